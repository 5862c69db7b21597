pub mod actuation;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod orchestrator;
pub mod poller;
pub mod setpoint;
#[cfg(feature = "simulation")]
pub mod sim;
pub mod state;
pub mod tags;
pub mod telemetry;
mod telemetry_proptest;
pub mod timebase;

pub use actuation::{ActuationController, CommandStats};
pub use connection::ConnectionState;
pub use error::{ConsoleError, GatewayError};
pub use gateway::{decode, DeviceGateway, Operation, Outcome, Request};
pub use notify::{Notification, NotificationCenter, Severity};
pub use orchestrator::{TestOrchestrator, TestStats};
pub use poller::{PollerConfig, PollerHandle, PollerPhase, TelemetryPoller};
pub use setpoint::{DutyCycle, InputViolation, TestConfiguration, Unvalidated, Validated};
#[cfg(feature = "simulation")]
pub use sim::SimulatedBench;
pub use state::{
    ConsoleView, ResultStatus, StateExchange, TestResult, TestRunState, ThrusterRunState,
};
pub use telemetry::{SensorReading, TelemetrySnapshot};
pub use timebase::TimeBase;
