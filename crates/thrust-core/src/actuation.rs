//! Thruster start and stop commands.
//!
//! The displayed run state changes only when the bench acknowledges a
//! command. A failed command leaves it where it was.

use crate::error::ConsoleError;
use crate::gateway::{decode, DeviceGateway, Request, ThrusterStatus};
use crate::notify::{NotificationCenter, Severity};
use crate::setpoint::DutyCycle;
use crate::state::{ThrusterRunState, ThrusterWriter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Command outcomes since the controller was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    pub acknowledged: u64,
    pub failed: u64,
}

/// Start/stop commands for the thruster.
///
/// Commands share one FIFO lane per device: each waits for the previous one
/// to be acknowledged before it is issued, so the run state always follows
/// the last submitted command.
pub struct ActuationController {
    gateway: Arc<dyn DeviceGateway>,
    state: ThrusterWriter,
    notifications: NotificationCenter,
    lane: Mutex<()>,
    acknowledged: AtomicU64,
    failed: AtomicU64,
}

impl ActuationController {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        state: ThrusterWriter,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            gateway,
            state,
            notifications,
            lane: Mutex::new(()),
            acknowledged: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Start at `duty_cycle`, a fraction in `0.0..=1.0`. Out-of-range values
    /// are refused without a request.
    #[instrument(skip(self))]
    pub async fn start_thruster(&self, duty_cycle: f64) -> Result<(), ConsoleError> {
        let duty = match DutyCycle::from_fraction(duty_cycle) {
            Ok(duty) => duty,
            Err(violation) => {
                self.notifications.emit(
                    format!("Cannot start thruster: {}", violation),
                    Severity::Warning,
                );
                return Err(violation.into());
            }
        };

        let request = Request::StartThruster {
            duty_cycle: duty.fraction(),
        };
        self.command(request, ThrusterRunState::Running, "start").await
    }

    #[instrument(skip(self))]
    pub async fn stop_thruster(&self) -> Result<(), ConsoleError> {
        self.command(Request::StopThruster, ThrusterRunState::Stopped, "stop")
            .await
    }

    /// Query PWM state from the bench. Does not change the run state.
    pub async fn thruster_status(&self) -> Result<ThrusterStatus, ConsoleError> {
        let outcome = self.gateway.call(&Request::ThrusterStatus).await;
        match decode::<ThrusterStatus>(outcome) {
            Ok(status) => {
                self.notifications.emit(
                    format!(
                        "PWM {} at {} Hz",
                        if status.pwm_enabled { "enabled" } else { "disabled" },
                        status.pwm_frequency
                    ),
                    Severity::Info,
                );
                Ok(status)
            }
            Err(e) => {
                self.notifications
                    .emit(format!("Failed to read thruster status: {}", e), Severity::Danger);
                Err(e.into())
            }
        }
    }

    async fn command(
        &self,
        request: Request,
        target: ThrusterRunState,
        verb: &'static str,
    ) -> Result<(), ConsoleError> {
        let _lane = self.lane.lock().await;
        debug!(operation = request.operation().as_str(), "Issuing thruster command");

        match self.gateway.call(&request).await {
            Ok(_) => {
                let previous = self.state.set(target);
                self.acknowledged.fetch_add(1, Ordering::Relaxed);
                info!(
                    from = previous.as_str(),
                    to = target.as_str(),
                    "Thruster command acknowledged"
                );
                let message = match target {
                    ThrusterRunState::Running => "Thruster started successfully!",
                    ThrusterRunState::Stopped => "Thruster stopped successfully!",
                };
                self.notifications.emit(message, Severity::Success);
                Ok(())
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, kind = e.kind(), verb, "Thruster command failed");
                self.notifications.emit(
                    format!("Failed to {} thruster: {}", verb, e),
                    Severity::Danger,
                );
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> CommandStats {
        CommandStats {
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
