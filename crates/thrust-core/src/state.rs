//! Shared observable console state.
//!
//! State is split into three groups, each behind a `watch` channel whose
//! sender is owned by exactly one writer:
//!
//! | group      | writer                  |
//! |------------|-------------------------|
//! | telemetry  | [`TelemetryWriter`]     |
//! | thruster   | [`ThrusterWriter`]      |
//! | test runs  | [`TestWriter`]          |
//!
//! Writers are not `Clone`, so a second writer for a group cannot exist.
//! Readers hold a cloneable [`ConsoleView`].

use crate::telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ThrusterRunState {
    #[default]
    Stopped,
    Running,
}

impl ThrusterRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrusterRunState::Stopped => "stopped",
            ThrusterRunState::Running => "running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TestRunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl TestRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestRunState::Idle => "idle",
            TestRunState::Running => "running",
            TestRunState::Completed => "completed",
            TestRunState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Success,
    Error,
}

/// Summary returned by the bench when a test run finishes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestResult {
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(rename = "data_points")]
    pub data_point_count: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "duration")]
    pub duration_s: Option<f64>,
    #[serde(default)]
    pub filename: Option<String>,
}

pub struct TelemetryWriter {
    tx: watch::Sender<TelemetrySnapshot>,
}

impl TelemetryWriter {
    /// Apply an in-place update and return the snapshot before the change.
    pub fn update(&self, f: impl FnOnce(&mut TelemetrySnapshot)) -> TelemetrySnapshot {
        let mut previous = TelemetrySnapshot::default();
        self.tx.send_modify(|snap| {
            previous = *snap;
            f(snap);
        });
        previous
    }
}

pub struct ThrusterWriter {
    tx: watch::Sender<ThrusterRunState>,
}

impl ThrusterWriter {
    pub fn set(&self, state: ThrusterRunState) -> ThrusterRunState {
        self.tx.send_replace(state)
    }
}

pub struct TestWriter {
    state: watch::Sender<TestRunState>,
    result: watch::Sender<Option<TestResult>>,
}

impl TestWriter {
    pub fn set_state(&self, state: TestRunState) {
        self.state.send_replace(state);
    }

    pub fn publish_result(&self, result: TestResult) {
        self.result.send_replace(Some(result));
    }
}

#[derive(Clone)]
pub struct ConsoleView {
    telemetry: watch::Receiver<TelemetrySnapshot>,
    thruster: watch::Receiver<ThrusterRunState>,
    test_state: watch::Receiver<TestRunState>,
    test_result: watch::Receiver<Option<TestResult>>,
}

impl ConsoleView {
    pub fn telemetry(&self) -> TelemetrySnapshot {
        *self.telemetry.borrow()
    }

    pub fn thruster(&self) -> ThrusterRunState {
        *self.thruster.borrow()
    }

    pub fn test_state(&self) -> TestRunState {
        *self.test_state.borrow()
    }

    pub fn test_result(&self) -> Option<TestResult> {
        self.test_result.borrow().clone()
    }

    pub fn watch_test_state(&self) -> watch::Receiver<TestRunState> {
        self.test_state.clone()
    }
}

/// All writers plus a view, created together so each writer exists once.
pub struct StateExchange {
    pub telemetry: TelemetryWriter,
    pub thruster: ThrusterWriter,
    pub test: TestWriter,
    pub view: ConsoleView,
}

impl StateExchange {
    pub fn new() -> Self {
        let (telemetry_tx, telemetry_rx) = watch::channel(TelemetrySnapshot::default());
        let (thruster_tx, thruster_rx) = watch::channel(ThrusterRunState::default());
        let (state_tx, state_rx) = watch::channel(TestRunState::default());
        let (result_tx, result_rx) = watch::channel(None);

        Self {
            telemetry: TelemetryWriter { tx: telemetry_tx },
            thruster: ThrusterWriter { tx: thruster_tx },
            test: TestWriter {
                state: state_tx,
                result: result_tx,
            },
            view: ConsoleView {
                telemetry: telemetry_rx,
                thruster: thruster_rx,
                test_state: state_rx,
                test_result: result_rx,
            },
        }
    }
}

impl Default for StateExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writers_are_visible_through_the_view() {
        let exchange = StateExchange::new();
        let view = exchange.view.clone();

        exchange.thruster.set(ThrusterRunState::Running);
        exchange.test.set_state(TestRunState::Running);
        exchange.telemetry.update(|snap| snap.reading.rpm = 900);

        assert_eq!(view.thruster(), ThrusterRunState::Running);
        assert_eq!(view.test_state(), TestRunState::Running);
        assert_eq!(view.telemetry().reading.rpm, 900);
        assert!(view.test_result().is_none());
    }

    #[test]
    fn update_returns_previous_snapshot() {
        let exchange = StateExchange::new();
        exchange.telemetry.update(|snap| snap.reading.rpm = 100);
        let previous = exchange.telemetry.update(|snap| snap.reading.rpm = 200);
        assert_eq!(previous.reading.rpm, 100);
        assert_eq!(exchange.view.telemetry().reading.rpm, 200);
    }

    #[test]
    fn test_result_parses_service_summary() {
        let raw = r#"{
            "status": "success",
            "duration": 10,
            "data_points": 42,
            "filename": "thruster_test_20250826_101500.csv"
        }"#;
        let result: TestResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.data_point_count, 42);
        assert_eq!(result.duration_s, Some(10.0));
        assert_eq!(
            result.filename.as_deref(),
            Some("thruster_test_20250826_101500.csv")
        );
    }
}
