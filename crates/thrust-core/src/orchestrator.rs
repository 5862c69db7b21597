//! Single-flight execution of timed test runs.
//!
//! At most one run is in flight. The slot is claimed with one atomic
//! check-and-set and released only after the run state and the operator
//! notification are settled, so a second caller never observes a free slot
//! next to a `Running` state.

use crate::error::ConsoleError;
use crate::gateway::{decode, DeviceGateway, Request};
use crate::notify::{NotificationCenter, Severity};
use crate::setpoint::TestConfiguration;
use crate::state::{TestResult, TestRunState, TestWriter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome counters since the orchestrator was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestStats {
    pub completed: u64,
    pub failed: u64,
    /// Refused because another run held the slot.
    pub rejected: u64,
    /// Dropped before the bench answered.
    pub abandoned: u64,
}

/// Claim on the single test slot.
///
/// Dropping an unsettled claim marks the run failed before the slot is freed.
struct FlightGuard<'a> {
    owner: &'a TestOrchestrator,
    settled: bool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(owner: &'a TestOrchestrator) -> Option<Self> {
        owner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                owner,
                settled: false,
            })
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.owner.abandon();
        }
        self.owner.in_flight.store(false, Ordering::Release);
    }
}

/// Runs timed tests on the bench, one at a time.
pub struct TestOrchestrator {
    gateway: Arc<dyn DeviceGateway>,
    state: TestWriter,
    notifications: NotificationCenter,
    in_flight: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    abandoned: AtomicU64,
}

impl TestOrchestrator {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        state: TestWriter,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            gateway,
            state,
            notifications,
            in_flight: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    /// Run one test to completion.
    ///
    /// An invalid configuration is refused first, without touching the slot.
    /// A call made while another test is running is then rejected before any
    /// request is sent. The bench answers only when the run is over, so this
    /// future stays pending for at least `duration_s`. Dropping it early
    /// leaves the test `Failed`.
    #[instrument(skip(self))]
    pub async fn start_test(
        &self,
        duration_s: f64,
        duty_cycle: f64,
    ) -> Result<TestResult, ConsoleError> {
        let config = match TestConfiguration::new(duration_s, duty_cycle).validate() {
            Ok(config) => config,
            Err(violation) => {
                self.notifications
                    .emit(format!("Cannot start test: {}", violation), Severity::Warning);
                return Err(violation.into());
            }
        };

        let Some(guard) = FlightGuard::acquire(self) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Test start rejected, a test is already running");
            self.notifications
                .emit("Test already running!", Severity::Warning);
            return Err(ConsoleError::TestAlreadyRunning);
        };

        self.state.set_state(TestRunState::Running);
        info!(
            duration_s = config.duration_s(),
            duty_cycle = config.duty_cycle(),
            "Test run started"
        );

        let request = Request::StartTest {
            duration_s: config.duration_s(),
            duty_cycle: config.duty_cycle(),
        };
        let outcome = decode::<TestResult>(self.gateway.call(&request).await);

        let result = match outcome {
            Ok(result) => {
                self.state.publish_result(result.clone());
                self.state.set_state(TestRunState::Completed);
                self.completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    data_points = result.data_point_count,
                    filename = ?result.filename,
                    "Test run completed"
                );
                self.notifications.emit(
                    format!(
                        "Test completed! Collected {} data points.",
                        result.data_point_count
                    ),
                    Severity::Success,
                );
                Ok(result)
            }
            Err(e) => {
                self.state.set_state(TestRunState::Failed);
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, kind = e.kind(), "Test run failed");
                self.notifications
                    .emit(format!("Test failed: {}", e), Severity::Danger);
                Err(e.into())
            }
        };

        // State and notification are settled; only now may a new run start.
        guard.settle();
        result
    }

    fn abandon(&self) {
        self.state.set_state(TestRunState::Failed);
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        warn!("Test run abandoned before the bench answered");
        self.notifications
            .emit("Test abandoned before completion.", Severity::Danger);
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> TestStats {
        TestStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
