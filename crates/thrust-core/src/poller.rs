//! Recurring telemetry refresh.
//!
//! Once mounted, the poller reads RPM, power and force on a fixed period and
//! publishes them through its [`TelemetryWriter`]. It never waits on actuation
//! or test runs. Teardown cancels the schedule at once; a tick that is still
//! fetching finishes its current call but nothing it reads is applied.

use crate::gateway::{decode, DeviceGateway, ForcePayload, PowerPayload, Request, RpmPayload};
use crate::state::TelemetryWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerPhase {
    #[default]
    Idle,
    Scheduled,
    Fetching,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub period: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_POLL_PERIOD,
        }
    }
}

/// Whether a tick's reads were published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied,
    Discarded,
}

pub struct TelemetryPoller {
    gateway: Arc<dyn DeviceGateway>,
    writer: TelemetryWriter,
    config: PollerConfig,
}

impl TelemetryPoller {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        writer: TelemetryWriter,
        config: PollerConfig,
    ) -> Self {
        Self {
            gateway,
            writer,
            config,
        }
    }

    /// Mount the poller: the first tick fires one period from now.
    pub fn spawn(self) -> PollerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let (phase_tx, phase_rx) = watch::channel(PollerPhase::Idle);

        let task = tokio::spawn(self.run(Arc::clone(&stop), Arc::clone(&wake), phase_tx));

        PollerHandle {
            stop,
            wake,
            phase: phase_rx,
            task: Some(task),
        }
    }

    async fn run(
        self,
        stop: Arc<AtomicBool>,
        wake: Arc<Notify>,
        phase: watch::Sender<PollerPhase>,
    ) {
        let period = self.config.period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "Telemetry poller mounted");

        loop {
            phase.send_replace(PollerPhase::Scheduled);
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake.notified() => {}
            }
            if stop.load(Ordering::Acquire) {
                break;
            }

            phase.send_replace(PollerPhase::Fetching);
            if self.tick(&stop).await == TickOutcome::Discarded {
                debug!("Poll tick discarded after teardown");
                break;
            }
        }

        phase.send_replace(PollerPhase::Stopped);
        info!("Telemetry poller stopped");
    }

    /// One refresh: RPM, then power, then force. A failed read does not
    /// prevent the next one. Once `stop` is set nothing more is applied.
    pub async fn tick(&self, stop: &AtomicBool) -> TickOutcome {
        let rpm = decode::<RpmPayload>(self.gateway.call(&Request::ReadRpm).await);
        if stop.load(Ordering::Acquire) {
            return TickOutcome::Discarded;
        }
        if let Err(e) = &rpm {
            debug!(error = %e, "RPM read failed");
        }
        self.writer.update(|snap| snap.apply_rpm(&rpm));

        let power = decode::<PowerPayload>(self.gateway.call(&Request::ReadPower).await);
        if stop.load(Ordering::Acquire) {
            return TickOutcome::Discarded;
        }
        let previous = self.writer.update(|snap| snap.apply_power(&power));
        log_transition("power", previous.connection.power_connected, &power);

        let force = decode::<ForcePayload>(self.gateway.call(&Request::ReadForce).await);
        if stop.load(Ordering::Acquire) {
            return TickOutcome::Discarded;
        }
        let previous = self.writer.update(|snap| {
            snap.apply_force(&force);
            snap.complete_tick();
        });
        log_transition("force", previous.connection.force_connected, &force);

        TickOutcome::Applied
    }
}

// Warn once per connected -> disconnected edge rather than every tick.
fn log_transition<T>(
    subsystem: &'static str,
    was_connected: bool,
    read: &Result<T, crate::error::GatewayError>,
) {
    match read {
        Err(e) if was_connected => warn!(subsystem, error = %e, "Sensor link lost"),
        Err(e) => debug!(subsystem, error = %e, "Sensor read failed"),
        Ok(_) if !was_connected => debug!(subsystem, "Sensor read succeeded"),
        Ok(_) => {}
    }
}

/// Handle to a mounted poller. Dropping it tears the poller down.
pub struct PollerHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    phase: watch::Receiver<PollerPhase>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn phase(&self) -> PollerPhase {
        *self.phase.borrow()
    }

    /// Cancel the schedule. Returns immediately; results of an in-flight
    /// tick are discarded.
    pub fn teardown(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Tear down and wait for the poll task to exit.
    pub async fn shutdown(mut self) {
        self.teardown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Telemetry poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
