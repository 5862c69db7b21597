use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thrust_core::{
    ActuationController, CommandStats, ConsoleView, TestOrchestrator, TestRunState, TestStats,
    ThrusterRunState,
};
use thrust_io::metrics::{
    init_metrics, serve_metrics, COMMANDS_ACKNOWLEDGED, COMMANDS_FAILED, FORCE_CONNECTED,
    POLL_TICKS, POWER_CONNECTED, READ_FAILURES, SUPPLY_CURRENT, SUPPLY_VOLTAGE, TESTS_ABANDONED,
    TESTS_COMPLETED, TESTS_FAILED, TESTS_REJECTED, TEST_RUNNING, THRUSTER_RPM, THRUSTER_RUNNING,
    THRUST_FORCE,
};
use tokio::task::JoinHandle;
use tracing::info;

const UPDATE_PERIOD: Duration = Duration::from_millis(200);

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Counter values already pushed to prometheus.
#[derive(Debug, Clone, Copy, Default)]
pub struct Published {
    ticks: u64,
    rpm_failures: u64,
    power_failures: u64,
    force_failures: u64,
    commands: CommandStats,
    tests: TestStats,
}

pub fn start_metrics_updater(
    view: ConsoleView,
    controller: Arc<ActuationController>,
    orchestrator: Arc<TestOrchestrator>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut published = Published::default();
        let mut ticker = tokio::time::interval(UPDATE_PERIOD);
        while !stop.load(Ordering::Relaxed) {
            ticker.tick().await;
            published = publish(&view, controller.stats(), orchestrator.stats(), published);
        }
        // Final values so a scrape after shutdown sees the whole session.
        publish(&view, controller.stats(), orchestrator.stats(), published);
    })
}

/// Mirror the current view into the gauges and advance counters by the
/// delta since `last`.
pub fn publish(
    view: &ConsoleView,
    commands: CommandStats,
    tests: TestStats,
    last: Published,
) -> Published {
    let snapshot = view.telemetry();
    let reading = snapshot.reading;
    THRUSTER_RPM.set(reading.rpm as f64);
    SUPPLY_VOLTAGE.set(reading.voltage);
    SUPPLY_CURRENT.set(reading.current);
    if let Some(force) = reading.force {
        THRUST_FORCE.set(force);
    }
    POWER_CONNECTED.set(flag(snapshot.connection.power_connected));
    FORCE_CONNECTED.set(flag(snapshot.connection.force_connected));
    THRUSTER_RUNNING.set(flag(view.thruster() == ThrusterRunState::Running));
    TEST_RUNNING.set(flag(view.test_state() == TestRunState::Running));

    let stats = snapshot.stats;
    POLL_TICKS.inc_by(stats.ticks.saturating_sub(last.ticks));
    READ_FAILURES
        .with_label_values(&["rpm"])
        .inc_by(stats.rpm_failures.saturating_sub(last.rpm_failures));
    READ_FAILURES
        .with_label_values(&["power"])
        .inc_by(stats.power_failures.saturating_sub(last.power_failures));
    READ_FAILURES
        .with_label_values(&["force"])
        .inc_by(stats.force_failures.saturating_sub(last.force_failures));
    COMMANDS_ACKNOWLEDGED.inc_by(commands.acknowledged.saturating_sub(last.commands.acknowledged));
    COMMANDS_FAILED.inc_by(commands.failed.saturating_sub(last.commands.failed));
    TESTS_COMPLETED.inc_by(tests.completed.saturating_sub(last.tests.completed));
    TESTS_FAILED.inc_by(tests.failed.saturating_sub(last.tests.failed));
    TESTS_REJECTED.inc_by(tests.rejected.saturating_sub(last.tests.rejected));
    TESTS_ABANDONED.inc_by(tests.abandoned.saturating_sub(last.tests.abandoned));

    Published {
        ticks: stats.ticks,
        rpm_failures: stats.rpm_failures,
        power_failures: stats.power_failures,
        force_failures: stats.force_failures,
        commands,
        tests,
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}
