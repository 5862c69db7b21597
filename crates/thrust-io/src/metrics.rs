//! Prometheus metrics for the thrust bench console.
//!
//! Gauges mirror the latest telemetry and run states; counters track polling
//! and operator actions.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use thrust_core::tags;
use tiny_http::{Response, Server};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// ============================================================================
// Telemetry
// ============================================================================

pub static THRUSTER_RPM: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::RPM.metric, "Latest thruster speed in RPM"));

pub static SUPPLY_VOLTAGE: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::VOLTAGE.metric, "Latest supply voltage in volts"));

pub static SUPPLY_CURRENT: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::CURRENT.metric, "Latest supply current in amps"));

pub static THRUST_FORCE: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::FORCE.metric, "Latest load cell reading in kgf"));

/// 1 = connected, 0 = disconnected
pub static POWER_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        tags::POWER_CONNECTED.metric,
        "Power supply link status (1=connected, 0=disconnected)",
    )
});

pub static FORCE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        tags::FORCE_CONNECTED.metric,
        "Load cell link status (1=connected, 0=disconnected)",
    )
});

pub static THRUSTER_RUNNING: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        tags::THRUSTER_RUNNING.metric,
        "Thruster run state as last acknowledged (1=running)",
    )
});

pub static TEST_RUNNING: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::TEST_RUNNING.metric, "Test run in progress (1=running)"));

// ============================================================================
// Counters
// ============================================================================

pub static POLL_TICKS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "thrustbench_poll_ticks_total",
        "Completed telemetry poll ticks",
    )
});

/// Failed sensor reads, labelled by sensor.
pub static READ_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "thrustbench_sensor_read_failures_total",
            "Sensor reads that failed",
        ),
        &["sensor"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static COMMANDS_ACKNOWLEDGED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "thrustbench_commands_acknowledged_total",
        "Thruster commands acknowledged by the bench",
    )
});

pub static COMMANDS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "thrustbench_commands_failed_total",
        "Thruster commands that failed",
    )
});

pub static TESTS_COMPLETED: LazyLock<IntCounter> =
    LazyLock::new(|| counter("thrustbench_tests_completed_total", "Completed test runs"));

pub static TESTS_FAILED: LazyLock<IntCounter> =
    LazyLock::new(|| counter("thrustbench_tests_failed_total", "Failed test runs"));

pub static TESTS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "thrustbench_tests_rejected_total",
        "Test starts rejected while another run was in progress",
    )
});

pub static TESTS_ABANDONED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "thrustbench_tests_abandoned_total",
        "Test runs dropped before the bench answered",
    )
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => match render() {
                    Ok(buffer) => Response::from_data(buffer).with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        )
                        .unwrap(),
                    ),
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        Response::from_string("Internal Server Error").with_status_code(500)
                    }
                },
                "/health" => Response::from_string("OK"),
                // Ready once telemetry has been refreshed at least once
                "/ready" if POLL_TICKS.get() > 0 => Response::from_string("Ready"),
                "/ready" => Response::from_string("Not Ready").with_status_code(503),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}

/// Text exposition of every registered metric.
pub fn render() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = THRUSTER_RPM.get();
    let _ = SUPPLY_VOLTAGE.get();
    let _ = SUPPLY_CURRENT.get();
    let _ = THRUST_FORCE.get();
    let _ = POWER_CONNECTED.get();
    let _ = FORCE_CONNECTED.get();
    let _ = THRUSTER_RUNNING.get();
    let _ = TEST_RUNNING.get();
    let _ = POLL_TICKS.get();
    for sensor in ["rpm", "power", "force"] {
        let _ = READ_FAILURES.with_label_values(&[sensor]).get();
    }
    let _ = COMMANDS_ACKNOWLEDGED.get();
    let _ = COMMANDS_FAILED.get();
    let _ = TESTS_COMPLETED.get();
    let _ = TESTS_FAILED.get();
    let _ = TESTS_REJECTED.get();
    let _ = TESTS_ABANDONED.get();
}
