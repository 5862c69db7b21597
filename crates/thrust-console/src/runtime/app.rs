use crate::infra::audit::{Audit, AuditEventType, AuditLogger};
use crate::operator::{record_command, Actions, OperatorSession, SessionEnd};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thrust_core::gateway::ServiceStatus;
use thrust_core::{
    decode, ActuationController, DeviceGateway, NotificationCenter, PollerConfig, Request,
    SimulatedBench, StateExchange, TelemetryPoller, TestOrchestrator, ThrusterRunState, TimeBase,
};
use thrust_io::{HttpGateway, HttpGatewayConfig, HttpGatewayError};
use tokio::io::BufReader;
use tracing::{error, info, warn};

// Pending stdin reads sit on a blocking thread that cannot be cancelled.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    // Held until exit so the file writer flushes.
    let _log_guard = match init_tracing(config.json_logs, config.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build async runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(console(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    code
}

async fn console(config: RuntimeConfig) -> ExitCode {
    telemetry::init();
    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let timebase = TimeBase::new();
    let audit = match init_audit(config.audit_path.as_ref(), timebase) {
        Ok(audit) => audit,
        Err(e) => {
            error!(error = %e, "Audit logging requested but failed to initialize");
            return ExitCode::FAILURE;
        }
    };

    let (gateway, gateway_label) = match build_gateway(&config) {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "Failed to set up bench gateway");
            return ExitCode::FAILURE;
        }
    };
    check_service(gateway.as_ref()).await;

    let StateExchange {
        telemetry: telemetry_writer,
        thruster,
        test,
        view,
    } = StateExchange::new();
    let notifications = NotificationCenter::new(config.notification_ttl);
    let controller = Arc::new(ActuationController::new(
        Arc::clone(&gateway),
        thruster,
        notifications.clone(),
    ));
    let orchestrator = Arc::new(TestOrchestrator::new(
        Arc::clone(&gateway),
        test,
        notifications.clone(),
    ));

    info!(
        period_ms = config.poll_interval.as_millis() as u64,
        "Starting telemetry poller"
    );
    let poller = TelemetryPoller::new(
        Arc::clone(&gateway),
        telemetry_writer,
        PollerConfig {
            period: config.poll_interval,
        },
    )
    .spawn();

    let stop = Arc::new(AtomicBool::new(false));
    let updater = metrics_enabled.then(|| {
        telemetry::start_metrics_updater(
            view.clone(),
            Arc::clone(&controller),
            Arc::clone(&orchestrator),
            Arc::clone(&stop),
        )
    });

    audit.record(
        AuditEventType::ConsoleStart,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "gateway": gateway_label,
            "poll_interval_ms": config.poll_interval.as_millis() as u64,
            "metrics_enabled": metrics_enabled,
        }),
    );
    info!(gateway = %gateway_label, "Thrust bench console ready, type `help` for commands");

    let actions = Actions {
        controller: Arc::clone(&controller),
        orchestrator: Arc::clone(&orchestrator),
        audit: audit.clone(),
    };
    let mut session = OperatorSession::new(
        actions,
        view.clone(),
        &notifications,
        config.duty_percent,
        config.test_duration_s,
    );

    let run_for = config.run_seconds.map(Duration::from_secs);
    let deadline = async move {
        match run_for {
            Some(run_for) => tokio::time::sleep(run_for).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let reason = tokio::select! {
        end = session.run(BufReader::new(tokio::io::stdin())) => match end {
            SessionEnd::Quit => "operator quit",
            // Headless timed runs keep going after stdin closes.
            SessionEnd::InputClosed if run_for.is_some() => tokio::select! {
                _ = &mut deadline => "run duration elapsed",
                _ = shutdown_signal() => "interrupted",
            },
            SessionEnd::InputClosed => "input closed",
        },
        _ = &mut deadline => "run duration elapsed",
        _ = shutdown_signal() => "interrupted",
    };
    info!(reason, "Shutting down console");
    session.abandon().await;

    if view.thruster() == ThrusterRunState::Running {
        info!("Stopping thruster before exit");
        let result = controller.stop_thruster().await;
        record_command(&audit, "stop", &result);
    }

    poller.shutdown().await;
    stop.store(true, Ordering::Relaxed);
    if let Some(updater) = updater {
        if let Err(e) = updater.await {
            warn!(error = %e, "Metrics updater ended abnormally");
        }
    }

    let snapshot = view.telemetry();
    let commands = controller.stats();
    let tests = orchestrator.stats();
    info!(
        poll_ticks = snapshot.stats.ticks,
        commands_acknowledged = commands.acknowledged,
        commands_failed = commands.failed,
        tests_completed = tests.completed,
        tests_failed = tests.failed,
        tests_rejected = tests.rejected,
        tests_abandoned = tests.abandoned,
        uptime_s = timebase.uptime().as_secs_f64(),
        "Console stopped"
    );
    audit.record(
        AuditEventType::ConsoleShutdown,
        json!({
            "reason": reason,
            "poll_ticks": snapshot.stats.ticks,
            "commands_acknowledged": commands.acknowledged,
            "commands_failed": commands.failed,
            "tests_completed": tests.completed,
            "tests_failed": tests.failed,
            "tests_rejected": tests.rejected,
            "tests_abandoned": tests.abandoned,
        }),
    );

    ExitCode::SUCCESS
}

fn build_gateway(
    config: &RuntimeConfig,
) -> Result<(Arc<dyn DeviceGateway>, String), HttpGatewayError> {
    if config.simulate {
        info!("Using simulated bench");
        let gateway: Arc<dyn DeviceGateway> = Arc::new(SimulatedBench::new());
        return Ok((gateway, "simulated".to_string()));
    }

    let gateway = HttpGateway::new(HttpGatewayConfig {
        base_url: config.gateway_url.clone(),
        request_timeout: config.request_timeout,
        test_grace: config.test_grace,
    })?;
    let label = gateway.base_url().to_string();
    let gateway: Arc<dyn DeviceGateway> = Arc::new(gateway);
    Ok((gateway, label))
}

/// Not fatal: the poller shows the bench as disconnected until it answers.
async fn check_service(gateway: &dyn DeviceGateway) {
    match decode::<ServiceStatus>(gateway.call(&Request::ServiceStatus).await) {
        Ok(status) => info!(
            status = status.message.as_deref().unwrap_or("ok"),
            "Bench service reachable"
        ),
        Err(e) => warn!(error = %e, "Bench service not reachable"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn init_audit(audit_path: Option<&PathBuf>, timebase: TimeBase) -> std::io::Result<Audit> {
    let Some(path) = audit_path else {
        return Ok(Audit::disabled());
    };
    let logger = AuditLogger::new(path)?;
    info!(path = %path.display(), "Audit logging enabled");
    Ok(Audit::new(Some(Arc::new(logger)), timebase))
}
