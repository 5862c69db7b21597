//! Line-oriented operator front end.
//!
//! Each line on stdin is one command. Actions that talk to the bench run as
//! independent tasks, so `stop` is accepted while a test is still running.
//! Notifications are printed as they are emitted.

use crate::infra::audit::{Audit, AuditEventType};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use thrust_core::tags;
use thrust_core::{
    ActuationController, ConsoleError, ConsoleView, DutyCycle, Notification, NotificationCenter,
    TestConfiguration, TestOrchestrator, TestRunState,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const HELP: &str = "\
Commands:
  start [PCT]        start the thruster at PCT percent duty cycle
  stop               stop the thruster
  test [SECS] [PCT]  run a timed test
  duty <PCT>         set the default duty cycle
  duration <SECS>    set the default test duration
  show               print telemetry and run states
  thruster           query PWM status from the bench
  help               this list
  quit               exit the console
";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorCommand {
    Start { duty_percent: Option<f64> },
    Stop,
    Test {
        duration_s: Option<f64>,
        duty_percent: Option<f64>,
    },
    SetDuty(f64),
    SetDuration(f64),
    Show,
    Thruster,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command {0:?}, type `help` for a list")]
    UnknownCommand(String),
    #[error("{command} expects a number, got {value:?}")]
    NotANumber {
        command: &'static str,
        value: String,
    },
    #[error("{0} requires a value")]
    MissingArgument(&'static str),
    #[error("too many arguments for {0}")]
    TooManyArguments(&'static str),
}

impl OperatorCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_ascii_lowercase().as_str() {
            "start" => {
                let args = numbers("start", &rest, 1)?;
                OperatorCommand::Start {
                    duty_percent: args.first().copied(),
                }
            }
            "stop" => {
                numbers("stop", &rest, 0)?;
                OperatorCommand::Stop
            }
            "test" => {
                let args = numbers("test", &rest, 2)?;
                OperatorCommand::Test {
                    duration_s: args.first().copied(),
                    duty_percent: args.get(1).copied(),
                }
            }
            "duty" => OperatorCommand::SetDuty(required("duty", &rest)?),
            "duration" => OperatorCommand::SetDuration(required("duration", &rest)?),
            "show" | "status" => OperatorCommand::Show,
            "thruster" => OperatorCommand::Thruster,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" => OperatorCommand::Quit,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn numbers(command: &'static str, args: &[&str], max: usize) -> Result<Vec<f64>, ParseError> {
    if args.len() > max {
        return Err(ParseError::TooManyArguments(command));
    }
    args.iter()
        .map(|raw| {
            // "63.27%" reads the same as "63.27"
            let trimmed = raw.strip_suffix('%').unwrap_or(raw);
            trimmed.parse::<f64>().map_err(|_| ParseError::NotANumber {
                command,
                value: raw.to_string(),
            })
        })
        .collect()
}

fn required(command: &'static str, args: &[&str]) -> Result<f64, ParseError> {
    numbers(command, args, 1)?
        .first()
        .copied()
        .ok_or(ParseError::MissingArgument(command))
}

/// Components an operator action may drive.
#[derive(Clone)]
pub struct Actions {
    pub controller: Arc<ActuationController>,
    pub orchestrator: Arc<TestOrchestrator>,
    pub audit: Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    InputClosed,
}

pub struct OperatorSession {
    actions: Actions,
    view: ConsoleView,
    notifications: broadcast::Receiver<Notification>,
    test_state: watch::Receiver<TestRunState>,
    duty_percent: f64,
    duration_s: f64,
    pending: JoinSet<()>,
}

impl OperatorSession {
    pub fn new(
        actions: Actions,
        view: ConsoleView,
        notifications: &NotificationCenter,
        duty_percent: f64,
        duration_s: f64,
    ) -> Self {
        let test_state = view.watch_test_state();
        Self {
            actions,
            view,
            notifications: notifications.subscribe(),
            test_state,
            duty_percent,
            duration_s,
            pending: JoinSet::new(),
        }
    }

    /// Serve commands from `input` until `quit` or end of input.
    ///
    /// On end of input, actions already issued are awaited so a piped script
    /// sees all of its results. On `quit` they are abandoned.
    pub async fn run<R>(&mut self, input: R) -> SessionEnd
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let end = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line) == SessionFlow::Quit {
                            break SessionEnd::Quit;
                        }
                    }
                    Ok(None) => break SessionEnd::InputClosed,
                    Err(e) => {
                        warn!(error = %e, "Failed to read operator input");
                        break SessionEnd::InputClosed;
                    }
                },
                received = self.notifications.recv() => self.print_received(received),
                Ok(()) = self.test_state.changed() => self.audit_test_state(),
                Some(joined) = self.pending.join_next() => log_join(joined),
            }
        };

        if end == SessionEnd::InputClosed {
            self.drain().await;
        }
        self.flush_notifications();
        end
    }

    fn handle_line(&mut self, line: &str) -> SessionFlow {
        let command = match OperatorCommand::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return SessionFlow::Continue,
            Err(e) => {
                println!("! {}", e);
                return SessionFlow::Continue;
            }
        };
        debug!(?command, "Operator command");

        match command {
            OperatorCommand::Start { duty_percent } => {
                let duty_percent = duty_percent.unwrap_or(self.duty_percent);
                self.pending
                    .spawn(start_thruster(self.actions.clone(), duty_percent));
            }
            OperatorCommand::Stop => {
                self.pending.spawn(stop_thruster(self.actions.clone()));
            }
            OperatorCommand::Test {
                duration_s,
                duty_percent,
            } => {
                let duration_s = duration_s.unwrap_or(self.duration_s);
                let duty_percent = duty_percent.unwrap_or(self.duty_percent);
                self.pending
                    .spawn(run_test(self.actions.clone(), duration_s, duty_percent));
            }
            OperatorCommand::Thruster => {
                self.pending.spawn(query_thruster(self.actions.clone()));
            }
            OperatorCommand::SetDuty(percent) => match DutyCycle::from_percent(percent) {
                Ok(duty) => {
                    self.duty_percent = percent;
                    println!("duty cycle set to {}% ({})", percent, duty.fraction());
                }
                Err(e) => println!("! {}", e),
            },
            OperatorCommand::SetDuration(seconds) => {
                match TestConfiguration::from_operator_input(seconds, self.duty_percent).validate()
                {
                    Ok(_) => {
                        self.duration_s = seconds;
                        println!("test duration set to {} s", seconds);
                    }
                    Err(e) => println!("! {}", e),
                }
            }
            OperatorCommand::Show => {
                print!(
                    "{}",
                    render_status(&self.view, self.duty_percent, self.duration_s)
                );
            }
            OperatorCommand::Help => print!("{}", HELP),
            OperatorCommand::Quit => return SessionFlow::Quit,
        }
        SessionFlow::Continue
    }

    /// Cancel actions still waiting on the bench and record any test run
    /// that was cut short.
    pub async fn abandon(&mut self) {
        let before = self.actions.orchestrator.stats().abandoned;
        self.pending.shutdown().await;
        let abandoned = self
            .actions
            .orchestrator
            .stats()
            .abandoned
            .saturating_sub(before);
        if abandoned > 0 {
            self.actions.audit.record(
                AuditEventType::TestAbandoned,
                json!({ "runs": abandoned }),
            );
        }
        self.flush_notifications();
    }

    async fn drain(&mut self) {
        while !self.pending.is_empty() {
            tokio::select! {
                received = self.notifications.recv() => self.print_received(received),
                Ok(()) = self.test_state.changed() => self.audit_test_state(),
                Some(joined) = self.pending.join_next() => log_join(joined),
            }
        }
    }

    fn flush_notifications(&mut self) {
        loop {
            match self.notifications.try_recv() {
                Ok(notification) => println!("{}", format_notification(&notification)),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification printer fell behind")
                }
                Err(_) => break,
            }
        }
    }

    fn print_received(&self, received: Result<Notification, RecvError>) {
        match received {
            Ok(notification) => println!("{}", format_notification(&notification)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notification printer fell behind"),
            Err(RecvError::Closed) => {}
        }
    }

    // A test going to Running is the point the bench accepted the run.
    fn audit_test_state(&mut self) {
        let state = *self.test_state.borrow_and_update();
        if state == TestRunState::Running {
            self.actions.audit.record(
                AuditEventType::TestStarted,
                json!({ "thruster": self.view.thruster().as_str() }),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionFlow {
    Continue,
    Quit,
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            warn!(error = %e, "Operator action panicked");
        }
    }
}

async fn start_thruster(actions: Actions, duty_percent: f64) {
    let duty_cycle = duty_percent / 100.0;
    actions.audit.record(
        AuditEventType::ThrusterCommandRequested,
        json!({ "command": "start", "duty_cycle": duty_cycle }),
    );
    let result = actions.controller.start_thruster(duty_cycle).await;
    record_command(&actions.audit, "start", &result);
}

async fn stop_thruster(actions: Actions) {
    actions.audit.record(
        AuditEventType::ThrusterCommandRequested,
        json!({ "command": "stop" }),
    );
    let result = actions.controller.stop_thruster().await;
    record_command(&actions.audit, "stop", &result);
}

pub fn record_command(audit: &Audit, command: &str, result: &Result<(), ConsoleError>) {
    match result {
        Ok(()) => audit.record(
            AuditEventType::ThrusterCommandAcknowledged,
            json!({ "command": command }),
        ),
        Err(e) => audit.record(
            AuditEventType::ThrusterCommandFailed,
            json!({ "command": command, "error": e.to_string() }),
        ),
    }
}

async fn run_test(actions: Actions, duration_s: f64, duty_percent: f64) {
    let duty_cycle = duty_percent / 100.0;
    match actions.orchestrator.start_test(duration_s, duty_cycle).await {
        Ok(result) => actions.audit.record(
            AuditEventType::TestCompleted,
            json!({
                "duration_s": duration_s,
                "duty_cycle": duty_cycle,
                "data_points": result.data_point_count,
                "filename": result.filename,
            }),
        ),
        Err(ConsoleError::TestAlreadyRunning) => actions.audit.record(
            AuditEventType::TestRejected,
            json!({ "reason": "already running" }),
        ),
        Err(ConsoleError::InvalidInput(violation)) => actions.audit.record(
            AuditEventType::TestRejected,
            json!({ "reason": violation.to_string() }),
        ),
        Err(e) => actions.audit.record(
            AuditEventType::TestFailed,
            json!({ "duration_s": duration_s, "duty_cycle": duty_cycle, "error": e.to_string() }),
        ),
    }
}

async fn query_thruster(actions: Actions) {
    // The controller reports the outcome as a notification.
    let _ = actions.controller.thruster_status().await;
}

pub fn format_notification(notification: &Notification) -> String {
    format!(
        "[{:>7}] {}",
        notification.severity.as_str(),
        notification.message
    )
}

pub fn render_status(view: &ConsoleView, duty_percent: f64, duration_s: f64) -> String {
    let snapshot = view.telemetry();
    let reading = snapshot.reading;
    let link = |connected: bool| if connected { "connected" } else { "disconnected" };
    let force = match reading.force {
        Some(force) => format!("{:.2} {}", force, tags::FORCE.unit),
        None => "--".to_string(),
    };
    let last_test = match view.test_result() {
        Some(result) => format!(
            "{} data points{}",
            result.data_point_count,
            result
                .filename
                .map(|f| format!(" ({})", f))
                .unwrap_or_default()
        ),
        None => "none".to_string(),
    };

    format!(
        "thruster   {}\n\
         test       {} (last: {})\n\
         rpm        {} {}\n\
         supply     {:.2} {}  {:.2} {}  [{}]\n\
         force      {}  [{}]\n\
         defaults   duty {}%  duration {} s\n",
        view.thruster().as_str(),
        view.test_state().as_str(),
        last_test,
        reading.rpm,
        tags::RPM.unit,
        reading.voltage,
        tags::VOLTAGE.unit,
        reading.current,
        tags::CURRENT.unit,
        link(snapshot.connection.power_connected),
        force,
        link(snapshot.connection.force_connected),
        duty_percent,
        duration_s,
    )
}
