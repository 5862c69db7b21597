use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use thrust_io::gateway_http::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEST_GRACE};

/// Duty cycle the operator page started with, in percent.
pub const DEFAULT_DUTY_PERCENT: f64 = 63.27;
pub const DEFAULT_TEST_DURATION_S: f64 = 10.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{flag} requires a value")]
    MissingValue { flag: String },
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },
    #[error("unknown option {0}")]
    UnknownOption(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub gateway_url: String,
    pub simulate: bool,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub test_grace: Duration,
    pub notification_ttl: Duration,
    pub duty_percent: f64,
    pub test_duration_s: f64,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            gateway_url: DEFAULT_BASE_URL.to_string(),
            simulate: false,
            poll_interval: thrust_core::poller::DEFAULT_POLL_PERIOD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            test_grace: DEFAULT_TEST_GRACE,
            notification_ttl: thrust_core::notify::DEFAULT_DISPLAY_WINDOW,
            duty_percent: DEFAULT_DUTY_PERCENT,
            test_duration_s: DEFAULT_TEST_DURATION_S,
            run_seconds: None,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            audit_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--gateway" => {
                    cfg.gateway_url = value(args, &mut i)?.to_string();
                }
                "--simulate" => {
                    cfg.simulate = true;
                }
                "--poll-interval-ms" => {
                    cfg.poll_interval = Duration::from_millis(parse_positive(args, &mut i)?);
                }
                "--request-timeout-ms" => {
                    cfg.request_timeout = Duration::from_millis(parse_positive(args, &mut i)?);
                }
                "--test-grace-secs" => {
                    cfg.test_grace = Duration::from_secs(parse(args, &mut i)?);
                }
                "--notification-ttl-ms" => {
                    cfg.notification_ttl = Duration::from_millis(parse_positive(args, &mut i)?);
                }
                "--duty-cycle" => {
                    cfg.duty_percent = parse(args, &mut i)?;
                }
                "--test-duration" => {
                    cfg.test_duration_s = parse(args, &mut i)?;
                }
                "--run-seconds" => {
                    cfg.run_seconds = Some(parse(args, &mut i)?);
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-dir" => {
                    cfg.log_dir = Some(PathBuf::from(value(args, &mut i)?));
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(value(args, &mut i)?.to_string());
                }
                "--audit-log" => {
                    cfg.audit_path = Some(PathBuf::from(value(args, &mut i)?));
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn print_help() {
        println!(
            r#"thrust-console - Operator console for the thruster test bench

USAGE:
    thrust-console [OPTIONS]

OPTIONS:
    --gateway <URL>            Bench control service base URL [default: http://127.0.0.1:8000]
    --simulate                 Drive an in-process simulated bench instead of the service
    --poll-interval-ms <MS>    Telemetry refresh period [default: 1000]
    --request-timeout-ms <MS>  Timeout for a single service call [default: 5000]
    --test-grace-secs <SECS>   Extra time allowed for a test run to answer [default: 30]
    --notification-ttl-ms <MS> How long a notification stays visible [default: 5000]
    --duty-cycle <PCT>         Initial duty cycle in percent [default: 63.27]
    --test-duration <SECS>     Initial test duration in seconds [default: 10]
    --run-seconds <SECS>       Run for a fixed duration then exit
    --json-logs                Output logs in JSON format (for log aggregation)
    --log-dir <PATH>           Also write daily-rolling log files to this directory
    --metrics-addr <ADDR>      Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>         Enable audit logging to specified JSONL file
    -h, --help                 Print this help message

COMMANDS (stdin):
    start [PCT]                Start the thruster (duty cycle in percent)
    stop                       Stop the thruster
    test [SECS] [PCT]          Run a timed test
    duty <PCT>                 Set the default duty cycle
    duration <SECS>            Set the default test duration
    show                       Print the latest telemetry and run states
    thruster                   Query PWM status from the bench
    help                       List commands
    quit                       Exit

ENVIRONMENT VARIABLES:
    RUST_LOG                   Set log filter (e.g., RUST_LOG=debug,thrust_core=trace)

EXAMPLES:
    # Against the bench service with metrics
    thrust-console --gateway http://bench.local:8000 --metrics-addr 0.0.0.0:9090

    # Short simulated run
    thrust-console --simulate --run-seconds 10
"#
        );
    }
}

fn value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, ConfigError> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue { flag: flag.clone() })
}

fn parse<T: std::str::FromStr>(args: &[String], i: &mut usize) -> Result<T, ConfigError> {
    let flag = args[*i].clone();
    let raw = value(args, i)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

fn parse_positive(args: &[String], i: &mut usize) -> Result<u64, ConfigError> {
    let flag = args[*i].clone();
    match parse::<u64>(args, i)? {
        0 => Err(ConfigError::InvalidValue {
            flag,
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("thrust-console")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_match_operator_page() {
        let cfg = RuntimeConfig::from_args(&args(&[])).unwrap();
        assert_eq!(cfg.duty_percent, 63.27);
        assert_eq!(cfg.test_duration_s, 10.0);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.notification_ttl, Duration::from_secs(5));
        assert_eq!(cfg.gateway_url, "http://127.0.0.1:8000");
        assert!(!cfg.simulate);
    }

    #[test]
    fn parses_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--simulate",
            "--poll-interval-ms",
            "250",
            "--duty-cycle",
            "70",
            "--run-seconds",
            "3",
            "--audit-log",
            "/tmp/audit.jsonl",
        ]))
        .unwrap();
        assert!(cfg.simulate);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.duty_percent, 70.0);
        assert_eq!(cfg.run_seconds, Some(3));
        assert_eq!(cfg.audit_path, Some(PathBuf::from("/tmp/audit.jsonl")));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--poll-interval-ms", "0"])).unwrap_err(),
            ConfigError::InvalidValue {
                flag: "--poll-interval-ms".into(),
                value: "0".into()
            }
        );
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--gateway"])).unwrap_err(),
            ConfigError::MissingValue {
                flag: "--gateway".into()
            }
        );
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--bind", "x"])),
            Err(ConfigError::UnknownOption(_))
        ));
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--nonsense"])).unwrap();
        assert!(cfg.show_help);
    }
}
