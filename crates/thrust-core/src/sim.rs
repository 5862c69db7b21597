use crate::error::GatewayError;
use crate::gateway::{DeviceGateway, Operation, Outcome, Request};
use crate::timebase::unix_us;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Duty cycle at which the ESC holds the thruster still.
pub const NEUTRAL_DUTY: f64 = 0.5;
pub const PWM_FREQUENCY_HZ: f64 = 333.0;
/// Sampling period of a test run on the bench.
pub const TEST_SAMPLE_PERIOD: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Bench {
    pwm_enabled: bool,
    duty_cycle: f64,
    speed_rpm: f64,

    max_rpm: f64,
    time_constant_s: f64,
    supply_voltage: f64,
    source_resistance: f64,
    idle_current: f64,
    max_current: f64,
    max_thrust_kgf: f64,

    last_step: Instant,
}

impl Bench {
    fn new() -> Self {
        Self {
            pwm_enabled: false,
            duty_cycle: NEUTRAL_DUTY,
            speed_rpm: 0.0,
            max_rpm: 3500.0,
            time_constant_s: 0.4,
            supply_voltage: 16.0,
            source_resistance: 0.05,
            idle_current: 0.15,
            max_current: 12.0,
            max_thrust_kgf: 5.0,
            last_step: Instant::now(),
        }
    }

    fn target_rpm(&self) -> f64 {
        if !self.pwm_enabled {
            return 0.0;
        }
        ((self.duty_cycle - NEUTRAL_DUTY).abs() * 2.0 * self.max_rpm).min(self.max_rpm)
    }

    fn step(&mut self) {
        let now = Instant::now();
        let dt_s = now.duration_since(self.last_step).as_secs_f64();
        self.last_step = now;

        let speed_error = self.target_rpm() - self.speed_rpm;
        self.speed_rpm += speed_error * (1.0 - (-dt_s / self.time_constant_s).exp());
        if self.speed_rpm < 0.5 && self.target_rpm() == 0.0 {
            self.speed_rpm = 0.0;
        }
    }

    fn load(&self) -> f64 {
        self.speed_rpm / self.max_rpm
    }

    fn current(&self) -> f64 {
        self.idle_current + self.max_current * self.load().powi(2)
    }

    fn voltage(&self) -> f64 {
        self.supply_voltage - self.source_resistance * self.current()
    }

    fn force(&self) -> f64 {
        let direction = if self.duty_cycle >= NEUTRAL_DUTY { 1.0 } else { -1.0 };
        direction * self.max_thrust_kgf * self.load().powi(2)
    }
}

#[derive(Debug, Default)]
struct Faults {
    failures: HashMap<Operation, String>,
    latency: HashMap<Operation, Duration>,
    force_absent: bool,
    supply_off: bool,
}

/// In-process stand-in for the bench service.
///
/// A first-order motor model turns the commanded duty cycle into RPM, current
/// draw, supply sag and thrust. Failures, latency and sensor dropouts can be
/// injected per operation.
#[derive(Debug)]
pub struct SimulatedBench {
    bench: Mutex<Bench>,
    faults: Mutex<Faults>,
    calls: Mutex<HashMap<Operation, u64>>,
}

impl SimulatedBench {
    pub fn new() -> Self {
        Self {
            bench: Mutex::new(Bench::new()),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Make every call to `operation` fail with `message`.
    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        lock(&self.faults).failures.insert(operation, message.into());
    }

    pub fn recover(&self, operation: Operation) {
        lock(&self.faults).failures.remove(&operation);
    }

    pub fn set_latency(&self, operation: Operation, latency: Duration) {
        lock(&self.faults).latency.insert(operation, latency);
    }

    /// The load cell answers but reports no value.
    pub fn set_force_absent(&self, absent: bool) {
        lock(&self.faults).force_absent = absent;
    }

    /// The supply answers with zero output.
    pub fn set_supply_off(&self, off: bool) {
        lock(&self.faults).supply_off = off;
    }

    pub fn calls(&self, operation: Operation) -> u64 {
        lock(&self.calls).get(&operation).copied().unwrap_or(0)
    }

    pub fn pwm_enabled(&self) -> bool {
        lock(&self.bench).pwm_enabled
    }

    pub fn duty_cycle(&self) -> f64 {
        lock(&self.bench).duty_cycle
    }

    fn start(&self, duty_cycle: f64) {
        let mut bench = lock(&self.bench);
        bench.step();
        bench.pwm_enabled = true;
        bench.duty_cycle = duty_cycle;
    }

    fn stop(&self) {
        let mut bench = lock(&self.bench);
        bench.step();
        bench.duty_cycle = NEUTRAL_DUTY;
        bench.pwm_enabled = false;
    }

    async fn run_test(&self, duration_s: f64, duty_cycle: f64) -> Outcome {
        let Ok(run_for) = Duration::try_from_secs_f64(duration_s) else {
            return Err(GatewayError::Rejected(format!(
                "Invalid test duration: {}",
                duration_s
            )));
        };
        self.start(duty_cycle);
        let started = Instant::now();
        let mut data_points = 0u64;
        while started.elapsed() < run_for {
            lock(&self.bench).step();
            data_points += 1;
            tokio::time::sleep(TEST_SAMPLE_PERIOD).await;
        }
        self.stop();

        Ok(json!({
            "status": "success",
            "duration": duration_s,
            "data_points": data_points,
            "filename": format!("thruster_test_{}.csv", unix_us() / 1_000_000),
        }))
    }
}

impl Default for SimulatedBench {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceGateway for SimulatedBench {
    async fn call(&self, request: &Request) -> Outcome {
        let operation = request.operation();
        *lock(&self.calls).entry(operation).or_insert(0) += 1;

        let (failure, latency, force_absent, supply_off) = {
            let faults = lock(&self.faults);
            (
                faults.failures.get(&operation).cloned(),
                faults.latency.get(&operation).copied(),
                faults.force_absent,
                faults.supply_off,
            )
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = failure {
            return Err(GatewayError::Rejected(message));
        }

        match request {
            Request::StartThruster { duty_cycle } => {
                self.start(*duty_cycle);
                Ok(json!({"status": "success", "duty_cycle": duty_cycle, "channel": 1}))
            }
            Request::StopThruster => {
                self.stop();
                Ok(json!({"status": "success", "message": "Thruster stopped"}))
            }
            Request::ThrusterStatus => Ok(json!({
                "status": "success",
                "pwm_enabled": self.pwm_enabled(),
                "pwm_frequency": PWM_FREQUENCY_HZ,
            })),
            Request::StartTest {
                duration_s,
                duty_cycle,
            } => self.run_test(*duration_s, *duty_cycle).await,
            Request::ReadRpm => {
                let mut bench = lock(&self.bench);
                bench.step();
                Ok(json!({"status": "success", "rpm": bench.speed_rpm.round()}))
            }
            Request::ReadPower => {
                let mut bench = lock(&self.bench);
                bench.step();
                let (voltage, current) = if supply_off {
                    (0.0, 0.0)
                } else {
                    (bench.voltage(), bench.current())
                };
                Ok(json!({"status": "success", "voltage": voltage, "current": current}))
            }
            Request::ReadForce => {
                let mut bench = lock(&self.bench);
                bench.step();
                let force = if force_absent { None } else { Some(bench.force()) };
                Ok(json!({"status": "success", "force": force}))
            }
            Request::ServiceStatus => Ok(json!({
                "status": "success",
                "message": "Simulated bench running",
            })),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
