use crate::connection::{self, ConnectionState};
use crate::error::GatewayError;
use crate::gateway::{ForcePayload, PowerPayload, RpmPayload};
use serde::Serialize;

/// Latest bench readings. A failed read leaves the previous values in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub rpm: u32,
    pub voltage: f64,
    pub current: f64,
    /// `None` until the load cell has produced a value.
    pub force: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub ticks: u64,
    pub rpm_failures: u64,
    pub power_failures: u64,
    pub force_failures: u64,
}

/// Everything the poller publishes: readings, derived connectivity and
/// counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub reading: SensorReading,
    pub connection: ConnectionState,
    pub stats: PollStats,
}

impl TelemetrySnapshot {
    pub fn apply_rpm(&mut self, read: &Result<RpmPayload, GatewayError>) {
        match read {
            Ok(payload) => self.reading.rpm = rpm_from_wire(payload.rpm),
            Err(_) => self.stats.rpm_failures += 1,
        }
    }

    pub fn apply_power(&mut self, read: &Result<PowerPayload, GatewayError>) {
        match read {
            Ok(payload) => {
                self.reading.voltage = payload.voltage;
                self.reading.current = payload.current;
            }
            Err(_) => self.stats.power_failures += 1,
        }
        self.connection.power_connected = connection::power_connected(read);
    }

    pub fn apply_force(&mut self, read: &Result<ForcePayload, GatewayError>) {
        match read {
            Ok(ForcePayload { force: Some(force) }) => self.reading.force = Some(*force),
            Ok(ForcePayload { force: None }) => {}
            Err(_) => self.stats.force_failures += 1,
        }
        self.connection.force_connected = connection::force_connected(read);
    }

    pub fn complete_tick(&mut self) {
        self.stats.ticks += 1;
    }
}

// The service reports pulse-derived RPM which may arrive as a float.
fn rpm_from_wire(rpm: f64) -> u32 {
    if rpm.is_finite() && rpm > 0.0 {
        rpm.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> GatewayError {
        GatewayError::Rejected("Could not connect".into())
    }

    #[test]
    fn failed_power_read_keeps_values_and_drops_flag() {
        let mut snap = TelemetrySnapshot::default();
        snap.apply_power(&Ok(PowerPayload {
            voltage: 16.0,
            current: 1.5,
        }));
        assert!(snap.connection.power_connected);

        snap.apply_power(&Err(rejected()));
        assert_eq!(snap.reading.voltage, 16.0);
        assert_eq!(snap.reading.current, 1.5);
        assert!(!snap.connection.power_connected);
        assert_eq!(snap.stats.power_failures, 1);
    }

    #[test]
    fn zero_voltage_success_overwrites_but_disconnects() {
        let mut snap = TelemetrySnapshot::default();
        snap.apply_power(&Ok(PowerPayload {
            voltage: 0.0,
            current: 0.0,
        }));
        assert_eq!(snap.reading.voltage, 0.0);
        assert!(!snap.connection.power_connected);
        assert_eq!(snap.stats.power_failures, 0);
    }

    #[test]
    fn null_force_keeps_last_value() {
        let mut snap = TelemetrySnapshot::default();
        snap.apply_force(&Ok(ForcePayload { force: Some(2.5) }));
        snap.apply_force(&Ok(ForcePayload { force: None }));
        assert_eq!(snap.reading.force, Some(2.5));
        assert!(!snap.connection.force_connected);
    }

    #[test]
    fn rpm_failure_keeps_last_value() {
        let mut snap = TelemetrySnapshot::default();
        snap.apply_rpm(&Ok(RpmPayload { rpm: 1440.0 }));
        snap.apply_rpm(&Err(GatewayError::Transport("timed out".into())));
        assert_eq!(snap.reading.rpm, 1440);
        assert_eq!(snap.stats.rpm_failures, 1);
    }

    #[test]
    fn negative_or_fractional_rpm_is_clamped_and_rounded() {
        assert_eq!(rpm_from_wire(-5.0), 0);
        assert_eq!(rpm_from_wire(1234.6), 1235);
        assert_eq!(rpm_from_wire(f64::INFINITY), 0);
    }
}
