//! Request/response seam to the bench control service.
//!
//! Every component talks to the device through [`DeviceGateway`]. An
//! implementation must never panic or leak a transport error type: every
//! failure comes back as a [`GatewayError`].

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartThruster,
    StopThruster,
    ThrusterStatus,
    StartTest,
    ReadRpm,
    ReadPower,
    ReadForce,
    ServiceStatus,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::StartThruster,
        Operation::StopThruster,
        Operation::ThrusterStatus,
        Operation::StartTest,
        Operation::ReadRpm,
        Operation::ReadPower,
        Operation::ReadForce,
        Operation::ServiceStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::StartThruster => "start-thruster",
            Operation::StopThruster => "stop-thruster",
            Operation::ThrusterStatus => "thruster-status",
            Operation::StartTest => "start-test",
            Operation::ReadRpm => "read-rpm",
            Operation::ReadPower => "read-power",
            Operation::ReadForce => "read-force",
            Operation::ServiceStatus => "service-status",
        }
    }
}

/// An operation together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    StartThruster { duty_cycle: f64 },
    StopThruster,
    ThrusterStatus,
    StartTest { duration_s: f64, duty_cycle: f64 },
    ReadRpm,
    ReadPower,
    ReadForce,
    ServiceStatus,
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::StartThruster { .. } => Operation::StartThruster,
            Request::StopThruster => Operation::StopThruster,
            Request::ThrusterStatus => Operation::ThrusterStatus,
            Request::StartTest { .. } => Operation::StartTest,
            Request::ReadRpm => Operation::ReadRpm,
            Request::ReadPower => Operation::ReadPower,
            Request::ReadForce => Operation::ReadForce,
            Request::ServiceStatus => Operation::ServiceStatus,
        }
    }
}

/// Success payload as returned by the service, or a normalized failure.
pub type Outcome = Result<serde_json::Value, GatewayError>;

#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn call(&self, request: &Request) -> Outcome;
}

/// Decode a success payload into a typed body. A payload that does not match
/// the expected shape is reported as [`GatewayError::Malformed`].
pub fn decode<T: DeserializeOwned>(outcome: Outcome) -> Result<T, GatewayError> {
    let value = outcome?;
    serde_json::from_value(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RpmPayload {
    pub rpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PowerPayload {
    pub voltage: f64,
    pub current: f64,
}

/// `force` is `null` when the load cell answered but had no reading.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ForcePayload {
    #[serde(default)]
    pub force: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThrusterStatus {
    pub pwm_enabled: bool,
    pub pwm_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_request_maps_to_its_operation() {
        let requests = [
            Request::StartThruster { duty_cycle: 0.5 },
            Request::StopThruster,
            Request::ThrusterStatus,
            Request::StartTest {
                duration_s: 1.0,
                duty_cycle: 0.5,
            },
            Request::ReadRpm,
            Request::ReadPower,
            Request::ReadForce,
            Request::ServiceStatus,
        ];
        let ops: Vec<Operation> = requests.iter().map(Request::operation).collect();
        assert_eq!(ops, Operation::ALL.to_vec());
    }

    #[test]
    fn decode_ignores_envelope_fields() {
        let outcome = Ok(json!({"status": "success", "voltage": 15.9, "current": 2.5}));
        let power: PowerPayload = decode(outcome).unwrap();
        assert_eq!(power.voltage, 15.9);
        assert_eq!(power.current, 2.5);
    }

    #[test]
    fn decode_reports_shape_mismatch_as_malformed() {
        let outcome = Ok(json!({"status": "success", "volts": 15.9}));
        let err = decode::<PowerPayload>(outcome).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn decode_passes_failures_through() {
        let outcome = Err(GatewayError::Rejected("Navigator not available".into()));
        let err = decode::<RpmPayload>(outcome).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("Navigator not available".into()));
    }

    #[test]
    fn absent_force_is_none() {
        let null: ForcePayload = decode(Ok(json!({"status": "success", "force": null}))).unwrap();
        assert_eq!(null.force, None);
        let missing: ForcePayload = decode(Ok(json!({"status": "success"}))).unwrap();
        assert_eq!(missing.force, None);
    }
}
