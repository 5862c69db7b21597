//! Connectivity inferred from the latest read of each subsystem.
//!
//! There is no heartbeat: a subsystem is connected exactly when its most
//! recent read succeeded and carried a plausible value.

use crate::error::GatewayError;
use crate::gateway::{ForcePayload, PowerPayload};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub power_connected: bool,
    pub force_connected: bool,
}

/// The supply is connected when the read succeeded and reports a positive
/// voltage.
pub fn power_connected(read: &Result<PowerPayload, GatewayError>) -> bool {
    matches!(read, Ok(power) if power.voltage > 0.0)
}

/// The load cell is connected when the read succeeded and a force value is
/// present. A successful call with `force: null` counts as disconnected.
pub fn force_connected(read: &Result<ForcePayload, GatewayError>) -> bool {
    matches!(read, Ok(ForcePayload { force: Some(_) }))
}
