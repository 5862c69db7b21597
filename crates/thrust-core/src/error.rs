//! Error taxonomy shared by the gateway seam and the console components.

use crate::setpoint::InputViolation;
use thiserror::Error;

/// Normalized failure of a single gateway call.
///
/// The `Display` output is the operator-facing message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Network failure, timeout or a non-2xx status without a usable body.
    #[error("{0}")]
    Transport(String),

    /// Well-formed error response from the bench service.
    #[error("{0}")]
    Rejected(String),

    /// Response arrived but could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::Rejected(_) => "rejected",
            GatewayError::Malformed(_) => "malformed",
        }
    }
}

/// Failure of an operator-initiated console operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Test already running")]
    TestAlreadyRunning,

    #[error(transparent)]
    InvalidInput(#[from] InputViolation),
}
