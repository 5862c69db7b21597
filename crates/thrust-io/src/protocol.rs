//! Wire format of the bench control service.
//!
//! Every response is a JSON object carrying a `status` discriminator
//! (`"success"` or `"error"`); error responses carry a `message`. The
//! remaining fields are the operation payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thrust_core::{GatewayError, Operation, Outcome, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
}

pub const fn route(operation: Operation) -> Route {
    match operation {
        Operation::StartThruster => Route {
            method: Method::Post,
            path: "/thruster/start",
        },
        Operation::StopThruster => Route {
            method: Method::Post,
            path: "/thruster/stop",
        },
        Operation::ThrusterStatus => Route {
            method: Method::Get,
            path: "/thruster/status",
        },
        Operation::StartTest => Route {
            method: Method::Post,
            path: "/tests/start",
        },
        Operation::ReadRpm => Route {
            method: Method::Get,
            path: "/sensors/rpm",
        },
        Operation::ReadPower => Route {
            method: Method::Get,
            path: "/sensors/power",
        },
        Operation::ReadForce => Route {
            method: Method::Get,
            path: "/sensors/force",
        },
        Operation::ServiceStatus => Route {
            method: Method::Get,
            path: "/status",
        },
    }
}

#[derive(Debug, Serialize)]
pub struct StartThrusterBody {
    pub duty_cycle: f64,
}

#[derive(Debug, Serialize)]
pub struct StartTestBody {
    pub duration: f64,
    pub duty_cycle: f64,
}

/// JSON body to send with `request`, if the route takes one.
pub fn request_body(request: &Request) -> Option<Value> {
    let body = match request {
        Request::StartThruster { duty_cycle } => serde_json::to_value(StartThrusterBody {
            duty_cycle: *duty_cycle,
        }),
        Request::StartTest {
            duration_s,
            duty_cycle,
        } => serde_json::to_value(StartTestBody {
            duration: *duration_s,
            duty_cycle: *duty_cycle,
        }),
        _ => return None,
    };
    body.ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<ResponseStatus>,
    #[serde(default)]
    message: Option<String>,
}

/// Normalize an HTTP response into an [`Outcome`].
///
/// A service-supplied `message` wins over the HTTP status text, matching
/// what the operator would otherwise read in the service logs.
pub fn parse_response(http_status: u16, body: &str) -> Outcome {
    let ok_status = (200..300).contains(&http_status);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if ok_status => return Err(GatewayError::Malformed(e.to_string())),
        Err(_) => return Err(status_failure(http_status)),
    };

    let envelope: Envelope = match serde_json::from_value(value.clone()) {
        Ok(envelope) => envelope,
        Err(e) if ok_status => return Err(GatewayError::Malformed(e.to_string())),
        Err(_) => return Err(status_failure(http_status)),
    };

    match (envelope.status, envelope.message) {
        (Some(ResponseStatus::Success), _) if ok_status => Ok(value),
        (Some(ResponseStatus::Error), Some(message)) => Err(GatewayError::Rejected(message)),
        (_, Some(message)) if !ok_status => Err(GatewayError::Rejected(message)),
        (Some(ResponseStatus::Error), None) => Err(GatewayError::Rejected(format!(
            "Request failed with status code {}",
            http_status
        ))),
        (None, _) if ok_status => Err(GatewayError::Malformed(
            "response has no status field".to_string(),
        )),
        _ => Err(status_failure(http_status)),
    }
}

fn status_failure(http_status: u16) -> GatewayError {
    GatewayError::Transport(format!("Request failed with status code {}", http_status))
}
