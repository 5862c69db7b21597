pub mod gateway_http;
pub mod metrics;
pub mod protocol;

pub use gateway_http::{HttpGateway, HttpGatewayConfig, HttpGatewayError};
pub use metrics::{init_metrics, serve_metrics};
pub use protocol::{parse_response, request_body, route, Method, Route};
