use api_types::envelope::{self, Envelope};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};

pub use proxy::Proxy;
pub use public_config::{AnalyticsIds, PublicConfig};
pub use server::{ServerConfig, run_with_listener, spawn_with_listener};

mod proxy;
mod public_config;
mod server;

/// Fixed message of the 502 envelope. Transport details only go to the log.
pub const PROXY_ERROR_MESSAGE: &str = "Unable to reach the backend service";

/// Failures produced by the edge itself, never by the backend.
#[derive(Debug)]
pub enum ServerError {
    Proxy,
    UnknownResource(String),
    MethodNotAllowed {
        method: String,
        allowed: &'static [&'static str],
    },
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServerError::Proxy => (
                StatusCode::BAD_GATEWAY,
                Json(Envelope::<()>::failure(
                    PROXY_ERROR_MESSAGE,
                    envelope::PROXY_ERROR,
                )),
            )
                .into_response(),
            ServerError::UnknownResource(name) => (
                StatusCode::NOT_FOUND,
                Json(Envelope::<()>::failure(
                    format!("unknown resource \"{name}\""),
                    envelope::NOT_FOUND,
                )),
            )
                .into_response(),
            ServerError::MethodNotAllowed { method, allowed } => {
                let mut res = (
                    StatusCode::METHOD_NOT_ALLOWED,
                    Json(Envelope::<()>::failure(
                        format!("method {method} not allowed"),
                        envelope::METHOD_NOT_ALLOWED,
                    )),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    res.headers_mut().insert(header::ALLOW, value);
                }
                res
            }
        }
    }
}
