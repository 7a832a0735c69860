//! Pass-through to the backend API.
//!
//! One attempt per call: no retry, no backoff, redirects are handed back to
//! the caller. Every transport failure becomes [`ServerError::Proxy`].
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, Method, header},
    response::{IntoResponse, Response},
};

use crate::ServerError;

/// Request headers copied to the backend. Everything else is dropped.
const FORWARDED_HEADERS: [HeaderName; 4] = [
    header::ACCEPT,
    header::CONTENT_TYPE,
    header::COOKIE,
    HeaderName::from_static("x-csrf-token"),
];

/// Connection-level response headers the edge server sets on its own.
const HOP_BY_HOP_HEADERS: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Only these methods have their request body read and forwarded.
fn carries_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

#[derive(Clone, Debug)]
pub struct Proxy {
    base_url: String,
    http: reqwest::Client,
}

impl Proxy {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base><backend_path>[?<query>]`, the query string copied verbatim.
    pub fn target_url(&self, backend_path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, backend_path.trim_start_matches('/'));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Forwards `request` to `backend_path` and returns the backend response
    /// as-is, or the 502 envelope when the backend cannot be reached.
    pub async fn forward(&self, backend_path: &str, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let url = self.target_url(backend_path, parts.uri.query());
        tracing::debug!("proxy {} {}", parts.method, url);

        let mut upstream = self.http.request(parts.method.clone(), &url);
        for name in &FORWARDED_HEADERS {
            for value in parts.headers.get_all(name) {
                upstream = upstream.header(name, value.clone());
            }
        }

        if carries_body(&parts.method) {
            let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!("failed to read request body for {url}: {err}");
                    return ServerError::Proxy.into_response();
                }
            };
            upstream = upstream.body(bytes);
        }

        match upstream.send().await {
            Ok(response) => {
                if response.status().is_server_error() {
                    tracing::warn!("backend answered {} for {url}", response.status());
                }
                into_response(response)
            }
            Err(err) => {
                tracing::error!("proxy request to {url} failed: {err}");
                ServerError::Proxy.into_response()
            }
        }
    }
}

fn into_response(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers: HeaderMap = response.headers().clone();
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");

    let mut res = Response::new(Body::from_stream(response.bytes_stream()));
    *res.status_mut() = status;
    *res.headers_mut() = headers;
    res
}
