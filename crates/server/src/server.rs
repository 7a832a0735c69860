use axum::{
    Json, Router,
    extract::{Request, State},
    http::Uri,
    response::{IntoResponse, Response},
    routing::{any, get},
};

use std::sync::Arc;

use api_types::{Resource, envelope::Envelope};

use crate::{Proxy, PublicConfig, ServerError};

const INTERNAL_PREFIX: &str = "/api/internal";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub backend_base_url: String,
    pub public: PublicConfig,
}

#[derive(Clone)]
pub struct ServerState {
    pub proxy: Proxy,
    pub public: Arc<PublicConfig>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            proxy: Proxy::new(&config.backend_base_url)?,
            public: Arc::new(config.public),
        })
    }
}

/// Resolves `/api/internal/<resource>[/...]` and forwards it to the backend
/// as `/<resource>[/...]`, keeping the raw (still percent-encoded) path.
async fn internal(State(state): State<ServerState>, request: Request) -> Response {
    let backend_path = request
        .uri()
        .path()
        .strip_prefix(INTERNAL_PREFIX)
        .unwrap_or_default()
        .to_string();

    let name = backend_path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default();
    let resource: Resource = match name.parse() {
        Ok(resource) => resource,
        Err(_) => return ServerError::UnknownResource(name.to_string()).into_response(),
    };

    let method = request.method().as_str();
    if !resource.allows(method) {
        return ServerError::MethodNotAllowed {
            method: method.to_string(),
            allowed: resource.methods(),
        }
        .into_response();
    }

    state.proxy.forward(&backend_path, request).await
}

/// Anything no route matches, e.g. `/api/internal/accounts/`.
async fn unmatched(uri: Uri) -> Response {
    let path = uri.path();
    let name = path
        .strip_prefix(INTERNAL_PREFIX)
        .unwrap_or(path)
        .trim_start_matches('/');
    ServerError::UnknownResource(name.to_string()).into_response()
}

async fn public_config(State(state): State<ServerState>) -> Json<Envelope<PublicConfig>> {
    Json(Envelope::ok(state.public.as_ref().clone()))
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/config", get(public_config))
        .route("/api/internal/{resource}", any(internal))
        .route("/api/internal/{resource}/{*rest}", any(internal))
        .fallback(unmatched)
        .with_state(state)
}

pub async fn run_with_listener(
    config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    let state = ServerState::new(config).map_err(std::io::Error::other)?;
    tracing::info!(
        "Edge proxy listening on {}, forwarding to {}",
        addr,
        state.proxy.base_url()
    );

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(config, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
