//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the session endpoints and the upstream fallback
//! - Wire up middleware (session gate, timeout, request ID, tracing)
//! - Bind server to listener
//! - Forward admitted requests to the content upstream
//! - Apply reloaded configuration to the running gate

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{AuthBackend, AuthError, GoTrueBackend, ProfileStore, RestProfileStore};
use crate::config::GateConfig;
use crate::gate::{session_gate, Gate, GateSettings};
use crate::http::handlers::auth_routes;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("identity provider client: {0}")]
    Provider(#[from] AuthError),

    #[error("invalid upstream address '{0}'")]
    Upstream(String),
}

/// State for the upstream forwarder.
#[derive(Clone)]
pub struct UpstreamState {
    pub client: Client<HttpConnector, Body>,
    pub authority: Authority,
}

type SettingsSink = Arc<dyn Fn(GateSettings) + Send + Sync>;

/// HTTP server for the session gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    apply_settings: SettingsSink,
}

impl HttpServer {
    /// Create a server talking to the configured identity provider and
    /// profile store.
    pub fn new(config: GateConfig) -> Result<Self, ServerError> {
        let backend = GoTrueBackend::from_config(&config)?;
        let profiles = RestProfileStore::from_config(&config)?;
        Self::with_providers(config, backend, profiles)
    }

    /// Create a server with explicit provider implementations.
    pub fn with_providers<B: AuthBackend, P: ProfileStore>(
        config: GateConfig,
        backend: B,
        profiles: P,
    ) -> Result<Self, ServerError> {
        let authority = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::Upstream(config.upstream.address.clone()))?;
        let upstream = UpstreamState {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            authority,
        };

        let gate = Gate::new(backend, profiles, GateSettings::from_config(&config));
        let apply_settings: SettingsSink = {
            let gate = gate.clone();
            Arc::new(move |settings| gate.update_settings(settings))
        };

        let router = Self::build_router(&config, gate, upstream);
        Ok(Self {
            router,
            config,
            apply_settings,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<B: AuthBackend, P: ProfileStore>(
        config: &GateConfig,
        gate: Gate<B, P>,
        upstream: UpstreamState,
    ) -> Router {
        let proxy = Router::new()
            .fallback(forward_upstream)
            .with_state(upstream);

        auth_routes(gate.clone())
            .merge(proxy)
            .layer(middleware::from_fn_with_state(gate, session_gate::<B, P>))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id(request.headers()),
                    )
                }),
            )
            .layer(set_request_id_layer())
    }

    /// The assembled router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Apply a reloaded configuration to the running gate.
    pub fn apply_config(&self, config: &GateConfig) {
        (self.apply_settings)(GateSettings::from_config(config));
    }

    /// Run the server until `shutdown` fires. Configurations arriving on
    /// `config_updates` replace the route table and session settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let apply_settings = self.apply_settings.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_settings(GateSettings::from_config(&config));
                tracing::info!(
                    landing_path = %config.routes.landing_path,
                    unlocked_path = %config.routes.unlocked_path,
                    "Applied reloaded configuration"
                );
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

/// Forward a request to the content upstream, streaming both bodies.
async fn forward_upstream(State(upstream): State<UpstreamState>, request: Request) -> Response {
    let request_id = request_id(request.headers()).to_string();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_REQUEST, "Bad request").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding to upstream"
    );

    match upstream.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_upstream(response.status().as_u16());
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream(502);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
