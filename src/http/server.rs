//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeouts, request ID)
//! - Dispatch requests to the routing engine
//! - Forward plain requests to upstream servers
//! - Hand upgrade handshakes to the relay engine
//! - Apply configuration reloads between requests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, Response, StatusCode, Uri, Version},
    response::IntoResponse,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::hijack::PendingHijack;
use crate::http::request::{forward_headers, request_id, upstream_uri, MakeRequestUuidV4};
use crate::http::upgrade::is_upgrade_request;
use crate::lifecycle::shutdown;
use crate::net::SessionTracker;
use crate::observability::metrics;
use crate::relay::{relay, Capabilities, ProxyCtx, RelayError};
use crate::routing::Router as ProxyRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<ProxyConfig>>,
    pub router: Arc<ArcSwap<ProxyRouter>>,
    pub client: Client<HttpConnector, Body>,
    pub sessions: SessionTracker,
    /// Handler set overriding the one derived from configuration.
    pub capabilities: Option<Capabilities>,
}

impl AppState {
    /// Swap in a new configuration; in-flight requests keep the old one.
    pub fn apply(&self, config: ProxyConfig) {
        self.router
            .store(Arc::new(ProxyRouter::from_config(config.routes.clone())));
        tracing::info!(
            routes = config.routes.len(),
            relay_mode = ?config.relay.mode,
            "Configuration reloaded"
        );
        self.config.store(Arc::new(config));
    }

    fn capabilities_for(&self, config: &ProxyConfig) -> Capabilities {
        match &self.capabilities {
            Some(caps) => caps.clone(),
            None => Capabilities::from_config(&config.relay),
        }
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            router: Arc::new(ArcSwap::from_pointee(ProxyRouter::from_config(
                config.routes.clone(),
            ))),
            config: Arc::new(ArcSwap::from_pointee(config)),
            client,
            sessions: SessionTracker::new(),
            capabilities: None,
        };
        Self { state }
    }

    /// Use `capabilities` for every relayed connection instead of the
    /// configured relay mode.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.state.capabilities = Some(capabilities);
        self
    }

    /// Tracker counting relays that are still running.
    pub fn sessions(&self) -> SessionTracker {
        self.state.sessions.clone()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ProxyConfig> {
        self.state.config.load_full()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.load().timeouts.request_secs);
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` are applied as they
    /// arrive. The request timeout and upstream connect timeout are fixed at
    /// startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload_state = self.state.clone();
        let reload_task = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                reload_state.apply(config);
            }
        });

        let sessions = self.state.sessions.clone();
        let app = Self::build_router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        reload_task.abort();
        tracing::info!(active_relays = sessions.active_count(), "HTTP server stopped");
        Ok(())
    }
}

/// Pick the upstream `host:port` for a request.
pub fn resolve_upstream(
    router: &ProxyRouter,
    config: &ProxyConfig,
    uri: &Uri,
    headers: &HeaderMap,
) -> Option<String> {
    if let Some(route) = router.match_request(uri, headers) {
        return Some(route.upstream.clone());
    }
    if !config.forward_proxy {
        return None;
    }
    let authority = uri.authority()?;
    let port = authority.port_u16().unwrap_or(80);
    Some(format!("{}:{}", authority.host(), port))
}

/// Main proxy handler.
/// Looks up the upstream, then relays upgrades or forwards plain requests.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().to_string();
    let config = state.config.load_full();

    tracing::debug!(
        request_id = %request_id,
        client = %client_addr,
        method = %method,
        uri = %request.uri(),
        "Proxying request"
    );

    // 1. Resolve upstream
    let upstream = {
        let router = state.router.load();
        resolve_upstream(&router, &config, request.uri(), request.headers())
    };
    let Some(upstream) = upstream else {
        tracing::warn!(request_id = %request_id, uri = %request.uri(), "No route matched");
        metrics::record_request(&method, 404, start_time);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    // 2. Upgrade handshakes leave request/response HTTP entirely
    if is_upgrade_request(request.headers(), &config.relay.protocol) {
        if !config.relay.enabled {
            metrics::record_request(&method, 501, start_time);
            return (StatusCode::NOT_IMPLEMENTED, "Connection upgrades are disabled").into_response();
        }
        // Only HTTP/1.1 connections can be taken over after a 101.
        if request.version() != Version::HTTP_11 {
            tracing::warn!(
                request_id = %request_id,
                version = ?request.version(),
                "Upgrade requested on a connection that cannot be upgraded"
            );
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Connection upgrades require HTTP/1.1").into_response();
        }
        let response = relay_upgrade(state, &config, upstream, request, &request_id).await;
        metrics::record_request(&method, response.status().as_u16(), start_time);
        return response;
    }

    // 3. Plain request/response
    let response = forward(&state, &upstream, request, &request_id).await;
    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

/// Forward a plain request and stream the upstream response back.
async fn forward(
    state: &AppState,
    upstream: &str,
    request: Request<Body>,
    request_id: &str,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let Some(uri) = upstream_uri(&parts.uri, upstream) else {
        tracing::error!(request_id = %request_id, upstream = %upstream, "Invalid upstream address");
        return (StatusCode::BAD_GATEWAY, "Invalid upstream address").into_response();
    };

    let mut upstream_req = Request::new(body);
    *upstream_req.method_mut() = parts.method;
    *upstream_req.uri_mut() = uri;
    forward_headers(&parts.headers, upstream_req.headers_mut(), false);

    match state.client.request(upstream_req).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            let mut headers = HeaderMap::new();
            forward_headers(&parts.headers, &mut headers, false);
            parts.headers = headers;
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, upstream = %upstream, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Complete an upgrade handshake with the upstream and relay the connection.
///
/// The `101` is mirrored to the client from this handler; the relay itself
/// runs in a spawned task because the client connection only becomes
/// available after that response has been written.
async fn relay_upgrade(
    state: AppState,
    config: &ProxyConfig,
    upstream: String,
    mut request: Request<Body>,
    request_id: &str,
) -> Response<Body> {
    let pending = PendingHijack::from_request(&mut request);
    let guard = state.sessions.track();
    let ctx = ProxyCtx::new(guard.id()).with_capabilities(state.capabilities_for(config));

    let Some(uri) = upstream_uri(request.uri(), &upstream) else {
        ctx.warn(format_args!("Invalid upstream address {}", upstream));
        return (StatusCode::BAD_GATEWAY, "Invalid upstream address").into_response();
    };
    let mut upstream_req = Request::new(Body::empty());
    *upstream_req.method_mut() = request.method().clone();
    *upstream_req.uri_mut() = uri;
    forward_headers(request.headers(), upstream_req.headers_mut(), true);

    tracing::info!(
        session = %ctx.session,
        request_id = %request_id,
        upstream = %upstream,
        protocol = %config.relay.protocol,
        "Upgrade handshake"
    );

    let upstream_resp = match state.client.request(upstream_req).await {
        Ok(response) => response,
        Err(e) => {
            ctx.warn(format_args!("{}", RelayError::from(e)));
            return (StatusCode::BAD_GATEWAY, "Upstream upgrade failed").into_response();
        }
    };

    if upstream_resp.status() != StatusCode::SWITCHING_PROTOCOLS {
        ctx.log(format_args!("{}", RelayError::Refused(upstream_resp.status())));
        let (parts, body) = upstream_resp.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let mut client_resp = Response::new(Body::empty());
    *client_resp.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    *client_resp.headers_mut() = upstream_resp.headers().clone();

    tokio::spawn(async move {
        let _guard = guard;
        let remote = async {
            hyper::upgrade::on(upstream_resp)
                .await
                .map(TokioIo::new)
                .map_err(|e| {
                    ctx.warn(format_args!("Upstream upgrade error: {}", e));
                    RelayError::UpstreamUpgrade(e)
                })
        };

        match tokio::try_join!(pending.hijack(&ctx), remote) {
            Ok((mut client, mut remote)) => {
                relay(&ctx, &mut remote, &mut client).await;
                // The engine leaves closing to us.
                let _ = client.shutdown().await;
                let _ = remote.shutdown().await;
            }
            Err(e) => ctx.log(format_args!("Relay aborted: {}", e)),
        }
    });

    client_resp
}
