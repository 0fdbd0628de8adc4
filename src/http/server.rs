//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, metrics, limits)
//! - Serve on a plain TCP listener or over TLS
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::{handlers, response};
use crate::http::request::{
    make_request_span, propagate_request_id_layer, set_request_id_layer,
};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::registry::SchemaRegistry;
use crate::security::auth::admin_auth_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::validation::ValidationEngine;

const BUCKET_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: ValidationEngine,
    pub registry: Arc<SchemaRegistry>,
    pub config: Arc<ServiceConfig>,
    pub started_at: Instant,
}

/// HTTP server for the validation service.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: Arc<ServiceConfig>, registry: Arc<SchemaRegistry>) -> Self {
        let state = AppState {
            engine: ValidationEngine::new(Arc::clone(&registry), config.validation.max_errors),
            registry,
            config: Arc::clone(&config),
            started_at: Instant::now(),
        };

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));
        let router = Self::build_router(&config, state, limiter.clone());
        Self {
            router,
            config,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers added through `Router::layer` run after routing, so the
    /// outermost one (metrics) still sees the matched route.
    #[allow(deprecated)]
    fn build_router(
        config: &ServiceConfig,
        state: AppState,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let admin = Router::new()
            .route("/schemas/{name}", put(handlers::put_schema).delete(handlers::delete_schema))
            .route("/reload", post(handlers::reload_schemas))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_auth_middleware,
            ));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            .route("/schemas", get(handlers::list_schemas))
            .route("/schemas/{name}", get(handlers::get_schema))
            .route("/validate", post(handlers::validate_inline))
            .route("/validate/{name}", post(handlers::validate_named))
            .route("/validate/{name}/batch", post(handlers::validate_batch))
            .merge(admin)
            .method_not_allowed_fallback(response::method_not_allowed)
            .fallback(response::route_not_found)
            .with_state(state);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
                    .layer(propagate_request_id_layer())
                    .layer(middleware::map_response(response::timeout_envelope))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections)),
            )
            .layer(middleware::from_fn(metrics::track_requests))
    }

    /// Evict idle rate-limit buckets until shutdown.
    fn spawn_maintenance(&self, shutdown_rx: &broadcast::Receiver<()>) {
        if let Some(limiter) = &self.limiter {
            tokio::spawn(Arc::clone(limiter).prune_periodically(
                BUCKET_PRUNE_INTERVAL,
                shutdown_rx.resubscribe(),
            ));
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        self.spawn_maintenance(&shutdown_rx);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        // Serve with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            "HTTPS server starting"
        );

        self.spawn_maintenance(&shutdown_rx);
        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown_rx).await;
            drain.graceful_shutdown(Some(grace));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
