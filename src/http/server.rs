//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all account routes
//! - Construct per-route guard chains from validated configuration
//! - Wire up middleware (tracing, timeout, request ID, metrics)
//! - Serve plain HTTP or TLS, with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::accounts::{handlers, PasswordHasher, SessionManager};
use crate::config::Config;
use crate::db::Store;
use crate::http::request::MakeRequestUuid;
use crate::observability::metrics;
use crate::security::limits::BodySizeGuard;
use crate::security::pow::{PowGuard, PowKeyError};
use crate::security::rate_limit::IpRateGuard;
use crate::security::{Guard, GuardChain, RouteProtection};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub hasher: Arc<PasswordHasher>,
    pub sessions: SessionManager,
    pub pow: Arc<PowGuard>,
    pub register: Arc<RouteProtection>,
    pub login: Arc<RouteProtection>,
    pub logout: Arc<RouteProtection>,
    pub profile: Arc<RouteProtection>,
    /// Per-IP account cap; `None` when disabled.
    pub account_cap: Option<i64>,
}

/// HTTP server for the account service.
pub struct HttpServer {
    router: Router,
    config: Config,
}

impl HttpServer {
    /// Build the server and its guard chains from a validated configuration.
    ///
    /// Guards are constructed once here and never mutated afterwards; each
    /// route owns its own instances, so there is no cross-route contention.
    pub fn new(config: Config, store: Store) -> Result<Self, PowKeyError> {
        let pow = Arc::new(PowGuard::from_config(&config.proof_of_work)?);
        let hasher = Arc::new(PasswordHasher::new());
        let sessions = SessionManager::new(store.clone(), config.listener.tls.is_some());

        // Register carries the full chain, cheapest check first.
        let register_body = Arc::new(BodySizeGuard::from_config(&config.body_limit.register));
        let register_cap = register_body.stream_cap();
        let register_guards: Vec<Arc<dyn Guard>> = vec![
            register_body,
            Arc::new(IpRateGuard::from_config(&config.ip_rate_limiter.register)),
            pow.clone(),
        ];
        let register = Arc::new(RouteProtection::new(
            GuardChain::new(register_guards),
            register_cap,
        ));

        let login_body = Arc::new(BodySizeGuard::from_config(&config.body_limit.login));
        let login_cap = login_body.stream_cap();
        let login_guards: Vec<Arc<dyn Guard>> = vec![
            login_body,
            Arc::new(IpRateGuard::from_config(&config.ip_rate_limiter.login)),
        ];
        let login = Arc::new(RouteProtection::new(GuardChain::new(login_guards), login_cap));

        let logout_guards: Vec<Arc<dyn Guard>> = vec![Arc::new(IpRateGuard::from_config(
            &config.ip_rate_limiter.logout,
        ))];
        let logout = Arc::new(RouteProtection::new(
            GuardChain::new(logout_guards),
            usize::MAX,
        ));

        let profile_guards: Vec<Arc<dyn Guard>> = vec![Arc::new(IpRateGuard::from_config(
            &config.ip_rate_limiter.profile,
        ))];
        let profile = Arc::new(RouteProtection::new(
            GuardChain::new(profile_guards),
            usize::MAX,
        ));

        let state = AppState {
            store,
            hasher,
            sessions,
            pow,
            register,
            login,
            logout,
            profile,
            account_cap: config.account_cap(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &Config, state: AppState) -> Router {
        Router::new()
            .route("/api/pow/challenge", get(handlers::pow_challenge))
            .route("/api/register", post(handlers::register))
            .route("/api/login", post(handlers::login))
            .route("/api/logout", post(handlers::logout))
            .route("/api/profile", get(handlers::profile))
            .with_state(state)
            .layer(middleware::from_fn(track_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The wired router; integration tests drive this in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let Self { router, config } = self;
        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        match &config.listener.tls {
            Some(tls) => {
                tracing::info!(address = %addr, "HTTPS server starting");
                let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    &tls.cert_path,
                    &tls.key_path,
                )
                .await?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Record one counter tick and a latency sample per request.
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request.uri().path().to_owned();
    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
