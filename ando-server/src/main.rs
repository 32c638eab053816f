//! Ando CE — reverse-proxy API gateway.
//!
//! Ingress: axum on the tokio multi-threaded scheduler. Egress: a single
//! pooled `reqwest::Client` shared by every forwarded request.

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::net::SocketAddr;
use std::sync::Arc;

use ando_core::config::AndoConfig;
use ando_core::registry::ProjectRegistry;
use ando_observability::GatewayMetrics;
use ando_plugin::Orchestrator;
use ando_proxy::breaker::BreakerPool;
use ando_proxy::forwarder::Forwarder;
use ando_store::{KvStore, RateLimiter, RedisStore};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use clap::Parser;
use http::Request;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ando", version, about = "Ando CE — reverse-proxy API gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level, overridden by RUST_LOG if set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Ando CE starting");

    let config = AndoConfig::load(cli.config.as_deref())?;
    info!(projects = config.projects.len(), "configuration loaded");

    let registry = Arc::new(ProjectRegistry::new(
        config.projects.values().cloned().collect(),
    ));
    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis.url)?);
    let rate_limiter = Arc::new(RateLimiter::new(Arc::clone(&store)));
    let breakers = Arc::new(BreakerPool::new());
    let forwarder = Arc::new(Forwarder::new(
        config.gateway.global_timeout_ms.map(std::time::Duration::from_millis),
    ));
    let metrics = Arc::new(GatewayMetrics::new()?);

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        store,
        rate_limiter,
        breakers,
        forwarder,
        Arc::clone(&metrics),
    ));

    let cors = ando_plugins::traffic::cors::layer(&config.cors);
    let app = Router::new()
        .fallback(any(proxy_handler))
        .with_state(orchestrator)
        .layer(cors);

    let admin_state = ando_admin::AdminState {
        metrics: Arc::clone(&metrics),
    };
    let admin_addr = config.gateway.admin_addr;
    tokio::spawn(async move {
        if let Err(err) = ando_admin::start(admin_addr, admin_state).await {
            tracing::error!(error = %err, "admin API failed");
        }
    });

    let http_addr = config.gateway.http_addr;
    info!(%http_addr, %admin_addr, "Ando CE is ready — serving traffic");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Ando CE stopped");
    Ok(())
}

async fn proxy_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    let mut req = req;
    req.extensions_mut().insert(ConnectInfo(addr));
    orchestrator.handle(req).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
}
