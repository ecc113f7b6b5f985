use anyhow::Context;
use clap::Parser;
use facet_gateway::{
    api::{build_router, AppState},
    config::Config,
    graphql::SchemaComposer,
    search::{ElasticsearchEngine, SearchService},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Faceted search gateway serving a composed GraphQL API
#[derive(Debug, Parser)]
#[command(name = "facet-gateway", version, about)]
struct Args {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Validate configuration, print the GraphQL SDL and exit
    #[arg(long)]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    init_tracing(&config);

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        domains = config.domains.len(),
        "Starting facet gateway"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = facet_gateway::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    let engine = ElasticsearchEngine::new(&config.engine.host, config.engine.timeout())
        .context("failed to create search engine client")?;
    let service = Arc::new(SearchService::new(Arc::new(engine)).with_timeout(config.engine.timeout()));

    let registrations = config
        .registrations()
        .context("invalid search domain configuration")?;
    let composed = SchemaComposer::new()
        .domains(registrations)
        .compose(service)
        .context("failed to compose GraphQL schema")?;

    if args.print_schema {
        println!("{}", composed.sdl());
        return Ok(());
    }

    for (field, type_name) in &composed.query_fields {
        tracing::info!(query_field = %field, type_name = %type_name, "Serving search domain");
    }

    let state = AppState::new(composed).with_metrics(config.observability.prometheus_enabled);
    let app = build_router(state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("HTTP server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   GraphQL API: http://{}/graphql", http_addr);
    tracing::info!("   Engine: {}", config.engine.host);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on ctrl-c; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    wait_for(tokio::signal::ctrl_c()).await;
    tracing::info!("Shutdown signal received");
}

async fn wait_for<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for shutdown signal, serving until killed: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_serving() {
        let failed = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal")) };
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for(failed)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_signal_resolves_wait() {
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for(async { Ok(()) })).await;
        assert!(waited.is_ok());
    }
}
