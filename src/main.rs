use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use file_relay::config::AppConfig;
use file_relay::infrastructure::storage;
use file_relay::services::shortener::TinyUrlClient;
use file_relay::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port for the HTTP server
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting File Relay...");

    // 2. Configuration, loaded once
    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(
        "🛡️  Config: Backend={}, Bucket={}, Max Size={}MB, Object TTL={:?}, Shortener Fallback={}",
        config.storage_backend.as_str(),
        config.bucket_name,
        config.max_file_size / 1024 / 1024,
        config.object_ttl,
        config.shortener_fallback
    );

    tokio::fs::create_dir_all(&config.staging_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create staging directory {}",
                config.staging_dir.display()
            )
        })?;
    info!("📂 Staging uploads in {}", config.staging_dir.display());

    // 3. Upstream clients
    let storage_service = storage::setup_storage(&config).await?;
    let shortener = Arc::new(TinyUrlClient::new(
        config.shortener_endpoint.clone(),
        config.tiny_url_api.clone(),
        config.upstream_timeout,
    )?);
    info!("🔗 Link shortener: {}", config.shortener_endpoint);

    let state = AppState::new(config, storage_service, shortener)?;

    // 4. HTTP server
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Server ready at http://{}", addr);
    info!("📖 OpenAPI document: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
