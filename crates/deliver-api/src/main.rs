//! # deliver-server
//!
//! Checkout and digital-file delivery service.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export MP_ACCESS_TOKEN=TEST-...
//! export RESEND_API_KEY=re_...
//! export FRONTEND_URL=https://datosconalex.com
//! export BACKEND_URL=https://api.datosconalex.com
//!
//! # Run the server
//! deliver-server
//! ```

use deliver_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    print_banner();

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.catalog.products.len());
    info!("Files directory: {}", state.config.files_dir.display());
    info!("Payment provider: {}", state.provider.provider_name());
    match state.config.notification_url() {
        Some(url) => info!("Notification URL: {}", url),
        None => info!("BACKEND_URL not set, checkouts carry no notification URL"),
    }

    let app = routes::create_router(state);

    info!("Server starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Checkout: POST http://{}/api/payments/create-preference/", addr);
        info!("Webhook: POST http://{}/api/payments/webhook/", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` filters (default INFO).
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let fmt_layer = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_banner() {
    println!(
        r#"
  deliver-server
  ━━━━━━━━━━━━━━━━━━━━━━━
  Checkout and file delivery
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
