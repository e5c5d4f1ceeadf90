//! # convert-gate
//!
//! Checkout and access-control boundary for the conversion service.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export CHECKOUT_MODE=pack
//! export CSRF_SECRET=...
//!
//! # Run the server
//! convert-gate
//! ```

use anyhow::Context;
use gate_api::{routes, state::AppConfig, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env once; every config loader below reads the process environment
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Initialize logging
    init_tracing(config.json_logs);

    // Print banner
    print_banner();

    // Initialize application state; any invalid setting stops here
    let state = AppState::new(config)?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();
    let checkout = state.checkout.config();

    info!("Environment: {}", state.config.environment);
    info!(
        "Checkout: mode={}, price={} {}, pack_size={}",
        checkout.mode, checkout.unit_price_minor, checkout.currency, checkout.pack_size
    );
    info!("Payment provider: {}", state.checkout.provider_name());
    info!("Filter chain: {}", state.chain.stage_names().join(" -> "));

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("convert-gate starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("CSRF token: GET http://{}/api/public/csrf", addr);
        info!("Checkout: POST http://{}/api/billing/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("convert-gate shut down");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

/// Waits for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl-C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
                info!("Received Ctrl-C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl-C, shutting down...");
    }
}

fn print_banner() {
    println!(
        r#"
  convert-gate
  ━━━━━━━━━━━━━━━━━━━━━━━
  Checkout & access gate
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
