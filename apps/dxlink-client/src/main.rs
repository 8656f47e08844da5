//! DXLink Client Binary
//!
//! Connects to the DXLink gateway and streams quotes for a watch list.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dxlink-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TASTY_SESSION_TOKEN`: REST session token
//!
//! ## Optional
//! - `TASTY_API_BASE_URL`: REST base URL (default: <https://api.tastyworks.com>)
//! - `DXLINK_SYMBOLS`: Comma-separated watch list (default: SPY)
//! - `DXLINK_CANDLE_SYMBOL`: Symbol to stream candles for
//! - `DXLINK_CANDLE_PERIOD`: Candle period (default: 5m)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: dxlink-client)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use dxlink_client::infrastructure::telemetry;
use dxlink_client::{
    ClientConfig, DxLinkClient, InstrumentResolver, QuoteTokenClient, StreamEvent, init_metrics,
};
use tokio::signal;

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting DXLink client");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        api_base_url = %config.api_base_url,
        feed_channel = config.stream.feed_channel,
        "Configuration loaded"
    );

    let token_client = QuoteTokenClient::new(
        config.api_base_url.clone(),
        config.credentials.session_token(),
    );
    let resolver = Arc::new(InstrumentResolver::new(
        config.api_base_url.clone(),
        config.credentials.session_token(),
    ));

    let client = DxLinkClient::new(token_client, resolver, config.stream.clone());

    client.on_quote(|quote| {
        tracing::info!(
            symbol = %quote.symbol,
            bid = quote.bid_price,
            ask = quote.ask_price,
            last = quote.last_price,
            change = quote.change,
            change_pct = quote.change_percent,
            volume = quote.volume,
            "quote"
        );
    });

    client.on_candle(|symbol, candle| {
        tracing::info!(
            symbol,
            time = %candle.timestamp,
            open = candle.open,
            high = candle.high,
            low = candle.low,
            close = candle.close,
            volume = candle.volume,
            "candle"
        );
    });

    client.on_lifecycle(|event| match event {
        StreamEvent::Connected => tracing::info!("stream connected"),
        StreamEvent::Disconnected => tracing::warn!("stream disconnected"),
    });

    let symbols = watch_list();
    tracing::info!(?symbols, "connecting with watch list");
    client.connect(&symbols).await?;

    if let Ok(candle_symbol) = std::env::var("DXLINK_CANDLE_SYMBOL") {
        let period =
            std::env::var("DXLINK_CANDLE_PERIOD").unwrap_or_else(|_| "5m".to_string());
        client.subscribe_to_candles(&candle_symbol, &period, None).await;
    }

    await_shutdown().await;

    client.disconnect();
    tracing::info!("DXLink client stopped");
    Ok(())
}

/// Parse the watch list from `DXLINK_SYMBOLS`.
fn watch_list() -> Vec<String> {
    std::env::var("DXLINK_SYMBOLS")
        .unwrap_or_else(|_| "SPY".to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
