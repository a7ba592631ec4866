//! Standalone rill feed server: one file-backed stream served over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rill_core::{Entry, Persister, Stream};
use rill_storage::FilePersister;

/// Schema-less JSON entry for streams driven entirely over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct JsonEntry(serde_json::Value);

impl Entry for JsonEntry {
    fn type_name() -> &'static str {
        "JsonEntry"
    }
}

/// Rill - append-only event log with a chunked HTTP feed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address for the feed endpoint
    #[arg(long, default_value = "127.0.0.1:8383")]
    bind: String,

    /// Path of the stream's record file
    #[arg(long, default_value = "stream.json")]
    data: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Advance the stream head every N milliseconds (0 = never)
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rill_core={0},rill_storage={0},rill_http={0},rill_server={0}",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rill server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Data file: {}", args.data.display());

    let persister = FilePersister::<JsonEntry>::open(&args.data)?;
    info!(size = persister.size(), "stream opened");
    let stream = Arc::new(Stream::new(persister));

    if args.tick_ms > 0 {
        let ticker = Arc::clone(&stream);
        let interval = Duration::from_millis(args.tick_ms);
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            if let Err(error) = ticker.update_head() {
                warn!(%error, "head tick failed");
                break;
            }
        });
    }

    let app = rill_http::router(Arc::clone(&stream));
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("Serving feed on http://{}", args.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
