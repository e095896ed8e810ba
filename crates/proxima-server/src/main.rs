//! proxima server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the JSON API over HTTP.
//!
//! # Printing a door sign
//!
//! To print a signed QR payload for a registered target without starting the
//! server:
//!
//! ```text
//! cargo run -p proxima-server --bin server -- --issue-qr <TARGET_ID>
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use proxima_server::{ServerConfig, build_engine, door_sign, expand_tilde, router};
use proxima_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Proxima matching & proximity server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a freshly signed QR payload for this target and exit.
  #[arg(long, value_name = "TARGET_ID")]
  issue_qr: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PROXIMA")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let (engine, events) = build_engine(Arc::new(store), &server_cfg)?;

  // Helper mode: sign a QR payload and exit.
  if let Some(target_id) = cli.issue_qr {
    println!("{}", door_sign(&engine, target_id).await?);
    return Ok(());
  }

  proxima_server::spawn_event_log(events);
  if proxima_server::spawn_expiry(Arc::clone(&engine), &server_cfg.expiry).is_some() {
    tracing::info!(
      older_than_days = server_cfg.expiry.older_than_days,
      "scheduled match expiry enabled"
    );
  }

  let app = router(engine);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
