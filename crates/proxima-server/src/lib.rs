//! Server wiring for Proxima: configuration, engine construction and the
//! background tasks that run beside the HTTP API.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use proxima_core::{
  geo::OperatingRegion,
  ranking::{AgeGapCompatibility, DEFAULT_MAX_NOISE},
};
use proxima_engine::{
  ChannelSink, Collaborators, Engine, EngineConfig, EngineEvent, FallbackGeocoder, Ports,
};
use proxima_qr::QrSigner;
use proxima_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PROXIMA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  pub store_path:       PathBuf,
  /// HMAC key for QR admission codes.
  pub qr_secret:        String,
  #[serde(default)]
  pub operating_region: Option<OperatingRegion>,
  #[serde(default)]
  pub ranking:          RankingConfig,
  #[serde(default)]
  pub expiry:           ExpiryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RankingConfig {
  /// Upper bound of the uniform noise added to scores; `0` disables it.
  pub exploration_noise: f64,
}

impl Default for RankingConfig {
  fn default() -> Self { Self { exploration_noise: DEFAULT_MAX_NOISE } }
}

/// Periodic expiry of stale matches. Disabled unless `interval_minutes` is
/// set.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExpiryConfig {
  pub interval_minutes:    Option<u64>,
  pub older_than_days:     u32,
  pub require_no_messages: bool,
}

impl Default for ExpiryConfig {
  fn default() -> Self {
    Self { interval_minutes: None, older_than_days: 7, require_no_messages: true }
  }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }

impl ServerConfig {
  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      operating_region:  self.operating_region,
      exploration_noise: self.ranking.exploration_noise,
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Engine ───────────────────────────────────────────────────────────────────

/// A single SQLite database serves as both engine store and user directory.
pub struct ServerPorts;

impl Ports for ServerPorts {
  type Store = SqliteStore;
  type Directory = SqliteStore;
  type Events = ChannelSink;
  type Geocoder = FallbackGeocoder;
}

pub type ServerEngine = Engine<ServerPorts>;

pub fn signer(config: &ServerConfig) -> anyhow::Result<QrSigner> {
  QrSigner::new(config.qr_secret.as_bytes()).context("invalid qr_secret")
}

/// Wire the engine against `store`, returning it together with the receiving
/// end of its event channel.
pub fn build_engine(
  store: Arc<SqliteStore>,
  config: &ServerConfig,
) -> anyhow::Result<(Arc<ServerEngine>, UnboundedReceiver<EngineEvent>)> {
  let (sink, events) = ChannelSink::channel();
  let engine = Engine::new(
    Collaborators::<ServerPorts> {
      store:     Arc::clone(&store),
      directory: store,
      events:    Arc::new(sink),
      geocoder:  Arc::new(FallbackGeocoder),
      age:       Arc::new(AgeGapCompatibility),
    },
    signer(config)?,
    config.engine_config(),
  );
  Ok((Arc::new(engine), events))
}

/// Encoded QR text for an existing target; fails for an unknown target.
pub async fn door_sign(engine: &ServerEngine, target_id: Uuid) -> anyhow::Result<String> {
  let payload = engine
    .geofence
    .issue_qr_token(target_id)
    .await
    .with_context(|| format!("cannot issue a QR code for target {target_id}"))?;
  payload.encode().context("failed to encode QR payload")
}

/// The public router: the JSON API under `/api`, with request tracing.
pub fn router(engine: Arc<ServerEngine>) -> Router {
  Router::new()
    .nest("/api", proxima_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

// ─── Background tasks ─────────────────────────────────────────────────────────

/// Drain engine events into the log until every sender is gone.
pub fn spawn_event_log(mut events: UnboundedReceiver<EngineEvent>) -> JoinHandle<()> {
  tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      match &event {
        EngineEvent::NewMatch { meeting_id, chat_room_id, .. } => {
          tracing::info!(%meeting_id, %chat_room_id, "auto-match announced");
        }
        EngineEvent::MatchCreated { match_id, .. } => {
          tracing::info!(%match_id, "match announced");
        }
        other => tracing::debug!(event = ?other, "engine event"),
      }
    }
  })
}

/// Run match expiry every `interval_minutes`, if configured.
pub fn spawn_expiry(engine: Arc<ServerEngine>, config: &ExpiryConfig) -> Option<JoinHandle<()>> {
  let minutes = config.interval_minutes.filter(|m| *m > 0)?;
  let ExpiryConfig { older_than_days, require_no_messages, .. } = *config;

  Some(tokio::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
    loop {
      ticker.tick().await;
      if let Err(e) = engine
        .ledger
        .expire_inactive_matches(older_than_days, require_no_messages)
        .await
      {
        tracing::warn!(error = %e, "scheduled match expiry failed");
      }
    }
  }))
}
