//! Engine tests against an in-memory SQLite store.

mod geofence;
mod ledger;
mod matcher;
mod ranker;

use std::sync::Arc;

use proxima_core::{
  geo::{Coordinate, EARTH_RADIUS_METERS},
  ranking::AgeGapCompatibility,
};
use proxima_qr::QrSigner;
use proxima_store_sqlite::SqliteStore;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
  ChannelSink, Collaborators, Engine, EngineConfig, EngineEvent, FallbackGeocoder, Ports,
};

pub(crate) struct TestPorts;

impl Ports for TestPorts {
  type Store = SqliteStore;
  type Directory = SqliteStore;
  type Events = ChannelSink;
  type Geocoder = FallbackGeocoder;
}

pub(crate) struct Harness {
  pub engine: Engine<TestPorts>,
  pub store:  Arc<SqliteStore>,
  pub signer: QrSigner,
  pub events: UnboundedReceiver<EngineEvent>,
}

impl Harness {
  /// Everything emitted so far.
  pub fn drain_events(&mut self) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(e) = self.events.try_recv() {
      out.push(e);
    }
    out
  }
}

pub(crate) async fn harness_with(config: EngineConfig) -> Harness {
  let store = Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  );
  let (sink, events) = ChannelSink::channel();
  let signer = QrSigner::new(b"engine-test-secret").expect("signer");

  let engine = Engine::new(
    Collaborators::<TestPorts> {
      store:     Arc::clone(&store),
      directory: Arc::clone(&store),
      events:    Arc::new(sink),
      geocoder:  Arc::new(FallbackGeocoder),
      age:       Arc::new(AgeGapCompatibility),
    },
    signer.clone(),
    config,
  );

  Harness { engine, store, signer, events }
}

/// A harness with deterministic ranking.
pub(crate) async fn harness() -> Harness {
  harness_with(EngineConfig { exploration_noise: 0.0, ..EngineConfig::default() }).await
}

pub(crate) fn seoul_city_hall() -> Coordinate { Coordinate::new(37.5665, 126.9780) }

/// The point `meters` due north of `from`.
pub(crate) fn north_of(from: Coordinate, meters: f64) -> Coordinate {
  let dlat = (meters / EARTH_RADIUS_METERS).to_degrees();
  Coordinate::new(from.latitude + dlat, from.longitude)
}
