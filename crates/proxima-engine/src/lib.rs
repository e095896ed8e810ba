//! The Proxima matching & proximity engine.
//!
//! Four services share one [`EngineStore`]:
//!
//! - [`GeoFenceVerifier`] admits users to location groups by GPS or QR.
//! - [`FeatureMatcher`] runs blind, bidirectional matching for meetups.
//! - [`CompatibilityRanker`] ranks and anonymizes discovery candidates.
//! - [`MatchLedger`] owns match creation and the match lifecycle.
//!
//! [`Engine`] wires them together from a single [`Ports`] description.

pub mod error;
pub mod events;
pub mod geofence;
pub mod ledger;
pub mod matcher;
pub mod ranker;

use std::sync::Arc;

use proxima_core::{
  geo::OperatingRegion,
  ranking::{AgeCompatibility, DEFAULT_MAX_NOISE},
  store::{EngineStore, ReverseGeocoder, UserDirectory},
};
use proxima_qr::QrSigner;
use serde::Deserialize;

pub use error::{Error, Result};
pub use events::{ChannelSink, EngineEvent, EventSink, NullSink};
pub use geofence::{CheckInOutcome, FallbackGeocoder, GeoFenceVerifier};
pub use ledger::MatchLedger;
pub use matcher::{Evaluation, FeatureMatcher};
pub use ranker::CompatibilityRanker;

/// The concrete collaborators an [`Engine`] runs against.
pub trait Ports: Send + Sync + 'static {
  type Store: EngineStore + 'static;
  type Directory: UserDirectory + 'static;
  type Events: EventSink + 'static;
  type Geocoder: ReverseGeocoder + 'static;
}

/// Tunables that are not collaborators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// When set, coordinates outside this box are rejected.
  pub operating_region:  Option<OperatingRegion>,
  /// Upper bound of the ranking exploration noise.
  pub exploration_noise: f64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { operating_region: None, exploration_noise: DEFAULT_MAX_NOISE }
  }
}

/// Everything the engine reads from or writes to.
pub struct Collaborators<P: Ports> {
  pub store:     Arc<P::Store>,
  pub directory: Arc<P::Directory>,
  pub events:    Arc<P::Events>,
  pub geocoder:  Arc<P::Geocoder>,
  pub age:       Arc<dyn AgeCompatibility>,
}

pub struct Engine<P: Ports> {
  pub geofence: GeoFenceVerifier<P::Store, P::Events, P::Geocoder>,
  pub matcher:  FeatureMatcher<P::Store, P::Events>,
  pub ranker:   CompatibilityRanker<P::Store, P::Directory>,
  pub ledger:   MatchLedger<P::Store, P::Directory, P::Events>,
}

impl<P: Ports> Engine<P> {
  pub fn new(deps: Collaborators<P>, signer: QrSigner, config: EngineConfig) -> Self {
    let Collaborators { store, directory, events, geocoder, age } = deps;
    Self {
      geofence: GeoFenceVerifier::new(
        Arc::clone(&store),
        Arc::clone(&events),
        geocoder,
        signer,
        config.operating_region,
      ),
      matcher:  FeatureMatcher::new(Arc::clone(&store), Arc::clone(&events)),
      ranker:   CompatibilityRanker::new(
        Arc::clone(&store),
        Arc::clone(&directory),
        age,
        config.exploration_noise,
      ),
      ledger:   MatchLedger::new(store, directory, events),
    }
  }
}

#[cfg(test)]
mod tests;
