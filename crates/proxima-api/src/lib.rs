//! JSON REST API for the Proxima engine.
//!
//! Exposes an axum [`Router`] backed by any [`Engine`]. Authentication, TLS
//! and transport concerns are the caller's responsibility; user ids arrive in
//! request bodies and query strings as already-authenticated values.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", proxima_api::api_router(engine.clone()))
//! ```

pub mod discovery;
pub mod error;
pub mod matches;
pub mod meetings;
pub mod targets;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use proxima_engine::{Engine, Ports};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<P: Ports>(engine: Arc<Engine<P>>) -> Router<()> {
  Router::new()
    // Location groups
    .route("/targets", post(targets::register::<P>))
    .route(
      "/targets/{id}",
      get(targets::get_one::<P>).patch(targets::update_geofence::<P>),
    )
    .route("/targets/{id}/check-in", post(targets::check_in_gps::<P>))
    .route("/targets/{id}/check-ins", get(targets::list_check_ins::<P>))
    .route("/targets/{id}/qr", get(targets::issue_qr::<P>))
    .route("/check-in/qr", post(targets::check_in_qr::<P>))
    .route("/users/{id}/check-ins", get(targets::history::<P>))
    // Meetups
    .route("/meetings", post(meetings::create::<P>))
    .route("/meetings/{id}/participants", post(meetings::join::<P>))
    .route("/participants/{id}/features", put(meetings::update_features::<P>))
    .route("/participants/{id}/leave", post(meetings::leave::<P>))
    .route("/participants/{id}/matches", get(meetings::matches::<P>))
    // Discovery
    .route("/groups/{id}/recommendations", get(discovery::recommendations::<P>))
    .route("/likes", post(discovery::like::<P>))
    // Matches
    .route("/matches", post(matches::create::<P>))
    .route("/matches/expire", post(matches::expire::<P>))
    .route("/matches/{id}", get(matches::get_one::<P>))
    .route("/matches/{id}/status", post(matches::set_status::<P>))
    .route("/matches/{id}/messages", post(matches::record_message::<P>))
    .route("/matches/{id}/mutual", get(matches::mutual::<P>))
    .with_state(engine)
}
