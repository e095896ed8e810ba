//! Core types and trait definitions for the Proxima matching & proximity
//! engine.
//!
//! This crate has no HTTP or database dependencies.
//! It holds the domain model, the pure algorithms (distance, feature
//! satisfaction, compatibility scoring) and the traits the engine uses to
//! reach its collaborators.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod geo;
pub mod matches;
pub mod meetup;
pub mod ranking;
pub mod store;
pub mod target;

pub use error::{Error, Result};
