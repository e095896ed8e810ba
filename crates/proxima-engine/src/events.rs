//! Outbound events.
//!
//! The engine never talks to push or chat services directly. It writes
//! [`EngineEvent`]s to an [`EventSink`]; whoever owns the sink decides how
//! they are delivered.

use chrono::{DateTime, Utc};
use proxima_core::target::CheckInMethod;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What happened, as seen by the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
  FeatureUpdated {
    meeting_id:     Uuid,
    participant_id: Uuid,
  },
  NewMatch {
    meeting_id:   Uuid,
    participant1: Uuid,
    participant2: Uuid,
    chat_room_id: Uuid,
  },
  CheckedIn {
    user_id:   Uuid,
    target_id: Uuid,
    method:    CheckInMethod,
  },
  MatchCreated {
    match_id: Uuid,
    user1:    Uuid,
    user2:    Uuid,
  },
  Activity(ActivityEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
  CheckedIn,
  JoinedMeeting,
  AutoMatched,
  Liked,
  Matched,
}

/// One line of a user's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
  pub user_id:        Uuid,
  pub participant_id: Option<Uuid>,
  pub kind:           ActivityKind,
  pub detail:         String,
  pub at:             DateTime<Utc>,
}

impl ActivityEntry {
  pub fn new(user_id: Uuid, kind: ActivityKind, detail: impl Into<String>) -> Self {
    Self {
      user_id,
      participant_id: None,
      kind,
      detail: detail.into(),
      at: Utc::now(),
    }
  }

  pub fn for_participant(mut self, participant_id: Uuid) -> Self {
    self.participant_id = Some(participant_id);
    self
  }
}

// ─── Sinks ───────────────────────────────────────────────────────────────────

/// Destination for engine events. Emitting never fails the operation that
/// produced the event.
pub trait EventSink: Send + Sync {
  fn emit(&self, event: EngineEvent);
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
  pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self { Self { tx } }

  /// A sink plus the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

impl EventSink for ChannelSink {
  fn emit(&self, event: EngineEvent) {
    if let Err(e) = self.tx.send(event) {
      tracing::warn!(event = ?e.0, "event receiver dropped; event discarded");
    }
  }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
  fn emit(&self, _event: EngineEvent) {}
}
