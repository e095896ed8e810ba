//! [`SqliteStore`]: the SQLite implementation of [`EngineStore`] and
//! [`UserDirectory`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use uuid::Uuid;

use proxima_core::{
  geo::Coordinate,
  matches::{
    AutoMatch, Match, MatchAttempt, MatchCreation, MatchStatus, NewAutoMatch,
    NewMatch, NewMatchAttempt, ordered_pair,
  },
  meetup::{FeatureProfile, FeatureSet, Meeting, NewParticipant, Participant},
  ranking::UserProfile,
  store::{EngineStore, UserDirectory},
  target::{CheckIn, LocationTarget, Membership, NewCheckIn, NewTarget},
};

use crate::{
  Error, Result,
  encode::{
    RawAutoMatch, RawCheckIn, RawFeatureProfile, RawMatch, RawMatchAttempt,
    RawMeeting, RawMembership, RawParticipant, RawTarget, RawUser, decode_uuid,
    encode_dt, encode_features, encode_uuid, now,
  },
  schema::SCHEMA,
};

fn sql_limit(limit: usize) -> i64 { i64::try_from(limit).unwrap_or(i64::MAX) }

// ─── Row lookups shared by reads and read-after-write ────────────────────────

fn select_target(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawTarget>> {
  conn
    .query_row(
      &format!("SELECT {} FROM targets WHERE target_id = ?1", RawTarget::COLUMNS),
      params![id],
      RawTarget::from_row,
    )
    .optional()
}

fn select_participant(
  conn: &Connection,
  id: &str,
) -> rusqlite::Result<Option<RawParticipant>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM participants WHERE participant_id = ?1",
        RawParticipant::COLUMNS
      ),
      params![id],
      RawParticipant::from_row,
    )
    .optional()
}

fn select_match(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawMatch>> {
  conn
    .query_row(
      &format!("SELECT {} FROM matches WHERE match_id = ?1", RawMatch::COLUMNS),
      params![id],
      RawMatch::from_row,
    )
    .optional()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Proxima store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. Every call
/// runs on the connection's single worker thread, so each `call` closure is
/// atomic with respect to every other.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace a directory profile.
  pub async fn upsert_user(&self, profile: UserProfile) -> Result<()> {
    let id_str = encode_uuid(profile.user_id);
    let last_active = profile.last_active_at.map(encode_dt);
    let age = profile.age.map(i64::from);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             user_id, nickname, bio, age, gender, profile_image, last_active_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (user_id) DO UPDATE SET
             nickname       = excluded.nickname,
             bio            = excluded.bio,
             age            = excluded.age,
             gender         = excluded.gender,
             profile_image  = excluded.profile_image,
             last_active_at = excluded.last_active_at",
          params![
            id_str,
            profile.nickname,
            profile.bio,
            age,
            profile.gender,
            profile.profile_image,
            last_active,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_participant(&self, id_str: String) -> Result<Option<Participant>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_participant(conn, &id_str)?))
      .await?;
    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn load_match(&self, id_str: String) -> Result<Option<Match>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_match(conn, &id_str)?))
      .await?;
    raw.map(RawMatch::into_match).transpose()
  }
}

// ─── EngineStore impl ────────────────────────────────────────────────────────

impl EngineStore for SqliteStore {
  type Error = Error;

  // ── Targets ───────────────────────────────────────────────────────────────

  async fn add_target(&self, input: NewTarget) -> Result<LocationTarget> {
    let at = now();
    let target = LocationTarget {
      target_id:     Uuid::new_v4(),
      owner_id:      input.owner_id,
      name:          input.name,
      center:        input.center,
      radius_meters: input.radius_meters,
      created_at:    at,
      updated_at:    at,
    };

    let id_str    = encode_uuid(target.target_id);
    let owner_str = encode_uuid(target.owner_id);
    let name      = target.name.clone();
    let center    = target.center;
    let radius    = target.radius_meters;
    let at_str    = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO targets (
             target_id, owner_id, name, latitude, longitude,
             radius_meters, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          params![
            id_str,
            owner_str,
            name,
            center.latitude,
            center.longitude,
            radius,
            at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(target)
  }

  async fn get_target(&self, target_id: Uuid) -> Result<Option<LocationTarget>> {
    let id_str = encode_uuid(target_id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_target(conn, &id_str)?))
      .await?;
    raw.map(RawTarget::into_target).transpose()
  }

  async fn update_geofence(
    &self,
    target_id: Uuid,
    center: Coordinate,
    radius_meters: f64,
  ) -> Result<Option<LocationTarget>> {
    let id_str = encode_uuid(target_id);
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE targets
           SET latitude = ?2, longitude = ?3, radius_meters = ?4, updated_at = ?5
           WHERE target_id = ?1",
          params![id_str, center.latitude, center.longitude, radius_meters, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_target(conn, &id_str)?)
      })
      .await?;
    raw.map(RawTarget::into_target).transpose()
  }

  // ── Check-ins: append-only ───────────────────────────────────────────────

  async fn record_check_in(&self, input: NewCheckIn) -> Result<CheckIn> {
    let check_in = CheckIn {
      check_in_id:     Uuid::new_v4(),
      user_id:         input.user_id,
      target_id:       input.target_id,
      coordinate:      input.coordinate,
      accuracy_meters: input.accuracy_meters,
      method:          input.method,
      is_valid:        true,
      address:         input.address,
      created_at:      now(),
    };

    let id_str     = encode_uuid(check_in.check_in_id);
    let user_str   = encode_uuid(check_in.user_id);
    let target_str = encode_uuid(check_in.target_id);
    let coordinate = check_in.coordinate;
    let accuracy   = check_in.accuracy_meters;
    let method     = check_in.method.to_string();
    let address    = check_in.address.clone();
    let at_str     = encode_dt(check_in.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO check_ins (
             check_in_id, user_id, target_id, latitude, longitude,
             accuracy_meters, method, is_valid, address, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
          params![
            id_str,
            user_str,
            target_str,
            coordinate.latitude,
            coordinate.longitude,
            accuracy,
            method,
            address,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(check_in)
  }

  async fn check_ins_for_target(&self, target_id: Uuid, limit: usize) -> Result<Vec<CheckIn>> {
    let id_str = encode_uuid(target_id);
    let limit = sql_limit(limit);

    let raws: Vec<RawCheckIn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM check_ins
           WHERE target_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2",
          RawCheckIn::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![id_str, limit], RawCheckIn::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCheckIn::into_check_in).collect()
  }

  async fn check_ins_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<CheckIn>> {
    let id_str = encode_uuid(user_id);
    let limit = sql_limit(limit);

    let raws: Vec<RawCheckIn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM check_ins
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2",
          RawCheckIn::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![id_str, limit], RawCheckIn::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCheckIn::into_check_in).collect()
  }

  // ── Membership ────────────────────────────────────────────────────────────

  async fn is_active_member(&self, user_id: Uuid, group_id: Uuid) -> Result<bool> {
    let user_str  = encode_uuid(user_id);
    let group_str = encode_uuid(group_id);

    let active: Option<bool> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT is_active FROM memberships WHERE user_id = ?1 AND group_id = ?2",
              params![user_str, group_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(active.unwrap_or(false))
  }

  async fn grant_membership(&self, user_id: Uuid, group_id: Uuid) -> Result<Membership> {
    let user_str  = encode_uuid(user_id);
    let group_str = encode_uuid(group_id);
    let at_str    = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        // An active row keeps its original join time.
        conn.execute(
          "INSERT INTO memberships (user_id, group_id, is_active, joined_at)
           VALUES (?1, ?2, 1, ?3)
           ON CONFLICT (user_id, group_id) DO UPDATE SET
             joined_at = CASE WHEN is_active = 1 THEN joined_at ELSE excluded.joined_at END,
             is_active = 1",
          params![user_str, group_str, at_str],
        )?;
        Ok(conn.query_row(
          "SELECT user_id, group_id, is_active, joined_at
           FROM memberships WHERE user_id = ?1 AND group_id = ?2",
          params![user_str, group_str],
          |row| {
            Ok(RawMembership {
              user_id:   row.get(0)?,
              group_id:  row.get(1)?,
              is_active: row.get(2)?,
              joined_at: row.get(3)?,
            })
          },
        )?)
      })
      .await?;

    raw.into_membership()
  }

  // ── Meetings & participants ───────────────────────────────────────────────

  async fn add_meeting(&self, title: String) -> Result<Meeting> {
    let meeting = Meeting { meeting_id: Uuid::new_v4(), title, created_at: now() };

    let id_str = encode_uuid(meeting.meeting_id);
    let title  = meeting.title.clone();
    let at_str = encode_dt(meeting.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO meetings (meeting_id, title, created_at) VALUES (?1, ?2, ?3)",
          params![id_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(meeting)
  }

  async fn get_meeting(&self, meeting_id: Uuid) -> Result<Option<Meeting>> {
    let id_str = encode_uuid(meeting_id);

    let raw: Option<RawMeeting> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT meeting_id, title, created_at FROM meetings WHERE meeting_id = ?1",
              params![id_str],
              |row| {
                Ok(RawMeeting {
                  meeting_id: row.get(0)?,
                  title:      row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMeeting::into_meeting).transpose()
  }

  async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>> {
    self.load_participant(encode_uuid(participant_id)).await
  }

  async fn find_participant(
    &self,
    user_id: Uuid,
    meeting_id: Uuid,
  ) -> Result<Option<Participant>> {
    let user_str    = encode_uuid(user_id);
    let meeting_str = encode_uuid(meeting_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM participants WHERE user_id = ?1 AND meeting_id = ?2",
                RawParticipant::COLUMNS
              ),
              params![user_str, meeting_str],
              RawParticipant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn add_participant(&self, input: NewParticipant) -> Result<Participant> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let user_str    = encode_uuid(input.user_id);
    let meeting_str = encode_uuid(input.meeting_id);
    let at_str      = encode_dt(now());

    // A concurrent join may have inserted the row first; return whichever
    // row owns the (user, meeting) pair.
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO participants (
             participant_id, user_id, meeting_id, nickname, is_active, joined_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5)
           ON CONFLICT (user_id, meeting_id) DO NOTHING",
          params![id_str, user_str, meeting_str, input.nickname, at_str],
        )?;
        Ok(conn.query_row(
          &format!(
            "SELECT {} FROM participants WHERE user_id = ?1 AND meeting_id = ?2",
            RawParticipant::COLUMNS
          ),
          params![user_str, meeting_str],
          RawParticipant::from_row,
        )?)
      })
      .await?;

    raw.into_participant()
  }

  async fn reactivate_participant(
    &self,
    participant_id: Uuid,
    nickname: String,
  ) -> Result<Option<Participant>> {
    let id_str = encode_uuid(participant_id);
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE participants
           SET is_active = 1, nickname = ?2, joined_at = ?3, left_at = NULL
           WHERE participant_id = ?1",
          params![id_str, nickname, at_str],
        )?;
        Ok(select_participant(conn, &id_str)?)
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn rename_participant(
    &self,
    participant_id: Uuid,
    nickname: String,
  ) -> Result<Option<Participant>> {
    let id_str = encode_uuid(participant_id);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE participants SET nickname = ?2
           WHERE participant_id = ?1 AND is_active = 1",
          params![id_str, nickname],
        )?;
        Ok(select_participant(conn, &id_str)?)
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn deactivate_participant(&self, participant_id: Uuid) -> Result<Option<Participant>> {
    let id_str = encode_uuid(participant_id);
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE participants
           SET is_active = 0, left_at = COALESCE(left_at, ?2)
           WHERE participant_id = ?1",
          params![id_str, at_str],
        )?;
        Ok(select_participant(conn, &id_str)?)
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  // ── Feature profiles ──────────────────────────────────────────────────────

  async fn put_feature_profile(
    &self,
    participant_id: Uuid,
    features: FeatureSet,
  ) -> Result<FeatureProfile> {
    let profile = FeatureProfile {
      participant_id,
      my_features: features.my_features,
      looking_for: features.looking_for,
      updated_at: now(),
    };

    let id_str = encode_uuid(participant_id);
    let mine   = encode_features(&profile.my_features)?;
    let wanted = encode_features(&profile.looking_for)?;
    let at_str = encode_dt(profile.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO feature_profiles (participant_id, my_features, looking_for, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (participant_id) DO UPDATE SET
             my_features = excluded.my_features,
             looking_for = excluded.looking_for,
             updated_at  = excluded.updated_at",
          params![id_str, mine, wanted, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(profile)
  }

  async fn get_feature_profile(&self, participant_id: Uuid) -> Result<Option<FeatureProfile>> {
    let id_str = encode_uuid(participant_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT participant_id, my_features, looking_for, updated_at
               FROM feature_profiles WHERE participant_id = ?1",
              params![id_str],
              RawFeatureProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeatureProfile::into_profile).transpose()
  }

  async fn active_profiles(&self, meeting_id: Uuid) -> Result<Vec<FeatureProfile>> {
    let id_str = encode_uuid(meeting_id);

    let raws: Vec<RawFeatureProfile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT fp.participant_id, fp.my_features, fp.looking_for, fp.updated_at
           FROM feature_profiles fp
           JOIN participants p ON p.participant_id = fp.participant_id
           WHERE p.meeting_id = ?1 AND p.is_active = 1
           ORDER BY p.joined_at",
        )?;
        let rows = stmt
          .query_map(params![id_str], RawFeatureProfile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFeatureProfile::into_profile).collect()
  }

  // ── Auto-matches ──────────────────────────────────────────────────────────

  async fn create_auto_match_if_absent(&self, input: NewAutoMatch) -> Result<Option<AutoMatch>> {
    let auto_match = AutoMatch {
      auto_match_id:   Uuid::new_v4(),
      meeting_id:      input.meeting_id,
      participant1_id: input.participant1_id,
      participant2_id: input.participant2_id,
      matched_at:      now(),
      chat_room_id:    input.chat_room_id,
    };

    let (low, high) = ordered_pair(input.participant1_id, input.participant2_id);
    let id_str      = encode_uuid(auto_match.auto_match_id);
    let meeting_str = encode_uuid(auto_match.meeting_id);
    let p1_str      = encode_uuid(auto_match.participant1_id);
    let p2_str      = encode_uuid(auto_match.participant2_id);
    let low_str     = encode_uuid(low);
    let high_str    = encode_uuid(high);
    let room_str    = encode_uuid(auto_match.chat_room_id);
    let at_str      = encode_dt(auto_match.matched_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO auto_matches (
             auto_match_id, meeting_id, participant1_id, participant2_id,
             participant_low, participant_high, chat_room_id, matched_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (meeting_id, participant_low, participant_high) DO NOTHING",
          params![id_str, meeting_str, p1_str, p2_str, low_str, high_str, room_str, at_str],
        )?)
      })
      .await?;

    Ok((inserted == 1).then_some(auto_match))
  }

  async fn auto_matches_for(&self, participant_id: Uuid) -> Result<Vec<AutoMatch>> {
    let id_str = encode_uuid(participant_id);

    let raws: Vec<RawAutoMatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM auto_matches
           WHERE participant1_id = ?1 OR participant2_id = ?1
           ORDER BY matched_at",
          RawAutoMatch::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawAutoMatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAutoMatch::into_auto_match).collect()
  }

  async fn record_match_attempt(&self, input: NewMatchAttempt) -> Result<MatchAttempt> {
    let raw = RawMatchAttempt {
      attempt_id:         encode_uuid(Uuid::new_v4()),
      meeting_id:         encode_uuid(input.meeting_id),
      participant_id:     encode_uuid(input.participant_id),
      potential_matches:  i64::from(input.potential_matches),
      successful_matches: i64::from(input.successful_matches),
      created_at:         encode_dt(now()),
    };

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO match_attempts (
             attempt_id, meeting_id, participant_id,
             potential_matches, successful_matches, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            raw.attempt_id,
            raw.meeting_id,
            raw.participant_id,
            raw.potential_matches,
            raw.successful_matches,
            raw.created_at,
          ],
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_attempt()
  }

  async fn match_attempts_for(&self, participant_id: Uuid) -> Result<Vec<MatchAttempt>> {
    let id_str = encode_uuid(participant_id);

    let raws: Vec<RawMatchAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM match_attempts
           WHERE participant_id = ?1
           ORDER BY created_at, rowid",
          RawMatchAttempt::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawMatchAttempt::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMatchAttempt::into_attempt).collect()
  }

  // ── Matches ───────────────────────────────────────────────────────────────

  async fn create_match_if_absent(&self, input: NewMatch) -> Result<MatchCreation> {
    let (low, high) = ordered_pair(input.user_a, input.user_b);
    let id_str      = encode_uuid(Uuid::new_v4());
    let user1_str   = encode_uuid(input.user_a);
    let user2_str   = encode_uuid(input.user_b);
    let low_str     = encode_uuid(low);
    let high_str    = encode_uuid(high);
    let group_str   = input.group_id.map(encode_uuid);
    let context_key = group_str.clone().unwrap_or_default();
    let at_str      = encode_dt(now());

    let (created, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
          .query_row(
            &format!(
              "SELECT {} FROM matches
               WHERE user_low = ?1 AND user_high = ?2 AND context_key = ?3
                 AND status != 'deleted'",
              RawMatch::COLUMNS
            ),
            params![low_str, high_str, context_key],
            RawMatch::from_row,
          )
          .optional()?;

        if let Some(raw) = existing {
          tx.commit()?;
          return Ok((false, raw));
        }

        tx.execute(
          "INSERT INTO matches (
             match_id, user1_id, user2_id, user_low, user_high,
             group_id, context_key, status, message_count, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', 0, ?8)",
          params![
            id_str,
            user1_str,
            user2_str,
            low_str,
            high_str,
            group_str,
            context_key,
            at_str,
          ],
        )?;
        let raw = select_match(&tx, &id_str)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((true, raw))
      })
      .await?;

    let m = raw.into_match()?;
    Ok(if created { MatchCreation::Created(m) } else { MatchCreation::Existing(m) })
  }

  async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>> {
    self.load_match(encode_uuid(match_id)).await
  }

  async fn set_match_status(&self, match_id: Uuid, status: MatchStatus) -> Result<Option<Match>> {
    let id_str     = encode_uuid(match_id);
    let status_str = status.to_string();
    let rank       = i64::from(status.rank());

    let raw = self
      .conn
      .call(move |conn| {
        // Only ever moves forward, even against a concurrent writer.
        conn.execute(
          "UPDATE matches SET status = ?2
           WHERE match_id = ?1
             AND CASE status
                   WHEN 'active'  THEN 0
                   WHEN 'expired' THEN 1
                   ELSE 2
                 END < ?3",
          params![id_str, status_str, rank],
        )?;
        Ok(select_match(conn, &id_str)?)
      })
      .await?;

    raw.map(RawMatch::into_match).transpose()
  }

  async fn record_match_message(
    &self,
    match_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Match>> {
    let id_str = encode_uuid(match_id);
    let at_str = encode_dt(at);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE matches
           SET message_count = message_count + 1, last_message_at = ?2
           WHERE match_id = ?1",
          params![id_str, at_str],
        )?;
        Ok(select_match(conn, &id_str)?)
      })
      .await?;

    raw.map(RawMatch::into_match).transpose()
  }

  async fn expire_matches(
    &self,
    created_before: DateTime<Utc>,
    require_no_messages: bool,
  ) -> Result<usize> {
    let cutoff_str = encode_dt(created_before);

    let expired = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE matches SET status = 'expired'
           WHERE status = 'active'
             AND created_at < ?1
             AND (?2 = 0 OR message_count = 0)",
          params![cutoff_str, require_no_messages],
        )?)
      })
      .await?;

    Ok(expired)
  }

  async fn matches_for_user(&self, user_id: Uuid) -> Result<Vec<Match>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawMatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM matches
           WHERE (user1_id = ?1 OR user2_id = ?1) AND status != 'deleted'
           ORDER BY created_at DESC",
          RawMatch::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawMatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMatch::into_match).collect()
  }
}

// ─── UserDirectory impl ──────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  type Error = Error;

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
    let id_str = encode_uuid(user_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM users WHERE user_id = ?1", RawUser::COLUMNS),
              params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_profile).transpose()
  }

  async fn group_candidates(
    &self,
    group_id: Uuid,
    exclude: Vec<Uuid>,
    limit: usize,
  ) -> Result<Vec<UserProfile>> {
    let group_str = encode_uuid(group_id);
    let exclude_json =
      serde_json::to_string(&exclude.into_iter().map(encode_uuid).collect::<Vec<_>>())?;
    let limit = sql_limit(limit);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.nickname, u.bio, u.age, u.gender,
                  u.profile_image, u.last_active_at
           FROM users u
           JOIN memberships m ON m.user_id = u.user_id
           WHERE m.group_id = ?1
             AND m.is_active = 1
             AND u.age IS NOT NULL
             AND u.gender IS NOT NULL
             AND u.user_id NOT IN (SELECT value FROM json_each(?2))
           ORDER BY u.last_active_at IS NULL, u.last_active_at DESC
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(params![group_str, exclude_json, limit], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_profile).collect()
  }

  async fn liked_user_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
    let id_str = encode_uuid(user_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT to_user_id FROM likes WHERE from_user_id = ?1")?;
        let rows = stmt
          .query_map(params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn record_like(&self, from: Uuid, to: Uuid) -> Result<()> {
    let from_str = encode_uuid(from);
    let to_str   = encode_uuid(to);
    let at_str   = encode_dt(now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO likes (from_user_id, to_user_id, created_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (from_user_id, to_user_id) DO NOTHING",
          params![from_str, to_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn has_liked(&self, from: Uuid, to: Uuid) -> Result<bool> {
    let from_str = encode_uuid(from);
    let to_str   = encode_uuid(to);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM likes WHERE from_user_id = ?1 AND to_user_id = ?2",
              params![from_str, to_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(found)
  }
}
