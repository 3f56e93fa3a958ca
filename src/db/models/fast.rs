//! Fasting session models, state transitions and queries.
//!
//! A session is *active* while `end_at` is unset and *stopped* once it is set.
//! `duration_mins` is derived from the two instants whenever a stop or an edit
//! leaves the session with an end.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;

use super::common::{millis_to_rfc3339, now_rfc3339, NumberInput};
use crate::stats::SessionSpan;

/// Allowed fasting targets, in hours.
pub const PRESETS: [i64; 3] = [8, 12, 21];

pub const NOTE_MAX_LEN: usize = 280;

/// Most sessions returned by a listing.
pub const LIST_LIMIT: i64 = 100;

/// Whole minutes between two instants, rounded half up and floored at zero.
pub fn duration_minutes(start_ms: i64, end_ms: i64) -> i64 {
    (end_ms - start_ms + 30_000).div_euclid(60_000).max(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FastCheckError {
    #[error("endAt cannot be before startAt")]
    EndBeforeStart,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FastSession {
    pub id: String,
    pub user_id: String,
    pub preset: i64,
    /// Epoch milliseconds
    pub start_at: i64,
    /// Epoch milliseconds
    pub end_at: Option<i64>,
    pub duration_mins: Option<i64>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated field changes for an edit
#[derive(Debug, Clone, Default)]
pub struct FastEdit {
    pub note: Option<String>,
    pub preset: Option<i64>,
    pub start_at: Option<i64>,
    pub end_at: Option<i64>,
}

/// Result of asking a session to stop
#[derive(Debug)]
pub enum StopOutcome {
    Stopped(FastSession),
    AlreadyStopped,
    NotFound,
}

impl FastSession {
    pub fn is_active(&self) -> bool {
        self.end_at.is_none()
    }

    /// Model-level invariant checked before every write.
    pub fn check(&self) -> Result<(), FastCheckError> {
        match self.end_at {
            Some(end) if end < self.start_at => Err(FastCheckError::EndBeforeStart),
            _ => Ok(()),
        }
    }

    /// Apply an edit in memory. The duration is recomputed only when the
    /// session has an end after the edit.
    pub fn apply_edit(&mut self, edit: &FastEdit) -> Result<(), FastCheckError> {
        if let Some(note) = &edit.note {
            self.note = Some(note.trim().to_string());
        }
        if let Some(preset) = edit.preset {
            self.preset = preset;
        }
        if let Some(start_at) = edit.start_at {
            self.start_at = start_at;
        }
        if let Some(end_at) = edit.end_at {
            self.end_at = Some(end_at);
        }

        if let Some(end) = self.end_at {
            self.duration_mins = Some(duration_minutes(self.start_at, end));
        }

        self.check()
    }

    pub fn to_response(&self) -> FastSessionResponse {
        self.response_with(UserRef::Id(self.user_id.clone()))
    }

    /// Response with the owner expanded to `{id, email}`.
    pub fn to_response_with_owner(&self, email: String) -> FastSessionResponse {
        self.response_with(UserRef::Populated {
            id: self.user_id.clone(),
            email,
        })
    }

    fn response_with(&self, user: UserRef) -> FastSessionResponse {
        FastSessionResponse {
            id: self.id.clone(),
            user,
            preset: self.preset,
            start_at: millis_to_rfc3339(self.start_at),
            end_at: self.end_at.map(millis_to_rfc3339),
            duration_mins: self.duration_mins,
            note: self.note.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub async fn create(
        db: &SqlitePool,
        user_id: &str,
        preset: i64,
        start_at: i64,
    ) -> Result<FastSession, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO fast_sessions (id, user_id, preset, start_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(preset)
        .bind(start_at)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as::<_, FastSession>("SELECT * FROM fast_sessions WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await
    }

    /// Insert a fully specified session (used by the seeder).
    pub async fn insert_completed(
        db: &SqlitePool,
        user_id: &str,
        preset: i64,
        start_at: i64,
        end_at: i64,
        note: Option<&str>,
    ) -> Result<FastSession, sqlx::Error> {
        let mut session = Self::create(db, user_id, preset, start_at).await?;
        session.end_at = Some(end_at);
        session.duration_mins = Some(duration_minutes(start_at, end_at));
        session.note = note.map(String::from);
        session.save(db).await?;
        Ok(session)
    }

    /// The newest sessions first, by start time.
    pub async fn list_for_user(
        db: &SqlitePool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<FastSession>, sqlx::Error> {
        sqlx::query_as::<_, FastSession>(
            "SELECT * FROM fast_sessions WHERE user_id = ? ORDER BY start_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await
    }

    pub async fn find_for_user(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<FastSession>, sqlx::Error> {
        sqlx::query_as::<_, FastSession>(
            "SELECT * FROM fast_sessions WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    /// Stop an active session at `now_ms`.
    ///
    /// The write only lands while `end_at` is still NULL, so of two racing
    /// stops exactly one succeeds.
    pub async fn stop(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
        now_ms: i64,
    ) -> Result<StopOutcome, sqlx::Error> {
        let Some(session) = Self::find_for_user(db, user_id, id).await? else {
            return Ok(StopOutcome::NotFound);
        };
        if !session.is_active() {
            return Ok(StopOutcome::AlreadyStopped);
        }

        let end_at = now_ms.max(session.start_at);
        let duration = duration_minutes(session.start_at, end_at);

        let result = sqlx::query(
            r#"
            UPDATE fast_sessions SET
                end_at = ?,
                duration_mins = ?,
                updated_at = ?
            WHERE id = ? AND user_id = ? AND end_at IS NULL
            "#,
        )
        .bind(end_at)
        .bind(duration)
        .bind(now_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(StopOutcome::AlreadyStopped);
        }

        let stopped = sqlx::query_as::<_, FastSession>("SELECT * FROM fast_sessions WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await?;

        Ok(StopOutcome::Stopped(stopped))
    }

    /// Persist every mutable field and refresh `updated_at`.
    pub async fn save(&mut self, db: &SqlitePool) -> Result<(), sqlx::Error> {
        self.updated_at = now_rfc3339();

        sqlx::query(
            r#"
            UPDATE fast_sessions SET
                preset = ?,
                start_at = ?,
                end_at = ?,
                duration_mins = ?,
                note = ?,
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(self.preset)
        .bind(self.start_at)
        .bind(self.end_at)
        .bind(self.duration_mins)
        .bind(&self.note)
        .bind(&self.updated_at)
        .bind(&self.id)
        .bind(&self.user_id)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Returns false when nothing matched.
    pub async fn delete_for_user(
        db: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fast_sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(db: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fast_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Timing fields of every session starting at or after `since_ms`.
    pub async fn spans_since(
        db: &SqlitePool,
        user_id: &str,
        since_ms: i64,
    ) -> Result<Vec<SessionSpan>, sqlx::Error> {
        let rows: Vec<(i64, Option<i64>, Option<i64>)> = sqlx::query_as(
            "SELECT start_at, end_at, duration_mins FROM fast_sessions WHERE user_id = ? AND start_at >= ?",
        )
        .bind(user_id)
        .bind(since_ms)
        .fetch_all(db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(start_at, end_at, duration_mins)| SessionSpan {
                start_at,
                end_at,
                duration_mins,
            })
            .collect())
    }

    /// Start instants at or after `since_ms`.
    pub async fn starts_since(
        db: &SqlitePool,
        user_id: &str,
        since_ms: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT start_at FROM fast_sessions WHERE user_id = ? AND start_at >= ?",
        )
        .bind(user_id)
        .bind(since_ms)
        .fetch_all(db)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

/// Owner reference: a bare id, or id plus email on single-session reads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Populated { id: String, email: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastSessionResponse {
    pub id: String,
    pub user: UserRef,
    pub preset: i64,
    pub start_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_mins: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFastRequest {
    pub preset: Option<NumberInput>,
    pub start_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFastRequest {
    pub note: Option<String>,
    pub preset: Option<NumberInput>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, User};

    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;

    fn session(start_at: i64, end_at: Option<i64>) -> FastSession {
        FastSession {
            id: "f1".to_string(),
            user_id: "u1".to_string(),
            preset: 12,
            start_at,
            end_at,
            duration_mins: None,
            note: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_duration_minutes_rounding() {
        assert_eq!(duration_minutes(0, 8 * HOUR + 30 * MINUTE), 510);
        assert_eq!(duration_minutes(0, 29_999), 0);
        assert_eq!(duration_minutes(0, 30_000), 1);
        assert_eq!(duration_minutes(0, 89_999), 1);
        assert_eq!(duration_minutes(HOUR, 0), 0);
    }

    #[test]
    fn test_edit_with_end_recomputes_duration() {
        let t = 1_700_000_000_000;
        let mut s = session(t, None);
        s.apply_edit(&FastEdit {
            end_at: Some(t + 8 * HOUR + 30 * MINUTE),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(s.duration_mins, Some(510));
        assert!(!s.is_active());
    }

    #[test]
    fn test_edit_without_end_leaves_duration_unset() {
        let mut s = session(0, None);
        s.apply_edit(&FastEdit {
            note: Some("  hungry  ".to_string()),
            preset: Some(21),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(s.duration_mins, None);
        assert_eq!(s.note.as_deref(), Some("hungry"));
        assert_eq!(s.preset, 21);
    }

    #[test]
    fn test_edit_start_on_stopped_session_recomputes() {
        let mut s = session(0, Some(10 * HOUR));
        s.apply_edit(&FastEdit {
            start_at: Some(2 * HOUR),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.duration_mins, Some(480));
    }

    #[test]
    fn test_edit_rejects_end_before_start() {
        let mut s = session(10 * HOUR, None);
        let err = s
            .apply_edit(&FastEdit {
                end_at: Some(HOUR),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, FastCheckError::EndBeforeStart);
        assert_eq!(err.to_string(), "endAt cannot be before startAt");
    }

    #[test]
    fn test_response_omits_unset_fields() {
        let json = serde_json::to_value(session(0, None).to_response()).unwrap();
        assert_eq!(json["user"], "u1");
        assert_eq!(json["startAt"], "1970-01-01T00:00:00.000Z");
        assert!(json.get("endAt").is_none());
        assert!(json.get("durationMins").is_none());
    }

    #[test]
    fn test_response_with_owner() {
        let json =
            serde_json::to_value(session(0, None).to_response_with_owner("a@b.co".into())).unwrap();
        assert_eq!(json["user"]["id"], "u1");
        assert_eq!(json["user"]["email"], "a@b.co");
    }

    #[tokio::test]
    async fn test_stop_twice_keeps_duration() {
        let db = init_memory().await.unwrap();
        let user = User::create(&db, "s@example.com", "h").await.unwrap();
        let t = 1_700_000_000_000;
        let created = FastSession::create(&db, &user.id, 12, t).await.unwrap();

        let first = FastSession::stop(&db, &user.id, &created.id, t + 8 * HOUR + 30 * MINUTE)
            .await
            .unwrap();
        let stopped = match first {
            StopOutcome::Stopped(s) => s,
            other => panic!("expected stop, got {:?}", other),
        };
        assert_eq!(stopped.duration_mins, Some(510));

        let second = FastSession::stop(&db, &user.id, &created.id, t + 20 * HOUR)
            .await
            .unwrap();
        assert!(matches!(second, StopOutcome::AlreadyStopped));

        let reloaded = FastSession::find_for_user(&db, &user.id, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.duration_mins, Some(510));
    }

    #[tokio::test]
    async fn test_other_users_session_is_invisible() {
        let db = init_memory().await.unwrap();
        let owner = User::create(&db, "owner@example.com", "h").await.unwrap();
        let other = User::create(&db, "other@example.com", "h").await.unwrap();
        let s = FastSession::create(&db, &owner.id, 8, 0).await.unwrap();

        assert!(FastSession::find_for_user(&db, &other.id, &s.id).await.unwrap().is_none());
        assert!(matches!(
            FastSession::stop(&db, &other.id, &s.id, HOUR).await.unwrap(),
            StopOutcome::NotFound
        ));
        assert!(!FastSession::delete_for_user(&db, &other.id, &s.id).await.unwrap());
        assert!(FastSession::delete_for_user(&db, &owner.id, &s.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_limited() {
        let db = init_memory().await.unwrap();
        let user = User::create(&db, "l@example.com", "h").await.unwrap();
        for i in 0..5 {
            FastSession::create(&db, &user.id, 8, i * HOUR).await.unwrap();
        }

        let rows = FastSession::list_for_user(&db, &user.id, 3).await.unwrap();
        let starts: Vec<i64> = rows.iter().map(|r| r.start_at).collect();
        assert_eq!(starts, vec![4 * HOUR, 3 * HOUR, 2 * HOUR]);
    }

    #[tokio::test]
    async fn test_spans_since_filters_on_start() {
        let db = init_memory().await.unwrap();
        let user = User::create(&db, "w@example.com", "h").await.unwrap();
        FastSession::create(&db, &user.id, 8, HOUR).await.unwrap();
        FastSession::insert_completed(&db, &user.id, 12, 5 * HOUR, 17 * HOUR, None)
            .await
            .unwrap();

        let spans = FastSession::spans_since(&db, &user.id, 2 * HOUR).await.unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration_mins, Some(720));

        let starts = FastSession::starts_since(&db, &user.id, 0).await.unwrap();
        assert_eq!(starts.len(), 2);
    }
}
