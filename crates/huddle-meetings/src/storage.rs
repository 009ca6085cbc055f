//! Meeting storage operations for SQLite.
//!
//! Every operation that touches more than one row runs in a single
//! transaction; a dropped future rolls it back, so a cancelled request never
//! leaves a participant set without its organizer. Those transactions read
//! before they write, so they take the write lock up front (`BEGIN
//! IMMEDIATE`): concurrent changes to one meeting queue behind each other
//! instead of failing to upgrade a read lock.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, instrument};

use huddle_graph::{format_timestamp, is_constraint_violation_any, parse_timestamp};

use crate::reconcile::{plan_reconciliation, ParticipantDiff};
use crate::schema::{Meeting, MeetingDraft, MeetingError, Participant, ParticipantStatus};

type MeetingRow = (i64, String, String, Option<String>, String, String, String);

fn meeting_from_row(
    (id, creator_id, title, description, starts_at, ends_at, created_at): MeetingRow,
) -> Result<Meeting, MeetingError> {
    Ok(Meeting {
        id,
        creator_id,
        title,
        description,
        starts_at: parse_timestamp(&starts_at)?,
        ends_at: parse_timestamp(&ends_at)?,
        created_at: parse_timestamp(&created_at)?,
        participants: Vec::new(),
    })
}

fn participant_from_row((contact_id, status): (String, String)) -> Result<Participant, MeetingError> {
    let status = ParticipantStatus::parse(&status).ok_or(MeetingError::UnknownStatus(status))?;
    Ok(Participant { contact_id, status })
}

async fn load_meeting(conn: &mut SqliteConnection, meeting_id: i64) -> Result<Option<Meeting>> {
    let row = sqlx::query_as::<_, MeetingRow>(
        "SELECT id, creator_id, title, description, starts_at, ends_at, created_at
         FROM meetings WHERE id = ?1",
    )
    .bind(meeting_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut meeting = meeting_from_row(row)?;

    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT contact_id, status FROM meeting_participants
         WHERE meeting_id = ?1 ORDER BY contact_id",
    )
    .bind(meeting_id)
    .fetch_all(&mut *conn)
    .await?;
    meeting.participants = rows
        .into_iter()
        .map(participant_from_row)
        .collect::<Result<_, _>>()?;

    Ok(Some(meeting))
}

async fn apply_diff(conn: &mut SqliteConnection, meeting_id: i64, diff: &ParticipantDiff) -> Result<()> {
    let now = format_timestamp(Utc::now());

    for contact_id in &diff.removed {
        sqlx::query("DELETE FROM meeting_participants WHERE meeting_id = ?1 AND contact_id = ?2")
            .bind(meeting_id)
            .bind(contact_id)
            .execute(&mut *conn)
            .await?;
    }

    for participant in &diff.updated {
        sqlx::query(
            "UPDATE meeting_participants SET status = ?1, updated_at = ?2
             WHERE meeting_id = ?3 AND contact_id = ?4",
        )
        .bind(participant.status.as_str())
        .bind(&now)
        .bind(meeting_id)
        .bind(&participant.contact_id)
        .execute(&mut *conn)
        .await?;
    }

    for participant in &diff.added {
        sqlx::query(
            "INSERT INTO meeting_participants (meeting_id, contact_id, status, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(meeting_id)
        .bind(&participant.contact_id)
        .bind(participant.status.as_str())
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Meeting and participant storage backed by SQLite.
#[derive(Clone)]
pub struct MeetingStore {
    pool: SqlitePool,
}

impl MeetingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Initialize the meeting schema. The identity tables must exist first
    /// (see `huddle_graph::RelationshipStore::init_schema`).
    #[instrument(skip_all)]
    pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS meetings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                creator_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                starts_at TEXT NOT NULL,
                ends_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                CHECK (ends_at >= starts_at)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS meeting_participants (
                meeting_id INTEGER NOT NULL REFERENCES meetings(id) ON DELETE CASCADE,
                contact_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (meeting_id, contact_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_participants_contact ON meeting_participants(contact_id)",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_meetings_starts ON meetings(starts_at)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Create a meeting owned by `creator_id` and invite `participants`.
    ///
    /// The creator always ends up as an accepted participant. Returns `None`
    /// for an invalid draft, an unknown creator or an unknown invitee.
    #[instrument(skip(self, draft, participants), fields(title = %draft.title))]
    pub async fn create_meeting(
        &self,
        creator_id: &str,
        draft: &MeetingDraft,
        participants: &[Participant],
    ) -> Result<Option<Meeting>> {
        if !draft.is_valid() {
            debug!("meeting draft rejected");
            return Ok(None);
        }

        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO meetings (creator_id, title, description, starts_at, ends_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id",
        )
        .bind(creator_id)
        .bind(draft.title.trim())
        .bind(&draft.description)
        .bind(format_timestamp(draft.starts_at))
        .bind(format_timestamp(draft.ends_at))
        .bind(format_timestamp(now))
        .fetch_one(&mut *tx)
        .await;

        let meeting_id = match inserted {
            Ok(id) => id,
            Err(err) if huddle_graph::is_constraint_violation(&err) => {
                debug!("meeting rejected by a constraint: {}", err);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(mut meeting) = load_meeting(&mut *tx, meeting_id).await? else {
            return Ok(None);
        };
        let Some(diff) = plan_reconciliation(&meeting, participants, creator_id) else {
            return Ok(None);
        };

        match apply_diff(&mut *tx, meeting_id, &diff).await {
            Ok(()) => {}
            Err(err) if is_constraint_violation_any(&err) => {
                debug!("meeting invitees rejected by a constraint: {}", err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
        tx.commit().await?;

        diff.apply(&mut meeting.participants);
        meeting.participants.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));
        info!(
            "Created meeting {} with {} participants",
            meeting.id,
            meeting.participants.len()
        );
        Ok(Some(meeting))
    }

    /// Get a meeting with its participants.
    pub async fn get_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>> {
        let mut conn = self.pool.acquire().await?;
        load_meeting(&mut *conn, meeting_id).await
    }

    /// Replace the participant set of a meeting with `incoming`.
    ///
    /// Only the creator may reconcile. Unknown meetings, non-creators and
    /// invitees rejected by a constraint all yield `false` with nothing
    /// written.
    #[instrument(skip(self, incoming), fields(incoming = incoming.len()))]
    pub async fn reconcile_participants(
        &self,
        meeting_id: i64,
        incoming: &[Participant],
        organizer_id: &str,
    ) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let Some(meeting) = load_meeting(&mut *tx, meeting_id).await? else {
            debug!("meeting not found");
            return Ok(false);
        };
        let Some(diff) = plan_reconciliation(&meeting, incoming, organizer_id) else {
            debug!("only the organizer may change participants");
            return Ok(false);
        };

        if diff.is_empty() {
            return Ok(true);
        }

        match apply_diff(&mut *tx, meeting_id, &diff).await {
            Ok(()) => {}
            Err(err) if is_constraint_violation_any(&err) => {
                debug!("participant change rejected by a constraint: {}", err);
                return Ok(false);
            }
            Err(err) => return Err(err),
        }
        tx.commit().await?;

        info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "participants reconciled"
        );
        Ok(true)
    }

    /// An invitee answers an invitation. The organizer's own status is
    /// pinned and cannot be changed here; `Pending` is not an answer.
    #[instrument(skip(self))]
    pub async fn respond(
        &self,
        meeting_id: i64,
        contact_id: &str,
        status: ParticipantStatus,
    ) -> Result<bool> {
        if status == ParticipantStatus::Pending {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE meeting_participants SET status = ?1, updated_at = ?2
             WHERE meeting_id = ?3 AND contact_id = ?4
               AND contact_id <> (SELECT creator_id FROM meetings WHERE id = ?3)",
        )
        .bind(status.as_str())
        .bind(format_timestamp(Utc::now()))
        .bind(meeting_id)
        .bind(contact_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Meetings `contact_id` participates in, ordered by start time.
    pub async fn meetings_for(&self, contact_id: &str) -> Result<Vec<Meeting>> {
        let rows = sqlx::query_as::<_, MeetingRow>(
            "SELECT m.id, m.creator_id, m.title, m.description, m.starts_at, m.ends_at, m.created_at
             FROM meetings m
             JOIN meeting_participants p ON p.meeting_id = m.id
             WHERE p.contact_id = ?1
             ORDER BY m.starts_at, m.id",
        )
        .bind(contact_id)
        .fetch_all(&self.pool)
        .await?;

        let participant_rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT meeting_id, contact_id, status FROM meeting_participants
             WHERE meeting_id IN (SELECT meeting_id FROM meeting_participants WHERE contact_id = ?1)
             ORDER BY meeting_id, contact_id",
        )
        .bind(contact_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_meeting: HashMap<i64, Vec<Participant>> = HashMap::new();
        for (meeting_id, contact, status) in participant_rows {
            by_meeting
                .entry(meeting_id)
                .or_default()
                .push(participant_from_row((contact, status))?);
        }

        rows.into_iter()
            .map(|row| -> Result<Meeting> {
                let mut meeting = meeting_from_row(row)?;
                meeting.participants = by_meeting.remove(&meeting.id).unwrap_or_default();
                Ok(meeting)
            })
            .collect()
    }

    /// Delete a meeting and its participants. Only the creator may delete.
    #[instrument(skip(self))]
    pub async fn delete_meeting(&self, meeting_id: i64, acting_user_id: &str) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let creator: Option<String> =
            sqlx::query_scalar("SELECT creator_id FROM meetings WHERE id = ?1")
                .bind(meeting_id)
                .fetch_optional(&mut *tx)
                .await?;
        if creator.as_deref() != Some(acting_user_id) {
            return Ok(false);
        }

        sqlx::query("DELETE FROM meeting_participants WHERE meeting_id = ?1")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM meetings WHERE id = ?1")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Deleted meeting {}", meeting_id);
        Ok(true)
    }

    pub async fn meeting_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meetings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
