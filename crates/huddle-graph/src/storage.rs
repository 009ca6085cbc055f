//! Relationship storage operations for SQLite.
//!
//! This module provides the `RelationshipStore` struct for persisting and
//! querying identities and the relationships between them. Writes that change
//! relationship state are crate-private: callers go through
//! [`crate::FriendshipEngine`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use crate::error::{is_constraint_violation, GraphError};
use crate::schema::{
    format_timestamp, pair_key, parse_timestamp, Identity, PendingRequest, Relationship,
    RelationshipStatus, PAIR_KEY_SEPARATOR,
};

type IdentityRow = (String, String, String, String);
type RelationshipRow = (i64, String, String, String, String, String);
type PendingRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

const RELATIONSHIP_COLUMNS: &str =
    "id, requester_id, receiver_id, status, created_at, updated_at";

fn identity_from_row((id, first_name, last_name, email): IdentityRow) -> Identity {
    Identity {
        id,
        first_name,
        last_name,
        email,
    }
}

fn relationship_from_row(
    (id, requester_id, receiver_id, status, created_at, updated_at): RelationshipRow,
) -> Result<Relationship, GraphError> {
    Ok(Relationship {
        id,
        requester_id,
        receiver_id,
        status: RelationshipStatus::parse(&status).ok_or(GraphError::UnknownStatus(status))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// SQLite `LIMIT` value; anything past `i64::MAX` means no limit.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Identity and relationship storage backed by SQLite.
#[derive(Clone)]
pub struct RelationshipStore {
    pool: SqlitePool,
}

impl RelationshipStore {
    /// Create a new RelationshipStore with an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the graph schema (called during DB setup).
    #[instrument(skip_all)]
    pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY CHECK (id <> '' AND instr(id, '|') = 0),
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        // One row per unordered pair, whatever its status: cancel and remove
        // delete the row, and a re-sent request reuses a declined one.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pair_key TEXT NOT NULL UNIQUE,
                requester_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                receiver_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (requester_id <> receiver_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_requester ON relationships(requester_id)",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_receiver ON relationships(receiver_id)",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_status ON relationships(status)")
            .execute(pool)
            .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    /// Insert or refresh an identity record.
    ///
    /// Ids must be non-empty and free of the pair key separator, otherwise
    /// two different pairs could share one key.
    #[instrument(skip(self), fields(id = %identity.id))]
    pub async fn upsert_identity(&self, identity: &Identity) -> Result<()> {
        if identity.id.is_empty() || identity.id.contains(PAIR_KEY_SEPARATOR) {
            return Err(GraphError::InvalidIdentity(format!(
                "id `{}` is empty or contains `{}`",
                identity.id, PAIR_KEY_SEPARATOR
            ))
            .into());
        }

        sqlx::query(
            "INSERT INTO identities (id, first_name, last_name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email",
        )
        .bind(&identity.id)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.email)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_identity(&self, id: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, first_name, last_name, email FROM identities WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(identity_from_row))
    }

    pub async fn identity_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM identities WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Fetch several identities at once. Unknown ids are skipped; the result
    /// is in alphabetical order.
    pub async fn get_identities(&self, ids: &[String]) -> Result<Vec<Identity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, first_name, last_name, email FROM identities WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE, id");

        let rows = query
            .build_query_as::<IdentityRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(identity_from_row).collect())
    }

    /// Case-insensitive substring search over names and email.
    #[instrument(skip(self))]
    pub async fn search_identities(&self, term: &str, limit: usize) -> Result<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, first_name, last_name, email FROM identities
             WHERE first_name LIKE ?1 ESCAPE '\\'
                OR last_name LIKE ?1 ESCAPE '\\'
                OR email LIKE ?1 ESCAPE '\\'
             ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE, id
             LIMIT ?2",
        )
        .bind(like_pattern(term))
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(identity_from_row).collect())
    }

    /// The first `limit` identities in alphabetical order.
    pub async fn identities_by_name(&self, limit: usize) -> Result<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, first_name, last_name, email FROM identities
             ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE, id
             LIMIT ?1",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(identity_from_row).collect())
    }

    pub async fn identity_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Relationship reads
    // ------------------------------------------------------------------

    pub async fn get_relationship(&self, id: i64) -> Result<Option<Relationship>> {
        let row = sqlx::query_as::<_, RelationshipRow>(&format!(
            "SELECT {} FROM relationships WHERE id = ?1",
            RELATIONSHIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(relationship_from_row).transpose()?)
    }

    /// The relationship for an unordered pair, if any.
    pub async fn relationship_for_pair(&self, a: &str, b: &str) -> Result<Option<Relationship>> {
        let row = sqlx::query_as::<_, RelationshipRow>(&format!(
            "SELECT {} FROM relationships WHERE pair_key = ?1",
            RELATIONSHIP_COLUMNS
        ))
        .bind(pair_key(a, b))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(relationship_from_row).transpose()?)
    }

    /// Every relationship touching `identity_id`, in any status.
    pub async fn relationships_touching(&self, identity_id: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query_as::<_, RelationshipRow>(&format!(
            "SELECT {} FROM relationships WHERE requester_id = ?1 OR receiver_id = ?1",
            RELATIONSHIP_COLUMNS
        ))
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| relationship_from_row(row).map_err(Into::into))
            .collect()
    }

    /// Accepted relationships touching any of `identity_ids`. Each row is
    /// returned once even when both of its parties are in the set.
    pub async fn accepted_touching_any(&self, identity_ids: &[String]) -> Result<Vec<Relationship>> {
        if identity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM relationships WHERE status = ",
            RELATIONSHIP_COLUMNS
        ));
        query.push_bind(RelationshipStatus::Accepted.as_str());
        query.push(" AND (requester_id IN (");
        let mut separated = query.separated(", ");
        for id in identity_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") OR receiver_id IN (");
        let mut separated = query.separated(", ");
        for id in identity_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated("))");

        let rows = query
            .build_query_as::<RelationshipRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| relationship_from_row(row).map_err(Into::into))
            .collect()
    }

    /// Identities of every accepted partner, ordered by first then last name.
    pub async fn friends_of(&self, identity_id: &str) -> Result<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(
            "SELECT i.id, i.first_name, i.last_name, i.email
             FROM relationships r
             JOIN identities i ON i.id = CASE WHEN r.requester_id = ?1
                                              THEN r.receiver_id
                                              ELSE r.requester_id END
             WHERE r.status = ?2 AND (r.requester_id = ?1 OR r.receiver_id = ?1)
             ORDER BY i.first_name COLLATE NOCASE, i.last_name COLLATE NOCASE, i.id",
        )
        .bind(identity_id)
        .bind(RelationshipStatus::Accepted.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(identity_from_row).collect())
    }

    /// Pending requests touching `identity_id`, newest first.
    pub async fn pending_for(&self, identity_id: &str) -> Result<Vec<PendingRequest>> {
        let rows = sqlx::query_as::<_, PendingRow>(
            "SELECT r.id, r.requester_id, r.receiver_id, r.status, r.created_at, r.updated_at,
                    i.id, i.first_name, i.last_name, i.email
             FROM relationships r
             JOIN identities i ON i.id = CASE WHEN r.requester_id = ?1
                                              THEN r.receiver_id
                                              ELSE r.requester_id END
             WHERE r.status = ?2 AND (r.requester_id = ?1 OR r.receiver_id = ?1)
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(identity_id)
        .bind(RelationshipStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, requester_id, receiver_id, status, created_at, updated_at, oid, first, last, email)|
                 -> Result<PendingRequest> {
                    let relationship = relationship_from_row((
                        id,
                        requester_id,
                        receiver_id,
                        status,
                        created_at,
                        updated_at,
                    ))?;
                    let is_incoming = relationship.receiver_id == identity_id;
                    Ok(PendingRequest {
                        relationship,
                        other: identity_from_row((oid, first, last, email)),
                        is_incoming,
                    })
                },
            )
            .collect()
    }

    pub async fn relationship_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Relationship count by status.
    pub async fn relationship_count_by_status(&self) -> Result<Vec<(RelationshipStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM relationships GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(status, count)| {
                RelationshipStatus::parse(&status)
                    .map(|s| (s, count))
                    .ok_or_else(|| anyhow::Error::from(GraphError::UnknownStatus(status)))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Relationship writes
    // ------------------------------------------------------------------

    /// Insert a pending request. Returns `None` when a constraint rejects the
    /// row (a concurrent request for the same pair, an unknown identity).
    #[instrument(skip(self, now))]
    pub(crate) async fn insert_pending(
        &self,
        requester_id: &str,
        receiver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let now = format_timestamp(now);
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO relationships (pair_key, requester_id, receiver_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING id",
        )
        .bind(pair_key(requester_id, receiver_id))
        .bind(requester_id)
        .bind(receiver_id)
        .bind(RelationshipStatus::Pending.as_str())
        .bind(&now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(id) => Ok(Some(id)),
            Err(err) if is_constraint_violation(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Turn a declined row back into a fresh pending request. Only succeeds
    /// while the row is still declined.
    #[instrument(skip(self, now))]
    pub(crate) async fn reopen_declined(
        &self,
        id: i64,
        requester_id: &str,
        receiver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE relationships
             SET requester_id = ?1, receiver_id = ?2, status = ?3, created_at = ?4, updated_at = ?4
             WHERE id = ?5 AND status = ?6",
        )
        .bind(requester_id)
        .bind(receiver_id)
        .bind(RelationshipStatus::Pending.as_str())
        .bind(format_timestamp(now))
        .bind(id)
        .bind(RelationshipStatus::Declined.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move a pending request addressed to `receiver_id` into `to`.
    #[instrument(skip(self, now))]
    pub(crate) async fn resolve_pending(
        &self,
        id: i64,
        receiver_id: &str,
        to: RelationshipStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE relationships SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4 AND receiver_id = ?5",
        )
        .bind(to.as_str())
        .bind(format_timestamp(now))
        .bind(id)
        .bind(RelationshipStatus::Pending.as_str())
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a pending request, provided `requester_id` sent it.
    #[instrument(skip(self))]
    pub(crate) async fn delete_pending_request(&self, id: i64, requester_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM relationships WHERE id = ?1 AND status = ?2 AND requester_id = ?3",
        )
        .bind(id)
        .bind(RelationshipStatus::Pending.as_str())
        .bind(requester_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the accepted relationship for a pair.
    #[instrument(skip(self))]
    pub(crate) async fn delete_accepted_pair(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM relationships WHERE pair_key = ?1 AND status = ?2")
            .bind(key)
            .bind(RelationshipStatus::Accepted.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Write a relationship row directly, bypassing the lifecycle rules.
    /// Used to seed blocked pairs, which the engine never creates itself.
    #[cfg(test)]
    pub(crate) async fn insert_with_status(
        &self,
        requester_id: &str,
        receiver_id: &str,
        status: RelationshipStatus,
    ) -> Result<i64> {
        let now = format_timestamp(Utc::now());
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO relationships (pair_key, requester_id, receiver_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING id",
        )
        .bind(pair_key(requester_id, receiver_id))
        .bind(requester_id)
        .bind(receiver_id)
        .bind(status.as_str())
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
