//! Graph schema definitions for Huddle.
//!
//! This module defines the core types for the friendship graph:
//! - `Identity`: a person known to the identity directory
//! - `RelationshipStatus`: lifecycle state of a link between two identities
//! - `Relationship`: a stored link, keyed by its canonical pair key
//! - `PendingRequest` / `Suggestion`: read models returned to callers

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Separator between the two ids of a pair key. Identity ids may not contain it.
pub const PAIR_KEY_SEPARATOR: char = '|';

/// Canonical, order-independent key for an unordered pair of identities.
pub fn pair_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", low, PAIR_KEY_SEPARATOR, high)
}

/// Format a timestamp for storage.
///
/// Fixed-width microsecond precision keeps the stored text sortable.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, GraphError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| GraphError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

/// A person as seen by the graph. Owned by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// Alphabetical order: first name, then last name (ASCII case-insensitive),
    /// then id so the order is total.
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        self.first_name
            .to_ascii_lowercase()
            .cmp(&other.first_name.to_ascii_lowercase())
            .then_with(|| {
                self.last_name
                    .to_ascii_lowercase()
                    .cmp(&other.last_name.to_ascii_lowercase())
            })
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Lifecycle state of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    /// Sent by the requester, awaiting the receiver
    Pending,
    /// Both parties are friends
    Accepted,
    /// Receiver turned the request down
    Declined,
    /// One party blocked the other
    Blocked,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Pending => "pending",
            RelationshipStatus::Accepted => "accepted",
            RelationshipStatus::Declined => "declined",
            RelationshipStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RelationshipStatus::Pending),
            "accepted" => Some(RelationshipStatus::Accepted),
            "declined" => Some(RelationshipStatus::Declined),
            "blocked" => Some(RelationshipStatus::Blocked),
            _ => None,
        }
    }

    /// Terminal statuses free the pair key for a new request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelationshipStatus::Declined)
    }
}

/// A stored relationship between two identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub requester_id: String,
    pub receiver_id: String,
    pub status: RelationshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn pair_key(&self) -> String {
        pair_key(&self.requester_id, &self.receiver_id)
    }

    pub fn involves(&self, identity_id: &str) -> bool {
        self.requester_id == identity_id || self.receiver_id == identity_id
    }

    /// The party that is not `identity_id`. Only meaningful when
    /// [`Relationship::involves`] holds.
    pub fn other_party(&self, identity_id: &str) -> &str {
        if self.requester_id == identity_id {
            &self.receiver_id
        } else {
            &self.requester_id
        }
    }
}

/// A pending request as seen by one of its parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub relationship: Relationship,
    /// The party on the other side of the request
    pub other: Identity,
    /// True when the viewing identity is the receiver
    pub is_incoming: bool,
}

/// A "people you may know" candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub identity: Identity,
    pub mutual_count: u32,
}

impl Suggestion {
    /// Ranking order: mutual count descending, then alphabetical.
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .mutual_count
            .cmp(&self.mutual_count)
            .then_with(|| self.identity.cmp_by_name(&other.identity))
    }
}
