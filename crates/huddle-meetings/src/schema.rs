//! Meeting and participant types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading meeting records back from storage.
#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("unknown participant status `{0}`")]
    UnknownStatus(String),

    #[error(transparent)]
    Graph(#[from] huddle_graph::GraphError),
}

/// A participant's answer to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Accepted,
    Declined,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Accepted => "accepted",
            ParticipantStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ParticipantStatus::Pending),
            "accepted" => Some(ParticipantStatus::Accepted),
            "declined" => Some(ParticipantStatus::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub contact_id: String,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn new(contact_id: impl Into<String>, status: ParticipantStatus) -> Self {
        Self {
            contact_id: contact_id.into(),
            status,
        }
    }

    pub fn pending(contact_id: impl Into<String>) -> Self {
        Self::new(contact_id, ParticipantStatus::Pending)
    }
}

/// A stored meeting with its participant set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl Meeting {
    pub fn participant(&self, contact_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.contact_id == contact_id)
    }

    /// Participant statuses keyed by contact id.
    pub fn statuses(&self) -> BTreeMap<String, ParticipantStatus> {
        self.participants
            .iter()
            .map(|p| (p.contact_id.clone(), p.status))
            .collect()
    }
}

/// Caller-supplied fields for a new meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDraft {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl MeetingDraft {
    pub fn new(title: impl Into<String>, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            starts_at,
            ends_at,
        }
    }

    /// A draft needs a title and must not end before it starts.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.ends_at >= self.starts_at
    }
}
