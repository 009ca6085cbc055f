//! Huddle Meetings
//!
//! Meetings and their participant sets. The organizer owns the participant
//! list: only the creator may reconcile it, and the creator always stays an
//! accepted participant.
//!
//! ## Architecture
//!
//! - `schema`: meeting, participant and draft types
//! - `reconcile`: pure diffing of current vs desired participants
//! - `storage`: SQLite persistence, one transaction per multi-row change

pub mod reconcile;
pub mod schema;
pub mod storage;

pub use reconcile::{plan_reconciliation, reconcile, ParticipantDiff};
pub use schema::{Meeting, MeetingDraft, MeetingError, Participant, ParticipantStatus};
pub use storage::MeetingStore;
