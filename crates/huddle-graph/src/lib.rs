//! Huddle Graph - friendship graph for meeting coordination.
//!
//! This crate provides the relationship core behind Huddle's contacts:
//!
//! - **Schema**: identities, relationship statuses and read models
//! - **Storage**: SQLite-backed persistence with a unique pair key per
//!   unordered pair of identities
//! - **Friendship Engine**: send/accept/decline/cancel/remove with actor and
//!   status guards
//! - **Suggestion Ranker**: mutual-friend ranking with alphabetical fallback
//!
//! # Example
//!
//! ```ignore
//! use huddle_graph::{FriendshipEngine, RelationshipStore, SuggestionRanker};
//!
//! let store = RelationshipStore::new(pool);
//! let engine = FriendshipEngine::new(store.clone());
//!
//! if engine.send("alice", "bob").await? {
//!     let request = engine.relationship_between("alice", "bob").await?.unwrap();
//!     engine.accept(request.id, "bob").await?;
//! }
//!
//! let suggestions = SuggestionRanker::new().suggest(&store, "alice").await?;
//! ```

pub mod error;
pub mod friendship;
pub mod identity;
pub mod schema;
pub mod storage;
pub mod suggest;

// Re-export commonly used types
pub use error::{is_constraint_violation, is_constraint_violation_any, GraphError};
pub use friendship::FriendshipEngine;
pub use identity::IdentityService;
pub use schema::{
    format_timestamp, pair_key, parse_timestamp, Identity, PendingRequest, Relationship,
    RelationshipStatus, Suggestion,
};
pub use storage::RelationshipStore;
pub use suggest::{SuggestionConfig, SuggestionRanker};
