//! Identity directory service.
//!
//! Validates identity records before they reach the store and provides the
//! contact search used by callers building invitation lists.

use anyhow::Result;
use tracing::info;

use crate::error::GraphError;
use crate::schema::{Identity, PAIR_KEY_SEPARATOR};
use crate::storage::RelationshipStore;

/// Default cap on contact search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 25;

/// Service for registering and looking up identities.
pub struct IdentityService;

impl IdentityService {
    /// Normalize and validate an identity.
    ///
    /// Names and email are trimmed, email is lowercased. Ids must be
    /// non-empty and free of the pair key separator.
    pub fn normalize(identity: &Identity) -> Result<Identity, GraphError> {
        let id = identity.id.trim();
        if id.is_empty() {
            return Err(GraphError::InvalidIdentity("id is empty".into()));
        }
        if id.contains(PAIR_KEY_SEPARATOR) {
            return Err(GraphError::InvalidIdentity(format!(
                "id `{}` contains `{}`",
                id, PAIR_KEY_SEPARATOR
            )));
        }

        let first_name = identity.first_name.trim();
        if first_name.is_empty() {
            return Err(GraphError::InvalidIdentity(format!(
                "identity `{}` has no first name",
                id
            )));
        }

        let email = identity.email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => {
                return Err(GraphError::InvalidIdentity(format!(
                    "identity `{}` has an invalid email `{}`",
                    id, identity.email
                )))
            }
        }

        Ok(Identity {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: identity.last_name.trim().to_string(),
            email,
        })
    }

    /// Validate and store an identity. Returns the stored form.
    pub async fn register(store: &RelationshipStore, identity: &Identity) -> Result<Identity> {
        let identity = Self::normalize(identity)?;
        store.upsert_identity(&identity).await?;
        info!("Registered identity {} ({})", identity.id, identity.display_name());
        Ok(identity)
    }

    /// Contact search. A blank term yields nothing rather than everyone.
    pub async fn search(
        store: &RelationshipStore,
        term: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Identity>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        store
            .search_identities(term, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .await
    }
}
