//! Friendship Engine.
//!
//! Enforces the relationship lifecycle on top of [`RelationshipStore`]:
//!
//! ```text
//!   send ──> Pending ──accept──> Accepted ──remove──> (deleted)
//!              │  └──decline──> Declined ──send──> Pending (row reused)
//!              └──cancel──> (deleted)
//! ```
//!
//! Business-rule rejections (wrong actor, wrong status, unknown row, a lost
//! race on the pair key) are answered with `Ok(false)`. Only infrastructure
//! failures surface as errors.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::schema::{
    pair_key, Identity, PendingRequest, Relationship, RelationshipStatus, PAIR_KEY_SEPARATOR,
};
use crate::storage::RelationshipStore;

/// Two different ids that can form an unambiguous pair key.
fn is_keyable_pair(a: &str, b: &str) -> bool {
    a != b && !a.contains(PAIR_KEY_SEPARATOR) && !b.contains(PAIR_KEY_SEPARATOR)
}

/// Request/accept/decline/cancel/remove over the relationship store.
#[derive(Clone)]
pub struct FriendshipEngine {
    store: RelationshipStore,
}

impl FriendshipEngine {
    pub fn new(store: RelationshipStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RelationshipStore {
        &self.store
    }

    /// Send a friend request from `requester_id` to `receiver_id`.
    ///
    /// Creates a pending row when the pair has none. A declined row is reused
    /// and reset to pending; any other existing row rejects the request.
    #[instrument(skip(self))]
    pub async fn send(&self, requester_id: &str, receiver_id: &str) -> Result<bool> {
        if !is_keyable_pair(requester_id, receiver_id) {
            debug!("friend request to self or to a malformed id rejected");
            return Ok(false);
        }
        if !self.store.identity_exists(requester_id).await?
            || !self.store.identity_exists(receiver_id).await?
        {
            debug!("friend request between unknown identities rejected");
            return Ok(false);
        }

        let now = Utc::now();
        let sent = match self
            .store
            .relationship_for_pair(requester_id, receiver_id)
            .await?
        {
            None => self
                .store
                .insert_pending(requester_id, receiver_id, now)
                .await?
                .is_some(),
            Some(existing) if existing.status.is_terminal() => {
                self.store
                    .reopen_declined(existing.id, requester_id, receiver_id, now)
                    .await?
            }
            Some(existing) => {
                debug!(
                    status = existing.status.as_str(),
                    "friend request rejected: pair already linked"
                );
                false
            }
        };

        if sent {
            info!("friend request sent");
        }
        Ok(sent)
    }

    /// Accept a pending request. Only its receiver may accept.
    #[instrument(skip(self))]
    pub async fn accept(&self, relationship_id: i64, acting_user_id: &str) -> Result<bool> {
        self.resolve(relationship_id, acting_user_id, RelationshipStatus::Accepted)
            .await
    }

    /// Decline a pending request. Only its receiver may decline.
    #[instrument(skip(self))]
    pub async fn decline(&self, relationship_id: i64, acting_user_id: &str) -> Result<bool> {
        self.resolve(relationship_id, acting_user_id, RelationshipStatus::Declined)
            .await
    }

    async fn resolve(
        &self,
        relationship_id: i64,
        acting_user_id: &str,
        to: RelationshipStatus,
    ) -> Result<bool> {
        let resolved = self
            .store
            .resolve_pending(relationship_id, acting_user_id, to, Utc::now())
            .await?;
        if resolved {
            info!(status = to.as_str(), "friend request resolved");
        } else {
            debug!("no pending request addressed to the acting user");
        }
        Ok(resolved)
    }

    /// Withdraw a pending request. Only its requester may cancel; the row is
    /// deleted so the pair can start over.
    #[instrument(skip(self))]
    pub async fn cancel(&self, relationship_id: i64, acting_user_id: &str) -> Result<bool> {
        let cancelled = self
            .store
            .delete_pending_request(relationship_id, acting_user_id)
            .await?;
        if cancelled {
            info!("friend request cancelled");
        } else {
            debug!("no pending request sent by the acting user");
        }
        Ok(cancelled)
    }

    /// Unfriend. Either party may remove an accepted relationship.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: &str, friend_id: &str) -> Result<bool> {
        if !is_keyable_pair(user_id, friend_id) {
            return Ok(false);
        }
        let removed = self
            .store
            .delete_accepted_pair(&pair_key(user_id, friend_id))
            .await?;
        if removed {
            info!("friendship removed");
        }
        Ok(removed)
    }

    /// Accepted partners of `user_id`, ordered by first then last name.
    pub async fn list_friends(&self, user_id: &str) -> Result<Vec<Identity>> {
        self.store.friends_of(user_id).await
    }

    /// Pending requests in both directions, newest first.
    pub async fn list_pending_requests(&self, user_id: &str) -> Result<Vec<PendingRequest>> {
        self.store.pending_for(user_id).await
    }

    /// The current relationship between two identities, in any status.
    pub async fn relationship_between(&self, a: &str, b: &str) -> Result<Option<Relationship>> {
        if !is_keyable_pair(a, b) {
            return Ok(None);
        }
        self.store.relationship_for_pair(a, b).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{file_test_db, seed, setup_test_db};

    async fn engine() -> FriendshipEngine {
        let store = RelationshipStore::new(setup_test_db().await);
        seed(
            &store,
            &[
                ("alice", "Alice", "Archer"),
                ("bob", "Bob", "Baker"),
                ("carol", "Carol", "Cooper"),
                ("dave", "Dave", "Drake"),
            ],
        )
        .await;
        FriendshipEngine::new(store)
    }

    async fn pending_id(engine: &FriendshipEngine, a: &str, b: &str) -> i64 {
        engine
            .relationship_between(a, b)
            .await
            .unwrap()
            .expect("relationship exists")
            .id
    }

    #[tokio::test]
    async fn test_send_to_self_fails() {
        let engine = engine().await;
        assert!(!engine.send("alice", "alice").await.unwrap());
        assert_eq!(engine.store().relationship_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_identity_fails() {
        let engine = engine().await;
        assert!(!engine.send("alice", "mallory").await.unwrap());
        assert!(!engine.send("mallory", "alice").await.unwrap());
        assert_eq!(engine.store().relationship_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reverse_send_fails_while_pending_or_accepted() {
        let engine = engine().await;
        assert!(engine.send("alice", "bob").await.unwrap());
        assert!(!engine.send("bob", "alice").await.unwrap());
        assert!(!engine.send("alice", "bob").await.unwrap());

        let id = pending_id(&engine, "alice", "bob").await;
        assert!(engine.accept(id, "bob").await.unwrap());
        assert!(!engine.send("bob", "alice").await.unwrap());
        assert_eq!(engine.store().relationship_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_accept_only_once_and_only_by_receiver() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;

        assert!(!engine.accept(id, "alice").await.unwrap());
        assert!(!engine.accept(id, "carol").await.unwrap());
        assert!(engine.accept(id, "bob").await.unwrap());
        assert!(!engine.accept(id, "bob").await.unwrap());
        assert!(!engine.decline(id, "bob").await.unwrap());
        assert!(!engine.accept(id + 100, "bob").await.unwrap());

        let rel = engine.store().get_relationship(id).await.unwrap().unwrap();
        assert_eq!(rel.status, RelationshipStatus::Accepted);
        assert!(rel.updated_at >= rel.created_at);
    }

    #[tokio::test]
    async fn test_decline_only_by_receiver() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;

        assert!(!engine.decline(id, "alice").await.unwrap());
        assert!(engine.decline(id, "bob").await.unwrap());
        let rel = engine.store().get_relationship(id).await.unwrap().unwrap();
        assert_eq!(rel.status, RelationshipStatus::Declined);
    }

    #[tokio::test]
    async fn test_cancel_only_by_requester_and_frees_pair() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;

        assert!(!engine.cancel(id, "bob").await.unwrap());
        assert!(!engine.cancel(id, "carol").await.unwrap());
        assert!(engine.cancel(id, "alice").await.unwrap());
        assert!(engine.store().get_relationship(id).await.unwrap().is_none());
        assert!(!engine.cancel(id, "alice").await.unwrap());

        // The pair key is free again, in either direction
        assert!(engine.send("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_rejected_once_accepted() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;
        engine.accept(id, "bob").await.unwrap();

        assert!(!engine.cancel(id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_frees_pair() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;

        // Not accepted yet
        assert!(!engine.remove("alice", "bob").await.unwrap());

        engine.accept(id, "bob").await.unwrap();
        assert!(engine.remove("bob", "alice").await.unwrap());
        assert!(!engine.remove("bob", "alice").await.unwrap());
        assert!(engine.relationship_between("alice", "bob").await.unwrap().is_none());

        assert!(engine.send("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_after_decline_reuses_row() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;
        let first = engine.store().get_relationship(id).await.unwrap().unwrap();
        engine.decline(id, "bob").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        assert!(engine.send("alice", "bob").await.unwrap());

        let again = engine.store().get_relationship(id).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, RelationshipStatus::Pending);
        assert_eq!(again.requester_id, "alice");
        assert!(again.created_at > first.created_at);
        assert_eq!(engine.store().relationship_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_declined_party_may_send_the_other_way() {
        let engine = engine().await;
        engine.send("alice", "bob").await.unwrap();
        let id = pending_id(&engine, "alice", "bob").await;
        engine.decline(id, "bob").await.unwrap();

        assert!(engine.send("bob", "alice").await.unwrap());
        let rel = engine.store().get_relationship(id).await.unwrap().unwrap();
        assert_eq!(rel.requester_id, "bob");
        assert_eq!(rel.receiver_id, "alice");

        // Roles swapped: alice is now the receiver
        assert!(engine.accept(id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_blocked_pair_cannot_be_requested() {
        let engine = engine().await;
        engine
            .store()
            .insert_with_status("alice", "bob", RelationshipStatus::Blocked)
            .await
            .unwrap();

        assert!(!engine.send("alice", "bob").await.unwrap());
        assert!(!engine.send("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_friends_ordered_by_name() {
        let engine = engine().await;
        for other in ["dave", "bob", "carol"] {
            engine.send("alice", other).await.unwrap();
            let id = pending_id(&engine, "alice", other).await;
            engine.accept(id, other).await.unwrap();
        }
        // Pending requests are not friends
        engine.send("bob", "dave").await.unwrap();

        let friends = engine.list_friends("alice").await.unwrap();
        let ids: Vec<_> = friends.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "carol", "dave"]);

        let friends = engine.list_friends("bob").await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].id, "alice");
    }

    #[tokio::test]
    async fn test_pending_requests_newest_first_with_direction() {
        let engine = engine().await;
        engine.send("bob", "alice").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        engine.send("alice", "carol").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        engine.send("dave", "alice").await.unwrap();

        let pending = engine.list_pending_requests("alice").await.unwrap();
        let summary: Vec<_> = pending
            .iter()
            .map(|p| (p.other.id.as_str(), p.is_incoming))
            .collect();
        assert_eq!(
            summary,
            vec![("dave", true), ("carol", false), ("bob", true)]
        );

        // Accepted requests drop out of the pending list
        let id = pending_id(&engine, "dave", "alice").await;
        engine.accept(id, "alice").await.unwrap();
        assert_eq!(engine.list_pending_requests("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ids_with_separator_never_alias_another_pair() {
        let engine = engine().await;
        assert!(engine.send("alice", "bob").await.unwrap());

        // "alice|bob" + "carol" would share a key with "alice" + "bob|carol"
        assert!(!engine.send("alice|bob", "carol").await.unwrap());
        assert!(!engine.send("alice", "bob|carol").await.unwrap());
        assert!(engine
            .relationship_between("alice", "bob|carol")
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .relationship_between("alice|bob", "carol")
            .await
            .unwrap()
            .is_none());
        assert!(!engine.remove("alice|bob", "carol").await.unwrap());
        assert_eq!(engine.store().relationship_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_leave_one_row_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationshipStore::new(file_test_db(dir.path()).await);
        let rounds = 20;
        for round in 0..rounds {
            let (a, b) = (format!("a{}", round), format!("b{}", round));
            seed(&store, &[(a.as_str(), "Ann", "A"), (b.as_str(), "Ben", "B")]).await;
        }
        let engine = FriendshipEngine::new(store.clone());

        for round in 0..rounds {
            let (a, b) = (format!("a{}", round), format!("b{}", round));
            let forward = {
                let engine = engine.clone();
                let (a, b) = (a.clone(), b.clone());
                tokio::spawn(async move { engine.send(&a, &b).await })
            };
            let backward = {
                let engine = engine.clone();
                let (a, b) = (a.clone(), b.clone());
                tokio::spawn(async move { engine.send(&b, &a).await })
            };

            let forward = forward.await.unwrap().unwrap();
            let backward = backward.await.unwrap().unwrap();
            assert!(forward ^ backward, "round {}: exactly one send wins", round);

            let row = engine.relationship_between(&a, &b).await.unwrap().unwrap();
            assert_eq!(row.status, RelationshipStatus::Pending);
        }

        assert_eq!(store.relationship_count().await.unwrap(), rounds);
    }
}
