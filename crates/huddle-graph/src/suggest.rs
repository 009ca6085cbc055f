//! Suggestion Ranker ("people you may know").
//!
//! Ranks identities by how many of the user's accepted friends are friends
//! with them, then pads with alphabetical candidates when the graph yields too
//! few. The scan is O(F·D) in the friend count and average degree; fine at
//! interactive scale without a materialized adjacency index.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::schema::{Identity, Relationship, RelationshipStatus, Suggestion};
use crate::storage::RelationshipStore;

/// Configuration for suggestion ranking.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    /// Maximum number of suggestions returned (default: 12)
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 12,
        }
    }
}

/// Identities a user already knows, and mutual counts for everyone else.
#[derive(Debug, Default, Clone)]
pub struct MutualGraph {
    /// The user plus every identity sharing a relationship row with them
    pub excluded: HashSet<String>,
    /// The user's accepted partners
    pub friends: Vec<String>,
    /// Candidate id -> number of the user's friends connected to it
    pub counts: HashMap<String, u32>,
}

impl MutualGraph {
    /// Build exclusions and the friend list from every row touching the user.
    pub fn from_user_relationships(user_id: &str, touching: &[Relationship]) -> Self {
        let mut excluded = HashSet::new();
        excluded.insert(user_id.to_string());

        let mut friends = Vec::new();
        for rel in touching.iter().filter(|r| r.involves(user_id)) {
            let other = rel.other_party(user_id);
            excluded.insert(other.to_string());
            if rel.status == RelationshipStatus::Accepted {
                friends.push(other.to_string());
            }
        }

        Self {
            excluded,
            friends,
            counts: HashMap::new(),
        }
    }

    /// Accumulate mutual counts from accepted rows touching the user's friends.
    ///
    /// A row between two friends is credited from both ends; counts are
    /// summed per candidate, so a candidate linked to three friends scores 3.
    pub fn count_mutuals(&mut self, friend_edges: &[Relationship]) {
        let friends: HashSet<&str> = self.friends.iter().map(String::as_str).collect();

        for edge in friend_edges
            .iter()
            .filter(|e| e.status == RelationshipStatus::Accepted)
        {
            for (friend, other) in [
                (edge.requester_id.as_str(), edge.receiver_id.as_str()),
                (edge.receiver_id.as_str(), edge.requester_id.as_str()),
            ] {
                if friends.contains(friend) && !self.excluded.contains(other) {
                    *self.counts.entry(other.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
}

/// Pick the final suggestion list from counted candidates and an
/// alphabetical padding pool.
///
/// `counted` need not be sorted. Padding entries that are excluded or already
/// selected are skipped. The result is ordered by mutual count descending,
/// then first and last name.
pub fn select_suggestions(
    mut counted: Vec<Suggestion>,
    padding: &[Identity],
    excluded: &HashSet<String>,
    max: usize,
) -> Vec<Suggestion> {
    counted.sort_by(|a, b| a.cmp_rank(b));
    counted.truncate(max);

    if counted.len() < max {
        let mut selected: HashSet<String> =
            counted.iter().map(|s| s.identity.id.clone()).collect();
        for identity in padding {
            if counted.len() >= max {
                break;
            }
            if excluded.contains(&identity.id) || selected.contains(&identity.id) {
                continue;
            }
            selected.insert(identity.id.clone());
            counted.push(Suggestion {
                identity: identity.clone(),
                mutual_count: 0,
            });
        }
    }

    counted.sort_by(|a, b| a.cmp_rank(b));
    counted
}

/// Suggestion Ranker computes "people you may know".
#[derive(Debug, Clone)]
pub struct SuggestionRanker {
    config: SuggestionConfig,
}

impl SuggestionRanker {
    /// Create a new SuggestionRanker with default configuration.
    pub fn new() -> Self {
        Self {
            config: SuggestionConfig::default(),
        }
    }

    /// Create a new SuggestionRanker with custom configuration.
    pub fn with_config(config: SuggestionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    /// Suggest up to the configured maximum.
    pub async fn suggest(&self, store: &RelationshipStore, user_id: &str) -> Result<Vec<Suggestion>> {
        self.suggest_up_to(store, user_id, self.config.max_suggestions)
            .await
    }

    /// Suggest up to `max` candidates for `user_id`.
    #[instrument(skip(self, store))]
    pub async fn suggest_up_to(
        &self,
        store: &RelationshipStore,
        user_id: &str,
        max: usize,
    ) -> Result<Vec<Suggestion>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let touching = store.relationships_touching(user_id).await?;
        let mut graph = MutualGraph::from_user_relationships(user_id, &touching);

        if !graph.friends.is_empty() {
            let friend_edges = store.accepted_touching_any(&graph.friends).await?;
            graph.count_mutuals(&friend_edges);
        }

        let candidate_ids: Vec<String> = graph.counts.keys().cloned().collect();
        let counted: Vec<Suggestion> = store
            .get_identities(&candidate_ids)
            .await?
            .into_iter()
            .map(|identity| {
                let mutual_count = graph.counts.get(&identity.id).copied().unwrap_or(0);
                Suggestion {
                    identity,
                    mutual_count,
                }
            })
            .collect();

        // At most `excluded + ranked` rows of the alphabetical pool can be
        // skipped, so `excluded + max` rows are always enough to fill the gap.
        let ranked = counted.len().min(max);
        let padding = if ranked < max {
            store
                .identities_by_name(graph.excluded.len().saturating_add(max))
                .await?
        } else {
            Vec::new()
        };

        let suggestions = select_suggestions(counted, &padding, &graph.excluded, max);

        debug!(
            "Suggested {} identities ({} with mutual friends, {} friends scanned)",
            suggestions.len(),
            suggestions.iter().filter(|s| s.mutual_count > 0).count(),
            graph.friends.len()
        );

        Ok(suggestions)
    }
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::friendship::FriendshipEngine;
    use crate::storage::tests::{seed, setup_test_db};
    use chrono::Utc;

    fn person(id: &str, first: &str, last: &str) -> Identity {
        Identity::new(id, first, last, format!("{}@example.com", id))
    }

    fn accepted(id: i64, a: &str, b: &str) -> Relationship {
        let now = Utc::now();
        Relationship {
            id,
            requester_id: a.to_string(),
            receiver_id: b.to_string(),
            status: RelationshipStatus::Accepted,
            created_at: now,
            updated_at: now,
        }
    }

    async fn befriend(engine: &FriendshipEngine, a: &str, b: &str) {
        assert!(engine.send(a, b).await.unwrap());
        let id = engine
            .relationship_between(a, b)
            .await
            .unwrap()
            .unwrap()
            .id;
        assert!(engine.accept(id, b).await.unwrap());
    }

    #[test]
    fn test_mutual_counts_are_summed_per_friend() {
        let touching = vec![accepted(1, "a", "x"), accepted(2, "y", "a")];
        let mut graph = MutualGraph::from_user_relationships("a", &touching);
        assert_eq!(graph.friends.len(), 2);

        graph.count_mutuals(&[
            accepted(1, "a", "x"),
            accepted(2, "y", "a"),
            accepted(3, "x", "z"),
            accepted(4, "z", "y"),
            accepted(5, "x", "w"),
            accepted(6, "x", "y"),
        ]);

        assert_eq!(graph.counts.get("z"), Some(&2));
        assert_eq!(graph.counts.get("w"), Some(&1));
        // Friends and the user are never candidates
        assert!(!graph.counts.contains_key("a"));
        assert!(!graph.counts.contains_key("x"));
        assert!(!graph.counts.contains_key("y"));
    }

    #[test]
    fn test_non_accepted_rows_exclude_but_do_not_count() {
        let mut pending = accepted(1, "a", "p");
        pending.status = RelationshipStatus::Pending;
        let mut declined = accepted(2, "d", "a");
        declined.status = RelationshipStatus::Declined;

        let graph = MutualGraph::from_user_relationships("a", &[pending, declined]);
        assert!(graph.friends.is_empty());
        assert!(graph.excluded.contains("p"));
        assert!(graph.excluded.contains("d"));
        assert!(graph.excluded.contains("a"));
    }

    #[test]
    fn test_padding_never_outranks_mutual_candidates() {
        let counted = vec![
            Suggestion {
                identity: person("z", "Zed", "Zimmer"),
                mutual_count: 1,
            },
            Suggestion {
                identity: person("y", "Yara", "Young"),
                mutual_count: 3,
            },
        ];
        let padding = vec![
            person("a", "Aaron", "Abbot"),
            person("me", "Anna", "Self"),
            person("z", "Zed", "Zimmer"),
            person("b", "Bella", "Brown"),
        ];
        let excluded: HashSet<String> = ["me".to_string()].into_iter().collect();

        let result = select_suggestions(counted, &padding, &excluded, 4);
        let summary: Vec<_> = result
            .iter()
            .map(|s| (s.identity.id.as_str(), s.mutual_count))
            .collect();
        assert_eq!(summary, vec![("y", 3), ("z", 1), ("a", 0), ("b", 0)]);
    }

    #[test]
    fn test_ranked_set_is_capped_before_padding() {
        let counted = (0..5)
            .map(|i| Suggestion {
                identity: person(&format!("c{}", i), &format!("C{}", i), "X"),
                mutual_count: i,
            })
            .collect();
        let result = select_suggestions(counted, &[person("p", "Pad", "P")], &HashSet::new(), 2);
        let counts: Vec<_> = result.iter().map(|s| s.mutual_count).collect();
        assert_eq!(counts, vec![4, 3]);
    }

    #[test]
    fn test_ties_break_alphabetically() {
        let counted = vec![
            Suggestion {
                identity: person("2", "Bea", "Adams"),
                mutual_count: 2,
            },
            Suggestion {
                identity: person("1", "Ann", "Zorn"),
                mutual_count: 2,
            },
            Suggestion {
                identity: person("3", "Ann", "Able"),
                mutual_count: 2,
            },
        ];
        let result = select_suggestions(counted, &[], &HashSet::new(), 12);
        let ids: Vec<_> = result.iter().map(|s| s.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_suggest_ranks_mutual_friend_first() {
        let store = RelationshipStore::new(setup_test_db().await);
        seed(
            &store,
            &[
                ("a", "Amy", "Adams"),
                ("x", "Xavier", "Xu"),
                ("y", "Yuki", "Yamada"),
                ("z", "Zoe", "Zane"),
                ("w", "Walt", "Wu"),
                ("b", "Ben", "Brown"),
                ("p", "Pat", "Price"),
            ],
        )
        .await;
        let engine = FriendshipEngine::new(store.clone());

        befriend(&engine, "a", "x").await;
        befriend(&engine, "y", "a").await;
        befriend(&engine, "x", "z").await;
        befriend(&engine, "z", "y").await;
        befriend(&engine, "x", "w").await;
        // A pending request keeps p out of the suggestions
        assert!(engine.send("p", "a").await.unwrap());

        let ranker = SuggestionRanker::new();
        let suggestions = ranker.suggest(&store, "a").await.unwrap();
        let summary: Vec<_> = suggestions
            .iter()
            .map(|s| (s.identity.id.as_str(), s.mutual_count))
            .collect();
        assert_eq!(summary, vec![("z", 2), ("w", 1), ("b", 0)]);
    }

    #[tokio::test]
    async fn test_suggest_without_friends_falls_back_to_alphabetical() {
        let store = RelationshipStore::new(setup_test_db().await);
        seed(
            &store,
            &[
                ("me", "Mia", "Moss"),
                ("c", "Cleo", "Cole"),
                ("a", "Abe", "Ames"),
                ("b", "Bo", "Bell"),
            ],
        )
        .await;

        let ranker = SuggestionRanker::with_config(SuggestionConfig { max_suggestions: 2 });
        let suggestions = ranker.suggest(&store, "me").await.unwrap();
        let ids: Vec<_> = suggestions.iter().map(|s| s.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(suggestions.iter().all(|s| s.mutual_count == 0));

        assert!(ranker.suggest_up_to(&store, "me", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suggest_padding_skips_everyone_the_user_knows() {
        let store = RelationshipStore::new(setup_test_db().await);
        // Known identities sort before the stranger, so the padding query
        // must look past all of them.
        seed(
            &store,
            &[
                ("me", "Aaron", "Aa"),
                ("f", "Abby", "Ab"),
                ("d", "Acer", "Ac"),
                ("s", "Zara", "Zz"),
            ],
        )
        .await;
        let engine = FriendshipEngine::new(store.clone());
        befriend(&engine, "me", "f").await;
        assert!(engine.send("me", "d").await.unwrap());
        let id = engine.relationship_between("me", "d").await.unwrap().unwrap().id;
        assert!(engine.decline(id, "d").await.unwrap());

        let suggestions = SuggestionRanker::new().suggest(&store, "me").await.unwrap();
        let ids: Vec<_> = suggestions.iter().map(|s| s.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["s"]);
    }

    #[tokio::test]
    async fn test_suggest_with_unbounded_max_returns_everyone_eligible() {
        let store = RelationshipStore::new(setup_test_db().await);
        seed(
            &store,
            &[
                ("me", "Mia", "Moss"),
                ("f", "Fay", "Fox"),
                ("x", "Xia", "Xu"),
                ("o", "Ola", "Orr"),
            ],
        )
        .await;
        let engine = FriendshipEngine::new(store.clone());
        befriend(&engine, "me", "f").await;
        befriend(&engine, "f", "x").await;

        let suggestions = SuggestionRanker::new()
            .suggest_up_to(&store, "me", usize::MAX)
            .await
            .unwrap();
        let ranked: Vec<_> = suggestions
            .iter()
            .map(|s| (s.identity.id.as_str(), s.mutual_count))
            .collect();
        assert_eq!(ranked, vec![("x", 1), ("o", 0)]);
    }
}
