//! Huddle Core
//!
//! Wires the graph and meeting stores to one SQLite database.
//!
//! - `paths`: where the data directory, database and config file live
//! - `config`: optional `huddle.toml` settings
//! - [`Core`]: the stores and engines, initialised from paths and config

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

pub mod config;
pub mod paths;

pub use config::HuddleConfig;
pub use paths::HuddlePaths;

pub use huddle_graph::{
    FriendshipEngine, Identity, IdentityService, PendingRequest, Relationship, RelationshipStatus,
    RelationshipStore, Suggestion, SuggestionRanker,
};
pub use huddle_meetings::{Meeting, MeetingDraft, MeetingStore, Participant, ParticipantStatus};

/// Open (creating if needed) the SQLite database at `db_path`.
pub async fn connect(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::from_str("sqlite:")?
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Every store and engine, wired to one database.
#[derive(Clone)]
pub struct Core {
    pub identities: RelationshipStore,
    pub friendships: FriendshipEngine,
    pub suggestions: SuggestionRanker,
    pub meetings: MeetingStore,
}

impl Core {
    pub async fn init(paths: &HuddlePaths, config: &HuddleConfig) -> Result<Self> {
        info!("Initializing Huddle Core...");
        paths.ensure_dirs()?;
        let db_path = config.database_path(&paths.base_dir, &paths.db_path);
        let pool = connect(&db_path, config.database.max_connections).await?;
        let core = Self::from_pool(pool, config).await?;
        info!("Database ready at {}", db_path.display());
        Ok(core)
    }

    /// Build a core over an existing pool, creating the schema if missing.
    pub async fn from_pool(pool: SqlitePool, config: &HuddleConfig) -> Result<Self> {
        // Meeting tables reference identities, so the graph schema goes first.
        RelationshipStore::init_schema(&pool).await?;
        MeetingStore::init_schema(&pool).await?;

        let identities = RelationshipStore::new(pool.clone());
        Ok(Self {
            friendships: FriendshipEngine::new(identities.clone()),
            suggestions: SuggestionRanker::with_config(config.suggestion_config()),
            meetings: MeetingStore::new(pool),
            identities,
        })
    }

    pub async fn register_identity(&self, identity: &Identity) -> Result<Identity> {
        IdentityService::register(&self.identities, identity).await
    }

    pub async fn suggest(&self, user_id: &str) -> Result<Vec<Suggestion>> {
        self.suggestions.suggest(&self.identities, user_id).await
    }
}
