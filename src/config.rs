//! Configuration loaded from environment variables.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `BRIDGE_TOKEN_SECRET` | Token signing key | unset (no codec) |
//! | `ROOM_INDEX_STRATEGY` | `generic` or `joined` | `joined` with `sqlite`, else `generic` |
//! | `DATABASE_PATH` | SQLite file | in-memory |

use std::env;
#[cfg(feature = "sqlite")]
use std::sync::Arc;

use crate::error::Result;
use crate::rooms::IndexStrategy;
use crate::token::{SigningKey, TokenCodec};
#[cfg(feature = "sqlite")]
use crate::{
    rooms::{build_index, CryptoStateStore, IndexBackends},
    storage::Database,
};

pub const TOKEN_SECRET_ENV: &str = "BRIDGE_TOKEN_SECRET";
pub const INDEX_STRATEGY_ENV: &str = "ROOM_INDEX_STRATEGY";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Settings the embedding bridge supplies at startup.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Room index strategy, resolved once at startup.
    pub index_strategy: IndexStrategy,
    /// SQLite database file. None = in-memory.
    pub database_path: Option<String>,
    /// Key for signing state tokens, if tokens are used.
    pub token_key: Option<SigningKey>,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value. Empty values count as unset, except the token secret,
    /// which must not be empty when present.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let index_strategy = match lookup(INDEX_STRATEGY_ENV).filter(|s| !s.trim().is_empty()) {
            Some(value) => value.parse()?,
            None => IndexStrategy::default(),
        };

        let token_key = SigningKey::from_optional(lookup(TOKEN_SECRET_ENV))?;

        let config = Self {
            index_strategy,
            database_path: lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()),
            token_key,
        };

        tracing::info!(
            strategy = %config.index_strategy,
            database = config.database_path.as_deref().unwrap_or(":memory:"),
            tokens = config.token_key.is_some(),
            "[Config] Loaded bridge configuration"
        );
        Ok(config)
    }

    /// A token codec for the configured key.
    pub fn token_codec(&self) -> Option<TokenCodec> {
        self.token_key.clone().map(TokenCodec::new)
    }

    /// Open the configured SQLite database.
    #[cfg(feature = "sqlite")]
    pub async fn open_database(&self) -> Result<Arc<Database>> {
        Ok(Arc::new(Database::open(self.database_path.as_deref()).await?))
    }

    /// Open the database and build the configured room index on top of it.
    #[cfg(feature = "sqlite")]
    pub async fn open_index(&self) -> Result<Arc<dyn CryptoStateStore>> {
        let db = self.open_database().await?;
        build_index(self.index_strategy, IndexBackends::from_store(db))
    }
}
