//! # Encrypted Room Index
//!
//! Answers one question for key distribution: which encrypted rooms does
//! the bridge share with a given user?
//!
//! ## Strategies
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SHARED ENCRYPTED ROOMS                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Generic (ProfileRoomIndex)          Joined (JoinedRoomIndex)          │
//! │  ──────────────────────────          ────────────────────────          │
//! │                                                                         │
//! │  RoomMembershipStore                 RelationalStore                    │
//! │    list_rooms_for_user(user)           query_joined_encrypted_rooms    │
//! │         │                                   │                           │
//! │         ▼                                   │  one query:               │
//! │  RoomDirectory                              │  mx_user_profile ⋈ portal │
//! │    get_room(room) per row                   │  WHERE encrypted          │
//! │         │                                   │                           │
//! │         ▼                                   ▼                           │
//! │  keep present && encrypted           HashSet<RoomId>                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  HashSet<RoomId>                                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both implement [`CryptoStateStore`] and return the same set for the same
//! data. Which one runs is decided once, at startup, by [`build_index`].
//!
//! Store failures surface as [`Error::StoreUnavailable`] and are never
//! reported as "no rooms".

mod joined;
mod profile;
mod records;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use joined::JoinedRoomIndex;
pub use profile::ProfileRoomIndex;
pub use records::{MemberProfile, Membership, RoomId, RoomRecord, UserId};

// ============================================================================
// CONTRACTS
// ============================================================================

/// Room state needed by the crypto layer.
#[async_trait]
pub trait CryptoStateStore: Send + Sync {
    /// Encrypted rooms shared between `user_id` and the bridge.
    ///
    /// A point-in-time snapshot; concurrent writes may or may not be seen.
    async fn find_shared_rooms(&self, user_id: &UserId) -> Result<HashSet<RoomId>>;

    /// Whether `room_id` is encrypted. Unknown rooms are not.
    async fn is_encrypted(&self, room_id: &RoomId) -> Result<bool>;
}

/// Rooms the bridge knows a user to be in.
#[async_trait]
pub trait RoomMembershipStore: Send + Sync {
    /// Rooms where `user_id` is joined or invited. May contain duplicates.
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>>;
}

/// Lookup of bridged rooms.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// `None` for rooms the bridge does not (or no longer) knows about.
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomRecord>>;
}

/// A store able to join membership rows to room rows server-side.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Rooms where `user_id` is joined or invited and the room is encrypted.
    async fn query_joined_encrypted_rooms(&self, user_id: &UserId) -> Result<Vec<RoomId>>;

    /// The room's encryption flag, `None` if the room is unknown.
    async fn room_encrypted(&self, room_id: &RoomId) -> Result<Option<bool>>;
}

// ============================================================================
// STRATEGY SELECTION
// ============================================================================

/// Which [`CryptoStateStore`] implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    /// Membership listing plus one directory lookup per room
    Generic,
    /// A single joined query against a relational store
    Joined,
}

impl Default for IndexStrategy {
    fn default() -> Self {
        if cfg!(feature = "sqlite") {
            IndexStrategy::Joined
        } else {
            IndexStrategy::Generic
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStrategy::Generic => f.write_str("generic"),
            IndexStrategy::Joined => f.write_str("joined"),
        }
    }
}

impl FromStr for IndexStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(IndexStrategy::Generic),
            "joined" => Ok(IndexStrategy::Joined),
            other => Err(Error::Configuration(format!(
                "unknown room index strategy '{}' (expected 'generic' or 'joined')",
                other
            ))),
        }
    }
}

/// Stores available to the embedding application.
#[derive(Clone, Default)]
pub struct IndexBackends {
    pub membership: Option<Arc<dyn RoomMembershipStore>>,
    pub directory: Option<Arc<dyn RoomDirectory>>,
    pub relational: Option<Arc<dyn RelationalStore>>,
}

impl IndexBackends {
    /// Backends for the generic strategy only
    pub fn generic(
        membership: Arc<dyn RoomMembershipStore>,
        directory: Arc<dyn RoomDirectory>,
    ) -> Self {
        Self {
            membership: Some(membership),
            directory: Some(directory),
            relational: None,
        }
    }

    /// Use one store for every role.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RoomMembershipStore + RoomDirectory + RelationalStore + 'static,
    {
        Self {
            membership: Some(store.clone()),
            directory: Some(store.clone()),
            relational: Some(store),
        }
    }
}

/// Build the index for `strategy`, failing if its backends are missing.
pub fn build_index(
    strategy: IndexStrategy,
    backends: IndexBackends,
) -> Result<Arc<dyn CryptoStateStore>> {
    let index: Arc<dyn CryptoStateStore> = match strategy {
        IndexStrategy::Generic => match (backends.membership, backends.directory) {
            (Some(membership), Some(directory)) => {
                Arc::new(ProfileRoomIndex::new(membership, directory))
            }
            _ => {
                return Err(Error::Configuration(
                    "generic room index needs both a membership store and a room directory".into(),
                ))
            }
        },
        IndexStrategy::Joined => match backends.relational {
            Some(store) => Arc::new(JoinedRoomIndex::new(store)),
            None if cfg!(feature = "sqlite") => {
                return Err(Error::Configuration(
                    "joined room index needs a relational store".into(),
                ))
            }
            None => {
                return Err(Error::Configuration(
                    "joined room index needs a relational store; this build has no `sqlite` feature"
                        .into(),
                ))
            }
        },
    };

    tracing::info!(strategy = %strategy, "[RoomIndex] Room index ready");
    Ok(index)
}

// ============================================================================
// TESTS
// ============================================================================
