//! # Bridge Crypto State
//!
//! Two small primitives for chat bridges:
//!
//! - [`token`] - tamper-evident tokens carrying a JSON payload
//! - [`rooms`] - which encrypted rooms the bridge shares with a user, for
//!   deciding who receives room keys
//!
//! The two are independent and share no state.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BRIDGE CRYPTO STATE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────┐          ┌───────────────────────────────────┐   │
//! │  │      token       │          │              rooms                │   │
//! │  │                  │          │                                   │   │
//! │  │ - sign_token     │          │ - CryptoStateStore (trait)        │   │
//! │  │ - verify_token   │          │ - ProfileRoomIndex (generic)      │   │
//! │  │ - TokenCodec     │          │ - JoinedRoomIndex  (single join)  │   │
//! │  └──────────────────┘          └─────────────────┬─────────────────┘   │
//! │                                                  │                     │
//! │                                                  ▼                     │
//! │                                ┌───────────────────────────────────┐   │
//! │                                │             storage               │   │
//! │                                │                                   │   │
//! │                                │ - MemoryStore (DashMap)           │   │
//! │                                │ - Database (SQLite, `sqlite`)     │   │
//! │                                └───────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use bridge_crypto_state::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_env()?;
//! let index = config.open_index().await?;
//! let rooms = index.find_shared_rooms(&user_id).await?;
//! ```

pub mod config;
pub mod error;
pub mod rooms;
pub mod storage;
pub mod token;

pub use error::{Error, Result};
pub use rooms::{
    build_index, CryptoStateStore, IndexBackends, IndexStrategy, RoomId, UserId,
};
pub use token::{sign_token, verify_token, Payload, SigningKey, TokenCodec};

/// Returns the crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
