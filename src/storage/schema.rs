//! # Database Schema
//!
//! Table layout for the SQLite store. Table and column names match the
//! bridge tables they mirror. An existing bridge database can be opened as
//! long as it has these columns; extra columns are ignored, and the first
//! open adds a `schema_version` table.
//!
//! ```text
//! ┌──────────────────────┐          ┌──────────────────┐
//! │   mx_user_profile    │          │      portal      │
//! ├──────────────────────┤          ├──────────────────┤
//! │ room_id          ────┼─────────►│ mxid             │
//! │ user_id              │          │ encrypted        │
//! │ membership           │          └──────────────────┘
//! │ displayname          │
//! │ avatar_url           │
//! └──────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Bridged rooms
CREATE TABLE IF NOT EXISTS portal (
    -- Chat room ID of the portal
    mxid TEXT PRIMARY KEY,
    -- 1 once end-to-end encryption is enabled in the room
    encrypted INTEGER NOT NULL DEFAULT 0
);

-- Member profiles per room, as seen by the bridge
CREATE TABLE IF NOT EXISTS mx_user_profile (
    room_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    -- join, invite, knock, leave or ban
    membership TEXT NOT NULL,
    displayname TEXT,
    avatar_url TEXT,
    PRIMARY KEY (room_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_mx_user_profile_user ON mx_user_profile(user_id);
"#;
