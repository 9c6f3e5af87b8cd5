//! # Database
//!
//! SQLite store for portals and member profiles.
//!
//! Implements every room index backend trait, so the same database can
//! drive either strategy:
//!
//! ```text
//! ┌─────────────────┐
//! │  room index     │  ProfileRoomIndex / JoinedRoomIndex
//! └────────┬────────┘
//!          │  RoomMembershipStore · RoomDirectory · RelationalStore
//!          ▼
//! ┌─────────────────┐
//! │    Database     │  this file
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │    rusqlite     │  file, or in-memory for tests
//! └─────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::schema;
use crate::error::{Error, Result};
use crate::rooms::{
    MemberProfile, Membership, RelationalStore, RoomDirectory, RoomId, RoomMembershipStore,
    RoomRecord, UserId,
};

/// The main database handle
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|e| {
                Error::StoreUnavailable(format!("Failed to open database: {}", e))
            })?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::StoreUnavailable(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = match conn.query_row(
            "SELECT version FROM schema_version LIMIT 1",
            [],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            // Fresh database, or a bridge database we have not opened before
            Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                if msg.starts_with("no such table") =>
            {
                None
            }
            Err(e) => {
                return Err(Error::StoreUnavailable(format!(
                    "Failed to read schema version: {}",
                    e
                )))
            }
        };

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES).map_err(|e| {
                    Error::StoreUnavailable(format!("Failed to create tables: {}", e))
                })?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )?;

                tracing::info!(
                    version = schema::SCHEMA_VERSION,
                    "[Storage] Database schema created"
                );
            }
            Some(v) => {
                tracing::debug!(version = v, "[Storage] Database schema version");
            }
        }

        Ok(())
    }

    // ========================================================================
    // PORTAL OPERATIONS
    // ========================================================================

    /// Insert a portal or update its encryption flag
    pub fn upsert_room(&self, room: &RoomRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO portal (mxid, encrypted) VALUES (?1, ?2)
             ON CONFLICT(mxid) DO UPDATE SET encrypted = excluded.encrypted",
            params![room.room_id.as_str(), room.encrypted],
        )?;
        Ok(())
    }

    /// Set a portal's encryption flag. Returns false if the portal is unknown.
    pub fn set_room_encrypted(&self, room_id: &RoomId, encrypted: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE portal SET encrypted = ?1 WHERE mxid = ?2",
            params![encrypted, room_id.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Delete a portal. Member profiles are kept.
    pub fn delete_room(&self, room_id: &RoomId) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM portal WHERE mxid = ?", params![room_id.as_str()])?;
        Ok(rows > 0)
    }

    /// Get a portal by room ID
    pub fn get_room_record(&self, room_id: &RoomId) -> Result<Option<RoomRecord>> {
        let conn = self.conn.lock();
        let room = conn
            .query_row(
                "SELECT mxid, encrypted FROM portal WHERE mxid = ?",
                params![room_id.as_str()],
                |row| {
                    Ok(RoomRecord {
                        room_id: RoomId::from_stored(row.get(0)?),
                        encrypted: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(room)
    }

    // ========================================================================
    // MEMBER OPERATIONS
    // ========================================================================

    /// Insert or replace a member profile
    pub fn put_member(&self, profile: &MemberProfile) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO mx_user_profile (room_id, user_id, membership, displayname, avatar_url)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(room_id, user_id) DO UPDATE SET
                membership = excluded.membership,
                displayname = excluded.displayname,
                avatar_url = excluded.avatar_url",
            params![
                profile.room_id.as_str(),
                profile.user_id.as_str(),
                profile.membership.as_str(),
                profile.displayname,
                profile.avatar_url,
            ],
        )?;
        Ok(())
    }

    /// Remove a member profile
    pub fn remove_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM mx_user_profile WHERE room_id = ?1 AND user_id = ?2",
            params![room_id.as_str(), user_id.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Get a member profile
    pub fn get_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<MemberProfile>> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                "SELECT room_id, user_id, membership, displayname, avatar_url
                 FROM mx_user_profile WHERE room_id = ?1 AND user_id = ?2",
                params![room_id.as_str(), user_id.as_str()],
                |row| {
                    let membership: String = row.get(2)?;
                    let membership = membership.parse::<Membership>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?;
                    Ok(MemberProfile {
                        room_id: RoomId::from_stored(row.get(0)?),
                        user_id: UserId::from_stored(row.get(1)?),
                        membership,
                        displayname: row.get(3)?,
                        avatar_url: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    // ========================================================================
    // ROOM INDEX QUERIES
    // ========================================================================

    /// Rooms where the user is joined or invited
    pub fn rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>> {
        self.query_room_ids(
            "SELECT room_id FROM mx_user_profile
             WHERE user_id = ?1 AND membership IN ('join', 'invite')",
            user_id,
        )
    }

    /// Rooms where the user is joined or invited and the portal is encrypted
    pub fn joined_encrypted_rooms(&self, user_id: &UserId) -> Result<Vec<RoomId>> {
        self.query_room_ids(
            "SELECT DISTINCT mx_user_profile.room_id FROM mx_user_profile
             JOIN portal ON portal.mxid = mx_user_profile.room_id
             WHERE mx_user_profile.user_id = ?1
               AND mx_user_profile.membership IN ('join', 'invite')
               AND portal.encrypted = 1",
            user_id,
        )
    }

    fn query_room_ids(&self, sql: &str, user_id: &UserId) -> Result<Vec<RoomId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rooms = stmt
            .query_map(params![user_id.as_str()], |row| {
                Ok(RoomId::from_stored(row.get(0)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rooms)
    }
}

// ============================================================================
// ROOM INDEX BACKENDS
// ============================================================================

#[async_trait]
impl RoomMembershipStore for Database {
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>> {
        self.rooms_for_user(user_id)
    }
}

#[async_trait]
impl RoomDirectory for Database {
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomRecord>> {
        self.get_room_record(room_id)
    }
}

#[async_trait]
impl RelationalStore for Database {
    async fn query_joined_encrypted_rooms(&self, user_id: &UserId) -> Result<Vec<RoomId>> {
        self.joined_encrypted_rooms(user_id)
    }

    async fn room_encrypted(&self, room_id: &RoomId) -> Result<Option<bool>> {
        Ok(self.get_room_record(room_id)?.map(|room| room.encrypted))
    }
}

// ============================================================================
// TESTS
// ============================================================================
