//! In-memory room and membership store.
//!
//! Uses DashMap for concurrent access. Nothing is persisted; useful for
//! tests and for bridges that rebuild room state from the homeserver on
//! startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::rooms::{
    MemberProfile, RoomDirectory, RoomId, RoomMembershipStore, RoomRecord, UserId,
};

/// DashMap-backed store implementing [`RoomMembershipStore`] and
/// [`RoomDirectory`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// room id → portal record
    rooms: Arc<DashMap<RoomId, RoomRecord>>,
    /// user id → (room id → profile in that room)
    members: Arc<DashMap<UserId, HashMap<RoomId, MemberProfile>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Rooms ────────────────────────────────────────────────────────────────

    /// Insert or replace a room.
    pub fn upsert_room(&self, room: RoomRecord) {
        self.rooms.insert(room.room_id.clone(), room);
    }

    /// Flip a room's encryption flag. Returns false if the room is unknown.
    pub fn set_room_encrypted(&self, room_id: &RoomId, encrypted: bool) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.encrypted = encrypted;
                true
            }
            None => false,
        }
    }

    /// Forget a room. Membership rows are left alone.
    pub fn delete_room(&self, room_id: &RoomId) -> bool {
        self.rooms.remove(room_id).is_some()
    }

    // ── Members ──────────────────────────────────────────────────────────────

    /// Insert or replace a member profile.
    pub fn put_member(&self, profile: MemberProfile) {
        self.members
            .entry(profile.user_id.clone())
            .or_default()
            .insert(profile.room_id.clone(), profile);
    }

    /// Remove a user's profile in one room.
    pub fn remove_member(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let removed = match self.members.get_mut(user_id) {
            Some(mut rooms) => rooms.remove(room_id).is_some(),
            None => false,
        };
        self.members.remove_if(user_id, |_, rooms| rooms.is_empty());
        removed
    }

    pub fn get_member(&self, room_id: &RoomId, user_id: &UserId) -> Option<MemberProfile> {
        self.members
            .get(user_id)
            .and_then(|rooms| rooms.get(room_id).cloned())
    }

    /// Number of known rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[async_trait]
impl RoomMembershipStore for MemoryStore {
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomId>> {
        Ok(self
            .members
            .get(user_id)
            .map(|rooms| {
                rooms
                    .values()
                    .filter(|profile| profile.membership.is_shared())
                    .map(|profile| profile.room_id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl RoomDirectory for MemoryStore {
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomRecord>> {
        Ok(self.rooms.get(room_id).map(|r| r.clone()))
    }
}
