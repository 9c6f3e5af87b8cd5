//! Generic strategy: list a user's rooms, then look each one up.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CryptoStateStore, RoomDirectory, RoomId, RoomMembershipStore, UserId};
use crate::error::Result;

/// Room index that works with any membership store and room directory.
///
/// Costs one directory lookup per candidate room. Membership rows that
/// point at rooms the directory no longer knows are skipped.
#[derive(Clone)]
pub struct ProfileRoomIndex {
    members: Arc<dyn RoomMembershipStore>,
    rooms: Arc<dyn RoomDirectory>,
}

impl ProfileRoomIndex {
    pub fn new(members: Arc<dyn RoomMembershipStore>, rooms: Arc<dyn RoomDirectory>) -> Self {
        Self { members, rooms }
    }
}

#[async_trait]
impl CryptoStateStore for ProfileRoomIndex {
    async fn find_shared_rooms(&self, user_id: &UserId) -> Result<HashSet<RoomId>> {
        let candidates = self.members.list_rooms_for_user(user_id).await?;
        let candidate_count = candidates.len();

        let mut seen = HashSet::with_capacity(candidate_count);
        let mut shared = HashSet::new();
        for room_id in candidates {
            if !seen.insert(room_id.clone()) {
                continue;
            }

            match self.rooms.get_room(&room_id).await? {
                Some(room) if room.encrypted => {
                    shared.insert(room_id);
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        room_id = room_id.as_str(),
                        "[RoomIndex] Membership references unknown room, skipping"
                    );
                }
            }
        }

        tracing::debug!(
            user_id = user_id.as_str(),
            candidates = candidate_count,
            shared = shared.len(),
            "[RoomIndex] Resolved shared encrypted rooms"
        );
        Ok(shared)
    }

    async fn is_encrypted(&self, room_id: &RoomId) -> Result<bool> {
        Ok(self
            .rooms
            .get_room(room_id)
            .await?
            .map_or(false, |room| room.encrypted))
    }
}
