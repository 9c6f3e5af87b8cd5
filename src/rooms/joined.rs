//! Joined strategy: let the store filter encrypted rooms in one query.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CryptoStateStore, RelationalStore, RoomId, UserId};
use crate::error::Result;

/// Room index backed by a store that can join memberships to rooms.
#[derive(Clone)]
pub struct JoinedRoomIndex {
    store: Arc<dyn RelationalStore>,
}

impl JoinedRoomIndex {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CryptoStateStore for JoinedRoomIndex {
    async fn find_shared_rooms(&self, user_id: &UserId) -> Result<HashSet<RoomId>> {
        let rows = self.store.query_joined_encrypted_rooms(user_id).await?;
        let shared: HashSet<RoomId> = rows.into_iter().collect();

        tracing::debug!(
            user_id = user_id.as_str(),
            shared = shared.len(),
            "[RoomIndex] Joined query returned shared encrypted rooms"
        );
        Ok(shared)
    }

    async fn is_encrypted(&self, room_id: &RoomId) -> Result<bool> {
        Ok(self.store.room_encrypted(room_id).await?.unwrap_or(false))
    }
}
