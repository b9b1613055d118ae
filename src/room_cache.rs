//! Server-side cache of room membership used to target fan-out (spec.md
//! §4.3).
//!
//! The cache is the source of truth for "who receives a posted message":
//! it is refreshed from the store after login, `joinroom`, and
//! `createroom`, and the fan-out engine only ever reads from here, never
//! from the store directly.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::store::{ChatStore, RoomRecord, StoreError};

#[derive(Default)]
pub struct RoomCache {
    rooms: RwLock<HashMap<i64, RoomRecord>>,
}

impl RoomCache {
    pub fn new() -> Self {
        RoomCache::default()
    }

    /// Re-fetches `user_id`'s rooms from the store and merges them in,
    /// accumulating channels/users per room rather than reassigning
    /// (spec.md §9, §4.3 "MUST be refreshed after... createroom, joinroom,
    /// or successful login").
    pub async fn refresh_for_user(
        &self,
        store: &dyn ChatStore,
        user_id: i64,
    ) -> Result<(), StoreError> {
        let fetched = store.get_rooms(user_id).await?;
        let mut rooms = self.rooms.write().await;
        for (room_id, room) in fetched {
            rooms.insert(room_id, room);
        }
        Ok(())
    }

    pub async fn get(&self, room_id: i64) -> Option<RoomRecord> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    /// The user ids currently believed to be members of `room_id`, used by
    /// the fan-out engine to decide who to push to (spec.md §4.5).
    pub async fn member_ids(&self, room_id: i64) -> Vec<i64> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|r| r.users.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn rooms_for(&self, user_id: i64) -> HashMap<i64, RoomRecord> {
        self.rooms
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.users.contains_key(&user_id))
            .map(|(id, r)| (*id, r.clone()))
            .collect()
    }
}

pub type SharedRoomCache = Arc<RoomCache>;
