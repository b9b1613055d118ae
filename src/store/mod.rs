//! The storage collaborator's interface (spec.md §6.3).
//!
//! The core only depends on `ChatStore`; any persistent store that
//! satisfies it is acceptable (spec.md §1). Two implementations ship with
//! this crate — [`memory::MemStore`] for tests/dev, and
//! [`postgres::PostgresStore`] as the production default — but neither is
//! part of the contract itself.

pub mod memory;
pub mod postgres;
mod pwhash;
pub mod types;

pub use types::{ChannelRecord, MessageRecord, RoomRecord, UserRecord};

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already registered")]
    UsernameTaken,
    #[error("room name already exists")]
    RoomNameTaken,
    #[error("database error: {0}")]
    Database(String),
}

/// The contract the dispatcher consumes for accounts, sessions, rooms,
/// channels, memberships, and persisted messages (spec.md §6.3).
///
/// Every method's error type is [`StoreError`]; validation that doesn't
/// require the store (empty fields, etc.) happens in the dispatcher before
/// these are ever called.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn user_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Hashes `password` internally and creates the account. Fails with
    /// [`StoreError::UsernameTaken`] if the (case-insensitive) username is
    /// already registered (spec.md I4, §9 case-sensitivity decision).
    async fn register(&self, username: &str, password: &str) -> Result<i64, StoreError>;

    async fn get_user_id(&self, username: &str) -> Result<Option<i64>, StoreError>;

    async fn is_valid_login(&self, user_id: i64, password: &str) -> Result<bool, StoreError>;

    async fn add_session(&self, user_id: i64, key: &str) -> Result<(), StoreError>;

    async fn user_id_from_key(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Removes a session so its key is no longer valid. Additive relative to
    /// spec.md's source material (§9 "Session revocation"); does not change
    /// any behavior spec.md otherwise specifies.
    async fn remove_session(&self, key: &str) -> Result<(), StoreError>;

    async fn room_exists(&self, name: &str) -> Result<Option<i64>, StoreError>;

    /// Atomically creates the room, adds `creator_id` as admin member, and
    /// creates the default "general" channel (spec.md §4.4, §8 P5).
    async fn create_room(
        &self,
        name: &str,
        creator_id: i64,
        password: &str,
    ) -> Result<RoomRecord, StoreError>;

    async fn add_user_to_room(&self, user_id: i64, room_id: i64) -> Result<(), StoreError>;

    /// Rooms `user_id` is a member of, keyed by room id, with channels and
    /// users fully populated (spec.md §9 "accumulate rather than reassign").
    async fn get_rooms(&self, user_id: i64) -> Result<HashMap<i64, RoomRecord>, StoreError>;

    async fn post_message(
        &self,
        user_id: i64,
        room_id: i64,
        channel_id: i64,
        body: &str,
    ) -> Result<MessageRecord, StoreError>;

    /// Ordered by `created` ascending, ties broken by id ascending (spec.md
    /// §4.4, §8 P4).
    async fn get_messages(
        &self,
        room_id: i64,
        channel_id: i64,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}
