//! In-process [`ChatStore`] backed by `tokio::sync::RwLock`-guarded maps.
//!
//! Development/test default (spec.md §1 treats the relational schema as an
//! external concern). Used directly by the in-memory integration tests and
//! whenever `DATABASE_URL` is unset (see `main.rs`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::pwhash;
use super::types::{ChannelRecord, MessageRecord, RoomRecord, UserRecord};
use super::{ChatStore, StoreError};

struct StoredUser {
    id: i64,
    username: String,
    password_verifier: String,
    created: chrono::DateTime<Utc>,
}

struct StoredRoom {
    id: i64,
    name: String,
    displayname: String,
    #[allow(dead_code)]
    password_verifier: String,
    channels: HashMap<i64, ChannelRecord>,
    /// user id -> is_admin
    members: HashMap<i64, bool>,
}

#[derive(Default)]
struct Inner {
    users_by_id: HashMap<i64, StoredUser>,
    /// lowercased username -> user id (spec.md §9 case-insensitive uniqueness)
    usernames: HashMap<String, i64>,
    sessions: HashMap<String, i64>,
    rooms: HashMap<i64, StoredRoom>,
    /// lowercased room name -> room id
    room_names: HashMap<String, i64>,
    messages: HashMap<(i64, i64), Vec<MessageRecord>>,
    next_user_id: i64,
    next_room_id: i64,
    next_channel_id: i64,
    next_message_id: i64,
}

pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn user_record(u: &StoredUser) -> UserRecord {
    UserRecord {
        id: u.id,
        username: u.username.clone(),
        displayname: None,
        created: u.created,
    }
}

fn room_record(r: &StoredRoom, users_by_id: &HashMap<i64, StoredUser>) -> RoomRecord {
    RoomRecord {
        id: r.id,
        name: r.name.clone(),
        displayname: r.displayname.clone(),
        channels: r.channels.clone(),
        users: r
            .members
            .keys()
            .filter_map(|uid| users_by_id.get(uid).map(|u| (*uid, user_record(u))))
            .collect(),
    }
}

#[async_trait]
impl ChatStore for MemStore {
    async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.usernames.contains_key(&username.to_lowercase()))
    }

    async fn register(&self, username: &str, password: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        let key = username.to_lowercase();
        if inner.usernames.contains_key(&key) {
            return Err(StoreError::UsernameTaken);
        }
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users_by_id.insert(
            id,
            StoredUser {
                id,
                username: username.to_owned(),
                password_verifier: pwhash::hash(password),
                created: Utc::now(),
            },
        );
        inner.usernames.insert(key, id);
        Ok(id)
    }

    async fn get_user_id(&self, username: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.usernames.get(&username.to_lowercase()).copied())
    }

    async fn is_valid_login(&self, user_id: i64, password: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users_by_id
            .get(&user_id)
            .map(|u| pwhash::verify(password, &u.password_verifier))
            .unwrap_or(false))
    }

    async fn add_session(&self, user_id: i64, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(key.to_owned(), user_id);
        Ok(())
    }

    async fn user_id_from_key(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(key).copied())
    }

    async fn remove_session(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(key);
        Ok(())
    }

    async fn room_exists(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.room_names.get(&name.to_lowercase()).copied())
    }

    async fn create_room(
        &self,
        name: &str,
        creator_id: i64,
        password: &str,
    ) -> Result<RoomRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let key = name.to_lowercase();
        if inner.room_names.contains_key(&key) {
            return Err(StoreError::RoomNameTaken);
        }
        inner.next_room_id += 1;
        let room_id = inner.next_room_id;
        inner.next_channel_id += 1;
        let channel_id = inner.next_channel_id;

        let mut channels = HashMap::new();
        channels.insert(
            channel_id,
            ChannelRecord {
                id: channel_id,
                name: "general".to_owned(),
            },
        );
        let mut members = HashMap::new();
        members.insert(creator_id, true);

        inner.rooms.insert(
            room_id,
            StoredRoom {
                id: room_id,
                name: name.to_owned(),
                displayname: name.to_owned(),
                password_verifier: if password.is_empty() {
                    String::new()
                } else {
                    pwhash::hash(password)
                },
                channels,
                members,
            },
        );
        inner.room_names.insert(key, room_id);

        let room = &inner.rooms[&room_id];
        Ok(room_record(room, &inner.users_by_id))
    }

    async fn add_user_to_room(&self, user_id: i64, room_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(room) = inner.rooms.get_mut(&room_id) {
            room.members.entry(user_id).or_insert(false);
        }
        Ok(())
    }

    async fn get_rooms(&self, user_id: i64) -> Result<HashMap<i64, RoomRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rooms
            .values()
            .filter(|r| r.members.contains_key(&user_id))
            .map(|r| (r.id, room_record(r, &inner.users_by_id)))
            .collect())
    }

    async fn post_message(
        &self,
        user_id: i64,
        room_id: i64,
        channel_id: i64,
        body: &str,
    ) -> Result<MessageRecord, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_message_id += 1;
        let id = inner.next_message_id;
        let now = Utc::now();
        let record = MessageRecord {
            id,
            user_id,
            message: body.to_owned(),
            created: now,
            received: now,
        };
        inner
            .messages
            .entry((room_id, channel_id))
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn get_messages(
        &self,
        room_id: i64,
        channel_id: i64,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut messages = inner
            .messages
            .get(&(room_id, channel_id))
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(messages)
    }
}
