use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered account (spec.md §3 "User").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    pub created: DateTime<Utc>,
}

/// A channel nested under a room (spec.md §3 "Channel").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: i64,
    pub name: String,
}

/// A room together with the channels and members visible to the caller
/// (spec.md §6.1 "Room record").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: i64,
    pub name: String,
    pub displayname: String,
    pub channels: HashMap<i64, ChannelRecord>,
    pub users: HashMap<i64, UserRecord>,
}

/// A persisted chat message (spec.md §6.1 "Message record").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub created: DateTime<Utc>,
    pub received: DateTime<Utc>,
}
