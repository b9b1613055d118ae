use serde::{Deserialize, Serialize};

use crate::store::{MessageRecord, RoomRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub timestamp: i64,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub timestamp: i64,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub timestamp: i64,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterResponse {
    pub timestamp: i64,
    pub code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoutRequest {
    pub timestamp: i64,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoutResponse {
    pub timestamp: i64,
    pub code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRoomRequest {
    pub timestamp: i64,
    pub key: String,
    pub room: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRoomResponse {
    pub timestamp: i64,
    pub room: String,
    pub code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRoomRequest {
    pub timestamp: i64,
    pub key: String,
    pub room: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRoomResponse {
    pub timestamp: i64,
    pub room: String,
    pub code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetRoomsRequest {
    pub timestamp: i64,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetRoomsResponse {
    pub timestamp: i64,
    pub code: i32,
    #[serde(default)]
    pub rooms: std::collections::HashMap<i64, RoomRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetMessagesRequest {
    pub timestamp: i64,
    pub key: String,
    pub room: i64,
    pub channel: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetMessagesResponse {
    pub timestamp: i64,
    pub code: i32,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostMessageRequest {
    pub timestamp: i64,
    pub key: String,
    pub room: i64,
    pub channel: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostMessageResponse {
    pub timestamp: i64,
    pub code: i32,
}

/// Server-initiated push delivering a newly posted message to a receiver
/// (spec.md §4.5, §6.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicMessage {
    pub timestamp: i64,
    pub room: i64,
    pub channel: i64,
    pub user_id: i64,
    pub id: i64,
    pub message: String,
    pub created: chrono::DateTime<chrono::Utc>,
}
