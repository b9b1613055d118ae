//! The line-delimited JSON wire codec (spec.md §4.1).
//!
//! Each frame is one JSON object terminated by `\n`; the `"type"` field
//! selects the schema. Framing itself is handled by `tokio_util::codec`'s
//! `LinesCodec` (the same crate/feature `services/receiver` already
//! depends on), layered under `serde_json`'s internally-tagged enum
//! support for the discriminator dispatch described in §4.1.

pub mod records;

use futures_util::StreamExt;
pub use records::*;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::error::WireError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "login")]
    Login(LoginRequest),
    #[serde(rename = "login-response")]
    LoginResponse(LoginResponse),
    #[serde(rename = "register")]
    Register(RegisterRequest),
    #[serde(rename = "register-response")]
    RegisterResponse(RegisterResponse),
    #[serde(rename = "logout")]
    Logout(LogoutRequest),
    #[serde(rename = "logout-response")]
    LogoutResponse(LogoutResponse),
    #[serde(rename = "joinroom")]
    JoinRoom(JoinRoomRequest),
    #[serde(rename = "joinroom-response")]
    JoinRoomResponse(JoinRoomResponse),
    #[serde(rename = "createroom")]
    CreateRoom(CreateRoomRequest),
    #[serde(rename = "createroom-response")]
    CreateRoomResponse(CreateRoomResponse),
    #[serde(rename = "getrooms")]
    GetRooms(GetRoomsRequest),
    #[serde(rename = "getrooms-response")]
    GetRoomsResponse(GetRoomsResponse),
    #[serde(rename = "getmessages")]
    GetMessages(GetMessagesRequest),
    #[serde(rename = "getmessages-response")]
    GetMessagesResponse(GetMessagesResponse),
    #[serde(rename = "postmessage")]
    PostMessage(PostMessageRequest),
    #[serde(rename = "postmessage-response")]
    PostMessageResponse(PostMessageResponse),
    #[serde(rename = "dynamicmessage")]
    DynamicMessage(DynamicMessage),
}

impl Frame {
    /// The envelope `timestamp` field, common to every frame.
    pub fn timestamp(&self) -> i64 {
        match self {
            Frame::Login(r) => r.timestamp,
            Frame::LoginResponse(r) => r.timestamp,
            Frame::Register(r) => r.timestamp,
            Frame::RegisterResponse(r) => r.timestamp,
            Frame::Logout(r) => r.timestamp,
            Frame::LogoutResponse(r) => r.timestamp,
            Frame::JoinRoom(r) => r.timestamp,
            Frame::JoinRoomResponse(r) => r.timestamp,
            Frame::CreateRoom(r) => r.timestamp,
            Frame::CreateRoomResponse(r) => r.timestamp,
            Frame::GetRooms(r) => r.timestamp,
            Frame::GetRoomsResponse(r) => r.timestamp,
            Frame::GetMessages(r) => r.timestamp,
            Frame::GetMessagesResponse(r) => r.timestamp,
            Frame::PostMessage(r) => r.timestamp,
            Frame::PostMessageResponse(r) => r.timestamp,
            Frame::DynamicMessage(r) => r.timestamp,
        }
    }
}

/// Parses one line of input into a [`Frame`]. An unrecognized `"type"` or
/// malformed JSON both surface as a [`WireError::Json`] (spec.md §4.1:
/// "Unknown discriminators yield a malformed outcome surfaced as a decode
/// failure").
pub fn decode_frame(line: &str) -> Result<Frame, WireError> {
    Ok(serde_json::from_str(line)?)
}

/// Serializes `frame` to a line including the trailing `\n`.
pub fn encode_frame(frame: &Frame) -> Result<String, WireError> {
    let mut s = serde_json::to_string(frame)?;
    s.push('\n');
    Ok(s)
}

/// Reads successive newline-delimited [`Frame`]s off an async byte stream.
pub struct FrameReader<R> {
    lines: FramedRead<R, LinesCodec>,
}

impl<R: tokio::io::AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        FrameReader {
            lines: FramedRead::new(reader, LinesCodec::new()),
        }
    }

    /// Returns the next frame, `Ok(None)` on clean EOF, or a [`WireError`]
    /// on I/O failure or malformed input.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, WireError> {
        match self.lines.next().await {
            None => Ok(None),
            Some(Ok(line)) => Ok(Some(decode_frame(&line)?)),
            Some(Err(LinesCodecError::Io(io_err))) => Err(WireError::Io(io_err)),
            Some(Err(e @ LinesCodecError::MaxLineLengthExceeded)) => Err(WireError::Io(
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )),
        }
    }
}

/// Writes a single [`Frame`] followed by its newline to `writer`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), WireError> {
    use tokio::io::AsyncWriteExt;
    let line = encode_frame(frame)?;
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}
