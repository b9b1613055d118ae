//! Per-connection request dispatcher (spec.md §4.4).
//!
//! One task per accepted TCP connection owns a [`FrameReader`] and a
//! dedicated writer task reached through an `mpsc` channel (spec.md §5, §9
//! "per-endpoint write serialization"). The dispatcher decodes frames,
//! validates session keys, calls the matching handler, and writes the
//! reply; on EOF or an unrecoverable decode/write error it detaches its
//! endpoint (if attached) and returns.

use std::sync::Arc;

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{HandlerError, StatusCode};
use crate::fanout::fan_out_message;
use crate::room_cache::RoomCache;
use crate::session_registry::{Endpoint, SessionRegistry};
use crate::store::ChatStore;
use crate::wire::{
    self, CreateRoomResponse, Frame, FrameReader, GetMessagesResponse, GetRoomsResponse,
    JoinRoomResponse, LoginResponse, LogoutResponse, PostMessageResponse, RegisterResponse,
};

/// Everything a connection task needs, shared across all connections.
#[derive(Clone)]
pub struct Shared {
    pub store: Arc<dyn ChatStore>,
    pub registry: Arc<SessionRegistry>,
    pub rooms: Arc<RoomCache>,
}

/// Tracks which endpoint (if any) this connection has attached to the
/// session registry, so it can be detached on disconnect or logout.
/// Authorization for every subsequent request still goes through
/// [`authorize`] against the store, not through this cache (spec.md §4.1).
struct Session {
    user_id: i64,
    endpoint_id: Uuid,
}

/// Drives one accepted connection end to end. `peer` is used only for
/// logging.
pub async fn run_connection<S>(shared: Shared, socket: S, peer: std::net::SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(socket);
    let mut reader = FrameReader::new(read_half);

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Frame>();
    let mut writer_task = {
        let mut write_half = write_half;
        tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if let Err(e) = wire::write_frame(&mut write_half, &frame).await {
                    warn!(%peer, error = %e, "write failed, closing writer task");
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        })
    };

    let mut session: Option<Session> = None;

    loop {
        let frame = tokio::select! {
            frame = reader.next_frame() => frame,
            _ = &mut writer_task => {
                warn!(%peer, "writer task exited early, closing connection");
                break;
            }
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(%peer, "peer closed connection");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "protocol error, closing connection");
                break;
            }
        };

        if let Some(reply) = handle_frame(&shared, &mut session, &writer_tx, frame).await {
            if writer_tx.send(reply).is_err() {
                warn!(%peer, "writer task gone, could not send reply");
                break;
            }
        }
    }

    if let Some(session) = session.take() {
        shared.registry.detach(session.user_id, session.endpoint_id).await;
    }
    drop(writer_tx);
    let _ = writer_task.await;
}

/// Dispatches a single decoded frame to its handler and returns the reply
/// frame to send, if any.
///
/// `register`/`login` are honored with no key at all. Every other request
/// carries its own `key` field, re-checked against the store on every call
/// via [`authorize`] — the connection-local `session` tracks only which
/// endpoint (if any) this socket has attached, for detach-on-disconnect; it
/// is never itself the source of truth for who a request is from (spec.md
/// §4.1, §4.4 "403 if key unknown").
async fn handle_frame(
    shared: &Shared,
    session: &mut Option<Session>,
    writer_tx: &mpsc::UnboundedSender<Frame>,
    frame: Frame,
) -> Option<Frame> {
    let now = now_ts();
    match frame {
        Frame::Register(req) => Some(Frame::RegisterResponse(RegisterResponse {
            timestamp: now,
            code: match do_register(shared, &req.username, &req.password).await {
                Ok(()) => StatusCode::Ok as i32,
                Err(e) => e.status() as i32,
            },
        })),

        Frame::Login(req) => {
            match do_login(shared, &req.username, &req.password, writer_tx.clone()).await {
                Ok((key, new_session)) => {
                    *session = Some(new_session);
                    Some(Frame::LoginResponse(LoginResponse {
                        timestamp: now,
                        code: StatusCode::Ok as i32,
                        key: Some(key),
                    }))
                }
                Err(e) => Some(Frame::LoginResponse(LoginResponse {
                    timestamp: now,
                    code: e.status() as i32,
                    key: None,
                })),
            }
        }

        Frame::Logout(req) => {
            let code = if let Some(Session { user_id, endpoint_id }) = session.take() {
                let _ = shared.store.remove_session(&req.key).await;
                shared.registry.detach(user_id, endpoint_id).await;
                StatusCode::Ok
            } else {
                StatusCode::Forbidden
            };
            Some(Frame::LogoutResponse(LogoutResponse {
                timestamp: now,
                code: code as i32,
            }))
        }

        Frame::JoinRoom(req) => {
            let reply = match authorize(shared, &req.key).await {
                Err(e) => Err(e),
                Ok(user_id) => do_join_room(shared, user_id, &req.room).await,
            };
            Some(Frame::JoinRoomResponse(JoinRoomResponse {
                timestamp: now,
                room: req.room,
                code: reply.map(|_| StatusCode::Ok).unwrap_or_else(|e| e.status()) as i32,
            }))
        }

        Frame::CreateRoom(req) => {
            let reply = match authorize(shared, &req.key).await {
                Err(e) => Err(e),
                Ok(user_id) => do_create_room(shared, user_id, &req.room, &req.password).await,
            };
            Some(Frame::CreateRoomResponse(CreateRoomResponse {
                timestamp: now,
                room: req.room,
                code: reply.map(|_| StatusCode::Ok).unwrap_or_else(|e| e.status()) as i32,
            }))
        }

        Frame::GetRooms(req) => {
            let reply = match authorize(shared, &req.key).await {
                Err(e) => Err(e),
                Ok(user_id) => Ok(shared.rooms.rooms_for(user_id).await),
            };
            Some(match reply {
                Ok(rooms) => Frame::GetRoomsResponse(GetRoomsResponse {
                    timestamp: now,
                    code: StatusCode::Ok as i32,
                    rooms,
                }),
                Err(e) => Frame::GetRoomsResponse(GetRoomsResponse {
                    timestamp: now,
                    code: e.status() as i32,
                    rooms: Default::default(),
                }),
            })
        }

        Frame::GetMessages(req) => {
            let reply = match authorize(shared, &req.key).await {
                Err(e) => Err(e),
                Ok(_user_id) => shared
                    .store
                    .get_messages(req.room, req.channel)
                    .await
                    .map_err(HandlerError::from),
            };
            Some(match reply {
                Ok(messages) => Frame::GetMessagesResponse(GetMessagesResponse {
                    timestamp: now,
                    code: StatusCode::Ok as i32,
                    messages,
                }),
                Err(e) => Frame::GetMessagesResponse(GetMessagesResponse {
                    timestamp: now,
                    code: e.status() as i32,
                    messages: Vec::new(),
                }),
            })
        }

        Frame::PostMessage(req) => {
            let reply = match authorize(shared, &req.key).await {
                Err(e) => Err(e),
                Ok(user_id) => {
                    do_post_message(shared, user_id, req.room, req.channel, &req.message).await
                }
            };
            Some(Frame::PostMessageResponse(PostMessageResponse {
                timestamp: now,
                code: reply.map(|_| StatusCode::Ok).unwrap_or_else(|e| e.status()) as i32,
            }))
        }

        // Server-only/response frames received from a client are protocol
        // violations; the connection is already past the point of no
        // return at decode, so nothing to do but ignore them here.
        Frame::LoginResponse(_)
        | Frame::RegisterResponse(_)
        | Frame::LogoutResponse(_)
        | Frame::JoinRoomResponse(_)
        | Frame::CreateRoomResponse(_)
        | Frame::GetRoomsResponse(_)
        | Frame::GetMessagesResponse(_)
        | Frame::PostMessageResponse(_)
        | Frame::DynamicMessage(_) => None,
    }
}

/// Resolves `key` against the store fresh on every call — the gate every
/// privileged request passes through (spec.md §4.1, §4.4). An unknown key
/// is 403 regardless of what this connection did earlier.
async fn authorize(shared: &Shared, key: &str) -> Result<i64, HandlerError> {
    shared
        .store
        .user_id_from_key(key)
        .await?
        .ok_or(HandlerError::Unauthenticated)
}

async fn do_register(shared: &Shared, username: &str, password: &str) -> Result<(), HandlerError> {
    if username.is_empty() || password.is_empty() {
        return Err(HandlerError::BadRequest("username/password required".into()));
    }
    if shared.store.user_exists(username).await? {
        return Err(HandlerError::BadRequest("username taken".into()));
    }
    shared.store.register(username, password).await?;
    Ok(())
}

async fn do_login(
    shared: &Shared,
    username: &str,
    password: &str,
    writer_tx: mpsc::UnboundedSender<Frame>,
) -> Result<(String, Session), HandlerError> {
    if username.is_empty() || password.is_empty() {
        return Err(HandlerError::Unauthenticated);
    }
    let user_id = shared
        .store
        .get_user_id(username)
        .await?
        .ok_or(HandlerError::Unauthenticated)?;
    if !shared.store.is_valid_login(user_id, password).await? {
        return Err(HandlerError::Unauthenticated);
    }

    let key = generate_session_key();
    shared.store.add_session(user_id, &key).await?;

    let endpoint = Endpoint::new(writer_tx);
    let endpoint_id = endpoint.id;
    shared.registry.attach(user_id, endpoint).await;
    shared.rooms.refresh_for_user(shared.store.as_ref(), user_id).await?;

    Ok((key, Session { user_id, endpoint_id }))
}

async fn do_join_room(shared: &Shared, user_id: i64, room_name: &str) -> Result<(), HandlerError> {
    if room_name.is_empty() {
        return Err(HandlerError::BadRequest("room name required".into()));
    }
    let room_id = shared
        .store
        .room_exists(room_name)
        .await?
        .ok_or_else(|| HandlerError::BadRequest("room does not exist".into()))?;
    shared.store.add_user_to_room(user_id, room_id).await?;
    shared.rooms.refresh_for_user(shared.store.as_ref(), user_id).await?;
    Ok(())
}

async fn do_create_room(
    shared: &Shared,
    user_id: i64,
    room_name: &str,
    password: &str,
) -> Result<(), HandlerError> {
    if room_name.is_empty() {
        return Err(HandlerError::BadRequest("room name required".into()));
    }
    if shared.store.room_exists(room_name).await?.is_some() {
        return Err(HandlerError::BadRequest("room name taken".into()));
    }
    shared.store.create_room(room_name, user_id, password).await?;
    shared.rooms.refresh_for_user(shared.store.as_ref(), user_id).await?;
    Ok(())
}

async fn do_post_message(
    shared: &Shared,
    user_id: i64,
    room_id: i64,
    channel_id: i64,
    body: &str,
) -> Result<(), HandlerError> {
    let message = shared
        .store
        .post_message(user_id, room_id, channel_id, body)
        .await?;
    fan_out_message(&shared.registry, &shared.rooms, room_id, channel_id, &message).await;
    Ok(())
}

/// A random, opaque bearer token with >=128 bits of entropy, comfortably
/// above spec.md §3's 122-bit floor.
fn generate_session_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
