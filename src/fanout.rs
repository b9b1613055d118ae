//! Fan-out engine: delivers a newly posted message to every live endpoint
//! of every member of the target room (spec.md §4.5).

use chrono::Utc;
use tracing::warn;

use crate::room_cache::RoomCache;
use crate::session_registry::SessionRegistry;
use crate::store::MessageRecord;
use crate::wire::{DynamicMessage, Frame};

/// Builds the `dynamicmessage` frame and pushes it to every member
/// endpoint (including the sender's other sessions).
///
/// Write failures are logged and swallowed per endpoint; they never abort
/// the loop, never affect the poster's own response, and never roll back
/// persistence (spec.md §4.5, §7).
pub async fn fan_out_message(
    registry: &SessionRegistry,
    rooms: &RoomCache,
    room_id: i64,
    channel_id: i64,
    message: &MessageRecord,
) {
    let frame = Frame::DynamicMessage(DynamicMessage {
        timestamp: Utc::now().timestamp(),
        room: room_id,
        channel: channel_id,
        user_id: message.user_id,
        id: message.id,
        message: message.message.clone(),
        created: message.created,
    });

    for member_id in rooms.member_ids(room_id).await {
        for endpoint in registry.endpoints_for(member_id).await {
            if !endpoint.send(frame.clone()) {
                warn!(
                    user_id = member_id,
                    endpoint_id = %endpoint.id,
                    room_id,
                    channel_id,
                    "dropping dynamicmessage: endpoint's writer task is gone"
                );
            }
        }
    }
}
