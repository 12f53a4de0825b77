use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::GpsTracking;

/// Frames a watcher may send over its channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeTracking {
        #[serde(alias = "requestId")]
        request_id: Uuid,
    },
}

/// Frames the hub pushes to watchers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LocationUpdate(GpsTracking),
    Subscribed { request_id: Uuid },
    Error { message: String },
}
