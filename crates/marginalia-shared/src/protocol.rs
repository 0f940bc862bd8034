//! Gateway wire protocol.
//!
//! Frames are JSON with a `type` tag and a `data` payload.  Chat messages
//! and notifications travel on distinctly named events so a client can
//! subscribe to each concern separately.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Message, Notification};

pub const EVENT_READY: &str = "ready";
pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_NEW_NOTIFICATION: &str = "new-notification";
pub const EVENT_ERROR: &str = "error";

/// Frames a client may send on the gateway socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Send a chat message to another user.
    SendMessage { receiver: Uuid, text: String },
}

/// Frames the server pushes to a connected client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once after the session is announced.
    Ready { user_id: Uuid },
    /// A chat message addressed to this user was persisted.
    NewMessage(Message),
    /// A notification addressed to this user was persisted.
    NewNotification(Notification),
    /// A client frame was rejected; the client should re-issue the action.
    Error { message: String },
}

impl ServerEvent {
    /// The event name carried in the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => EVENT_READY,
            ServerEvent::NewMessage(_) => EVENT_NEW_MESSAGE,
            ServerEvent::NewNotification(_) => EVENT_NEW_NOTIFICATION,
            ServerEvent::Error { .. } => EVENT_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_serde_tags() {
        let user_id = Uuid::new_v4();
        let event = ServerEvent::Ready { user_id };
        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&event).unwrap(),
        )
        .unwrap();
        assert_eq!(json["type"], event.name());

        let event = ServerEvent::Error {
            message: "nope".into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], EVENT_ERROR);
    }

    #[test]
    fn client_frame_round_trip() {
        let frame = ClientFrame::SendMessage {
            receiver: Uuid::new_v4(),
            text: "hello".into(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("send-message"));
        assert_eq!(serde_json::from_str::<ClientFrame>(&json).unwrap(), frame);
    }
}
