//! WebSocket wire messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pushed from the server. Room-scoped events go only to clients that
/// joined the room; `WorkflowVariations` goes to everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    PhaseUpdate {
        room: String,
        campaign_id: String,
        phase: String,
        status: String,
        timestamp: DateTime<Utc>,
    },
    Log {
        room: String,
        level: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    WorkflowVariations {
        variations: Vec<serde_json::Value>,
    },
}

impl ServerEvent {
    pub fn log(room: impl Into<String>, level: &str, message: impl Into<String>) -> Self {
        Self::Log {
            room: room.into(),
            level: level.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// `None` for broadcast events.
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::PhaseUpdate { room, .. } | Self::Log { room, .. } => Some(room),
            Self::WorkflowVariations { .. } => None,
        }
    }
}

/// Sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom { room: String },
    LeaveRoom { room: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let ev = ServerEvent::log("c-1", "info", "recon started");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(ev.room(), Some("c-1"));

        let ev = ServerEvent::PhaseUpdate {
            room: "c-1".into(),
            campaign_id: "c-1".into(),
            phase: "discovery".into(),
            status: "running".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "phase-update");
        assert_eq!(json["campaignId"], "c-1");

        let ev = ServerEvent::WorkflowVariations { variations: vec![] };
        assert_eq!(serde_json::to_value(&ev).unwrap()["type"], "workflow-variations");
        assert_eq!(ev.room(), None);
    }

    #[test]
    fn test_client_join_room() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join-room","room":"abc"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { room: "abc".into() });
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }
}
