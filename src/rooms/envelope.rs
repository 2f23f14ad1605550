use serde::{Deserialize, Serialize};

use crate::RelayResult;

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Join {
        room: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        message: String,
    },
}

impl ClientEnvelope {
    pub fn parse(raw: &[u8]) -> RelayResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Frames the server sends. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    System {
        message: String,
    },
    Chat {
        user: String,
        message: String,
        room: String,
    },
}

impl ServerEnvelope {
    pub(crate) fn joined(room: &str) -> Self {
        ServerEnvelope::System {
            message: format!("Joined room {room}"),
        }
    }

    pub fn to_json(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
