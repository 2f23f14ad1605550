use tracing::debug;

use crate::{RelayError, RelayResult};

use super::{
    envelope::{ClientEnvelope, ServerEnvelope},
    registry::{ConnectionId, FanOut, Registry},
};

/// What happened to an inbound envelope that was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Joined { room: String },
    Broadcast { room: String, fan_out: FanOut },
}

/// Turns inbound frames into registry changes and outbound frames.
#[derive(Clone, Default)]
pub struct MessageRouter {
    registry: Registry,
}

impl MessageRouter {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handle_envelope(&self, id: ConnectionId, raw: &[u8]) -> RelayResult<Routed> {
        match ClientEnvelope::parse(raw)? {
            ClientEnvelope::Join { room, user } => self.join(id, room, user),
            ClientEnvelope::Message { user, message, .. } => self.chat(id, user, message),
        }
    }

    fn join(&self, id: ConnectionId, room: String, user: Option<String>) -> RelayResult<Routed> {
        if room.is_empty() {
            return Err(RelayError::EmptyRoom);
        }

        self.registry.join(id, &room)?;
        if let Some(user) = user {
            self.registry.set_user(id, user)?;
        }

        // the join itself stands even if the confirmation can't be delivered
        let confirmation = ServerEnvelope::joined(&room).to_json()?;
        if let Err(err) = self.registry.send_to(id, confirmation) {
            debug!(connection = %id, error = %err, "join confirmation dropped");
        }

        Ok(Routed::Joined { room })
    }

    fn chat(&self, id: ConnectionId, claimed: Option<String>, message: String) -> RelayResult<Routed> {
        let session = self
            .registry
            .session(id)
            .ok_or(RelayError::UnknownConnection(id))?;
        let Some(room) = session.room else {
            return Err(RelayError::NotInRoom(id));
        };

        let chat = ServerEnvelope::Chat {
            user: session.user.or(claimed).unwrap_or_default(),
            message,
            room: room.clone(),
        };
        let fan_out = self.registry.fan_out(&room, &chat.to_json()?);
        debug!(connection = %id, room = %room, delivered = fan_out.delivered, skipped = fan_out.skipped, "broadcast");

        Ok(Routed::Broadcast { room, fan_out })
    }
}
