use thiserror::Error;

use crate::rooms::ConnectionId;

pub type RelayResult<T> = Result<T, RelayError>;

/// Everything that can go wrong while relaying a single envelope.
///
/// None of these end the connection that caused them. The transport logs
/// them and keeps reading.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    #[error("join without a room name")]
    EmptyRoom,

    #[error("{0} sent a chat message before joining a room")]
    NotInRoom(ConnectionId),

    #[error("{0} is no longer reachable")]
    ChannelClosed(ConnectionId),

    #[error("{connection} points at room {room:?} which does not list it")]
    RegistryInconsistency {
        connection: ConnectionId,
        room: String,
    },

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}
