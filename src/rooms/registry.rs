use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{RelayError, RelayResult};

/// Identity of one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0.simple())
    }
}

/// Outbound half of a connection. Payloads are already-encoded JSON frames.
pub type Outbox = mpsc::UnboundedSender<String>;

/// What the registry knows about a connection besides its channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub room: Option<String>,
    pub user: Option<String>,
}

/// Result of enqueueing one payload to a whole room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub skipped: usize,
}

struct Member {
    outbox: Outbox,
    session: Session,
}

#[derive(Default)]
struct Rooms {
    rooms: HashMap<String, HashSet<ConnectionId>>,
    members: HashMap<ConnectionId, Member>,
    prune_empty: bool,
}

impl Rooms {
    /// Takes `id` out of whatever room it is in and returns that room.
    fn detach(&mut self, id: ConnectionId) -> Option<String> {
        let room = self.members.get_mut(&id)?.session.room.take()?;

        let stale = match self.rooms.get_mut(&room) {
            Some(members) => {
                let removed = members.remove(&id);
                if self.prune_empty && members.is_empty() {
                    self.rooms.remove(&room);
                    trace!(room = %room, "pruned empty room");
                }
                !removed
            }
            None => true,
        };

        if stale {
            let error = RelayError::RegistryInconsistency {
                connection: id,
                room: room.clone(),
            };
            warn!(%error, "healed registry entry");
        }

        Some(room)
    }
}

/// Room membership for every live connection.
///
/// Cloning is cheap and every clone sees the same state. All reads and
/// writes are serialized by one lock, which is never held across an await.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Rooms>>,
}

impl Registry {
    pub fn new(prune_empty_rooms: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Rooms {
                prune_empty: prune_empty_rooms,
                ..Default::default()
            })),
        }
    }

    // Every mutation leaves `Rooms` consistent before it can panic, so a
    // poisoned lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, Rooms> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        self.lock().members.insert(
            id,
            Member {
                outbox,
                session: Session::default(),
            },
        );
        debug!(connection = %id, "registered");
        id
    }

    /// Moves `id` into `room`, leaving its previous room first.
    pub fn join(&self, id: ConnectionId, room: &str) -> RelayResult<()> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(member) = state.members.get(&id) else {
            return Err(RelayError::UnknownConnection(id));
        };

        if member.session.room.as_deref() == Some(room)
            && state.rooms.get(room).is_some_and(|m| m.contains(&id))
        {
            return Ok(());
        }

        if let Some(previous) = state.detach(id) {
            debug!(connection = %id, room = %previous, "left room");
        }

        state.rooms.entry(room.to_owned()).or_default().insert(id);
        if let Some(member) = state.members.get_mut(&id) {
            member.session.room = Some(room.to_owned());
        }
        debug!(connection = %id, room = %room, "joined room");

        Ok(())
    }

    /// Removes `id` from its current room, if it has one.
    pub fn leave(&self, id: ConnectionId) -> Option<String> {
        let room = self.lock().detach(id);
        if let Some(room) = &room {
            debug!(connection = %id, room = %room, "left room");
        }
        room
    }

    /// Close notification from the transport: leaves the room and forgets
    /// the connection. Returns whether the connection was known.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut state = self.lock();
        state.detach(id);
        let known = state.members.remove(&id).is_some();
        debug!(connection = %id, known, "disconnected");
        known
    }

    pub fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        self.lock()
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn session(&self, id: ConnectionId) -> Option<Session> {
        self.lock().members.get(&id).map(|m| m.session.clone())
    }

    pub fn set_user(&self, id: ConnectionId, user: String) -> RelayResult<()> {
        let mut state = self.lock();
        let member = state
            .members
            .get_mut(&id)
            .ok_or(RelayError::UnknownConnection(id))?;
        member.session.user = Some(user);
        Ok(())
    }

    pub fn send_to(&self, id: ConnectionId, payload: String) -> RelayResult<()> {
        let state = self.lock();
        let member = state
            .members
            .get(&id)
            .ok_or(RelayError::UnknownConnection(id))?;
        member
            .outbox
            .send(payload)
            .map_err(|_| RelayError::ChannelClosed(id))
    }

    /// Enqueues `payload` for every member of `room`.
    ///
    /// The whole loop runs under the lock so all recipients observe payloads
    /// for a room in the same order. Enqueueing never waits on a socket.
    pub fn fan_out(&self, room: &str, payload: &str) -> FanOut {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut report = FanOut::default();
        let Some(members) = state.rooms.get_mut(room) else {
            return report;
        };

        let mut orphans = Vec::new();
        for &id in members.iter() {
            let Some(member) = state.members.get(&id) else {
                orphans.push(id);
                continue;
            };
            if member.outbox.send(payload.to_owned()).is_ok() {
                report.delivered += 1;
            } else {
                report.skipped += 1;
                let error = RelayError::ChannelClosed(id);
                trace!(%error, "skipped recipient");
            }
        }

        for id in orphans {
            members.remove(&id);
            let error = RelayError::RegistryInconsistency {
                connection: id,
                room: room.to_owned(),
            };
            warn!(%error, "dropped orphaned member");
        }
        if state.prune_empty && members.is_empty() {
            state.rooms.remove(room);
        }

        report
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().members.len()
    }
}
