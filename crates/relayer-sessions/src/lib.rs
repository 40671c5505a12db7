// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]

//! # Relayer Sessions Module
//!
//! The registry of live client sessions: their declared identity, their
//! role-room membership, the address routing table for the multiplexed
//! ledger subscription, and the event fan-out.
//!
//! ## Overview
//!
//! One registry instance is shared across all connection-handling tasks.
//! Every mutation is an in-memory map update under a [`parking_lot::RwLock`]
//! and never suspends; broadcasts take read locks only, so unrelated
//! sessions can join and leave while a fan-out is scanning room members.
//!
//! Instead of one ledger listener per registered client, all sessions share
//! a single multiplexed watcher and the registry routes decoded events to
//! the interested sessions by normalized address.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use aegis_relayer_types::{EthAddress, UserRole};

/// Outbound event channel capacity per session.
///
/// Delivery is fire-and-forget: a session that cannot drain 50 pending
/// events loses the overflow rather than back-pressuring the relay.
const EVENT_CHANNEL_CAPACITY: usize = 50;

/// Identifier of one live client connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The target scope of one fan-out.
///
/// The reference system expressed rooms implicitly through library sugar;
/// here the scope is an explicit part of the broadcaster's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Deliver to a single session.
    Session(SessionId),
    /// Deliver to every session in a role room.
    Room(UserRole),
    /// Deliver to every connected session.
    All,
}

#[derive(Debug)]
struct SessionEntry<E> {
    sender: mpsc::Sender<E>,
    address: Option<EthAddress>,
    role: Option<UserRole>,
}

/// The shared registry of live sessions.
///
/// Generic over the event type `E` that is fanned out to sessions, so the
/// registry does not depend on the wire protocol.
#[derive(Debug)]
pub struct SessionRegistry<E> {
    sessions: RwLock<HashMap<SessionId, SessionEntry<E>>>,
    rooms: RwLock<HashMap<UserRole, HashSet<SessionId>>>,
    routes: RwLock<HashMap<EthAddress, HashSet<SessionId>>>,
}

impl<E> Default for SessionRegistry<E> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Clone> SessionRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new session for a freshly accepted connection.
    ///
    /// Returns the session id and the receiving half of the session's
    /// outbound event channel. The connection task forwards events from
    /// the receiver into its socket; when the session is disconnected the
    /// sender is dropped and the receiver runs dry.
    pub fn connect(&self) -> (SessionId, mpsc::Receiver<E>) {
        let id = SessionId::new();
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.sessions.write().insert(
            id,
            SessionEntry {
                sender,
                address: None,
                role: None,
            },
        );
        tracing::debug!(session = %id, "session connected");
        (id, receiver)
    }

    /// Sets the declared identity of a session.
    ///
    /// Registration is idempotent per session: a repeated call overwrites
    /// the address and role, atomically moving the session's routing entry
    /// and room membership so the old listener registration cannot leak.
    ///
    /// Returns `false` if the session is not (or no longer) connected.
    pub fn register(
        &self,
        id: SessionId,
        address: EthAddress,
        role: UserRole,
    ) -> bool {
        let (old_address, old_role) = {
            let mut sessions = self.sessions.write();
            let Some(entry) = sessions.get_mut(&id) else {
                return false;
            };
            let old = (entry.address, entry.role);
            entry.address = Some(address);
            entry.role = Some(role);
            old
        };
        {
            let mut rooms = self.rooms.write();
            if let Some(old_role) = old_role {
                if let Some(members) = rooms.get_mut(&old_role) {
                    members.remove(&id);
                }
            }
            rooms.entry(role).or_default().insert(id);
        }
        {
            let mut routes = self.routes.write();
            if let Some(old_address) = old_address {
                if let Some(members) = routes.get_mut(&old_address) {
                    members.remove(&id);
                    if members.is_empty() {
                        routes.remove(&old_address);
                    }
                }
            }
            routes.entry(address).or_default().insert(id);
        }
        tracing::debug!(session = %id, %address, %role, "session registered");
        true
    }

    /// Tears a session down.
    ///
    /// Synchronously removes the session from its room and from the address
    /// routing table and drops its event sender before returning, so no
    /// event emitted after this call can reach the dead connection.
    ///
    /// Safe to call more than once.
    pub fn disconnect(&self, id: SessionId) {
        let Some(entry) = self.sessions.write().remove(&id) else {
            return;
        };
        if let Some(role) = entry.role {
            let mut rooms = self.rooms.write();
            if let Some(members) = rooms.get_mut(&role) {
                members.remove(&id);
            }
        }
        if let Some(address) = entry.address {
            let mut routes = self.routes.write();
            if let Some(members) = routes.get_mut(&address) {
                members.remove(&id);
                if members.is_empty() {
                    routes.remove(&address);
                }
            }
        }
        tracing::debug!(session = %id, "session disconnected");
    }

    /// The sessions currently routed for a normalized address.
    pub fn sessions_for_address(
        &self,
        address: &EthAddress,
    ) -> Vec<SessionId> {
        self.routes
            .read()
            .get(address)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of currently connected sessions.
    pub fn connection_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Fans an event out to every live session in `scope`.
    ///
    /// Fire-and-forget: sessions that disconnect concurrently with the
    /// delivery, or whose outbound channel is full, simply do not receive
    /// the event; no error surfaces to the emitter. Returns the number of
    /// sessions the event was handed to.
    pub fn broadcast(&self, scope: BroadcastScope, event: E) -> usize {
        match scope {
            BroadcastScope::Session(id) => {
                let sessions = self.sessions.read();
                sessions
                    .get(&id)
                    .map_or(0, |entry| deliver(id, entry, event))
            }
            BroadcastScope::Room(role) => {
                let members: Vec<SessionId> = self
                    .rooms
                    .read()
                    .get(&role)
                    .map(|members| members.iter().copied().collect())
                    .unwrap_or_default();
                let sessions = self.sessions.read();
                members
                    .into_iter()
                    .filter_map(|id| {
                        sessions
                            .get(&id)
                            .map(|entry| deliver(id, entry, event.clone()))
                    })
                    .sum()
            }
            BroadcastScope::All => {
                let sessions = self.sessions.read();
                sessions
                    .iter()
                    .map(|(id, entry)| deliver(*id, entry, event.clone()))
                    .sum()
            }
        }
    }
}

fn deliver<E>(id: SessionId, entry: &SessionEntry<E>, event: E) -> usize {
    match entry.sender.try_send(event) {
        Ok(()) => 1,
        Err(e) => {
            // Slow or concurrently closing session; the event is dropped.
            tracing::trace!(session = %id, "event not delivered: {}", e);
            0
        }
    }
}
