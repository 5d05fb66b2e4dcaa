// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The daemon context: the explicit value carrying every piece of
process-wide state the original implementation kept as global
singletons (current-resource-list, current-worker-list,
current-channel). One instance is built at daemon startup and threaded
through every southbound/northbound call.
*/

use std::collections::HashMap;

use uuid::Uuid;

use crate::channel::Channel;
use crate::manager::Manager;
use crate::resource::ResourceTable;

/// A connected tool, holding its channel. Lifetime matches the
/// connection.
pub struct ControlClient {
    /// The client's channel instance.
    pub channel: Box<dyn Channel>,
}

impl ControlClient {
    /// Wraps a connected channel as a new control client.
    pub fn new(channel: Box<dyn Channel>) -> ControlClient {
        ControlClient { channel }
    }
}

/// Process-wide daemon state: the manager (resource table, worker set,
/// SID allocator) and the set of connected control clients, keyed by
/// the CID the client announced on its first request. A worker's
/// recorded destination (`Worker::destination`) is that same CID, so
/// northbound unicast looks a client up by the identifier a tool chose
/// for itself, matching spec.md's "Client Identifier (CID): 16-byte
/// UUID chosen by the tool".
pub struct DaemonContext {
    /// Owns resource discovery/enumeration/access/release and the
    /// worker set.
    pub manager: Manager,
    control_clients: HashMap<Uuid, ControlClient>,
}

impl DaemonContext {
    /// Builds a fresh context over an already-loaded resource table, with
    /// no control clients connected yet.
    pub fn new(resources: ResourceTable) -> DaemonContext {
        DaemonContext {
            manager: Manager::new(resources),
            control_clients: HashMap::new(),
        }
    }

    /// Registers a newly connected control client under its announced
    /// CID. A later registration under the same CID replaces the
    /// earlier one (the original connection is assumed already closed).
    pub fn add_control_client(&mut self, cid: Uuid, client: ControlClient) {
        self.control_clients.insert(cid, client);
    }

    /// Removes a disconnected control client, closing its channel.
    pub fn remove_control_client(&mut self, cid: Uuid) {
        if let Some(mut client) = self.control_clients.remove(&cid) {
            client.channel.close();
        }
    }

    /// Looks up a connected control client by CID, mutably.
    pub fn control_client_mut(&mut self, cid: Uuid) -> Option<&mut ControlClient> {
        self.control_clients.get_mut(&cid)
    }

    /// Iterates every connected control client, mutably, for broadcast
    /// delivery.
    pub fn control_clients_mut(&mut self) -> impl Iterator<Item = &mut ControlClient> {
        self.control_clients.values_mut()
    }

    /// Number of currently connected control clients.
    pub fn control_client_count(&self) -> usize {
        self.control_clients.len()
    }
}
