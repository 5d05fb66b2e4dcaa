// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The manager: owns the resource table, the worker set, the SID allocator,
and the Discovery/Enumeration/Access/Release handlers. Also services the
local Control verbs (Shutdown/Start/Stop/List) used by operations
tooling against the daemon process itself.
*/

use std::collections::HashMap;

use log::{debug, info, warn};
use uuid::Uuid;
use vita49::{Command, CommandResult, Control, ControlPayload, ListItem, Request};

use crate::errors::AgentError;
use crate::resource::ResourceTable;
use crate::worker::{Worker, WorkerHandle, WorkerState};

/// SID `0` is reserved for the manager itself and never assigned to a
/// worker.
const FIRST_SID: u32 = 1;

/// The daemon-side component that owns the worker set and services
/// Discovery/Enumeration/Access/Release. One instance per daemon
/// process, held inside the shared `DaemonContext`.
pub struct Manager {
    resources: ResourceTable,
    workers: HashMap<u32, Worker>,
    next_sid: u32,
}

impl Manager {
    /// Builds a manager over an already-loaded resource table, with an
    /// empty worker set and the SID allocator starting at 1.
    pub fn new(resources: ResourceTable) -> Manager {
        Manager {
            resources,
            workers: HashMap::new(),
            next_sid: FIRST_SID,
        }
    }

    /// The loaded resource table.
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Looks up a worker by its assigned Stream ID.
    pub fn worker(&self, sid: u32) -> Option<&Worker> {
        self.workers.get(&sid)
    }

    /// Looks up a worker by its assigned Stream ID, mutably.
    pub fn worker_mut(&mut self, sid: u32) -> Option<&mut Worker> {
        self.workers.get_mut(&sid)
    }

    /// Number of workers currently held.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Handles a Discovery request. The RID list, when present, filters
    /// the response to only the named resources (Resolved Open Question
    /// (a): the CID is always echoed back, but authenticates nothing at
    /// Discovery time). Result is `InvalidArg` only if a filter entry
    /// names no known resource.
    pub fn discovery(&self, request: &Command) -> Command {
        let mut response = Command::new_result(Request::Discovery, CommandResult::Success);
        response.set_client_id(request.client_id());

        let ids: Vec<Uuid> = match request.resource_id_list() {
            Some(filter) => {
                let mut ids = Vec::with_capacity(filter.len());
                for rid in filter {
                    if self.resources.by_uuid(*rid).is_none() {
                        response.set_result(CommandResult::InvalidArg);
                        return response;
                    }
                    ids.push(*rid);
                }
                ids
            }
            None => self.resources.iter().map(|r| r.uuid()).collect(),
        };
        response.set_resource_id_list(Some(ids));
        response
    }

    /// Handles an Enumeration request. Matches each entry in the request's
    /// RID list by UUID first, then falls back to the entry's ASCII
    /// representation as a resource name (mirroring the tool-side helper
    /// that retries as a name when a command-line argument doesn't parse
    /// as a UUID). Absent a RID list, every table entry is returned.
    pub fn enumeration(&self, request: &Command) -> Command {
        let mut response = Command::new_result(Request::Enumeration, CommandResult::Success);
        response.set_client_id(request.client_id());

        let descriptors = match request.resource_id_list() {
            Some(rids) => {
                let mut found = Vec::with_capacity(rids.len());
                for rid in rids {
                    match self
                        .resources
                        .by_uuid(*rid)
                        .or_else(|| self.resources.by_name(&rid.to_string()))
                    {
                        Some(desc) => found.push(desc.clone()),
                        None => {
                            response.set_result(CommandResult::NotFound);
                            return response;
                        }
                    }
                }
                found
            }
            None => self.resources.iter().cloned().collect(),
        };
        response.set_resource_info_list(Some(descriptors));
        response
    }

    /// Handles an Access request: must carry a CID and a RID list with
    /// exactly one UUID. On success, allocates a SID, creates a worker
    /// bound to that resource (direction taken from the resource's own
    /// access bits), and replies with `StreamIdAssignment` set. The new
    /// SID is inserted into the worker set only after the `Worker` value
    /// is fully built, so it never becomes visible to a concurrent
    /// Access request half-initialized.
    pub fn access(&mut self, request: &Command) -> Command {
        let mut response = Command::new_result(Request::Access, CommandResult::Success);
        response.set_client_id(request.client_id());

        let client_id = match request.client_id() {
            Some(cid) => cid,
            None => {
                response.set_result(CommandResult::InvalidArg);
                return response;
            }
        };
        let rid = match request.resource_id_list() {
            Some([single]) => *single,
            _ => {
                response.set_result(CommandResult::InvalidArg);
                return response;
            }
        };
        let resource = match self.resources.by_uuid(rid) {
            Some(resource) => resource.clone(),
            None => {
                response.set_result(CommandResult::NotFound);
                return response;
            }
        };
        if self
            .workers
            .values()
            .any(|w| w.resource().uuid() == rid && w.state() != WorkerState::Released)
        {
            response.set_result(CommandResult::AccessDenied);
            return response;
        }

        let sid = self.next_sid;
        let direction = resource.access();
        let worker = Worker::new(sid, client_id, resource, direction);
        self.next_sid += 1;
        self.workers.insert(sid, worker);
        info!("access: sid {sid} assigned to client {client_id}");

        response.set_stream_id_assignment(Some(sid));
        response
    }

    /// Handles a Release request: must carry the target SID. Authorizes
    /// by CID match, tears the worker down, and removes it from the
    /// worker set. The freed SID is never reassigned (the allocator is
    /// monotonic for the daemon's lifetime) so cardinality after a
    /// matching Access/Release pair returns to its prior value without
    /// reusing identifiers.
    pub fn release(&mut self, request: &Command) -> Result<Command, AgentError> {
        let sid = request
            .stream_id_assignment()
            .ok_or(AgentError::InvalidArg("Release requires a Stream ID"))?;
        let client_id = request
            .client_id()
            .ok_or(AgentError::InvalidArg("Release requires a Client ID"))?;

        let worker = self
            .workers
            .get_mut(&sid)
            .ok_or(AgentError::UnknownStreamId(sid))?;
        if worker.client_id() != client_id {
            return Err(AgentError::NotOwner(sid));
        }
        worker.terminate();
        self.workers.remove(&sid);
        debug!("release: sid {sid} torn down");

        let mut response = Command::new_result(Request::Release, CommandResult::Success);
        response.set_client_id(Some(client_id));
        response.set_stream_id_assignment(Some(sid));
        Ok(response)
    }

    /// Handles a local Control verb targeting the daemon process itself.
    /// `Start`/`Stop` act on the named worker's running state directly
    /// (bypassing the Command-role state machine in `worker`, matching
    /// the original's local-control shortcut); neither touches the
    /// pipeline binding, so no `IoctlTarget` is needed here unlike the
    /// dispatcher's Open/Close path. `List` walks the worker set;
    /// `Shutdown` is reported to the caller, who drives the actual
    /// poll-loop teardown.
    pub fn handle_control(&mut self, control: &Control) -> Control {
        match control.payload() {
            ControlPayload::Shutdown => Control::new_shutdown(),
            ControlPayload::Start { sid, .. } => match self.workers.get_mut(sid) {
                Some(worker) => match worker.start() {
                    Ok(_) => Control::new_start(*sid, 0),
                    Err(e) => Control::new_start(*sid, e.to_command_result() as u8),
                },
                None => {
                    warn!("control start: unknown sid {sid}");
                    Control::new_start(*sid, CommandResult::NotFound as u8)
                }
            },
            ControlPayload::Stop { sid, .. } => match self.workers.get_mut(sid) {
                Some(worker) => {
                    let header = vita49::CommonHeader::new(vita49::PacketType::Command);
                    match worker.stop(&header, Some(vita49::TimestampInterpretation::Relative)) {
                        Ok(_) => Control::new_stop(*sid, 0),
                        Err(e) => Control::new_stop(*sid, e.to_command_result() as u8),
                    }
                }
                None => {
                    warn!("control stop: unknown sid {sid}");
                    Control::new_stop(*sid, CommandResult::NotFound as u8)
                }
            },
            ControlPayload::List { .. } => {
                let mut items: Vec<ListItem> =
                    self.workers.keys().map(|sid| ListItem { sid: *sid }).collect();
                items.sort_by_key(|item| item.sid);
                Control::new_list(items)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceTableBuilder;
    use vita49::AccessBits;

    fn descriptor(name: &str, access: AccessBits) -> vita49::ResourceDescriptor {
        vita49::ResourceDescriptor::new(Uuid::new_v4(), name, 1, 1, 61.44, 64, 4096, access, None)
            .unwrap()
    }

    fn two_resource_manager() -> (Manager, Uuid, Uuid) {
        let r1 = descriptor("radio0", AccessBits::TX);
        let r2 = descriptor("radio1", AccessBits::RX);
        let (u1, u2) = (r1.uuid(), r2.uuid());
        let table = ResourceTableBuilder::new().insert(r1).insert(r2).build();
        (Manager::new(table), u1, u2)
    }

    #[test]
    fn discovery_round_trip_with_no_filter() {
        let (manager, u1, u2) = two_resource_manager();
        let cid = Uuid::new_v4();
        let mut req = Command::new_request(Request::Discovery);
        req.set_client_id(Some(cid));
        let resp = manager.discovery(&req);
        assert_eq!(resp.result(), CommandResult::Success);
        assert_eq!(resp.client_id(), Some(cid));
        let mut ids = resp.resource_id_list().unwrap().to_vec();
        ids.sort();
        let mut expected = vec![u1, u2];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn access_then_double_access_denied_then_release_frees_sid() {
        let (mut manager, u1, _u2) = two_resource_manager();
        let c1 = Uuid::new_v4();
        let mut req1 = Command::new_request(Request::Access);
        req1.set_client_id(Some(c1));
        req1.set_resource_id_list(Some(vec![u1]));
        let resp1 = manager.access(&req1);
        assert_eq!(resp1.result(), CommandResult::Success);
        assert_eq!(resp1.stream_id_assignment(), Some(1));

        let c2 = Uuid::new_v4();
        let mut req2 = Command::new_request(Request::Access);
        req2.set_client_id(Some(c2));
        req2.set_resource_id_list(Some(vec![u1]));
        let resp2 = manager.access(&req2);
        assert_eq!(resp2.result(), CommandResult::AccessDenied);

        let mut release_req = Command::new_request(Request::Release);
        release_req.set_client_id(Some(c1));
        release_req.set_stream_id_assignment(Some(1));
        let release_resp = manager.release(&release_req).unwrap();
        assert_eq!(release_resp.result(), CommandResult::Success);
        assert_eq!(manager.worker_count(), 0);

        let resp3 = manager.access(&req2);
        assert_eq!(resp3.result(), CommandResult::Success);
        assert_eq!(resp3.stream_id_assignment(), Some(2));
    }

    #[test]
    fn release_by_non_owner_is_rejected() {
        let (mut manager, u1, _u2) = two_resource_manager();
        let owner = Uuid::new_v4();
        let mut req = Command::new_request(Request::Access);
        req.set_client_id(Some(owner));
        req.set_resource_id_list(Some(vec![u1]));
        manager.access(&req);

        let mut release_req = Command::new_request(Request::Release);
        release_req.set_client_id(Some(Uuid::new_v4()));
        release_req.set_stream_id_assignment(Some(1));
        assert!(matches!(
            manager.release(&release_req),
            Err(AgentError::NotOwner(1))
        ));
    }

    #[test]
    fn local_control_list_reflects_worker_set() {
        let (mut manager, u1, _u2) = two_resource_manager();
        let mut req = Command::new_request(Request::Access);
        req.set_client_id(Some(Uuid::new_v4()));
        req.set_resource_id_list(Some(vec![u1]));
        manager.access(&req);

        let reply = manager.handle_control(&Control::new_list(vec![]));
        match reply.payload() {
            ControlPayload::List { items } => assert_eq!(items, &vec![ListItem { sid: 1 }]),
            _ => panic!("wrong payload"),
        }
    }
}
