// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The daemon's message dispatcher: `southbound` routes an inbound frame
from a tool to the manager or the owning worker; `northbound` routes an
outbound frame from a worker back to one or every connected control
client.
*/

use log::{debug, error, warn};
use uuid::Uuid;
use vita49::{Command, Control, Packet, Request};

use crate::context::DaemonContext;
use crate::errors::AgentError;
use crate::worker::IoctlTarget;

/// Handles one inbound frame already read off a control client's
/// channel. Control packets route to the manager's local-control
/// handler. Discovery/Enumeration/Access/Release always go to the
/// manager regardless of any Stream ID they carry, since the manager
/// owns the worker set and tears a worker down itself on Release. Every
/// other Command request, and every Context packet, is routed to the
/// worker owning its Stream ID; an unmatched SID is dropped with a
/// logged error, not surfaced as a fatal condition.
pub fn southbound(
    ctx: &mut DaemonContext,
    ioctl_target: &mut dyn IoctlTarget,
    frame: &[u8],
) -> Result<Option<Vec<u8>>, AgentError> {
    let packet = Packet::parse(frame)?;
    match packet {
        Packet::Control(control) => {
            let reply = ctx.manager.handle_control(&control);
            Ok(Some(reply.format()?))
        }
        Packet::Command { header, command, .. } => {
            let request = command.request();
            if matches!(
                request,
                Request::Discovery | Request::Enumeration | Request::Access
            ) {
                let response = match request {
                    Request::Discovery => ctx.manager.discovery(&command),
                    Request::Enumeration => ctx.manager.enumeration(&command),
                    Request::Access => ctx.manager.access(&command),
                    _ => unreachable!(),
                };
                return Ok(Some(Packet::new_command(response).format()?));
            }

            if request == Request::Release {
                // `Manager::release` already tears the worker down and removes
                // it from the worker set (it is the fall-through target, not a
                // second independent handler to invoke). A failure still owes
                // the client a Result-role reply, not a dropped connection.
                let response = match ctx.manager.release(&command) {
                    Ok(response) => response,
                    Err(e) => {
                        let mut response = Command::new_result(request, e.to_command_result());
                        response.set_client_id(command.client_id());
                        response.set_stream_id_assignment(command.stream_id_assignment());
                        response
                    }
                };
                return Ok(Some(Packet::new_command(response).format()?));
            }

            let sid = header.stream_id();
            match ctx.manager.worker_mut(sid) {
                Some(worker) => {
                    let response = match crate::worker::handle(worker, &header, &command, ioctl_target)
                    {
                        Ok(response) => response,
                        Err(e) => {
                            let mut response = Command::new_result(request, e.to_command_result());
                            response.set_client_id(command.client_id());
                            response.set_stream_id_assignment(Some(sid));
                            response
                        }
                    };
                    Ok(Some(Packet::new_command(response).format()?))
                }
                None => {
                    error!("southbound: no worker for sid {sid}, dropping {request:?}");
                    Ok(None)
                }
            }
        }
        Packet::Context { header, .. } => {
            let sid = header.stream_id();
            if ctx.manager.worker(sid).is_none() {
                warn!("southbound: context packet for unknown sid {sid} dropped");
            } else {
                debug!("southbound: context packet for sid {sid} noted, no worker handler yet");
            }
            Ok(None)
        }
    }
}

/// Delivers an outbound frame from a worker northbound: unicast to
/// `destination` if the control-client set still holds a channel for
/// it, otherwise clone the frame and broadcast to every connected
/// client.
pub fn northbound(ctx: &mut DaemonContext, destination: Option<Uuid>, frame: Vec<u8>) {
    match destination.and_then(|cid| ctx.control_client_mut(cid)) {
        Some(client) => {
            if let Err(e) = client.channel.enqueue(frame) {
                warn!("northbound: unicast enqueue failed: {e}");
            }
        }
        None => {
            for client in ctx.control_clients_mut() {
                if let Err(e) = client.channel.enqueue(frame.clone()) {
                    warn!("northbound: broadcast enqueue failed for a client: {e}");
                }
            }
        }
    }
}

/// Builds a Control-verb acknowledgement-free shutdown frame, used by
/// the daemon binary's own teardown path to self-address a `Shutdown`
/// verb into its own southbound handler.
pub fn shutdown_frame() -> Result<Vec<u8>, AgentError> {
    Ok(Control::new_shutdown().format()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceTableBuilder;
    use crate::worker::NullIoctlTarget;
    use vita49::{AccessBits, Command, CommandResult, ResourceDescriptor};

    fn context_with_one_resource() -> (DaemonContext, Uuid) {
        let resource =
            ResourceDescriptor::new(Uuid::new_v4(), "radio0", 1, 1, 61.44, 64, 4096, AccessBits::TX, None)
                .unwrap();
        let uuid = resource.uuid();
        let table = ResourceTableBuilder::new().insert(resource).build();
        (DaemonContext::new(table), uuid)
    }

    #[test]
    fn southbound_routes_discovery_to_manager() {
        let (mut ctx, uuid) = context_with_one_resource();
        let mut target = NullIoctlTarget;
        let mut req = Command::new_request(Request::Discovery);
        req.set_client_id(Some(Uuid::new_v4()));
        let frame = Packet::new_command(req).format().unwrap();

        let reply_frame = southbound(&mut ctx, &mut target, &frame).unwrap().unwrap();
        match Packet::parse(&reply_frame).unwrap() {
            Packet::Command { command, .. } => {
                assert_eq!(command.result(), CommandResult::Success);
                assert_eq!(command.resource_id_list(), Some(&[uuid][..]));
            }
            _ => panic!("expected a Command packet"),
        }
    }

    #[test]
    fn southbound_drops_request_for_unknown_sid() {
        let (mut ctx, _uuid) = context_with_one_resource();
        let mut target = NullIoctlTarget;
        let mut req = Command::new_request(Request::Configure);
        req.set_event_period(Some(1024));
        let mut packet = Packet::new_command(req);
        packet.set_stream_id(99);
        let frame = packet.format().unwrap();

        let reply = southbound(&mut ctx, &mut target, &frame).unwrap();
        assert!(reply.is_none());
    }
}
