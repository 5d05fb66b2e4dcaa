// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end coverage of the six concrete control-plane scenarios,
//! wiring a `DaemonContext` directly to southbound dispatch without a
//! real socket (a `LoopbackChannel` stands in for the transport).

use uuid::Uuid;
use v49_agent::worker::NullIoctlTarget;
use v49_agent::{DaemonContext, ResourceTableBuilder};
use vita49::{
    AccessBits, Command, CommandResult, Packet, Request, ResourceDescriptor,
    TimestampInterpretation,
};

fn two_resource_context() -> (DaemonContext, Uuid, Uuid) {
    let r1 = ResourceDescriptor::new(Uuid::new_v4(), "radio0", 1, 1, 61.44, 64, 4096, AccessBits::TX, None)
        .unwrap();
    let r2 = ResourceDescriptor::new(Uuid::new_v4(), "radio1", 1, 1, 61.44, 64, 4096, AccessBits::RX, None)
        .unwrap();
    let (u1, u2) = (r1.uuid(), r2.uuid());
    let table = ResourceTableBuilder::new().insert(r1).insert(r2).build();
    (DaemonContext::new(table), u1, u2)
}

fn send(ctx: &mut DaemonContext, command: Command) -> Command {
    let frame = Packet::new_command(command).format().unwrap();
    let reply_frame = v49_agent::dispatch::southbound(ctx, &mut NullIoctlTarget, &frame)
        .unwrap()
        .expect("a reply frame");
    match Packet::parse(&reply_frame).unwrap() {
        Packet::Command { command, .. } => command,
        _ => panic!("expected a Command reply"),
    }
}

#[test]
fn scenario_1_discovery_round_trip() {
    let (mut ctx, u1, u2) = two_resource_context();
    let cid = Uuid::parse_str("4cb6f860-107e-42b3-a2bc-cda24cff1b73").unwrap();
    let mut req = Command::new_request(Request::Discovery);
    req.set_client_id(Some(cid));

    let resp = send(&mut ctx, req);
    assert_eq!(resp.role(), vita49::Role::Result);
    assert_eq!(resp.request(), Request::Discovery);
    assert_eq!(resp.client_id(), Some(cid));
    assert_eq!(resp.result(), CommandResult::Success);
    let mut ids = resp.resource_id_list().unwrap().to_vec();
    ids.sort();
    let mut expected = vec![u1, u2];
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn scenario_2_through_4_access_denied_release_sid_not_reused() {
    let (mut ctx, u1, _u2) = two_resource_context();
    let c1 = Uuid::new_v4();

    // 2. Access success.
    let mut access1 = Command::new_request(Request::Access);
    access1.set_client_id(Some(c1));
    access1.set_resource_id_list(Some(vec![u1]));
    let resp1 = send(&mut ctx, access1);
    assert_eq!(resp1.result(), CommandResult::Success);
    assert_eq!(resp1.stream_id_assignment(), Some(1));

    // 3. Access denied (double), by a different client.
    let c2 = Uuid::new_v4();
    let mut access2 = Command::new_request(Request::Access);
    access2.set_client_id(Some(c2));
    access2.set_resource_id_list(Some(vec![u1]));
    let resp2 = send(&mut ctx, access2.clone());
    assert_eq!(resp2.result(), CommandResult::AccessDenied);

    // 4. Release by the owner, then a fresh Access gets SID 2, not 1.
    let mut release = Command::new_request(Request::Release);
    release.set_client_id(Some(c1));
    release.set_stream_id_assignment(Some(1));
    let release_resp = send(&mut ctx, release);
    assert_eq!(release_resp.result(), CommandResult::Success);

    let resp3 = send(&mut ctx, access2);
    assert_eq!(resp3.result(), CommandResult::Success);
    assert_eq!(resp3.stream_id_assignment(), Some(2));
}

#[test]
fn scenario_5_stop_requires_relative_interpretation() {
    let (mut ctx, u1, _u2) = two_resource_context();
    let c1 = Uuid::new_v4();

    let mut access = Command::new_request(Request::Access);
    access.set_client_id(Some(c1));
    access.set_resource_id_list(Some(vec![u1]));
    let access_resp = send(&mut ctx, access);
    let sid = access_resp.stream_id_assignment().unwrap();

    let mut open = Command::new_request(Request::Open);
    open.set_client_id(Some(c1));
    let mut open_packet = Packet::new_command(open);
    open_packet.set_stream_id(sid);
    let open_frame = open_packet.format().unwrap();
    v49_agent::dispatch::southbound(&mut ctx, &mut NullIoctlTarget, &open_frame).unwrap();

    let mut configure = Command::new_request(Request::Configure);
    configure.set_client_id(Some(c1));
    configure.set_event_period(Some(1024));
    let mut configure_packet = Packet::new_command(configure);
    configure_packet.set_stream_id(sid);
    if let Packet::Command { header, .. } = &mut configure_packet {
        header.set_tsi(vita49::Tsi::None);
        header.set_tsf(vita49::Tsf::SampleCount);
    }
    let configure_frame = configure_packet.format().unwrap();
    v49_agent::dispatch::southbound(&mut ctx, &mut NullIoctlTarget, &configure_frame).unwrap();

    let mut start = Command::new_request(Request::Start);
    start.set_client_id(Some(c1));
    let mut start_packet = Packet::new_command(start);
    start_packet.set_stream_id(sid);
    let start_frame = start_packet.format().unwrap();
    v49_agent::dispatch::southbound(&mut ctx, &mut NullIoctlTarget, &start_frame).unwrap();

    let mut stop = Command::new_request(Request::Stop);
    stop.set_client_id(Some(c1));
    stop.set_timestamp_interpretation(Some(TimestampInterpretation::Absolute));
    let mut stop_packet = Packet::new_command(stop);
    stop_packet.set_stream_id(sid);
    let stop_frame = stop_packet.format().unwrap();
    let reply_frame = v49_agent::dispatch::southbound(&mut ctx, &mut NullIoctlTarget, &stop_frame)
        .unwrap()
        .unwrap();
    match Packet::parse(&reply_frame).unwrap() {
        Packet::Command { command, .. } => assert_eq!(command.result(), CommandResult::InvalidArg),
        _ => panic!("expected a Command reply"),
    }
}

#[test]
fn scenario_6_paginated_enumeration_reassembles_in_order() {
    let mut builder = ResourceTableBuilder::new();
    for i in 0..200 {
        builder = builder.insert(
            ResourceDescriptor::new(Uuid::new_v4(), &format!("r{i}"), 1, 1, 10.0, 64, 1024, AccessBits::empty(), None)
                .unwrap(),
        );
    }
    let mut ctx = DaemonContext::new(builder.build());

    let mut req = Command::new_request(Request::Enumeration);
    req.set_client_id(Some(Uuid::new_v4()));
    let frame = Packet::new_command(req).format().unwrap();
    let reply_frame = v49_agent::dispatch::southbound(&mut ctx, &mut NullIoctlTarget, &frame)
        .unwrap()
        .unwrap();

    let reply = match Packet::parse(&reply_frame).unwrap() {
        Packet::Command { command, .. } => command,
        _ => panic!("expected a Command reply"),
    };
    assert_eq!(reply.result(), CommandResult::Success);

    let mut reply_packet = Packet::new_command(reply);
    reply_packet.set_stream_id(0);
    let frames = reply_packet.format_paginated(700).unwrap();
    assert!(frames.len() >= 3);

    let reassembled = Packet::reassemble(&frames).unwrap();
    match reassembled {
        Packet::Command { command, .. } => {
            assert_eq!(command.resource_info_list().unwrap().len(), 200);
        }
        _ => panic!("expected a Command packet"),
    }
}
