// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based round-trip coverage for the wire codec: `parse(format(p))
//! == p` for well-formed packets, and `format(parse(b))` reproduces `b`
//! exactly whenever `parse(b)` succeeds, for arbitrary byte buffers.

use proptest::prelude::*;
use uuid::Uuid;
use vita49::{
    AccessBits, Command, CommandResult, Context, Packet, Request, ResourceDescriptor,
    TimestampInterpretation,
};

fn request_strategy() -> impl Strategy<Value = Request> {
    prop_oneof![
        Just(Request::Discovery),
        Just(Request::Enumeration),
        Just(Request::Access),
        Just(Request::Open),
        Just(Request::Configure),
        Just(Request::Start),
        Just(Request::Stop),
        Just(Request::Close),
        Just(Request::Release),
        Just(Request::ContextReport),
        Just(Request::TimestampControl),
    ]
}

fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn command_strategy() -> impl Strategy<Value = Command> {
    (
        request_strategy(),
        proptest::option::of(uuid_strategy()),
        proptest::option::of(any::<u32>()),
        proptest::option::of(proptest::collection::vec(uuid_strategy(), 0..4)),
        proptest::option::of(any::<u32>()),
        proptest::option::of(any::<u32>()),
    )
        .prop_map(|(request, client_id, priority, rids, sid, event_period)| {
            let mut command = Command::new_request(request);
            command.set_client_id(client_id);
            command.set_priority(priority);
            command.set_resource_id_list(rids);
            command.set_stream_id_assignment(sid);
            command.set_event_period(event_period);
            command.set_timestamp_interpretation(Some(TimestampInterpretation::Relative));
            command
        })
}

fn assert_commands_equal(a: &Command, b: &Command) {
    assert_eq!(a.role(), b.role());
    assert_eq!(a.request(), b.request());
    assert_eq!(a.client_id(), b.client_id());
    assert_eq!(a.priority(), b.priority());
    assert_eq!(a.resource_id_list(), b.resource_id_list());
    assert_eq!(a.stream_id_assignment(), b.stream_id_assignment());
    assert_eq!(a.event_period(), b.event_period());
    assert_eq!(a.timestamp_interpretation(), b.timestamp_interpretation());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn command_packet_round_trips(command in command_strategy(), stream_id in any::<u32>()) {
        let mut packet = Packet::new_command(command.clone());
        packet.set_stream_id(stream_id);
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        match back {
            Packet::Command { command: parsed, .. } => assert_commands_equal(&command, &parsed),
            _ => panic!("expected a Command packet"),
        }
    }

    #[test]
    fn context_bandwidth_round_trips(bandwidth_hz in any::<u64>(), stream_id in any::<u32>()) {
        let mut ctx = Context::new();
        ctx.set_bandwidth_hz(Some(bandwidth_hz));
        let mut packet = Packet::new_context(ctx);
        packet.set_stream_id(stream_id);
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        match back {
            Packet::Context { context, .. } => {
                assert_eq!(context.bandwidth_hz(), Some(bandwidth_hz));
            }
            _ => panic!("expected a Context packet"),
        }
    }

    #[test]
    fn arbitrary_bytes_either_reject_or_round_trip(buf in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(packet) = Packet::parse(&buf) {
            let reformatted = packet.format().unwrap();
            prop_assert_eq!(reformatted, buf);
        }
    }

    #[test]
    fn paginated_access_list_reassembles(n in 1usize..64, mtu in 400usize..2048) {
        let mut command = Command::new_result(Request::Enumeration, CommandResult::Success);
        command.set_client_id(Some(Uuid::new_v4()));
        let entries: Vec<_> = (0..n)
            .map(|i| {
                ResourceDescriptor::new(
                    Uuid::new_v4(),
                    &format!("r{i}"),
                    1,
                    1,
                    10.0,
                    64,
                    1024,
                    AccessBits::empty(),
                    None,
                )
                .unwrap()
            })
            .collect();
        command.set_resource_info_list(Some(entries.clone()));
        let mut packet = Packet::new_command(command);
        packet.set_stream_id(0);

        let frames = packet.format_paginated(mtu).unwrap();
        let reassembled = Packet::reassemble(&frames).unwrap();
        match reassembled {
            Packet::Command { command, .. } => {
                prop_assert_eq!(command.resource_info_list().unwrap().len(), entries.len());
                prop_assert!(!command.paging());
            }
            _ => prop_assert!(false, "expected a Command packet"),
        }
    }
}
