// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The top-level `Packet` value and its wire parse/format/pagination
algorithm (spec section 4.1, "Packet codec").
*/

use deku::prelude::*;

use crate::class_id::ClassIdentifier;
use crate::command::Command;
use crate::context::Context;
use crate::control::Control;
use crate::errors::{Category, SubCode, VitaError};
use crate::header::{CommonHeader, PacketType};

/// Default maximum transmission unit, in bytes, a single wire frame may
/// occupy before pagination kicks in.
pub const DEFAULT_MTU: usize = 5120;
/// Bytes reserved at the head of every frame's budget for channel/stack
/// framing overhead, subtracted from the MTU before computing the body
/// budget available to a single fragment.
pub const HEAD_RESERVATION: usize = 256;

/// A fully parsed top-level packet: Command, Context, or local Control.
#[derive(Clone, Debug)]
pub enum Packet {
    /// A Command sub-packet, with its common header and optional class
    /// identifier.
    Command {
        header: CommonHeader,
        class_id: Option<ClassIdentifier>,
        command: Command,
    },
    /// A Context sub-packet, with its common header and optional class
    /// identifier.
    Context {
        header: CommonHeader,
        class_id: Option<ClassIdentifier>,
        context: Context,
    },
    /// A local Control packet. Never carries a common header or class
    /// identifier; recognized ahead of header decode by magic number.
    Control(Control),
}

impl Packet {
    /// Builds a Command packet with a fresh header and no class id.
    pub fn new_command(command: Command) -> Packet {
        Packet::Command {
            header: CommonHeader::new(PacketType::Command),
            class_id: None,
            command,
        }
    }

    /// Builds a Context packet with a fresh header and no class id.
    pub fn new_context(context: Context) -> Packet {
        Packet::Context {
            header: CommonHeader::new(PacketType::Context),
            class_id: None,
            context,
        }
    }

    /// Sets the stream id on a Command/Context packet's header. No-op on
    /// Control packets.
    pub fn set_stream_id(&mut self, sid: u32) {
        match self {
            Packet::Command { header, .. } | Packet::Context { header, .. } => {
                header.set_stream_id(sid)
            }
            Packet::Control(_) => {}
        }
    }

    /// Gets the stream id from a Command/Context packet's header.
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            Packet::Command { header, .. } | Packet::Context { header, .. } => {
                Some(header.stream_id())
            }
            Packet::Control(_) => None,
        }
    }

    /// Attaches the fixed class identifier to a Command/Context packet.
    pub fn set_class_id(&mut self, class_id: Option<ClassIdentifier>) {
        match self {
            Packet::Command {
                header, class_id: c, ..
            }
            | Packet::Context {
                header, class_id: c, ..
            } => {
                header.set_has_cid(class_id.is_some());
                *c = class_id;
            }
            Packet::Control(_) => {}
        }
    }

    /// Parses one wire frame: a Control packet if it begins with the
    /// Control magic, otherwise a Command or Context packet per the
    /// common header's `type` field.
    pub fn parse(buf: &[u8]) -> Result<Packet, VitaError> {
        if Control::has_magic(buf) {
            return Ok(Packet::Control(Control::parse(buf)?));
        }
        let short = || VitaError::parse(Category::Common, SubCode::ShortRead);
        if buf.len() < 8 {
            return Err(short());
        }
        let hword_1 = u16::from_be_bytes(buf[0..2].try_into().unwrap());
        let has_cid = hword_1 & (1 << 11) != 0;
        let tsi_present = (hword_1 >> 8) & 0b11 != 0;
        let tsf_present = (hword_1 >> 6) & 0b11 != 0;
        let mut header_len = 8;
        if tsi_present {
            header_len += 4;
        }
        if tsf_present {
            header_len += 8;
        }
        if buf.len() < header_len {
            return Err(short());
        }
        let header = CommonHeader::try_from(&buf[0..header_len])?;

        let bytes_on_wire = header.packet_size_words() as usize * 4;
        if bytes_on_wire != buf.len() {
            return Err(VitaError::parse(Category::Common, SubCode::BadSize));
        }

        let mut cursor = header_len;
        let class_id = if has_cid {
            const CID_LEN: usize = 8;
            if buf.len() < cursor + CID_LEN {
                return Err(short());
            }
            let cid = ClassIdentifier::try_from(&buf[cursor..cursor + CID_LEN])?;
            cid.validate()?;
            cursor += CID_LEN;
            Some(cid)
        } else {
            None
        };

        let body = &buf[cursor..];
        match header.packet_type()? {
            PacketType::Command => Ok(Packet::Command {
                header,
                class_id,
                command: Command::parse(body)?,
            }),
            PacketType::Context => Ok(Packet::Context {
                header,
                class_id,
                context: Context::parse(body)?,
            }),
        }
    }

    /// Formats this packet into a single wire frame, ignoring MTU. Use
    /// [`Packet::format_paginated`] when the body may exceed the MTU.
    pub fn format(&self) -> Result<Vec<u8>, VitaError> {
        match self {
            Packet::Control(c) => c.format(),
            Packet::Command {
                header,
                class_id,
                command,
            } => Self::assemble(header, class_id, &command.format()?),
            Packet::Context {
                header,
                class_id,
                context,
            } => Self::assemble(header, class_id, &context.format()?),
        }
    }

    /// Formats this packet, splitting a Command packet's body across
    /// multiple wire frames if it exceeds `mtu - HEAD_RESERVATION`.
    /// Context and Control packets are never paginated (neither carries
    /// a `Paging` indicator).
    pub fn format_paginated(&self, mtu: usize) -> Result<Vec<Vec<u8>>, VitaError> {
        match self {
            Packet::Control(_) | Packet::Context { .. } => Ok(vec![self.format()?]),
            Packet::Command {
                header,
                class_id,
                command,
            } => {
                let class_id_len = if class_id.is_some() { 8 } else { 0 };
                let fixed_overhead = header.to_bytes()?.len() + class_id_len;
                let budget = mtu
                    .saturating_sub(HEAD_RESERVATION)
                    .saturating_sub(fixed_overhead);
                if budget == 0 {
                    return Err(VitaError::parse(Category::Common, SubCode::BadSize));
                }
                let fragments = command.paginate(budget)?;
                let mut frames = Vec::with_capacity(fragments.len());
                let mut count = header.packet_count();
                for frag in fragments {
                    let mut frag_header = header.clone();
                    frag_header.set_packet_count(count);
                    frames.push(Self::assemble(&frag_header, class_id, &frag.format()?)?);
                    count = (count + 1) % 16;
                }
                Ok(frames)
            }
        }
    }

    fn assemble(
        header: &CommonHeader,
        class_id: &Option<ClassIdentifier>,
        body: &[u8],
    ) -> Result<Vec<u8>, VitaError> {
        let class_id_bytes = match class_id {
            Some(cid) => cid.to_bytes()?,
            None => Vec::new(),
        };
        let mut header = header.clone();
        header.set_has_cid(class_id.is_some());
        let header_bytes = header.to_bytes()?;
        let total_bytes = header_bytes.len() + class_id_bytes.len() + body.len();
        if total_bytes % 4 != 0 {
            return Err(VitaError::parse(Category::Common, SubCode::WordAlignment));
        }
        let mut header = header;
        header.set_packet_size_words((total_bytes / 4) as u16);
        let header_bytes = header.to_bytes()?;

        let mut out = Vec::with_capacity(total_bytes);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&class_id_bytes);
        out.extend_from_slice(body);
        Ok(out)
    }

    /// Re-assembles a sequence of received wire frames that form one
    /// paginated Command message (all but the last with `Paging` set)
    /// into a single logical [`Packet`]. Frames must all be Command
    /// packets sharing `stream_id`.
    pub fn reassemble(frames: &[Vec<u8>]) -> Result<Packet, VitaError> {
        let mut header = None;
        let mut class_id = None;
        let mut commands = Vec::with_capacity(frames.len());
        for frame in frames {
            match Packet::parse(frame)? {
                Packet::Command {
                    header: h,
                    class_id: c,
                    command,
                } => {
                    match &header {
                        None => {
                            header = Some(h);
                            class_id = c;
                        }
                        Some(first) => {
                            if first.stream_id() != h.stream_id() {
                                return Err(VitaError::parse(Category::Common, SubCode::Paging));
                            }
                        }
                    }
                    commands.push(command);
                }
                _ => return Err(VitaError::parse(Category::Common, SubCode::Paging)),
            }
        }
        let header = header.ok_or_else(|| VitaError::parse(Category::Common, SubCode::Paging))?;
        let command = Command::reassemble(commands)?;
        Ok(Packet::Command {
            header,
            class_id,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandResult, Request};
    use crate::resource::{AccessBits, ResourceDescriptor};

    #[test]
    fn bare_command_round_trips() {
        let packet = Packet::new_command(Command::new_request(Request::Discovery));
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        match back {
            Packet::Command { command, .. } => assert_eq!(command.request(), Request::Discovery),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn context_packet_round_trips() {
        let mut ctx = Context::new();
        ctx.set_bandwidth_hz(Some(20_000_000));
        let packet = Packet::new_context(ctx);
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        match back {
            Packet::Context { context, .. } => {
                assert_eq!(context.bandwidth_hz(), Some(20_000_000))
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn class_id_round_trips_and_validates() {
        let mut packet = Packet::new_command(Command::new_request(Request::Discovery));
        packet.set_class_id(Some(ClassIdentifier::fixed()));
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        match back {
            Packet::Command { class_id, .. } => assert!(class_id.is_some()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn bad_size_field_is_rejected() {
        let packet = Packet::new_command(Command::new_request(Request::Discovery));
        let mut wire = packet.format().unwrap();
        // Corrupt packet_size_words.
        wire[2] = 0xFF;
        wire[3] = 0xFF;
        let err = Packet::parse(&wire).unwrap_err();
        assert!(matches!(
            err,
            VitaError::Parse(Category::Common, SubCode::BadSize)
        ));
    }

    #[test]
    fn control_packet_recognized_before_header_decode() {
        let packet = Packet::Control(Control::new_shutdown());
        let wire = packet.format().unwrap();
        let back = Packet::parse(&wire).unwrap();
        assert!(matches!(back, Packet::Control(_)));
    }

    #[test]
    fn paginated_enumeration_reassembles_in_order() {
        let mut command = Command::new_result(Request::Enumeration, CommandResult::Success);
        command.set_client_id(Some(uuid::Uuid::new_v4()));
        let entries: Vec<_> = (0..200)
            .map(|i| {
                ResourceDescriptor::new(
                    uuid::Uuid::new_v4(),
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

        let frames = packet.format_paginated(700).unwrap();
        assert!(frames.len() >= 3);

        let reassembled = Packet::reassemble(&frames).unwrap();
        match reassembled {
            Packet::Command { command, .. } => {
                assert_eq!(command.resource_info_list().unwrap().len(), entries.len());
                assert!(!command.paging());
            }
            _ => panic!("wrong variant"),
        }
    }
}
