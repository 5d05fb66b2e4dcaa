// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the local Control packet used by
operations tooling to manage the daemon process itself. Control packets
never cross the wire to a peer outside the daemon process boundary; they
share the same channel framing as Command/Context packets so the daemon
can recognize one before attempting header decode.
*/

use crate::errors::{Category, SubCode, VitaError};

/// Magic value a Control packet begins with. Chosen so it can never be
/// mistaken for a valid common header word (whose top nibble is
/// restricted to the Command/Context type values).
pub const CONTROL_MAGIC: u32 = 0x93d1_56CF;

/// A local-control verb.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verb {
    /// Drain outstanding sends, close every channel, terminate workers,
    /// and exit.
    Shutdown,
    /// Start a stopped worker.
    Start,
    /// Stop a running worker.
    Stop,
    /// Query the worker roster.
    List,
}

impl Verb {
    fn from_wire(v: u8) -> Result<Verb, VitaError> {
        match v {
            0 => Ok(Verb::Shutdown),
            1 => Ok(Verb::Start),
            2 => Ok(Verb::Stop),
            3 => Ok(Verb::List),
            _ => Err(VitaError::parse(Category::Control, SubCode::CommandRange)),
        }
    }
    fn to_wire(self) -> u8 {
        match self {
            Verb::Shutdown => 0,
            Verb::Start => 1,
            Verb::Stop => 2,
            Verb::List => 3,
        }
    }
}

/// One entry in a `List` response.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListItem {
    /// Stream id identifying the worker.
    pub sid: u32,
}

/// The verb-specific payload of a Control packet.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlPayload {
    /// No payload.
    Shutdown,
    /// `sid` identifies the target worker; `err` carries a non-zero
    /// [`CommandResult`](crate::command::CommandResult) wire code on
    /// failure, zero on success.
    Start {
        /// Stream id identifying the worker to start.
        sid: u32,
        /// Zero on success, a non-zero result code on failure.
        err: u8,
    },
    /// `sid` identifies the target worker; `err` carries a non-zero
    /// [`CommandResult`](crate::command::CommandResult) wire code on
    /// failure, zero on success.
    Stop {
        /// Stream id identifying the worker to stop.
        sid: u32,
        /// Zero on success, a non-zero result code on failure.
        err: u8,
    },
    /// The current worker roster.
    List {
        /// One entry per known worker.
        items: Vec<ListItem>,
    },
}

/// A local Control packet: magic, length prefix, verb, and payload.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Control {
    verb: Verb,
    payload: ControlPayload,
}

impl Control {
    /// Builds a `Shutdown` control packet.
    pub fn new_shutdown() -> Control {
        Control {
            verb: Verb::Shutdown,
            payload: ControlPayload::Shutdown,
        }
    }
    /// Builds a `Start` control packet for worker `sid`.
    pub fn new_start(sid: u32, err: u8) -> Control {
        Control {
            verb: Verb::Start,
            payload: ControlPayload::Start { sid, err },
        }
    }
    /// Builds a `Stop` control packet for worker `sid`.
    pub fn new_stop(sid: u32, err: u8) -> Control {
        Control {
            verb: Verb::Stop,
            payload: ControlPayload::Stop { sid, err },
        }
    }
    /// Builds a `List` control packet carrying the given worker roster.
    pub fn new_list(items: Vec<ListItem>) -> Control {
        Control {
            verb: Verb::List,
            payload: ControlPayload::List { items },
        }
    }

    /// Gets the verb.
    pub fn verb(&self) -> Verb {
        self.verb
    }
    /// Gets the verb-specific payload.
    pub fn payload(&self) -> &ControlPayload {
        &self.payload
    }

    /// True if `buf` begins with the Control magic. Checked by the
    /// top-level packet dispatcher before attempting common-header
    /// decode.
    pub fn has_magic(buf: &[u8]) -> bool {
        buf.len() >= 4 && u32::from_be_bytes(buf[0..4].try_into().unwrap()) == CONTROL_MAGIC
    }

    /// Parses a full Control packet, including the leading magic and
    /// length prefix.
    pub fn parse(buf: &[u8]) -> Result<Control, VitaError> {
        let short = || VitaError::parse(Category::Control, SubCode::ShortRead);
        if buf.len() < 9 {
            return Err(short());
        }
        if !Self::has_magic(buf) {
            return Err(VitaError::parse(Category::Control, SubCode::BadHeaderType));
        }
        let length = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
        if buf.len() < 8 + length {
            return Err(VitaError::parse(Category::Control, SubCode::BadSize));
        }
        let verb = Verb::from_wire(buf[8])?;
        let body = &buf[9..8 + length];
        let payload = match verb {
            Verb::Shutdown => ControlPayload::Shutdown,
            Verb::Start => {
                if body.len() < 5 {
                    return Err(short());
                }
                ControlPayload::Start {
                    sid: u32::from_be_bytes(body[0..4].try_into().unwrap()),
                    err: body[4],
                }
            }
            Verb::Stop => {
                if body.len() < 5 {
                    return Err(short());
                }
                ControlPayload::Stop {
                    sid: u32::from_be_bytes(body[0..4].try_into().unwrap()),
                    err: body[4],
                }
            }
            Verb::List => {
                if body.len() < 4 {
                    return Err(short());
                }
                let count = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
                let needed = count
                    .checked_mul(4)
                    .ok_or_else(|| VitaError::parse(Category::Control, SubCode::ListSize))?;
                if body.len() < 4 + needed {
                    return Err(VitaError::parse(Category::Control, SubCode::ListSize));
                }
                let mut items = Vec::with_capacity(count);
                for i in 0..count {
                    let off = 4 + i * 4;
                    items.push(ListItem {
                        sid: u32::from_be_bytes(body[off..off + 4].try_into().unwrap()),
                    });
                }
                ControlPayload::List { items }
            }
        };
        Ok(Control { verb, payload })
    }

    /// Formats this Control packet into its full wire form, including
    /// the leading magic and length prefix.
    pub fn format(&self) -> Result<Vec<u8>, VitaError> {
        let mut body = Vec::new();
        body.push(self.verb.to_wire());
        match &self.payload {
            ControlPayload::Shutdown => {}
            ControlPayload::Start { sid, err } | ControlPayload::Stop { sid, err } => {
                body.extend_from_slice(&sid.to_be_bytes());
                body.push(*err);
            }
            ControlPayload::List { items } => {
                body.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    body.extend_from_slice(&item.sid.to_be_bytes());
                }
            }
        }
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&CONTROL_MAGIC.to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_round_trips() {
        let ctrl = Control::new_shutdown();
        let wire = ctrl.format().unwrap();
        assert!(Control::has_magic(&wire));
        let back = Control::parse(&wire).unwrap();
        assert_eq!(back.verb(), Verb::Shutdown);
        assert_eq!(*back.payload(), ControlPayload::Shutdown);
    }

    #[test]
    fn list_round_trips() {
        let ctrl = Control::new_list(vec![ListItem { sid: 1 }, ListItem { sid: 2 }]);
        let wire = ctrl.format().unwrap();
        let back = Control::parse(&wire).unwrap();
        match back.payload() {
            ControlPayload::List { items } => assert_eq!(items, &vec![ListItem { sid: 1 }, ListItem { sid: 2 }]),
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn magic_distinguishes_from_command_header() {
        // A valid Command header's top nibble is 0x6; the Control magic's
        // top byte can never collide with a valid header word's type
        // nibble range.
        let header_like = [0x60_u32, 0, 0, 0];
        let bytes = header_like[0].to_be_bytes();
        assert!(!Control::has_magic(&bytes));
    }

    #[test]
    fn stop_carries_sid_and_err() {
        let ctrl = Control::new_stop(7, 3);
        let wire = ctrl.format().unwrap();
        let back = Control::parse(&wire).unwrap();
        assert_eq!(*back.payload(), ControlPayload::Stop { sid: 7, err: 3 });
    }
}
