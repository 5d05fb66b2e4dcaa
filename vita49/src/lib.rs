// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! `vita49` is a crate for parsing and creating the VITA-49 control-plane
//! packets (Command, Context, and local Control) used by a software-
//! defined-radio agent daemon and its tool. It has no I/O and no process
//! model: it is a pure parse/format library over byte slices.
#![deny(missing_docs)]
#![deny(unstable_features, unused_import_braces, unreachable_pub)]
#![forbid(unsafe_code)]

mod class_id;
mod command;
mod context;
mod control;
mod errors;
mod header;
mod packet;
mod resource;

pub use crate::class_id::{
    ClassIdentifier, FIXED_INFORMATION_CLASS_CODE, FIXED_OUI, FIXED_PACKET_CLASS_CODE,
};
pub use crate::command::{
    Command, CommandIndicators, CommandResult, Request, Role, TimestampInterpretation,
};
pub use crate::context::{Context, ContextIndicators, Gain};
pub use crate::control::{Control, ControlPayload, ListItem, Verb, CONTROL_MAGIC};
pub use crate::errors::{Category, SubCode, VitaError};
pub use crate::header::{CommonHeader, PacketType, Tsf, Tsi};
pub use crate::packet::{Packet, DEFAULT_MTU, HEAD_RESERVATION};
pub use crate::resource::{
    AccessBits, ResourceDescriptor, ResourceDirection, ResourceSpecTag, RESOURCE_INFO_SIZE,
    RESOURCE_NAME_LEN,
};

/// Standard imports for the most commonly used structures and traits in
/// the `vita49` crate.
pub mod prelude {
    pub use crate::class_id::ClassIdentifier;
    pub use crate::command::{Command, CommandResult, Request, Role, TimestampInterpretation};
    pub use crate::context::{Context, Gain};
    pub use crate::control::{Control, ControlPayload, Verb};
    pub use crate::errors::{Category, SubCode, VitaError};
    pub use crate::header::{CommonHeader, PacketType, Tsf, Tsi};
    pub use crate::packet::Packet;
    pub use crate::resource::{AccessBits, ResourceDescriptor, ResourceSpecTag};
}
