// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Error types/enumerations for the `vita49` crate.
*/

use thiserror::Error;

/// Which part of a packet a [`SubCode`] applies to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// The common packet header, stream ID, class ID, or timestamp fields.
    Common,
    /// The Command sub-packet.
    Command,
    /// The Context sub-packet.
    Context,
    /// The local Control packet.
    Control,
}

/// Specific reason a parse or format operation failed within a [`Category`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubCode {
    /// Fewer bytes were available than the field being read requires.
    ShortRead,
    /// The header's packet type nibble wasn't a recognized Command/Context value.
    BadHeaderType,
    /// The class identifier didn't match the fixed OUI/class pair.
    BadClassId,
    /// `packet_size_words * 4` didn't agree with the number of bytes on the wire.
    BadSize,
    /// A fractional timestamp's value exceeded the semantic range for its format.
    FractionOutOfRange,
    /// A field or packet wasn't aligned to a 32-bit word boundary.
    WordAlignment,
    /// A fragment sequence violated the pagination invariants (non-contiguous
    /// `packet_count`, mismatched `stream_id`/`client_id`, or a continuation
    /// that never terminates).
    Paging,
    /// A message could not be queued to a channel's outbound queue.
    Enqueue,
    /// A length-prefixed list's declared element count doesn't fit the
    /// remaining bytes in the packet.
    ListSize,
    /// A Command packet's `request` code wasn't one of the known values.
    CommandRange,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Common => "common",
            Category::Command => "command",
            Category::Context => "context",
            Category::Control => "control",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for SubCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubCode::ShortRead => "short read",
            SubCode::BadHeaderType => "bad header type",
            SubCode::BadClassId => "bad class id",
            SubCode::BadSize => "bad size",
            SubCode::FractionOutOfRange => "fraction out of range",
            SubCode::WordAlignment => "word alignment",
            SubCode::Paging => "paging",
            SubCode::Enqueue => "enqueue",
            SubCode::ListSize => "list size",
            SubCode::CommandRange => "command range",
        };
        write!(f, "{s}")
    }
}

/// Generic `vita49` crate error enumeration.
#[derive(Error, Debug)]
pub enum VitaError {
    /// A parse or format error, tagged with which sub-packet it occurred in
    /// and why.
    #[error("{0}: {1}")]
    Parse(Category, SubCode),
    /// Error given when a function that can only operate on command
    /// packets is executed on something else.
    #[error("function can only run on command packets")]
    CommandOnly,
    /// Error given when a function that can only operate on context
    /// packets is executed on something else.
    #[error("function can only run on context packets")]
    ContextOnly,
    /// Error given when a function that can only operate on control
    /// packets is executed on something else.
    #[error("function can only run on control packets")]
    ControlOnly,
    /// Error given when attempting to set a timestamp field with a
    /// Tsi/Tsf mode that doesn't make sense for the operation.
    #[error("attempted to set timestamp field with Tsi/Tsf mode that doesn't make sense")]
    TimestampModeMismatch,
    /// Error given when trying to set a reserved field.
    #[error("attempted to set reserved field")]
    ReservedField,
    /// Error given when a resource name exceeds the length limit or
    /// contains non-printable bytes.
    #[error("resource name invalid")]
    InvalidResourceName,
    /// Error given when a `deku` read/write operation fails in a way this
    /// crate doesn't give a more specific error for.
    #[error("codec error: {0}")]
    Deku(#[from] deku::DekuError),
}

impl VitaError {
    /// Shorthand for constructing a [`VitaError::Parse`].
    pub fn parse(category: Category, subcode: SubCode) -> VitaError {
        VitaError::Parse(category, subcode)
    }
}
