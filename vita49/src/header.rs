// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the common VITA-49 packet header
(spec section 3, "Packet (common header)").
*/

use deku::prelude::*;

use crate::errors::{Category, SubCode, VitaError};

/// The type of packet carried by the common header. Control packets are
/// recognized ahead of this field by their magic number and never reach
/// this enum.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    /// Context packet.
    #[deku(id = 0x4)]
    Context,
    /// Command packet.
    #[deku(id = 0x6)]
    Command,
}

impl TryFrom<u8> for PacketType {
    type Error = VitaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x4 => Ok(PacketType::Context),
            0x6 => Ok(PacketType::Command),
            _ => Err(VitaError::parse(Category::Common, SubCode::BadHeaderType)),
        }
    }
}

/// TimeStamp-Integer (TSI) field.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tsi {
    /// Timestamp is not included.
    #[default]
    None,
    /// Timestamp represents UTC time.
    Utc,
    /// Timestamp represents GPS time.
    Gps,
    /// Timestamp represents some other time base.
    Other,
}

impl Tsi {
    fn from_bits(bits: u16) -> Tsi {
        match bits & 0b11 {
            0 => Tsi::None,
            1 => Tsi::Utc,
            2 => Tsi::Gps,
            _ => Tsi::Other,
        }
    }
    fn to_bits(self) -> u16 {
        match self {
            Tsi::None => 0,
            Tsi::Utc => 1,
            Tsi::Gps => 2,
            Tsi::Other => 3,
        }
    }
}

/// TimeStamp-Fractional (TSF) field.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tsf {
    /// Timestamp is not included.
    #[default]
    None,
    /// Timestamp represents a sample counter.
    SampleCount,
    /// Timestamp represents picoseconds.
    Picoseconds,
    /// Timestamp represents a free-running count.
    FreeRunning,
}

impl Tsf {
    fn from_bits(bits: u16) -> Tsf {
        match bits & 0b11 {
            0 => Tsf::None,
            1 => Tsf::SampleCount,
            2 => Tsf::Picoseconds,
            _ => Tsf::FreeRunning,
        }
    }
    fn to_bits(self) -> u16 {
        match self {
            Tsf::None => 0,
            Tsf::SampleCount => 1,
            Tsf::Picoseconds => 2,
            Tsf::FreeRunning => 3,
        }
    }
}

/// Common packet header: type, class-id presence, timestamp modes,
/// modulo-16 packet count, packet size, stream id, and the optional
/// timestamp fields gated by `tsi`/`tsf`.
///
/// Bit layout of the first 16-bit half-word (big-endian on the wire):
/// `TTTT C R II FF xx NNNN` — type(4), has_cid(1), reserved/TSM(1),
/// tsi(2), tsf(2), unused(2), packet_count(4).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite)]
#[deku(endian = "big")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommonHeader {
    hword_1: u16,
    /// Packet size in 32-bit words, inclusive of the header word itself.
    packet_size_words: u16,
    /// Stream identifier. Always present; SID 0 is reserved for the
    /// manager and never assigned to a worker.
    stream_id: u32,
    #[deku(cond = "(hword_1 >> 8) & 0b11 != 0")]
    ts_integer: Option<u32>,
    #[deku(cond = "(hword_1 >> 6) & 0b11 != 0")]
    ts_fractional: Option<u64>,
}

impl CommonHeader {
    /// Builds a new header for the given packet type with all optional
    /// fields absent.
    pub fn new(packet_type: PacketType) -> CommonHeader {
        let mut ret = CommonHeader::default();
        ret.set_packet_type(packet_type);
        ret
    }

    /// Gets the packet type.
    pub fn packet_type(&self) -> Result<PacketType, VitaError> {
        (((self.hword_1 >> 12) & 0b1111) as u8).try_into()
    }
    /// Sets the packet type.
    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        let id: u8 = match packet_type {
            PacketType::Context => 0x4,
            PacketType::Command => 0x6,
        };
        self.hword_1 = (self.hword_1 & !(0b1111 << 12)) | ((id as u16) << 12);
    }

    /// Returns true if a class identifier is included in the packet.
    pub fn has_cid(&self) -> bool {
        self.hword_1 & (1 << 11) != 0
    }
    /// Sets the class-id-included flag.
    pub fn set_has_cid(&mut self, included: bool) {
        self.hword_1 = (self.hword_1 & !(1 << 11)) | ((included as u16) << 11);
    }

    /// Gets the TimeStamp-Integer (TSI) field.
    pub fn tsi(&self) -> Tsi {
        Tsi::from_bits(self.hword_1 >> 8)
    }
    /// Sets the TimeStamp-Integer (TSI) field.
    pub fn set_tsi(&mut self, tsi: Tsi) {
        self.hword_1 = (self.hword_1 & !(0b11 << 8)) | (tsi.to_bits() << 8);
    }

    /// Gets the TimeStamp-Fractional (TSF) field.
    pub fn tsf(&self) -> Tsf {
        Tsf::from_bits(self.hword_1 >> 6)
    }
    /// Sets the TimeStamp-Fractional (TSF) field.
    pub fn set_tsf(&mut self, tsf: Tsf) {
        self.hword_1 = (self.hword_1 & !(0b11 << 6)) | (tsf.to_bits() << 6);
    }

    /// Reserved "TSM" bit. Always tolerated on read, always written zero.
    pub fn reserved_tsm(&self) -> bool {
        self.hword_1 & (1 << 10) != 0
    }

    /// Gets the modulo-16 packet counter field.
    pub fn packet_count(&self) -> u8 {
        (self.hword_1 & 0b1111) as u8
    }
    /// Sets the modulo-16 packet counter field.
    pub fn set_packet_count(&mut self, count: u8) {
        self.hword_1 = (self.hword_1 & !0b1111) | ((count & 0b1111) as u16);
    }
    /// Increments the packet counter by one (wrapping at 16).
    pub fn inc_packet_count(&mut self) {
        self.set_packet_count((self.packet_count() + 1) % 16);
    }

    /// Gets the packet size field (32-bit words, header inclusive).
    pub fn packet_size_words(&self) -> u16 {
        self.packet_size_words
    }
    /// Sets the packet size field (32-bit words, header inclusive).
    pub fn set_packet_size_words(&mut self, words: u16) {
        self.packet_size_words = words;
    }

    /// Gets the stream identifier.
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }
    /// Sets the stream identifier.
    pub fn set_stream_id(&mut self, sid: u32) {
        self.stream_id = sid;
    }

    /// Gets the integer-seconds timestamp, if `tsi != None`.
    pub fn ts_integer(&self) -> Option<u32> {
        self.ts_integer
    }
    /// Gets the fractional timestamp, if `tsf != None`.
    pub fn ts_fractional(&self) -> Option<u64> {
        self.ts_fractional
    }

    /// Sets the timestamp fields, clearing both if `tsi`/`tsf` are `None`.
    /// Returns [`VitaError::TimestampModeMismatch`] if a value is given for
    /// a field whose mode is `None`, or omitted for a mode that requires one.
    pub fn set_timestamps(
        &mut self,
        tsi: Tsi,
        ts_integer: Option<u32>,
        tsf: Tsf,
        ts_fractional: Option<u64>,
    ) -> Result<(), VitaError> {
        match (tsi, ts_integer) {
            (Tsi::None, None) | (Tsi::Utc, Some(_)) | (Tsi::Gps, Some(_)) | (Tsi::Other, Some(_)) => {}
            _ => return Err(VitaError::TimestampModeMismatch),
        }
        match (tsf, ts_fractional) {
            (Tsf::None, None)
            | (Tsf::SampleCount, Some(_))
            | (Tsf::Picoseconds, Some(_))
            | (Tsf::FreeRunning, Some(_)) => {}
            _ => return Err(VitaError::TimestampModeMismatch),
        }
        self.set_tsi(tsi);
        self.set_tsf(tsf);
        self.ts_integer = ts_integer;
        self.ts_fractional = ts_fractional;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_type_round_trips() {
        let mut h = CommonHeader::new(PacketType::Command);
        assert_eq!(h.packet_type().unwrap(), PacketType::Command);
        h.set_packet_type(PacketType::Context);
        assert_eq!(h.packet_type().unwrap(), PacketType::Context);
    }

    #[test]
    fn tsi_tsf_and_packet_count_round_trip() {
        let mut h = CommonHeader::new(PacketType::Command);
        h.set_tsi(Tsi::Utc);
        h.set_tsf(Tsf::SampleCount);
        h.set_packet_count(5);
        assert_eq!(h.tsi(), Tsi::Utc);
        assert_eq!(h.tsf(), Tsf::SampleCount);
        assert_eq!(h.packet_count(), 5);
        h.inc_packet_count();
        assert_eq!(h.packet_count(), 6);
    }

    #[test]
    fn packet_count_wraps_modulo_16() {
        let mut h = CommonHeader::new(PacketType::Command);
        h.set_packet_count(15);
        h.inc_packet_count();
        assert_eq!(h.packet_count(), 0);
    }

    #[test]
    fn bad_packet_type_is_rejected() {
        let mut h = CommonHeader::new(PacketType::Command);
        // Poke an invalid type nibble directly.
        h.hword_1 = (h.hword_1 & !(0b1111 << 12)) | (0xF << 12);
        assert!(h.packet_type().is_err());
    }
}
