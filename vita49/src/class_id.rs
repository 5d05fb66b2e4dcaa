// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Structures and methods related to the fixed class identifier field that
follows the common header on every packet.
*/
use deku::prelude::*;

use crate::errors::{Category, SubCode, VitaError};

/// Organizationally Unique Identifier used by every packet on the wire.
pub const FIXED_OUI: u32 = 0x00_1122_33 & 0xFF_FFFF;
/// Information class code used by every packet on the wire.
pub const FIXED_INFORMATION_CLASS_CODE: u16 = 0x0001;
/// Packet class code used by every packet on the wire.
pub const FIXED_PACKET_CLASS_CODE: u16 = 0x0001;

/// Class identifier data structure. Every packet carries the same fixed
/// OUI/class pair; [`ClassIdentifier::validate`] checks an incoming one
/// against it.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, DekuRead, DekuWrite,
)]
#[deku(endian = "big")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassIdentifier {
    word_1: u32,
    information_class_code: u16,
    packet_class_code: u16,
}

impl ClassIdentifier {
    /// Builds the fixed class identifier used by every packet this crate
    /// produces.
    pub fn fixed() -> ClassIdentifier {
        ClassIdentifier {
            word_1: FIXED_OUI,
            information_class_code: FIXED_INFORMATION_CLASS_CODE,
            packet_class_code: FIXED_PACKET_CLASS_CODE,
        }
    }

    /// Gets the number of padding bits.
    pub fn pad_bit_count(&self) -> u8 {
        ((self.word_1 >> 27) & 0x1F) as u8
    }
    /// Sets the number of padding bits.
    pub fn set_pad_bit_count(&mut self, count: u8) {
        self.word_1 = self.word_1 & !(0x1F << 27) | ((count as u32) << 27);
    }

    /// Gets the Organizational Unique Identifier (OUI).
    pub fn oui(&self) -> u32 {
        self.word_1 & 0xFF_FFFF
    }
    /// Sets the Organizational Unique Identifier (OUI).
    ///
    /// Note: while this API takes a 32-bit integer, only the least
    /// significant 24 bits are used.
    pub fn set_oui(&mut self, oui: u32) {
        self.word_1 = self.word_1 & !(0xFF_FFFF) | (oui & 0xFF_FFFF);
    }

    /// Gets the information class code.
    pub fn information_class_code(&self) -> u16 {
        self.information_class_code
    }
    /// Sets the information class code.
    pub fn set_information_class_code(&mut self, code: u16) {
        self.information_class_code = code;
    }

    /// Gets the packet class code.
    pub fn packet_class_code(&self) -> u16 {
        self.packet_class_code
    }
    /// Sets the packet class code.
    pub fn set_packet_class_code(&mut self, code: u16) {
        self.packet_class_code = code;
    }

    /// Checks this class identifier against the fixed OUI/class pair
    /// every packet on the wire is required to carry.
    pub fn validate(&self) -> Result<(), VitaError> {
        if self.oui() == FIXED_OUI
            && self.information_class_code == FIXED_INFORMATION_CLASS_CODE
            && self.packet_class_code == FIXED_PACKET_CLASS_CODE
        {
            Ok(())
        } else {
            Err(VitaError::parse(Category::Common, SubCode::BadClassId))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_class_id_validates() {
        assert!(ClassIdentifier::fixed().validate().is_ok());
    }

    #[test]
    fn wrong_oui_is_rejected() {
        let mut cid = ClassIdentifier::fixed();
        cid.set_oui(0x00_0000);
        assert!(cid.validate().is_err());
    }

    #[test]
    fn pad_bit_count_round_trips() {
        let mut cid = ClassIdentifier::fixed();
        cid.set_pad_bit_count(7);
        assert_eq!(cid.pad_bit_count(), 7);
        // OUI must be untouched by the pad bit count field.
        assert_eq!(cid.oui(), FIXED_OUI);
    }
}
