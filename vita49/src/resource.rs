// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to the resource descriptor, the
on-wire (and config-file-loaded) description of one hardware resource a
daemon can grant access to.
*/

use core::fmt;

use fixed::types::I8F8;

use crate::errors::{Category, SubCode, VitaError};

/// Maximum length, in bytes, of a resource's printable name field.
pub const RESOURCE_NAME_LEN: usize = 20;
/// Wire size of a [`ResourceDescriptor`], in bytes (padded to a 32-bit
/// word boundary).
pub const RESOURCE_INFO_SIZE: usize = 48;

/// Direction a resource's channel identifier tag describes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceDirection {
    /// Transmit.
    Tx,
    /// Receive.
    Rx,
}

/// A resource's device/direction/channel identifier tag, recovered from
/// the `AD[12]{T|R}[12]` spec format: device letter (A or D), device
/// index (1 or 2), direction (T or R), channel index (1 or 2).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceSpecTag {
    device_is_analog: bool,
    device_index: u8,
    direction: ResourceDirection,
    channel_index: u8,
}

impl ResourceSpecTag {
    /// Parses a tag of the form `AD[12]{T|R}[12]`, e.g. `"A1T1"`.
    pub fn parse(s: &str) -> Result<ResourceSpecTag, VitaError> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(VitaError::InvalidResourceName);
        }
        let device_is_analog = match bytes[0] {
            b'A' => true,
            b'D' => false,
            _ => return Err(VitaError::InvalidResourceName),
        };
        let device_index = match bytes[1] {
            b'1' => 1,
            b'2' => 2,
            _ => return Err(VitaError::InvalidResourceName),
        };
        let direction = match bytes[2] {
            b'T' => ResourceDirection::Tx,
            b'R' => ResourceDirection::Rx,
            _ => return Err(VitaError::InvalidResourceName),
        };
        let channel_index = match bytes[3] {
            b'1' => 1,
            b'2' => 2,
            _ => return Err(VitaError::InvalidResourceName),
        };
        Ok(ResourceSpecTag {
            device_is_analog,
            device_index,
            direction,
            channel_index,
        })
    }
}

impl fmt::Display for ResourceSpecTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.device_is_analog { 'A' } else { 'D' },
            self.device_index,
            match self.direction {
                ResourceDirection::Tx => 'T',
                ResourceDirection::Rx => 'R',
            },
            self.channel_index
        )
    }
}

/// Access bits a [`ResourceDescriptor`] may grant; claimed at Open and
/// released at Close, a worker's locking discipline for the underlying
/// pipeline.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessBits(u8);

impl AccessBits {
    /// Exclusive transmit access.
    pub const TX: AccessBits = AccessBits(1 << 0);
    /// Exclusive receive access.
    pub const RX: AccessBits = AccessBits(1 << 1);

    /// Builds an empty access-bit set.
    pub fn empty() -> AccessBits {
        AccessBits(0)
    }
    /// Returns the raw bit value.
    pub fn bits(&self) -> u8 {
        self.0
    }
    /// Builds an access-bit set from a raw value.
    pub fn from_bits(bits: u8) -> AccessBits {
        AccessBits(bits)
    }
    /// True if every bit in `other` is set in `self`.
    pub fn contains(&self, other: AccessBits) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AccessBits {
    type Output = AccessBits;
    fn bitor(self, rhs: AccessBits) -> AccessBits {
        AccessBits(self.0 | rhs.0)
    }
}

/// Description of one hardware resource a daemon can grant access to.
/// Loaded from configuration (external to this crate) and carried
/// on-wire inside a Command's `ResourceInfoList`.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceDescriptor {
    uuid: uuid::Uuid,
    name: String,
    tx_channels: u8,
    rx_channels: u8,
    /// Sample rate, megahertz, Q8.8 fixed point.
    rate_mhz: I8F8,
    min_packet_bytes: u16,
    max_packet_bytes: u16,
    access: AccessBits,
    spec_tag: Option<ResourceSpecTag>,
}

impl ResourceDescriptor {
    /// Builds a new resource descriptor, validating the name length.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: uuid::Uuid,
        name: &str,
        tx_channels: u8,
        rx_channels: u8,
        rate_mhz: f32,
        min_packet_bytes: u16,
        max_packet_bytes: u16,
        access: AccessBits,
        spec_tag: Option<ResourceSpecTag>,
    ) -> Result<ResourceDescriptor, VitaError> {
        if name.len() > RESOURCE_NAME_LEN || !name.is_ascii() {
            return Err(VitaError::InvalidResourceName);
        }
        Ok(ResourceDescriptor {
            uuid,
            name: name.to_string(),
            tx_channels,
            rx_channels,
            rate_mhz: I8F8::from_num(rate_mhz),
            min_packet_bytes,
            max_packet_bytes,
            access,
            spec_tag,
        })
    }

    /// Clones every field except the UUID, for `resource.conf`'s `copy=`
    /// semantics: copy an earlier entry, then override select fields.
    pub fn copy_with_uuid(&self, uuid: uuid::Uuid) -> ResourceDescriptor {
        ResourceDescriptor {
            uuid,
            ..self.clone()
        }
    }

    /// Resource identifier.
    pub fn uuid(&self) -> uuid::Uuid {
        self.uuid
    }
    /// Short printable name.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Number of transmit channels.
    pub fn tx_channels(&self) -> u8 {
        self.tx_channels
    }
    /// Number of receive channels.
    pub fn rx_channels(&self) -> u8 {
        self.rx_channels
    }
    /// Sample rate in megahertz.
    pub fn rate_mhz(&self) -> f32 {
        self.rate_mhz.to_num()
    }
    /// Minimum packet payload size, bytes.
    pub fn min_packet_bytes(&self) -> u16 {
        self.min_packet_bytes
    }
    /// Maximum packet payload size, bytes.
    pub fn max_packet_bytes(&self) -> u16 {
        self.max_packet_bytes
    }
    /// Access bits this resource can grant.
    pub fn access(&self) -> AccessBits {
        self.access
    }
    /// Device/direction/channel identifier tag, if set.
    pub fn spec_tag(&self) -> Option<ResourceSpecTag> {
        self.spec_tag
    }

    /// Encodes this descriptor into its fixed 48-byte wire form.
    pub fn to_wire(&self) -> Result<[u8; RESOURCE_INFO_SIZE], VitaError> {
        let mut buf = [0u8; RESOURCE_INFO_SIZE];
        buf[0..16].copy_from_slice(self.uuid.as_bytes());
        let name_bytes = self.name.as_bytes();
        buf[16..16 + name_bytes.len()].copy_from_slice(name_bytes);
        buf[36] = self.tx_channels;
        buf[37] = self.rx_channels;
        buf[38..40].copy_from_slice(&self.rate_mhz.to_bits().to_be_bytes());
        buf[40..42].copy_from_slice(&self.min_packet_bytes.to_be_bytes());
        buf[42..44].copy_from_slice(&self.max_packet_bytes.to_be_bytes());
        buf[44] = self.access.bits();
        buf[45] = match self.spec_tag {
            Some(tag) => {
                (tag.device_is_analog as u8) << 7
                    | (tag.device_index & 0x3) << 5
                    | (matches!(tag.direction, ResourceDirection::Tx) as u8) << 4
                    | (tag.channel_index & 0x3)
            }
            None => 0,
        };
        buf[46] = (self.spec_tag.is_some()) as u8;
        Ok(buf)
    }

    /// Decodes a descriptor from its fixed 48-byte wire form.
    pub fn from_wire(buf: &[u8; RESOURCE_INFO_SIZE]) -> Result<ResourceDescriptor, VitaError> {
        let uuid = uuid::Uuid::from_slice(&buf[0..16])
            .map_err(|_| VitaError::parse(Category::Command, SubCode::ShortRead))?;
        let name_end = buf[16..36]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RESOURCE_NAME_LEN);
        let name = std::str::from_utf8(&buf[16..16 + name_end])
            .map_err(|_| VitaError::InvalidResourceName)?
            .to_string();
        let tx_channels = buf[36];
        let rx_channels = buf[37];
        let rate_bits = i16::from_be_bytes([buf[38], buf[39]]);
        let min_packet_bytes = u16::from_be_bytes([buf[40], buf[41]]);
        let max_packet_bytes = u16::from_be_bytes([buf[42], buf[43]]);
        let access = AccessBits::from_bits(buf[44]);
        let spec_tag = if buf[46] != 0 {
            let raw = buf[45];
            Some(ResourceSpecTag {
                device_is_analog: raw & 0x80 != 0,
                device_index: (raw >> 5) & 0x3,
                direction: if raw & 0x10 != 0 {
                    ResourceDirection::Tx
                } else {
                    ResourceDirection::Rx
                },
                channel_index: raw & 0x3,
            })
        } else {
            None
        };
        Ok(ResourceDescriptor {
            uuid,
            name,
            tx_channels,
            rx_channels,
            rate_mhz: I8F8::from_bits(rate_bits),
            min_packet_bytes,
            max_packet_bytes,
            access,
            spec_tag,
        })
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) tx={} rx={} rate={}MHz",
            self.name,
            self.uuid,
            self.tx_channels,
            self.rx_channels,
            self.rate_mhz()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spec_tag_parses_and_displays() {
        let tag = ResourceSpecTag::parse("A1T1").unwrap();
        assert_eq!(tag.to_string(), "A1T1");
        let tag = ResourceSpecTag::parse("D2R2").unwrap();
        assert_eq!(tag.to_string(), "D2R2");
        assert!(ResourceSpecTag::parse("X9Q9").is_err());
        assert!(ResourceSpecTag::parse("A1T").is_err());
    }

    #[test]
    fn descriptor_round_trips_over_wire() {
        let desc = ResourceDescriptor::new(
            uuid::Uuid::new_v4(),
            "radio0",
            2,
            2,
            122.88,
            64,
            8192,
            AccessBits::TX | AccessBits::RX,
            Some(ResourceSpecTag::parse("A1T1").unwrap()),
        )
        .unwrap();
        let wire = desc.to_wire().unwrap();
        let back = ResourceDescriptor::from_wire(&wire).unwrap();
        assert_eq!(desc.uuid(), back.uuid());
        assert_eq!(desc.name(), back.name());
        assert_eq!(desc.tx_channels(), back.tx_channels());
        assert_eq!(desc.rx_channels(), back.rx_channels());
        assert_relative_eq!(desc.rate_mhz(), back.rate_mhz(), max_relative = 0.01);
        assert_eq!(desc.min_packet_bytes(), back.min_packet_bytes());
        assert_eq!(desc.max_packet_bytes(), back.max_packet_bytes());
        assert!(back.access().contains(AccessBits::TX));
        assert!(back.access().contains(AccessBits::RX));
        assert_eq!(desc.spec_tag().unwrap().to_string(), "A1T1");
    }

    #[test]
    fn name_too_long_is_rejected() {
        let res = ResourceDescriptor::new(
            uuid::Uuid::new_v4(),
            "this-name-is-absolutely-too-long-to-fit",
            1,
            1,
            10.0,
            64,
            1024,
            AccessBits::empty(),
            None,
        );
        assert!(res.is_err());
    }

    #[test]
    fn copy_with_uuid_preserves_other_fields() {
        let original = ResourceDescriptor::new(
            uuid::Uuid::new_v4(),
            "radio0",
            1,
            1,
            61.44,
            64,
            4096,
            AccessBits::TX,
            None,
        )
        .unwrap();
        let new_uuid = uuid::Uuid::new_v4();
        let copy = original.copy_with_uuid(new_uuid);
        assert_eq!(copy.uuid(), new_uuid);
        assert_eq!(copy.name(), original.name());
        assert_relative_eq!(copy.rate_mhz(), original.rate_mhz());
    }
}
