// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Data structures and methods related to Context sub-packets: bandwidth,
IF/RF reference frequency, reference level, per-stage gain, sample
rate, and temperature.
*/

use core::fmt;

use fixed::types::{I10F6, I9F7};

use crate::errors::{Category, SubCode, VitaError};

/// Per-stage gain, Q7 fixed point per stage, matching the teacher's gain
/// representation: stage 1 conveys front-end/RF gain, stage 2 conveys
/// back-end/IF gain (or total gain, with stage 2 zero, for equipment that
/// doesn't distribute gain).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gain {
    stage_1: I9F7,
    stage_2: I9F7,
}

impl Gain {
    /// Builds a `Gain` from stage 1 and 2 values in dB.
    pub fn new(stage_1_db: f32, stage_2_db: f32) -> Gain {
        Gain {
            stage_1: I9F7::from_num(stage_1_db),
            stage_2: I9F7::from_num(stage_2_db),
        }
    }
    /// Gets stage 1 gain in dB.
    pub fn stage_1_db(&self) -> f32 {
        self.stage_1.to_num()
    }
    /// Gets stage 2 gain in dB.
    pub fn stage_2_db(&self) -> f32 {
        self.stage_2.to_num()
    }

    fn from_wire(bits: u32) -> Gain {
        Gain {
            stage_1: I9F7::from_bits((bits & 0xFFFF) as i16),
            stage_2: I9F7::from_bits(((bits >> 16) & 0xFFFF) as i16),
        }
    }
    fn to_wire(self) -> u32 {
        ((self.stage_2.to_bits() as u16 as u32) << 16) | (self.stage_1.to_bits() as u16 as u32)
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage1={}dB stage2={}dB", self.stage_1_db(), self.stage_2_db())
    }
}

/// Bit positions of the optional fields in a Context packet's indicator
/// bitmap, descending from bit 31. Bits 24..0 are reserved and must be
/// zero.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextIndicators(u32);

macro_rules! indicator_bit {
    ($get:ident, $set:ident, $bit:expr) => {
        /// See field documentation on the enclosing type.
        pub fn $get(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }
        /// See field documentation on the enclosing type.
        pub fn $set(&mut self, value: bool) {
            self.0 = (self.0 & !(1 << $bit)) | ((value as u32) << $bit);
        }
    };
}

impl ContextIndicators {
    indicator_bit!(bandwidth, set_bandwidth, 31);
    indicator_bit!(if_reference_frequency, set_if_reference_frequency, 30);
    indicator_bit!(rf_reference_frequency, set_rf_reference_frequency, 29);
    indicator_bit!(reference_level, set_reference_level, 28);
    indicator_bit!(gain, set_gain, 27);
    indicator_bit!(sample_rate, set_sample_rate, 26);
    indicator_bit!(temperature, set_temperature, 25);

    /// Raw bitmap value.
    pub fn bits(&self) -> u32 {
        self.0
    }
    /// Builds from a raw bitmap value, rejecting reserved bits.
    pub fn from_bits(bits: u32) -> Result<ContextIndicators, VitaError> {
        if bits & 0x01FF_FFFF != 0 {
            return Err(VitaError::ReservedField);
        }
        Ok(ContextIndicators(bits))
    }
}

/// A Context sub-packet carrying RF/IF context values for a stream.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Context {
    indicators: ContextIndicators,
    bandwidth_hz: Option<u64>,
    if_reference_frequency_hz: Option<i64>,
    rf_reference_frequency_hz: Option<i64>,
    reference_level_db: Option<i16>,
    gain: Option<Gain>,
    sample_rate_hz: Option<u64>,
    temperature_c: Option<i16>,
}

impl Context {
    /// Builds an empty Context with no optional fields set.
    pub fn new() -> Context {
        Context::default()
    }

    /// Gets the indicator bitmap.
    pub fn indicators(&self) -> ContextIndicators {
        self.indicators
    }

    /// Gets the bandwidth in Hz, if present.
    pub fn bandwidth_hz(&self) -> Option<u64> {
        self.bandwidth_hz
    }
    /// Sets the bandwidth in Hz, updating the indicator bit to match.
    pub fn set_bandwidth_hz(&mut self, value: Option<u64>) {
        self.indicators.set_bandwidth(value.is_some());
        self.bandwidth_hz = value;
    }

    /// Gets the IF reference frequency in Hz, if present.
    pub fn if_reference_frequency_hz(&self) -> Option<i64> {
        self.if_reference_frequency_hz
    }
    /// Sets the IF reference frequency in Hz, updating the indicator bit
    /// to match.
    pub fn set_if_reference_frequency_hz(&mut self, value: Option<i64>) {
        self.indicators.set_if_reference_frequency(value.is_some());
        self.if_reference_frequency_hz = value;
    }

    /// Gets the RF reference frequency in Hz, if present.
    pub fn rf_reference_frequency_hz(&self) -> Option<i64> {
        self.rf_reference_frequency_hz
    }
    /// Sets the RF reference frequency in Hz, updating the indicator bit
    /// to match.
    pub fn set_rf_reference_frequency_hz(&mut self, value: Option<i64>) {
        self.indicators.set_rf_reference_frequency(value.is_some());
        self.rf_reference_frequency_hz = value;
    }

    /// Reference level in dBm, stored on the wire as Q7 fixed point.
    pub fn reference_level_dbm(&self) -> Option<f32> {
        self.reference_level_db
            .map(|bits| I9F7::from_bits(bits).to_num())
    }
    /// Sets the reference level in dBm, updating the indicator bit to
    /// match.
    pub fn set_reference_level_dbm(&mut self, value: Option<f32>) {
        self.indicators.set_reference_level(value.is_some());
        self.reference_level_db = value.map(|v| I9F7::from_num(v).to_bits());
    }

    /// Gets the per-stage gain, if present.
    pub fn gain(&self) -> Option<Gain> {
        self.gain
    }
    /// Sets the per-stage gain, updating the indicator bit to match.
    pub fn set_gain(&mut self, value: Option<Gain>) {
        self.indicators.set_gain(value.is_some());
        self.gain = value;
    }

    /// Gets the sample rate in Hz, if present.
    pub fn sample_rate_hz(&self) -> Option<u64> {
        self.sample_rate_hz
    }
    /// Sets the sample rate in Hz, updating the indicator bit to match.
    pub fn set_sample_rate_hz(&mut self, value: Option<u64>) {
        self.indicators.set_sample_rate(value.is_some());
        self.sample_rate_hz = value;
    }

    /// Temperature in degrees Celsius, stored on the wire as Q6 fixed
    /// point.
    pub fn temperature_c(&self) -> Option<f32> {
        self.temperature_c.map(|bits| I10F6::from_bits(bits).to_num())
    }
    /// Sets the temperature in degrees Celsius, updating the indicator bit
    /// to match.
    pub fn set_temperature_c(&mut self, value: Option<f32>) {
        self.indicators.set_temperature(value.is_some());
        self.temperature_c = value.map(|v| I10F6::from_num(v).to_bits());
    }

    /// Parses a Context sub-packet body (everything after the class id
    /// and stream id/timestamp fields).
    pub fn parse(buf: &[u8]) -> Result<Context, VitaError> {
        let short = || VitaError::parse(Category::Context, SubCode::ShortRead);
        if buf.len() < 4 {
            return Err(short());
        }
        let indicators =
            ContextIndicators::from_bits(u32::from_be_bytes(buf[0..4].try_into().unwrap()))?;
        let mut cursor = 4usize;
        let mut take = |n: usize| -> Result<&[u8], VitaError> {
            let end = cursor.checked_add(n).ok_or_else(short)?;
            let slice = buf.get(cursor..end).ok_or_else(short)?;
            cursor = end;
            Ok(slice)
        };

        let bandwidth_hz = if indicators.bandwidth() {
            Some(u64::from_be_bytes(take(8)?.try_into().unwrap()))
        } else {
            None
        };
        let if_reference_frequency_hz = if indicators.if_reference_frequency() {
            Some(i64::from_be_bytes(take(8)?.try_into().unwrap()))
        } else {
            None
        };
        let rf_reference_frequency_hz = if indicators.rf_reference_frequency() {
            Some(i64::from_be_bytes(take(8)?.try_into().unwrap()))
        } else {
            None
        };
        let reference_level_db = if indicators.reference_level() {
            Some(i16::from_be_bytes(take(2)?.try_into().unwrap()))
        } else {
            None
        };
        let gain = if indicators.gain() {
            Some(Gain::from_wire(u32::from_be_bytes(
                take(4)?.try_into().unwrap(),
            )))
        } else {
            None
        };
        let sample_rate_hz = if indicators.sample_rate() {
            Some(u64::from_be_bytes(take(8)?.try_into().unwrap()))
        } else {
            None
        };
        let temperature_c = if indicators.temperature() {
            Some(i16::from_be_bytes(take(2)?.try_into().unwrap()))
        } else {
            None
        };

        Ok(Context {
            indicators,
            bandwidth_hz,
            if_reference_frequency_hz,
            rf_reference_frequency_hz,
            reference_level_db,
            gain,
            sample_rate_hz,
            temperature_c,
        })
    }

    /// Formats this Context sub-packet into its wire body.
    pub fn format(&self) -> Result<Vec<u8>, VitaError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.indicators.bits().to_be_bytes());
        if let Some(v) = self.bandwidth_hz {
            out.extend_from_slice(&v.to_be_bytes());
        }
        if let Some(v) = self.if_reference_frequency_hz {
            out.extend_from_slice(&v.to_be_bytes());
        }
        if let Some(v) = self.rf_reference_frequency_hz {
            out.extend_from_slice(&v.to_be_bytes());
        }
        if let Some(v) = self.reference_level_db {
            out.extend_from_slice(&v.to_be_bytes());
        }
        if let Some(v) = self.gain {
            out.extend_from_slice(&v.to_wire().to_be_bytes());
        }
        if let Some(v) = self.sample_rate_hz {
            out.extend_from_slice(&v.to_be_bytes());
        }
        if let Some(v) = self.temperature_c {
            out.extend_from_slice(&v.to_be_bytes());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_context_round_trips() {
        let ctx = Context::new();
        let wire = ctx.format().unwrap();
        let back = Context::parse(&wire).unwrap();
        assert_eq!(back.indicators().bits(), 0);
    }

    #[test]
    fn fixed_point_fields_round_trip() {
        let mut ctx = Context::new();
        ctx.set_reference_level_dbm(Some(-12.5));
        ctx.set_gain(Some(Gain::new(25.2, 0.23)));
        ctx.set_temperature_c(Some(42.75));
        ctx.set_bandwidth_hz(Some(20_000_000));
        ctx.set_sample_rate_hz(Some(122_880_000));

        let wire = ctx.format().unwrap();
        let back = Context::parse(&wire).unwrap();

        assert_relative_eq!(
            back.reference_level_dbm().unwrap(),
            -12.5,
            max_relative = 0.01
        );
        assert_relative_eq!(back.gain().unwrap().stage_1_db(), 25.2, max_relative = 0.1);
        assert_relative_eq!(back.gain().unwrap().stage_2_db(), 0.23, max_relative = 0.1);
        assert_relative_eq!(back.temperature_c().unwrap(), 42.75, max_relative = 0.01);
        assert_eq!(back.bandwidth_hz(), Some(20_000_000));
        assert_eq!(back.sample_rate_hz(), Some(122_880_000));
    }

    #[test]
    fn reserved_indicator_bits_are_rejected() {
        assert!(ContextIndicators::from_bits(1).is_err());
    }
}
