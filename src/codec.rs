// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary codec mapping scaled logical values to Modbus holding-register words.
//!
//! Word order and byte order are big-endian throughout, for both 32-bit
//! integers and `f32`, as required by the wire format.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// Semantic type of a register's stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    U16,
    U32,
    I16,
    I32,
    F32,
}

impl RegisterType {
    /// Number of consecutive 16-bit words this type occupies.
    pub fn word_count(self) -> u16 {
        match self {
            RegisterType::U16 | RegisterType::I16 => 1,
            RegisterType::U32 | RegisterType::I32 | RegisterType::F32 => 2,
        }
    }
}

/// Encode a logical value into the register words that represent it.
///
/// `raw = logical * scale`. Integer types saturate at their representable
/// bounds rather than wrapping; `f32` passes non-finite values through
/// unchanged.
pub fn encode(logical: f64, reg_type: RegisterType, scale: f64) -> Vec<u16> {
    let raw = logical * scale;
    match reg_type {
        RegisterType::U16 => {
            let clamped = raw.clamp(0.0, u16::MAX as f64).trunc() as u16;
            vec![clamped]
        }
        RegisterType::I16 => {
            let clamped = raw.clamp(i16::MIN as f64, i16::MAX as f64).trunc() as i16;
            vec![clamped as u16]
        }
        RegisterType::U32 => {
            let clamped = raw.clamp(0.0, u32::MAX as f64).trunc() as u32;
            vec![(clamped >> 16) as u16, (clamped & 0xFFFF) as u16]
        }
        RegisterType::I32 => {
            let clamped = raw.clamp(i32::MIN as f64, i32::MAX as f64).trunc() as i32;
            let bits = clamped as u32;
            vec![(bits >> 16) as u16, (bits & 0xFFFF) as u16]
        }
        RegisterType::F32 => {
            let mut buf = [0u8; 4];
            BigEndian::write_f32(&mut buf, raw as f32);
            vec![
                BigEndian::read_u16(&buf[0..2]),
                BigEndian::read_u16(&buf[2..4]),
            ]
        }
    }
}

/// Decode register words back into a logical value. The inverse of [`encode`].
///
/// A word slice shorter than the type requires (2 words for any 32-bit type)
/// decodes as `0.0`.
pub fn decode(words: &[u16], reg_type: RegisterType, scale: f64) -> f64 {
    match reg_type {
        RegisterType::U16 => words.first().copied().unwrap_or(0) as f64 / scale,
        RegisterType::I16 => {
            let raw = words.first().copied().unwrap_or(0) as i16;
            raw as f64 / scale
        }
        RegisterType::U32 => {
            if words.len() < 2 {
                return 0.0;
            }
            let value = ((words[0] as u32) << 16) | words[1] as u32;
            value as f64 / scale
        }
        RegisterType::I32 => {
            if words.len() < 2 {
                return 0.0;
            }
            let bits = ((words[0] as u32) << 16) | words[1] as u32;
            (bits as i32) as f64 / scale
        }
        RegisterType::F32 => {
            if words.len() < 2 {
                return 0.0;
            }
            let mut buf = [0u8; 4];
            BigEndian::write_u16(&mut buf[0..2], words[0]);
            BigEndian::write_u16(&mut buf[2..4], words[1]);
            BigEndian::read_f32(&buf) as f64 / scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn u16_round_trip_s1() {
        // S1: {address:0, type:u16, scale:10, base_value:12.3}
        let words = encode(12.3, RegisterType::U16, 10.0);
        assert_eq!(words, vec![123]);
        assert!((decode(&words, RegisterType::U16, 10.0) - 12.3).abs() < 1e-9);
    }

    #[test]
    fn i16_negative_s2() {
        // S2: {address:1, type:i16, scale:1, base_value:-1}
        let words = encode(-1.0, RegisterType::I16, 1.0);
        assert_eq!(words, vec![0xFFFF]);
        assert_eq!(decode(&words, RegisterType::I16, 1.0), -1.0);
    }

    #[test]
    fn f32_layout_s3() {
        // S3: {address:2, type:f32, scale:1, base_value:1.0}
        let words = encode(1.0, RegisterType::F32, 1.0);
        assert_eq!(words, vec![0x3F80, 0x0000]);
        assert_eq!(decode(&words, RegisterType::F32, 1.0), 1.0);
    }

    #[test]
    fn u32_split_s5() {
        // S5: power = 23000 encoded as u32 -> [0x0000, 0x59D8]
        let words = encode(23000.0, RegisterType::U32, 1.0);
        assert_eq!(words, vec![0x0000, 0x59D8]);
        assert_eq!(decode(&words, RegisterType::U32, 1.0), 23000.0);
    }

    #[test]
    fn u16_saturates_above_range() {
        let words = encode(100_000.0, RegisterType::U16, 1.0);
        assert_eq!(words, vec![u16::MAX]);
    }

    #[test]
    fn i32_saturates_below_range() {
        let words = encode(-1e12, RegisterType::I32, 1.0);
        let decoded = decode(&words, RegisterType::I32, 1.0);
        assert_eq!(decoded, i32::MIN as f64);
    }

    #[test]
    fn short_word_slice_decodes_as_zero() {
        assert_eq!(decode(&[1], RegisterType::U32, 1.0), 0.0);
        assert_eq!(decode(&[], RegisterType::F32, 1.0), 0.0);
    }

    #[test]
    fn f32_passes_non_finite_through() {
        let words = encode(f64::INFINITY, RegisterType::F32, 1.0);
        let decoded = decode(&words, RegisterType::F32, 1.0);
        assert!(decoded.is_infinite());
    }

    #[test]
    fn round_trip_is_identity_for_representable_values() {
        for v in [0.0, 1.5, -1.5, 100.25, -100.25] {
            let words = encode(v, RegisterType::F32, 1.0);
            let back = decode(&words, RegisterType::F32, 1.0);
            assert_relative_eq!(back, v, epsilon = 1e-4);
        }
    }
}
