//! Bitmap operations over a string value (spec §4.3). A bitmap is not a
//! distinct stored type; it's a view over `Value::String` bytes.

use bytes::{Bytes, BytesMut};

pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl BitOp {
    pub fn parse(s: &[u8]) -> Option<Self> {
        match s.to_ascii_uppercase().as_slice() {
            b"AND" => Some(BitOp::And),
            b"OR" => Some(BitOp::Or),
            b"XOR" => Some(BitOp::Xor),
            b"NOT" => Some(BitOp::Not),
            _ => None,
        }
    }
}

/// GETBIT: a missing key or an offset past the string's end reads as 0
/// (spec §4.3).
pub fn get_bit(data: &[u8], offset: u64) -> u8 {
    let byte_idx = (offset / 8) as usize;
    if byte_idx >= data.len() {
        return 0;
    }
    let bit_idx = (offset % 8) as u32;
    (data[byte_idx] >> (7 - bit_idx)) & 1
}

/// SETBIT: extends the string with zero bytes as needed, flips the
/// addressed bit (MSB-first within each byte), and returns the prior
/// value of that bit.
pub fn set_bit(data: &mut BytesMut, offset: u64, value: u8) -> u8 {
    let byte_idx = (offset / 8) as usize;
    if byte_idx >= data.len() {
        data.resize(byte_idx + 1, 0);
    }
    let bit_idx = (offset % 8) as u32;
    let mask = 1u8 << (7 - bit_idx);
    let prior = (data[byte_idx] & mask != 0) as u8;
    if value != 0 {
        data[byte_idx] |= mask;
    } else {
        data[byte_idx] &= !mask;
    }
    prior
}

/// Resolves a possibly-negative byte range (from the tail) the way
/// BITCOUNT/BITPOS's optional start/end arguments work.
fn byte_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    crate::util::normalize_range(start, end, len)
}

pub fn bit_count(data: &[u8], start: Option<i64>, end: Option<i64>) -> u64 {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => match byte_range(data.len(), s, e) {
            Some(r) => r,
            None => return 0,
        },
        _ => {
            if data.is_empty() {
                return 0;
            }
            (0, data.len() - 1)
        }
    };
    data[start..=end].iter().map(|b| b.count_ones() as u64).sum()
}

/// BITOP AND/OR/XOR/NOT: missing bytes on shorter sources count as 0;
/// the destination length equals the longest source. NOT takes exactly
/// one source (enforced by the command layer, not here).
pub fn bit_op(op: &BitOp, sources: &[Bytes]) -> Bytes {
    let max_len = sources.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![0u8; max_len];
    match op {
        BitOp::Not => {
            let src = sources.first().map(|s| s.as_ref()).unwrap_or(&[]);
            for i in 0..max_len {
                let b = src.get(i).copied().unwrap_or(0);
                out[i] = !b;
            }
        }
        BitOp::And => {
            for i in 0..max_len {
                let mut acc = 0xFFu8;
                for src in sources {
                    acc &= src.get(i).copied().unwrap_or(0);
                }
                out[i] = acc;
            }
        }
        BitOp::Or => {
            for i in 0..max_len {
                let mut acc = 0u8;
                for src in sources {
                    acc |= src.get(i).copied().unwrap_or(0);
                }
                out[i] = acc;
            }
        }
        BitOp::Xor => {
            for i in 0..max_len {
                let mut acc = 0u8;
                for src in sources {
                    acc ^= src.get(i).copied().unwrap_or(0);
                }
                out[i] = acc;
            }
        }
    }
    Bytes::from(out)
}

/// BITPOS: offset of the first bit matching `target_bit` within the
/// byte range, or -1 if none found (spec §4.3).
pub fn bit_pos(data: &[u8], target_bit: u8, start: Option<i64>, end: Option<i64>) -> i64 {
    if data.is_empty() {
        return if target_bit == 0 { 0 } else { -1 };
    }
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => match byte_range(data.len(), s, e) {
            Some(r) => r,
            None => return -1,
        },
        (Some(s), None) => match byte_range(data.len(), s, -1) {
            Some(r) => r,
            None => return -1,
        },
        (None, None) => (0, data.len() - 1),
        (None, Some(e)) => match byte_range(data.len(), 0, e) {
            Some(r) => r,
            None => return -1,
        },
    };
    for byte_idx in start..=end {
        let byte = data[byte_idx];
        for bit_idx in 0..8u32 {
            let bit = (byte >> (7 - bit_idx)) & 1;
            if bit == target_bit {
                return (byte_idx * 8 + bit_idx as usize) as i64;
            }
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_4_from_spec() {
        let mut data = BytesMut::new();
        assert_eq!(set_bit(&mut data, 7, 1), 0);
        assert_eq!(get_bit(&data, 7), 1);
        assert_eq!(bit_count(&data, None, None), 1);
        assert_eq!(set_bit(&mut data, 0, 1), 0);
        assert_eq!(bit_pos(&data, 1, None, None), 0);
    }

    #[test]
    fn getbit_past_end_is_zero() {
        let data = BytesMut::from(&b"a"[..]);
        assert_eq!(get_bit(&data, 100), 0);
    }

    #[test]
    fn bitop_and_or_xor_pad_with_zero() {
        let a = Bytes::from_static(b"\xff\xff");
        let b = Bytes::from_static(b"\x0f");
        assert_eq!(bit_op(&BitOp::And, &[a.clone(), b.clone()]).as_ref(), &[0x0f, 0x00]);
        assert_eq!(bit_op(&BitOp::Or, &[a.clone(), b.clone()]).as_ref(), &[0xff, 0xff]);
        assert_eq!(bit_op(&BitOp::Xor, &[a, b]).as_ref(), &[0xf0, 0xff]);
    }

    #[test]
    fn bitop_not_flips_single_source() {
        let a = Bytes::from_static(b"\x00");
        assert_eq!(bit_op(&BitOp::Not, &[a]).as_ref(), &[0xff]);
    }

    #[test]
    fn bitpos_returns_negative_one_when_absent() {
        let data = BytesMut::from(&b"\x00\x00"[..]);
        assert_eq!(bit_pos(&data, 1, None, None), -1);
    }
}
