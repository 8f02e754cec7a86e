//! Bitmap commands: `GETBIT`, `SETBIT`, `BITCOUNT`, `BITOP`, `BITPOS`
//! (spec §6 "Bitmaps").

use bytes::{Bytes, BytesMut};

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::types::{bit_count, bit_op, bit_pos, get_bit, set_bit, BitOp};
use crate::util::parse_int;

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "getbit" => getbit(argv, keyspace),
        "setbit" => setbit(argv, keyspace),
        "bitcount" => bitcount(argv, keyspace),
        "bitop" => bitop(argv, keyspace),
        "bitpos" => bitpos(argv, keyspace),
        _ => unreachable!("bitops::dispatch called with {name}"),
    }
}

fn offset_arg(arg: &Bytes) -> RedisResult<u64> {
    let offset = parse_int(arg).ok_or(RedisError::NotAnInteger)?;
    if offset < 0 {
        return Err(RedisError::OutOfRange);
    }
    Ok(offset as u64)
}

fn getbit(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let offset = offset_arg(&argv[2])?;
    let bit = keyspace.string(&argv[1])?.map(|d| get_bit(d, offset)).unwrap_or(0);
    Ok(Reply::Integer(bit as i64))
}

fn setbit(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let offset = offset_arg(&argv[2])?;
    let bit = parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?;
    if bit != 0 && bit != 1 {
        return Err(RedisError::SyntaxError);
    }
    let buf = keyspace.string_entry_mut(&argv[1])?;
    let mut scratch = BytesMut::from(buf.as_ref());
    let prior = set_bit(&mut scratch, offset, bit as u8);
    *buf = scratch.freeze();
    Ok(Reply::Integer(prior as i64))
}

fn bitcount(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let range = match argv.len() {
        2 => None,
        4 => Some((parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?, parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?)),
        _ => return Err(RedisError::SyntaxError),
    };
    let count = keyspace
        .string(&argv[1])?
        .map(|d| match range {
            Some((s, e)) => bit_count(d, Some(s), Some(e)),
            None => bit_count(d, None, None),
        })
        .unwrap_or(0);
    Ok(Reply::Integer(count as i64))
}

/// `BITOP AND|OR|XOR|NOT destkey srckey [srckey ...]`; `NOT` takes
/// exactly one source (spec §4.3).
fn bitop(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let op = BitOp::parse(&argv[1]).ok_or(RedisError::SyntaxError)?;
    let dest = &argv[2];
    let source_keys = &argv[3..];
    if source_keys.is_empty() || (matches!(op, BitOp::Not) && source_keys.len() != 1) {
        return Err(RedisError::SyntaxError);
    }
    let mut sources = Vec::with_capacity(source_keys.len());
    for key in source_keys {
        sources.push(keyspace.string(key)?.cloned().unwrap_or_default());
    }
    let result = bit_op(&op, &sources);
    let len = result.len();
    keyspace.set_string(dest.clone(), result);
    Ok(Reply::Integer(len as i64))
}

fn bitpos(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let target = parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?;
    if target != 0 && target != 1 {
        return Err(RedisError::SyntaxError);
    }
    let (start, end) = match argv.len() {
        3 => (None, None),
        4 => (Some(parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?), None),
        5 => (
            Some(parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?),
            Some(parse_int(&argv[4]).ok_or(RedisError::NotAnInteger)?),
        ),
        _ => return Err(RedisError::SyntaxError),
    };
    let pos = keyspace
        .string(&argv[1])?
        .map(|d| bit_pos(d, target as u8, start, end))
        .unwrap_or(if target == 0 { 0 } else { -1 });
    Ok(Reply::Integer(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn scenario_4_from_spec() {
        let mut ks = Keyspace::new();
        assert_eq!(setbit(&[b("SETBIT"), b("bm"), b("7"), b("1")], &mut ks).unwrap(), Reply::Integer(0));
        assert_eq!(getbit(&[b("GETBIT"), b("bm"), b("7")], &mut ks).unwrap(), Reply::Integer(1));
        assert_eq!(bitcount(&[b("BITCOUNT"), b("bm")], &mut ks).unwrap(), Reply::Integer(1));
        assert_eq!(setbit(&[b("SETBIT"), b("bm"), b("0"), b("1")], &mut ks).unwrap(), Reply::Integer(0));
        assert_eq!(bitpos(&[b("BITPOS"), b("bm"), b("1")], &mut ks).unwrap(), Reply::Integer(0));
    }

    #[test]
    fn bitop_not_requires_single_source() {
        let mut ks = Keyspace::new();
        ks.set_string(b("a"), b("x"));
        ks.set_string(b("b"), b("y"));
        assert!(matches!(
            bitop(&[b("BITOP"), b("NOT"), b("dest"), b("a"), b("b")], &mut ks),
            Err(RedisError::SyntaxError)
        ));
    }
}
