//! HyperLogLog commands: `PFADD`, `PFCOUNT`, `PFMERGE` (spec §6 "HLL").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::types::HyperLogLog;

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "pfadd" => pfadd(argv, keyspace),
        "pfcount" => pfcount(argv, keyspace),
        "pfmerge" => pfmerge(argv, keyspace),
        _ => unreachable!("hll::dispatch called with {name}"),
    }
}

fn pfadd(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let buf = keyspace.string_entry_mut(&argv[1])?;
    let mut hll = if buf.is_empty() {
        HyperLogLog::new()
    } else {
        HyperLogLog::from_bytes(buf).ok_or(RedisError::WrongType)?
    };
    let mut changed = false;
    for element in &argv[2..] {
        if hll.add(element) {
            changed = true;
        }
    }
    *buf = hll.to_bytes();
    Ok(Reply::Integer(changed as i64))
}

/// Estimates the union's cardinality across every named key without
/// materializing a merged key (spec §4.3).
fn pfcount(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let mut hlls = Vec::with_capacity(argv.len() - 1);
    for key in &argv[1..] {
        if let Some(data) = keyspace.string(key)? {
            hlls.push(HyperLogLog::from_bytes(data).ok_or(RedisError::WrongType)?);
        }
    }
    if hlls.is_empty() {
        return Ok(Reply::Integer(0));
    }
    let refs: Vec<&HyperLogLog> = hlls.iter().collect();
    Ok(Reply::Integer(HyperLogLog::count_union(&refs) as i64))
}

fn pfmerge(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let dest = &argv[1];
    let mut merged = match keyspace.string(dest)? {
        Some(data) if !data.is_empty() => HyperLogLog::from_bytes(data).ok_or(RedisError::WrongType)?,
        _ => HyperLogLog::new(),
    };
    for key in &argv[2..] {
        if let Some(data) = keyspace.string(key)? {
            let other = HyperLogLog::from_bytes(data).ok_or(RedisError::WrongType)?;
            merged.merge_max(&other);
        }
    }
    keyspace.set_string(dest.clone(), merged.to_bytes());
    Ok(Reply::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn pfadd_reports_structural_change() {
        let mut ks = Keyspace::new();
        assert_eq!(pfadd(&[b("PFADD"), b("hll"), b("a")], &mut ks).unwrap(), Reply::Integer(1));
    }

    #[test]
    fn pfcount_over_missing_keys_is_zero() {
        let mut ks = Keyspace::new();
        assert_eq!(pfcount(&[b("PFCOUNT"), b("missing")], &mut ks).unwrap(), Reply::Integer(0));
    }

    #[test]
    fn pfmerge_writes_union_into_destination() {
        let mut ks = Keyspace::new();
        pfadd(&[b("PFADD"), b("a"), b("x"), b("y")], &mut ks).unwrap();
        pfadd(&[b("PFADD"), b("b"), b("y"), b("z")], &mut ks).unwrap();
        pfmerge(&[b("PFMERGE"), b("dest"), b("a"), b("b")], &mut ks).unwrap();
        let Reply::Integer(count) = pfcount(&[b("PFCOUNT"), b("dest")], &mut ks).unwrap() else {
            panic!("expected integer reply");
        };
        assert_eq!(count, 3);
    }
}
