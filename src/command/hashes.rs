//! Hash commands: `HSET`, `HGET`, `HDEL`, `HKEYS`, `HVALS`, `HGETALL`
//! (spec §6 "Hashes").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "hset" => hset(argv, keyspace),
        "hget" => hget(argv, keyspace),
        "hdel" => hdel(argv, keyspace),
        "hkeys" => hkeys(argv, keyspace),
        "hvals" => hvals(argv, keyspace),
        "hgetall" => hgetall(argv, keyspace),
        _ => unreachable!("hashes::dispatch called with {name}"),
    }
}

/// `HSET key field value [field value ...]`; returns the count of
/// fields that were newly created (spec §4.2's ZADD rule applies the
/// same way here).
fn hset(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if argv.len() < 4 || argv.len() % 2 != 0 {
        return Err(RedisError::WrongArity("hset".into()));
    }
    let hash = keyspace.hash_mut(&argv[1])?;
    let mut added = 0i64;
    for pair in argv[2..].chunks(2) {
        if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
            added += 1;
        }
    }
    Ok(Reply::Integer(added))
}

fn hget(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match keyspace.hash(&argv[1])?.and_then(|h| h.get(argv[2].as_ref())) {
        Some(v) => Ok(Reply::bulk(v.clone())),
        None => Ok(Reply::NullBulk),
    }
}

fn hdel(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if keyspace.hash(&argv[1])?.is_none() {
        return Ok(Reply::Integer(0));
    }
    let hash = keyspace.hash_mut(&argv[1])?;
    let mut removed = 0i64;
    for field in &argv[2..] {
        if hash.shift_remove(field.as_ref()).is_some() {
            removed += 1;
        }
    }
    keyspace.delete_if_empty(&argv[1]);
    Ok(Reply::Integer(removed))
}

fn hkeys(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let fields = keyspace
        .hash(&argv[1])?
        .map(|h| h.keys().cloned().map(Reply::bulk).collect())
        .unwrap_or_default();
    Ok(Reply::Array(fields))
}

fn hvals(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let values = keyspace
        .hash(&argv[1])?
        .map(|h| h.values().cloned().map(Reply::bulk).collect())
        .unwrap_or_default();
    Ok(Reply::Array(values))
}

fn hgetall(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let mut out = Vec::new();
    if let Some(h) = keyspace.hash(&argv[1])? {
        for (field, value) in h {
            out.push(Reply::bulk(field.clone()));
            out.push(Reply::bulk(value.clone()));
        }
    }
    Ok(Reply::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn hset_reports_only_newly_created_fields() {
        let mut ks = Keyspace::new();
        assert_eq!(hset(&[b("HSET"), b("h"), b("f"), b("1")], &mut ks).unwrap(), Reply::Integer(1));
        assert_eq!(hset(&[b("HSET"), b("h"), b("f"), b("2")], &mut ks).unwrap(), Reply::Integer(0));
    }

    #[test]
    fn hdel_on_missing_key_is_a_noop() {
        let mut ks = Keyspace::new();
        assert_eq!(hdel(&[b("HDEL"), b("missing"), b("f")], &mut ks).unwrap(), Reply::Integer(0));
        assert!(!ks.exists(b"missing"));
    }

    #[test]
    fn hgetall_interleaves_field_and_value() {
        let mut ks = Keyspace::new();
        hset(&[b("HSET"), b("h"), b("f"), b("v")], &mut ks).unwrap();
        assert_eq!(
            hgetall(&[b("HGETALL"), b("h")], &mut ks).unwrap(),
            Reply::Array(vec![Reply::bulk(b("f")), Reply::bulk(b("v"))])
        );
    }
}
