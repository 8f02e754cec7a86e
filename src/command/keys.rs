//! Generic key commands: `DEL`, `EXISTS`, `EXPIRE`, `TTL`, `TYPE` (spec
//! §6 "Keys").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::util::{now_secs, parse_int};

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "del" => del(argv, keyspace),
        "exists" => exists(argv, keyspace),
        "expire" => expire(argv, keyspace),
        "ttl" => ttl(argv, keyspace),
        "type" => type_name(argv, keyspace),
        _ => unreachable!("keys::dispatch called with {name}"),
    }
}

fn del(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let mut removed = 0i64;
    for key in &argv[1..] {
        if keyspace.delete(key) {
            removed += 1;
        }
    }
    Ok(Reply::Integer(removed))
}

fn exists(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Integer(keyspace.exists(&argv[1]) as i64))
}

/// `EXPIRE key seconds`: a non-positive TTL deletes the key immediately
/// (spec §4.4).
fn expire(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let secs = parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?;
    if secs <= 0 {
        return Ok(Reply::Integer(keyspace.delete(&argv[1]) as i64));
    }
    let installed = keyspace.set_expire_at(&argv[1], now_secs() + secs);
    Ok(Reply::Integer(installed as i64))
}

fn ttl(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Integer(keyspace.ttl_secs(&argv[1])))
}

fn type_name(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Simple(keyspace.type_name(&argv[1]).unwrap_or("none").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn expire_with_nonpositive_ttl_deletes_immediately() {
        let mut ks = Keyspace::new();
        ks.set_string(b("k"), b("v"));
        let reply = expire(&[b("EXPIRE"), b("k"), b("0")], &mut ks).unwrap();
        assert_eq!(reply, Reply::Integer(1));
        assert!(!ks.exists(b"k"));
    }

    #[test]
    fn ttl_reports_minus_two_for_missing_key() {
        let mut ks = Keyspace::new();
        assert_eq!(ttl(&[b("TTL"), b("missing")], &mut ks).unwrap(), Reply::Integer(-2));
    }

    #[test]
    fn type_of_missing_key_is_none() {
        let mut ks = Keyspace::new();
        assert_eq!(type_name(&[b("TYPE"), b("missing")], &mut ks).unwrap(), Reply::Simple("none".to_string()));
    }
}
