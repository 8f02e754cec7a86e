//! List commands: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LRANGE`
//! (spec §6 "Lists").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::util::{normalize_range, parse_int};

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "lpush" => lpush(argv, keyspace),
        "rpush" => rpush(argv, keyspace),
        "lpop" => lpop(argv, keyspace),
        "rpop" => rpop(argv, keyspace),
        "llen" => llen(argv, keyspace),
        "lrange" => lrange(argv, keyspace),
        _ => unreachable!("lists::dispatch called with {name}"),
    }
}

fn lpush(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let list = keyspace.list_mut(&argv[1])?;
    for v in &argv[2..] {
        list.push_front(v.clone());
    }
    Ok(Reply::Integer(list.len() as i64))
}

fn rpush(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let list = keyspace.list_mut(&argv[1])?;
    for v in &argv[2..] {
        list.push_back(v.clone());
    }
    Ok(Reply::Integer(list.len() as i64))
}

fn lpop(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if keyspace.list(&argv[1])?.map(|l| l.is_empty()).unwrap_or(true) {
        return Ok(Reply::NullBulk);
    }
    let popped = keyspace.list_mut(&argv[1])?.pop_front();
    keyspace.delete_if_empty(&argv[1]);
    Ok(popped.map(Reply::bulk).unwrap_or(Reply::NullBulk))
}

fn rpop(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if keyspace.list(&argv[1])?.map(|l| l.is_empty()).unwrap_or(true) {
        return Ok(Reply::NullBulk);
    }
    let popped = keyspace.list_mut(&argv[1])?.pop_back();
    keyspace.delete_if_empty(&argv[1]);
    Ok(popped.map(Reply::bulk).unwrap_or(Reply::NullBulk))
}

fn llen(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Integer(keyspace.list(&argv[1])?.map(|l| l.len()).unwrap_or(0) as i64))
}

/// Negative indices count from the tail; `start > stop` yields the
/// empty sequence (spec §4.2).
fn lrange(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let start = parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?;
    let stop = parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?;
    let Some(list) = keyspace.list(&argv[1])? else {
        return Ok(Reply::Array(vec![]));
    };
    match normalize_range(start, stop, list.len()) {
        None => Ok(Reply::Array(vec![])),
        Some((s, e)) => Ok(Reply::Array(
            list.iter().skip(s).take(e - s + 1).map(|v| Reply::bulk(v.clone())).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn rpush_then_lrange_preserves_insertion_order() {
        let mut ks = Keyspace::new();
        rpush(&[b("RPUSH"), b("l"), b("a"), b("b"), b("c")], &mut ks).unwrap();
        assert_eq!(
            lrange(&[b("LRANGE"), b("l"), b("0"), b("-1")], &mut ks).unwrap(),
            Reply::Array(vec![Reply::bulk(b("a")), Reply::bulk(b("b")), Reply::bulk(b("c"))])
        );
    }

    #[test]
    fn popping_the_last_element_deletes_the_key() {
        let mut ks = Keyspace::new();
        rpush(&[b("RPUSH"), b("l"), b("x")], &mut ks).unwrap();
        rpop(&[b("RPOP"), b("l")], &mut ks).unwrap();
        assert!(!ks.exists(b"l"));
    }

    #[test]
    fn lpop_on_missing_key_is_null() {
        let mut ks = Keyspace::new();
        assert_eq!(lpop(&[b("LPOP"), b("missing")], &mut ks).unwrap(), Reply::NullBulk);
    }
}
