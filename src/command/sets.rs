//! Set commands: `SADD`, `SREM`, `SCARD`, `SMEMBERS`, `SISMEMBER`,
//! `SMOVE`, `SPOP [count]`, `SRANDMEMBER [count]`, `SINTER`, `SUNION`,
//! `SDIFF` (spec §6 "Sets").

use std::collections::HashSet;

use bytes::Bytes;
use rand::seq::SliceRandom;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::util::parse_int;

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "sadd" => sadd(argv, keyspace),
        "srem" => srem(argv, keyspace),
        "scard" => scard(argv, keyspace),
        "smembers" => smembers(argv, keyspace),
        "sismember" => sismember(argv, keyspace),
        "smove" => smove(argv, keyspace),
        "spop" => spop(argv, keyspace),
        "srandmember" => srandmember(argv, keyspace),
        "sinter" => sinter(argv, keyspace),
        "sunion" => sunion(argv, keyspace),
        "sdiff" => sdiff(argv, keyspace),
        _ => unreachable!("sets::dispatch called with {name}"),
    }
}

fn sadd(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let set = keyspace.set_mut(&argv[1])?;
    let mut added = 0i64;
    for member in &argv[2..] {
        if set.insert(member.clone()) {
            added += 1;
        }
    }
    Ok(Reply::Integer(added))
}

fn srem(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if keyspace.set(&argv[1])?.is_none() {
        return Ok(Reply::Integer(0));
    }
    let set = keyspace.set_mut(&argv[1])?;
    let mut removed = 0i64;
    for member in &argv[2..] {
        if set.remove(member.as_ref()) {
            removed += 1;
        }
    }
    keyspace.delete_if_empty(&argv[1]);
    Ok(Reply::Integer(removed))
}

fn scard(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Integer(keyspace.set(&argv[1])?.map(|s| s.len()).unwrap_or(0) as i64))
}

fn smembers(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let members = keyspace
        .set(&argv[1])?
        .map(|s| s.iter().cloned().map(Reply::bulk).collect())
        .unwrap_or_default();
    Ok(Reply::Array(members))
}

fn sismember(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let is_member = keyspace.set(&argv[1])?.map(|s| s.contains(argv[2].as_ref())).unwrap_or(false);
    Ok(Reply::Integer(is_member as i64))
}

/// `SMOVE source destination member`. Real old-Redis rejects
/// `source == destination` with exactly this error (spec's
/// `SameObject` error kind), rather than treating it as a no-op move.
fn smove(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let (src, dst, member) = (&argv[1], &argv[2], &argv[3]);
    if src == dst {
        return Err(RedisError::SameObject);
    }
    let is_member = keyspace.set(src)?.map(|s| s.contains(member.as_ref())).unwrap_or(false);
    if !is_member {
        return Ok(Reply::Integer(0));
    }
    keyspace.set_mut(src)?.remove(member.as_ref());
    keyspace.delete_if_empty(src);
    keyspace.set_mut(dst)?.insert(member.clone());
    Ok(Reply::Integer(1))
}

fn spop(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let count = optional_count(argv)?;
    if keyspace.set(&argv[1])?.is_none() {
        return Ok(match count {
            Some(_) => Reply::Array(vec![]),
            None => Reply::NullBulk,
        });
    }
    let mut rng = rand::thread_rng();
    let popped: Vec<Bytes> = {
        let set = keyspace.set_mut(&argv[1])?;
        match count {
            None => set.iter().next().cloned().into_iter().collect(),
            Some(n) => {
                let mut members: Vec<Bytes> = set.iter().cloned().collect();
                members.shuffle(&mut rng);
                members.truncate(n.max(0) as usize);
                members
            }
        }
    };
    {
        let set = keyspace.set_mut(&argv[1])?;
        for member in &popped {
            set.remove(member.as_ref());
        }
    }
    keyspace.delete_if_empty(&argv[1]);
    match count {
        None => Ok(popped.into_iter().next().map(Reply::bulk).unwrap_or(Reply::NullBulk)),
        Some(_) => Ok(Reply::Array(popped.into_iter().map(Reply::bulk).collect())),
    }
}

/// `SRANDMEMBER key [count]`. A negative count permits duplicates; a
/// positive count does not and is clamped at cardinality (spec §4.2).
fn srandmember(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let count = optional_count(argv)?;
    let Some(set) = keyspace.set(&argv[1])? else {
        return Ok(match count {
            Some(_) => Reply::Array(vec![]),
            None => Reply::NullBulk,
        });
    };
    let members: Vec<&Bytes> = set.iter().collect();
    let mut rng = rand::thread_rng();
    match count {
        None => Ok(members.choose(&mut rng).map(|m| Reply::bulk((*m).clone())).unwrap_or(Reply::NullBulk)),
        Some(n) if n < 0 => {
            let picks = (0..(-n)).filter_map(|_| members.choose(&mut rng)).map(|m| Reply::bulk((*m).clone())).collect();
            Ok(Reply::Array(picks))
        }
        Some(n) => {
            let take = (n as usize).min(members.len());
            let mut shuffled = members;
            shuffled.shuffle(&mut rng);
            shuffled.truncate(take);
            Ok(Reply::Array(shuffled.into_iter().map(|m| Reply::bulk(m.clone())).collect()))
        }
    }
}

fn optional_count(argv: &[Bytes]) -> RedisResult<Option<i64>> {
    if argv.len() > 2 {
        Ok(Some(parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?))
    } else {
        Ok(None)
    }
}

fn collect_sets(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Vec<HashSet<Bytes>>> {
    argv[1..].iter().map(|key| Ok(keyspace.set(key)?.cloned().unwrap_or_default())).collect()
}

fn sinter(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let sets = collect_sets(argv, keyspace)?;
    let mut result = sets.first().cloned().unwrap_or_default();
    for s in &sets[1..] {
        result.retain(|m| s.contains(m));
    }
    Ok(Reply::Array(result.into_iter().map(Reply::bulk).collect()))
}

fn sunion(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let sets = collect_sets(argv, keyspace)?;
    let mut result = HashSet::new();
    for s in sets {
        result.extend(s);
    }
    Ok(Reply::Array(result.into_iter().map(Reply::bulk).collect()))
}

fn sdiff(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let sets = collect_sets(argv, keyspace)?;
    let mut result = sets.first().cloned().unwrap_or_default();
    for s in &sets[1..] {
        for member in s {
            result.remove(member);
        }
    }
    Ok(Reply::Array(result.into_iter().map(Reply::bulk).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn smove_rejects_identical_source_and_destination() {
        let mut ks = Keyspace::new();
        sadd(&[b("SADD"), b("s"), b("m")], &mut ks).unwrap();
        assert!(matches!(smove(&[b("SMOVE"), b("s"), b("s"), b("m")], &mut ks), Err(RedisError::SameObject)));
    }

    #[test]
    fn smove_moves_member_between_sets() {
        let mut ks = Keyspace::new();
        sadd(&[b("SADD"), b("src"), b("m")], &mut ks).unwrap();
        let reply = smove(&[b("SMOVE"), b("src"), b("dst"), b("m")], &mut ks).unwrap();
        assert_eq!(reply, Reply::Integer(1));
        assert!(!ks.exists(b"src"));
        assert_eq!(sismember(&[b("SISMEMBER"), b("dst"), b("m")], &mut ks).unwrap(), Reply::Integer(1));
    }

    #[test]
    fn sinter_with_missing_key_is_empty() {
        let mut ks = Keyspace::new();
        sadd(&[b("SADD"), b("a"), b("x")], &mut ks).unwrap();
        assert_eq!(sinter(&[b("SINTER"), b("a"), b("missing")], &mut ks).unwrap(), Reply::Array(vec![]));
    }

    #[test]
    fn spop_with_count_clamps_to_cardinality() {
        let mut ks = Keyspace::new();
        sadd(&[b("SADD"), b("s"), b("a"), b("b")], &mut ks).unwrap();
        let Reply::Array(items) = spop(&[b("SPOP"), b("s"), b("10")], &mut ks).unwrap() else {
            panic!("expected array reply");
        };
        assert_eq!(items.len(), 2);
        assert!(!ks.exists(b"s"));
    }
}
