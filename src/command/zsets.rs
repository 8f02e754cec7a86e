//! Sorted-set commands: `ZADD`, `ZREM`, `ZCARD`, `ZCOUNT`, `ZSCORE`,
//! `ZINCRBY`, `ZRANGE [WITHSCORES]`, `ZREVRANGE [WITHSCORES]`,
//! `ZRANGEBYSCORE` (spec §6 "Sorted sets").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::util::{parse_float, parse_int};

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "zadd" => zadd(argv, keyspace),
        "zrem" => zrem(argv, keyspace),
        "zcard" => zcard(argv, keyspace),
        "zcount" => zcount(argv, keyspace),
        "zscore" => zscore(argv, keyspace),
        "zincrby" => zincrby(argv, keyspace),
        "zrange" => range_reply(argv, keyspace, false),
        "zrevrange" => range_reply(argv, keyspace, true),
        "zrangebyscore" => zrangebyscore(argv, keyspace),
        _ => unreachable!("zsets::dispatch called with {name}"),
    }
}

/// `ZADD key score member [score member ...]`; the return value counts
/// only newly inserted members, not updated ones (spec §4.2).
fn zadd(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if argv.len() < 4 || argv.len() % 2 != 0 {
        return Err(RedisError::WrongArity("zadd".into()));
    }
    let zset = keyspace.zset_mut(&argv[1])?;
    let mut added = 0i64;
    for pair in argv[2..].chunks(2) {
        let score = parse_float(&pair[0]).ok_or(RedisError::NotAFloat)?;
        if zset.insert(pair[1].clone(), score) {
            added += 1;
        }
    }
    Ok(Reply::Integer(added))
}

fn zrem(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    if keyspace.zset(&argv[1])?.is_none() {
        return Ok(Reply::Integer(0));
    }
    let zset = keyspace.zset_mut(&argv[1])?;
    let mut removed = 0i64;
    for member in &argv[2..] {
        if zset.remove(member.as_ref()) {
            removed += 1;
        }
    }
    keyspace.delete_if_empty(&argv[1]);
    Ok(Reply::Integer(removed))
}

fn zcard(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    Ok(Reply::Integer(keyspace.zset(&argv[1])?.map(|z| z.len()).unwrap_or(0) as i64))
}

fn zcount(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let min = parse_float(&argv[2]).ok_or(RedisError::NotAFloat)?;
    let max = parse_float(&argv[3]).ok_or(RedisError::NotAFloat)?;
    Ok(Reply::Integer(keyspace.zset(&argv[1])?.map(|z| z.count_by_score(min, max)).unwrap_or(0) as i64))
}

fn zscore(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match keyspace.zset(&argv[1])?.and_then(|z| z.score(&argv[2])) {
        Some(s) => Ok(Reply::bulk(format_score(s))),
        None => Ok(Reply::NullBulk),
    }
}

/// `ZINCRBY key increment member`; inserts a missing member with the
/// increment as its initial score (spec §4.2).
fn zincrby(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let delta = parse_float(&argv[2]).ok_or(RedisError::NotAFloat)?;
    let zset = keyspace.zset_mut(&argv[1])?;
    let new_score = zset.incr_by(argv[3].clone(), delta);
    Ok(Reply::bulk(format_score(new_score)))
}

fn range_reply(argv: &[Bytes], keyspace: &mut Keyspace, rev: bool) -> RedisResult<Reply> {
    let start = parse_int(&argv[2]).ok_or(RedisError::NotAnInteger)?;
    let stop = parse_int(&argv[3]).ok_or(RedisError::NotAnInteger)?;
    let with_scores = argv.len() > 4 && argv[4].eq_ignore_ascii_case(b"WITHSCORES");
    let Some(zset) = keyspace.zset(&argv[1])? else {
        return Ok(Reply::Array(vec![]));
    };
    Ok(build_member_score_array(zset.range_by_rank(start, stop, rev), with_scores))
}

fn zrangebyscore(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let min = parse_float(&argv[2]).ok_or(RedisError::NotAFloat)?;
    let max = parse_float(&argv[3]).ok_or(RedisError::NotAFloat)?;
    let with_scores = argv.len() > 4 && argv[4].eq_ignore_ascii_case(b"WITHSCORES");
    let Some(zset) = keyspace.zset(&argv[1])? else {
        return Ok(Reply::Array(vec![]));
    };
    Ok(build_member_score_array(zset.range_by_score(min, max), with_scores))
}

fn build_member_score_array(items: Vec<(Bytes, f64)>, with_scores: bool) -> Reply {
    let mut out = Vec::with_capacity(items.len() * if with_scores { 2 } else { 1 });
    for (member, score) in items {
        out.push(Reply::bulk(member));
        if with_scores {
            out.push(Reply::bulk(format_score(score)));
        }
    }
    Reply::Array(out)
}

/// Integral scores render without a trailing `.0`, matching the wire
/// form real clients expect (spec §8 scenario 3: `ZINCRBY` replies
/// `125`, not `125.0`).
fn format_score(score: f64) -> Bytes {
    if score.fract() == 0.0 && score.abs() < 1e17 {
        Bytes::from(format!("{}", score as i64))
    } else {
        Bytes::from(format!("{score}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn scenario_3_from_spec() {
        let mut ks = Keyspace::new();
        let added = zadd(
            &[b("ZADD"), b("lb"), b("100"), b("a"), b("75"), b("b"), b("150"), b("c")],
            &mut ks,
        )
        .unwrap();
        assert_eq!(added, Reply::Integer(3));

        assert_eq!(
            range_reply(&[b("ZRANGE"), b("lb"), b("0"), b("-1"), b("WITHSCORES")], &mut ks, false).unwrap(),
            Reply::Array(vec![
                Reply::bulk(b("b")),
                Reply::bulk(b("75")),
                Reply::bulk(b("a")),
                Reply::bulk(b("100")),
                Reply::bulk(b("c")),
                Reply::bulk(b("150")),
            ])
        );

        assert_eq!(zincrby(&[b("ZINCRBY"), b("lb"), b("50"), b("b")], &mut ks).unwrap(), Reply::bulk(b("125")));

        assert_eq!(
            zrangebyscore(&[b("ZRANGEBYSCORE"), b("lb"), b("100"), b("200")], &mut ks).unwrap(),
            Reply::Array(vec![Reply::bulk(b("a")), Reply::bulk(b("b")), Reply::bulk(b("c"))])
        );
    }

    #[test]
    fn zincrby_on_missing_member_inserts() {
        let mut ks = Keyspace::new();
        assert_eq!(zincrby(&[b("ZINCRBY"), b("z"), b("5"), b("x")], &mut ks).unwrap(), Reply::bulk(b("5")));
    }
}
