//! Command table and dispatch for data-plane commands (spec §4.5).
//!
//! Grounded on the teacher's `cmd.rs` `CMD_TABLE`/`lookup_command` pair,
//! generalized from `proc: Arc<dyn Fn(&mut RedisClient)>` entries bound to
//! a shared client/server singleton to plain functions over `&mut
//! Keyspace` the dispatcher calls directly. `MULTI`/`EXEC`/`WATCH`,
//! `SUBSCRIBE`/`PUBLISH`, and the admin commands need state this table
//! doesn't carry (transaction/watch state, the pub/sub bus, the
//! persistence coordinator) and are special-cased by `server::dispatcher`
//! ahead of this table, matching the teacher's own split between
//! `exec_command`/`discard_command` and the generic `call()` path.

mod bitops;
mod hashes;
mod hll;
mod keys;
mod lists;
mod sets;
mod strings;
mod zsets;

use std::collections::HashMap;

use bytes::Bytes;
use once_cell::sync::Lazy;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;

/// Arity follows the teacher's encoding: a positive N means exactly N
/// arguments including the command name; a negative -N means "at least
/// N" (variadic tail).
#[derive(Clone, Copy)]
struct Spec {
    arity: i32,
    write: bool,
}

/// The write-classified command set exactly as enumerated in spec §4.5.
static TABLE: Lazy<HashMap<&'static str, Spec>> = Lazy::new(|| {
    HashMap::from([
        ("ping", Spec { arity: 1, write: false }),
        ("set", Spec { arity: -3, write: true }),
        ("get", Spec { arity: 2, write: false }),
        ("del", Spec { arity: -2, write: true }),
        ("exists", Spec { arity: 2, write: false }),
        ("expire", Spec { arity: 3, write: true }),
        ("ttl", Spec { arity: 2, write: false }),
        ("type", Spec { arity: 2, write: false }),
        ("hset", Spec { arity: -4, write: true }),
        ("hget", Spec { arity: 3, write: false }),
        ("hdel", Spec { arity: -3, write: true }),
        ("hkeys", Spec { arity: 2, write: false }),
        ("hvals", Spec { arity: 2, write: false }),
        ("hgetall", Spec { arity: 2, write: false }),
        ("lpush", Spec { arity: -3, write: true }),
        ("rpush", Spec { arity: -3, write: true }),
        ("lpop", Spec { arity: 2, write: true }),
        ("rpop", Spec { arity: 2, write: true }),
        ("llen", Spec { arity: 2, write: false }),
        ("lrange", Spec { arity: 4, write: false }),
        ("sadd", Spec { arity: -3, write: true }),
        ("srem", Spec { arity: -3, write: true }),
        ("scard", Spec { arity: 2, write: false }),
        ("smembers", Spec { arity: 2, write: false }),
        ("sismember", Spec { arity: 3, write: false }),
        ("smove", Spec { arity: 4, write: true }),
        ("spop", Spec { arity: -2, write: true }),
        ("srandmember", Spec { arity: -2, write: false }),
        ("sinter", Spec { arity: -2, write: false }),
        ("sunion", Spec { arity: -2, write: false }),
        ("sdiff", Spec { arity: -2, write: false }),
        ("zadd", Spec { arity: -4, write: true }),
        ("zrem", Spec { arity: -3, write: true }),
        ("zcard", Spec { arity: 2, write: false }),
        ("zcount", Spec { arity: 4, write: false }),
        ("zscore", Spec { arity: 3, write: false }),
        ("zincrby", Spec { arity: 4, write: true }),
        ("zrange", Spec { arity: -4, write: false }),
        ("zrevrange", Spec { arity: -4, write: false }),
        ("zrangebyscore", Spec { arity: -4, write: false }),
        ("getbit", Spec { arity: 3, write: false }),
        ("setbit", Spec { arity: 4, write: true }),
        ("bitcount", Spec { arity: -2, write: false }),
        ("bitop", Spec { arity: -4, write: true }),
        ("bitpos", Spec { arity: -3, write: false }),
        ("pfadd", Spec { arity: -2, write: true }),
        ("pfcount", Spec { arity: -2, write: false }),
        ("pfmerge", Spec { arity: -3, write: true }),
    ])
});

/// Whether `name` names a command this table knows about (used by the
/// dispatcher to decide whether to fall through to MULTI-queueing,
/// pub/sub, or admin handling instead).
pub fn is_known(name: &str) -> bool {
    TABLE.contains_key(name)
}

pub fn is_write(name: &str) -> bool {
    TABLE.get(name).map(|s| s.write).unwrap_or(false)
}

/// Arity check: `-ERR wrong number of arguments` if `argc` doesn't
/// satisfy the table's contract (spec §4.5).
pub fn check_arity(name: &str, argc: usize) -> RedisResult<()> {
    let spec = TABLE.get(name).ok_or_else(|| RedisError::UnknownCommand(name.to_string()))?;
    let ok = if spec.arity >= 0 {
        argc == spec.arity as usize
    } else {
        argc >= (-spec.arity) as usize
    };
    if ok {
        Ok(())
    } else {
        Err(RedisError::WrongArity(name.to_string()))
    }
}

/// Routes a validated data-plane command to its handler. Callers must
/// have already resolved unknown-command and arity errors via
/// [`is_known`]/[`check_arity`].
pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "ping" => Ok(Reply::Simple("PONG".to_string())),
        "set" | "get" => strings::dispatch(name, argv, keyspace),
        "del" | "exists" | "expire" | "ttl" | "type" => keys::dispatch(name, argv, keyspace),
        "hset" | "hget" | "hdel" | "hkeys" | "hvals" | "hgetall" => hashes::dispatch(name, argv, keyspace),
        "lpush" | "rpush" | "lpop" | "rpop" | "llen" | "lrange" => lists::dispatch(name, argv, keyspace),
        "sadd" | "srem" | "scard" | "smembers" | "sismember" | "smove" | "spop" | "srandmember" | "sinter" | "sunion"
        | "sdiff" => sets::dispatch(name, argv, keyspace),
        "zadd" | "zrem" | "zcard" | "zcount" | "zscore" | "zincrby" | "zrange" | "zrevrange" | "zrangebyscore" => {
            zsets::dispatch(name, argv, keyspace)
        }
        "getbit" | "setbit" | "bitcount" | "bitop" | "bitpos" => bitops::dispatch(name, argv, keyspace),
        "pfadd" | "pfcount" | "pfmerge" => hll::dispatch(name, argv, keyspace),
        _ => Err(RedisError::UnknownCommand(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn write_classification_matches_spec_4_5() {
        for name in [
            "set", "del", "expire", "hset", "hdel", "lpush", "rpush", "lpop", "rpop", "sadd", "srem", "smove", "spop",
            "zadd", "zrem", "zincrby", "setbit", "bitop", "pfadd", "pfmerge",
        ] {
            assert!(is_write(name), "{name} should be write-classified");
        }
        for name in ["get", "exists", "ttl", "hget", "llen", "scard", "zcard", "getbit"] {
            assert!(!is_write(name), "{name} should not be write-classified");
        }
    }

    #[test]
    fn arity_check_rejects_too_few_arguments() {
        assert!(check_arity("get", 1).is_err());
        assert!(check_arity("get", 2).is_ok());
        assert!(check_arity("del", 1).is_err());
        assert!(check_arity("del", 5).is_ok());
    }

    #[test]
    fn unknown_command_is_not_in_the_table() {
        assert!(!is_known("frobnicate"));
        assert!(check_arity("frobnicate", 1).is_err());
    }

    #[test]
    fn dispatch_routes_ping_without_touching_keyspace() {
        let mut ks = Keyspace::new();
        assert_eq!(dispatch("ping", &[b("PING")], &mut ks).unwrap(), Reply::Simple("PONG".to_string()));
    }
}
