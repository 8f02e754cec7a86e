//! String commands: `SET`, `GET` (spec §6 "Strings").

use bytes::Bytes;

use crate::error::{RedisError, RedisResult};
use crate::protocol::Reply;
use crate::store::Keyspace;
use crate::util::{now_secs, parse_int};

pub fn dispatch(name: &str, argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match name {
        "set" => set(argv, keyspace),
        "get" => get(argv, keyspace),
        _ => unreachable!("strings::dispatch called with {name}"),
    }
}

/// `SET key value [EX seconds]`. Per spec §9's resolved open question,
/// overwriting a key that currently holds a non-string value is a
/// WRONGTYPE error rather than a silent re-type.
fn set(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    let key = &argv[1];
    let value = &argv[2];
    let ex_secs = match argv.len() {
        3 => None,
        5 if argv[3].eq_ignore_ascii_case(b"EX") => {
            Some(parse_int(&argv[4]).ok_or(RedisError::NotAnInteger)?)
        }
        _ => return Err(RedisError::SyntaxError),
    };

    keyspace.string(key)?;
    keyspace.set_string(key.clone(), value.clone());
    if let Some(secs) = ex_secs {
        keyspace.set_expire_at(key, now_secs() + secs);
    }
    Ok(Reply::ok())
}

fn get(argv: &[Bytes], keyspace: &mut Keyspace) -> RedisResult<Reply> {
    match keyspace.string(&argv[1])? {
        Some(v) => Ok(Reply::bulk(v.clone())),
        None => Ok(Reply::NullBulk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_from_spec() {
        let mut ks = Keyspace::new();
        assert_eq!(set(&[b("SET"), b("foo"), b("bar")], &mut ks).unwrap(), Reply::ok());
        assert_eq!(get(&[b("GET"), b("foo")], &mut ks).unwrap(), Reply::bulk(Bytes::from_static(b"bar")));
        ks.delete(b"foo");
        assert_eq!(get(&[b("GET"), b("foo")], &mut ks).unwrap(), Reply::NullBulk);
    }

    #[test]
    fn set_with_ex_installs_ttl() {
        let mut ks = Keyspace::new();
        set(&[b("SET"), b("k"), b("v"), b("EX"), b("100")], &mut ks).unwrap();
        assert!(ks.ttl_secs(b"k") > 0);
    }

    #[test]
    fn set_against_wrong_type_key_errors() {
        let mut ks = Keyspace::new();
        ks.list_mut(b"k").unwrap().push_back(Bytes::from_static(b"x"));
        assert!(matches!(set(&[b("SET"), b("k"), b("v")], &mut ks), Err(RedisError::WrongType)));
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }
}
