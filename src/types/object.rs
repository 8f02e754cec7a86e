//! The typed value variants a key can hold (spec §3). Grounded on the
//! teacher's `RedisObject` enum (`obj.rs`), generalized to add the
//! `Hash` variant the distillation's source lacked and dropping the
//! object-sharing/ref-counted-`Arc<RwLock<_>>` wrapper: under the
//! single-dispatcher-thread model (spec §5) values are owned outright
//! by the keyspace, not shared between connections.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use indexmap::IndexMap;

use super::SortedSet;

pub type HashValue = IndexMap<Bytes, Bytes>;

#[derive(Debug, Clone)]
pub enum Value {
    String(Bytes),
    Hash(HashValue),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
}

impl Value {
    /// The name used in `WRONGTYPE` messages and `INFO`/`DEBUG OBJECT`
    /// style introspection.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut Bytes> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashValue> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut HashValue> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut HashSet<Bytes>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_zset(&self) -> Option<&SortedSet> {
        match self {
            Value::SortedSet(z) => Some(z),
            _ => None,
        }
    }

    pub fn as_zset_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            Value::SortedSet(z) => Some(z),
            _ => None,
        }
    }

    /// Whether a container value emptied itself and should be deleted
    /// from the keyspace (spec §3 "Lifecycle": "on container-emptying
    /// operations (last LPOP/ZREM/SREM)").
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
        }
    }
}
