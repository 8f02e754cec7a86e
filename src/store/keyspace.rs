//! The typed keyspace plus its expiration index (spec §3/§4.4).
//!
//! Grounded on the teacher's `RedisDB` (`redis/db.rs`: `dict` +
//! `expires` maps) generalized from `HashMap<String, String>` to the
//! full `Value` enum, with a revision counter per key added per
//! REDESIGN FLAGS ("the source's watched-key-changed check is
//! stubbed... implement it correctly").

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

use crate::error::RedisError;
use crate::types::{HashValue, SortedSet, Value};
use crate::util::now_secs;

/// Cloned only for `BGSAVE`'s point-in-time snapshot (spec §4.8): the
/// clone is handed to a spawned thread so the dispatcher keeps mutating
/// the live keyspace without blocking on disk I/O.
#[derive(Default, Clone)]
pub struct Keyspace {
    data: HashMap<Bytes, Value>,
    expires: HashMap<Bytes, i64>,
    revisions: HashMap<Bytes, u64>,
    /// Changes since the last successful RDB save (spec §4.8 auto-save
    /// rule's "changes since last save" counter).
    dirty: u64,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn bump_revision(&mut self, key: &[u8]) {
        *self.revisions.entry(Bytes::copy_from_slice(key)).or_insert(0) += 1;
    }

    pub fn revision(&self, key: &[u8]) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = 0;
    }

    /// Lazy expiration (spec §4.4): consults the deadline table before
    /// any read, evicting on a past deadline. Returns `true` if the key
    /// was just evicted.
    fn expire_if_needed(&mut self, key: &[u8]) -> bool {
        if let Some(&deadline) = self.expires.get(key) {
            if deadline <= now_secs() {
                self.data.remove(key);
                self.expires.remove(key);
                self.bump_revision(key);
                self.dirty += 1;
                return true;
            }
        }
        false
    }

    /// Active sweep (spec §4.4): scans the deadline table and evicts
    /// anything past its deadline, returning the keys removed so the
    /// caller can emit synthetic DEL entries to the AOF.
    pub fn sweep_expired(&mut self) -> Vec<Bytes> {
        let now = now_secs();
        let expired: Vec<Bytes> = self
            .expires
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.data.remove(key);
            self.expires.remove(key);
            self.bump_revision(key);
            self.dirty += 1;
        }
        expired
    }

    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key);
        self.data.contains_key(key)
    }

    pub fn type_name(&mut self, key: &[u8]) -> Option<&'static str> {
        self.expire_if_needed(key);
        self.data.get(key).map(Value::type_name)
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.expire_if_needed(key);
        self.data.get(key)
    }

    /// DEL: removes a key from both the data and expiration maps in the
    /// same logical step (spec §3 invariant). Returns whether it
    /// existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key);
        let existed = self.data.remove(key).is_some();
        self.expires.remove(key);
        if existed {
            self.bump_revision(key);
            self.dirty += 1;
        }
        existed
    }

    /// Removes a container key that a mutation just emptied (spec §3
    /// "on container-emptying operations (last LPOP/ZREM/SREM)").
    pub fn delete_if_empty(&mut self, key: &[u8]) {
        if matches!(self.data.get(key), Some(v) if v.is_empty_container()) {
            self.data.remove(key);
            self.expires.remove(key);
            self.bump_revision(key);
        }
    }

    /// SET: full overwrite, always clears any prior TTL (the caller
    /// re-applies one via EXPIRE for `SET ... EX seconds`).
    pub fn set_string(&mut self, key: Bytes, value: Bytes) {
        self.expires.remove(&key);
        self.data.insert(key.clone(), Value::String(value));
        self.bump_revision(&key);
        self.dirty += 1;
    }

    pub fn string(&mut self, key: &[u8]) -> Result<Option<&Bytes>, RedisError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(RedisError::WrongType),
        }
    }

    pub fn string_mut(&mut self, key: &[u8]) -> Result<Option<&mut Bytes>, RedisError> {
        self.expire_if_needed(key);
        match self.data.get(key) {
            None => return Ok(None),
            Some(Value::String(_)) => {}
            Some(_) => return Err(RedisError::WrongType),
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_string_mut))
    }

    /// Gets (creating an empty one if absent) the string bytes behind a
    /// bitmap/HLL key, erroring WRONGTYPE against a non-string key.
    pub fn string_entry_mut(&mut self, key: &[u8]) -> Result<&mut Bytes, RedisError> {
        self.expire_if_needed(key);
        if !self.data.contains_key(key) {
            self.data.insert(Bytes::copy_from_slice(key), Value::String(Bytes::new()));
        } else if !matches!(self.data.get(key), Some(Value::String(_))) {
            return Err(RedisError::WrongType);
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_string_mut).unwrap())
    }

    pub fn hash(&mut self, key: &[u8]) -> Result<Option<&HashValue>, RedisError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(RedisError::WrongType),
        }
    }

    pub fn hash_mut(&mut self, key: &[u8]) -> Result<&mut HashValue, RedisError> {
        self.expire_if_needed(key);
        if !self.data.contains_key(key) {
            self.data.insert(Bytes::copy_from_slice(key), Value::Hash(HashValue::new()));
        } else if !matches!(self.data.get(key), Some(Value::Hash(_))) {
            return Err(RedisError::WrongType);
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_hash_mut).unwrap())
    }

    pub fn list(&mut self, key: &[u8]) -> Result<Option<&VecDeque<Bytes>>, RedisError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::List(l)) => Ok(Some(l)),
            Some(_) => Err(RedisError::WrongType),
        }
    }

    pub fn list_mut(&mut self, key: &[u8]) -> Result<&mut VecDeque<Bytes>, RedisError> {
        self.expire_if_needed(key);
        if !self.data.contains_key(key) {
            self.data.insert(Bytes::copy_from_slice(key), Value::List(VecDeque::new()));
        } else if !matches!(self.data.get(key), Some(Value::List(_))) {
            return Err(RedisError::WrongType);
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_list_mut).unwrap())
    }

    pub fn set(&mut self, key: &[u8]) -> Result<Option<&HashSet<Bytes>>, RedisError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(RedisError::WrongType),
        }
    }

    pub fn set_mut(&mut self, key: &[u8]) -> Result<&mut HashSet<Bytes>, RedisError> {
        self.expire_if_needed(key);
        if !self.data.contains_key(key) {
            self.data.insert(Bytes::copy_from_slice(key), Value::Set(HashSet::new()));
        } else if !matches!(self.data.get(key), Some(Value::Set(_))) {
            return Err(RedisError::WrongType);
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_set_mut).unwrap())
    }

    pub fn zset(&mut self, key: &[u8]) -> Result<Option<&SortedSet>, RedisError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(RedisError::WrongType),
        }
    }

    pub fn zset_mut(&mut self, key: &[u8]) -> Result<&mut SortedSet, RedisError> {
        self.expire_if_needed(key);
        if !self.data.contains_key(key) {
            self.data.insert(Bytes::copy_from_slice(key), Value::SortedSet(SortedSet::new()));
        } else if !matches!(self.data.get(key), Some(Value::SortedSet(_))) {
            return Err(RedisError::WrongType);
        }
        self.bump_revision(key);
        self.dirty += 1;
        Ok(self.data.get_mut(key).and_then(Value::as_zset_mut).unwrap())
    }

    pub fn set_expire_at(&mut self, key: &[u8], deadline_secs: i64) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        if !self.data.contains_key(key) {
            return false;
        }
        self.expires.insert(Bytes::copy_from_slice(key), deadline_secs);
        self.bump_revision(key);
        true
    }

    pub fn ttl_secs(&mut self, key: &[u8]) -> i64 {
        if self.expire_if_needed(key) {
            return -2;
        }
        if !self.data.contains_key(key) {
            return -2;
        }
        match self.expires.get(key) {
            None => -1,
            Some(&deadline) => (deadline - now_secs()).max(0),
        }
    }

    /// Iterates every non-expired `(key, value, Option<deadline>)` triple,
    /// for RDB save and AOF rewrite. Does not itself run lazy expiration
    /// on every key (that would be an O(n) sweep on every save); callers
    /// that care about absolute freshness should `sweep_expired` first.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value, Option<i64>)> {
        let now = now_secs();
        self.data.iter().filter_map(move |(k, v)| match self.expires.get(k) {
            Some(&deadline) if deadline <= now => None,
            Some(&deadline) => Some((k, v, Some(deadline))),
            None => Some((k, v, None)),
        })
    }

    /// Used by RDB load and AOF replay to install values directly
    /// without going through the write-classified command path (so
    /// replay does not re-trigger AOF logging).
    pub fn restore(&mut self, key: Bytes, value: Value, deadline_secs: Option<i64>) {
        if let Some(deadline) = deadline_secs {
            if deadline <= now_secs() {
                return; // spec §4.8: expired-at-replay keys are dropped.
            }
            self.expires.insert(key.clone(), deadline);
        }
        self.data.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.expires.clear();
        self.revisions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_expiration_elides_reads_past_deadline() {
        let mut ks = Keyspace::new();
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        ks.set_expire_at(b"k", now_secs() - 1);
        assert!(!ks.exists(b"k"));
        assert_eq!(ks.ttl_secs(b"k"), -2);
    }

    #[test]
    fn delete_removes_ttl_entry_in_same_step() {
        let mut ks = Keyspace::new();
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        ks.set_expire_at(b"k", now_secs() + 100);
        ks.delete(b"k");
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v2"));
        assert_eq!(ks.ttl_secs(b"k"), -1);
    }

    #[test]
    fn cross_type_access_is_wrongtype_error() {
        let mut ks = Keyspace::new();
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        assert!(matches!(ks.list_mut(b"k"), Err(RedisError::WrongType)));
    }

    #[test]
    fn revision_bumps_on_every_mutation() {
        let mut ks = Keyspace::new();
        assert_eq!(ks.revision(b"k"), 0);
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        assert_eq!(ks.revision(b"k"), 1);
        ks.delete(b"k");
        assert_eq!(ks.revision(b"k"), 2);
    }

    #[test]
    fn container_emptying_deletes_the_key() {
        let mut ks = Keyspace::new();
        ks.list_mut(b"l").unwrap().push_back(Bytes::from_static(b"x"));
        ks.list_mut(b"l").unwrap().pop_back();
        ks.delete_if_empty(b"l");
        assert!(!ks.exists(b"l"));
    }
}
