//! Per-connection transaction/WATCH state (spec §4.6).
//!
//! Per REDESIGN FLAGS ("the source's per-connection transaction state is
//! a mutably aliased reference shared with the dispatcher; re-model as a
//! map from connection id -> transaction state owned by the
//! dispatcher"), this struct has no connection-owned counterpart: the
//! dispatcher keeps one of these per connection id in a `HashMap` and
//! looks it up on every command.

use bytes::Bytes;

use crate::error::RedisError;
use crate::store::Keyspace;

#[derive(Default)]
pub struct TxState {
    in_multi: bool,
    aborted: bool,
    queue: Vec<Vec<Bytes>>,
    watches: Vec<(Bytes, u64)>,
}

impl TxState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_multi(&self) -> bool {
        self.in_multi
    }

    pub fn watch(&mut self, key: &[u8], revision: u64) -> Result<(), RedisError> {
        if self.in_multi {
            return Err(RedisError::WatchInsideMulti);
        }
        if !self.watches.iter().any(|(k, _)| k.as_ref() == key) {
            self.watches.push((Bytes::copy_from_slice(key), revision));
        }
        Ok(())
    }

    pub fn unwatch(&mut self) {
        self.watches.clear();
    }

    pub fn multi(&mut self) -> Result<(), RedisError> {
        if self.in_multi {
            return Err(RedisError::NestedMulti);
        }
        self.in_multi = true;
        self.aborted = false;
        self.queue.clear();
        Ok(())
    }

    pub fn queue_command(&mut self, argv: Vec<Bytes>) {
        self.queue.push(argv);
    }

    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether any watched key has been modified since WATCH was issued
    /// (spec §4.6 EXEC semantics, spec §9's revision-counter fix for the
    /// stubbed "watched key changed" check).
    pub fn is_dirty(&self, keyspace: &Keyspace) -> bool {
        self.watches.iter().any(|(key, rev)| keyspace.revision(key) != *rev)
    }

    /// DISCARD: clears queue and watch state (spec §4.6).
    pub fn discard(&mut self) {
        self.in_multi = false;
        self.aborted = false;
        self.queue.clear();
        self.watches.clear();
    }

    /// EXEC: takes ownership of the queued commands and clears
    /// transaction + watch state, leaving the connection IDLE. Returns
    /// `None` if not currently queueing.
    pub fn take_for_exec(&mut self) -> Option<Vec<Vec<Bytes>>> {
        if !self.in_multi {
            return None;
        }
        let queue = std::mem::take(&mut self.queue);
        self.in_multi = false;
        self.aborted = false;
        self.watches.clear();
        Some(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_inside_multi_is_rejected() {
        let mut tx = TxState::new();
        tx.multi().unwrap();
        assert!(matches!(tx.watch(b"k", 0), Err(RedisError::WatchInsideMulti)));
    }

    #[test]
    fn nested_multi_is_rejected() {
        let mut tx = TxState::new();
        tx.multi().unwrap();
        assert!(matches!(tx.multi(), Err(RedisError::NestedMulti)));
    }

    #[test]
    fn dirty_detects_revision_change_since_watch() {
        let mut ks = Keyspace::new();
        let mut tx = TxState::new();
        tx.watch(b"k", ks.revision(b"k")).unwrap();
        assert!(!tx.is_dirty(&ks));
        ks.set_string(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
        assert!(tx.is_dirty(&ks));
    }

    #[test]
    fn exec_clears_state_and_returns_queue() {
        let mut tx = TxState::new();
        tx.multi().unwrap();
        tx.queue_command(vec![Bytes::from_static(b"SET")]);
        let queue = tx.take_for_exec().unwrap();
        assert_eq!(queue.len(), 1);
        assert!(!tx.in_multi());
        assert!(tx.take_for_exec().is_none());
    }
}
