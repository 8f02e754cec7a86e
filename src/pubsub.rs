//! Channel -> subscriber fan-out (spec §4.7). Pattern subscriptions are
//! explicitly out of scope (spec §1 Non-goals); `PUBSUB NUMPAT` always
//! reports 0.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

pub type ConnId = u64;

#[derive(Default)]
pub struct PubSubBus {
    /// Channel -> ordered list of subscribed connection ids (ordered so
    /// PUBLISH delivers in a stable, reproducible sequence).
    channels: HashMap<Bytes, Vec<ConnId>>,
    /// Connection -> set of channels it is subscribed to, used both to
    /// answer "current total subscription count" on SUBSCRIBE and to
    /// clean up in O(subscriptions) on disconnect rather than scanning
    /// every channel.
    subscriptions: HashMap<ConnId, HashSet<Bytes>>,
}

impl PubSubBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to `channel`'s subscriber list. Returns the
    /// connection's total subscription count after the add, for the
    /// `subscribe` notification (spec §4.7).
    pub fn subscribe(&mut self, conn: ConnId, channel: Bytes) -> usize {
        let subs = self.subscriptions.entry(conn).or_default();
        if subs.insert(channel.clone()) {
            self.channels.entry(channel).or_default().push(conn);
        }
        self.subscriptions.get(&conn).map(HashSet::len).unwrap_or(0)
    }

    /// Removes `conn` from `channel`. Returns the connection's
    /// remaining total subscription count.
    pub fn unsubscribe(&mut self, conn: ConnId, channel: &[u8]) -> usize {
        if let Some(subs) = self.subscriptions.get_mut(&conn) {
            subs.remove(channel);
        }
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.retain(|&c| c != conn);
            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }
        self.subscriptions.get(&conn).map(HashSet::len).unwrap_or(0)
    }

    /// UNSUBSCRIBE with no arguments: every channel `conn` is on.
    /// Returns the channels it was removed from.
    pub fn unsubscribe_all(&mut self, conn: ConnId) -> Vec<Bytes> {
        let channels: Vec<Bytes> = self
            .subscriptions
            .get(&conn)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        for channel in &channels {
            self.unsubscribe(conn, channel);
        }
        channels
    }

    /// A disconnecting connection is removed from every channel it is
    /// in (spec §4.7).
    pub fn remove_connection(&mut self, conn: ConnId) {
        self.unsubscribe_all(conn);
        self.subscriptions.remove(&conn);
    }

    /// PUBLISH: the ordered list of connections to push `message` to.
    /// The caller (dispatcher) does the actual socket write and reports
    /// the count back to the publishing client.
    pub fn subscribers(&self, channel: &[u8]) -> Vec<ConnId> {
        self.channels.get(channel).cloned().unwrap_or_default()
    }

    pub fn active_channels(&self) -> Vec<Bytes> {
        self.channels.keys().cloned().collect()
    }

    pub fn num_subscribers(&self, channel: &[u8]) -> usize {
        self.channels.get(channel).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_reports_running_total() {
        let mut bus = PubSubBus::new();
        assert_eq!(bus.subscribe(1, Bytes::from_static(b"a")), 1);
        assert_eq!(bus.subscribe(1, Bytes::from_static(b"b")), 2);
    }

    #[test]
    fn publish_delivers_to_all_subscribers_in_order() {
        let mut bus = PubSubBus::new();
        bus.subscribe(1, Bytes::from_static(b"ch"));
        bus.subscribe(2, Bytes::from_static(b"ch"));
        bus.subscribe(3, Bytes::from_static(b"ch"));
        assert_eq!(bus.subscribers(b"ch"), vec![1, 2, 3]);
    }

    #[test]
    fn disconnect_removes_from_every_channel() {
        let mut bus = PubSubBus::new();
        bus.subscribe(1, Bytes::from_static(b"a"));
        bus.subscribe(1, Bytes::from_static(b"b"));
        bus.remove_connection(1);
        assert!(bus.subscribers(b"a").is_empty());
        assert!(bus.subscribers(b"b").is_empty());
        assert!(bus.active_channels().is_empty());
    }

    #[test]
    fn unsubscribe_all_returns_and_clears_every_channel() {
        let mut bus = PubSubBus::new();
        bus.subscribe(1, Bytes::from_static(b"a"));
        bus.subscribe(1, Bytes::from_static(b"b"));
        let mut removed = bus.unsubscribe_all(1);
        removed.sort();
        assert_eq!(removed, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }
}
