//! Concurrent map of currently reachable subscribers.
//!
//! [`ConnectionRegistry`] maps each [`Identity`] to its open [`Channel`].
//! It is the single source of truth for who can be reached right now and is
//! never persisted.

use dashmap::DashMap;

use super::{Channel, ConnectionId, Identity};

/// Identity → channel map shared by every session and the broadcast bus.
///
/// # Concurrency
///
/// Backed by a sharded [`DashMap`]. Register and unregister only lock the
/// shard owning the identity. [`ConnectionRegistry::snapshot`] clones the
/// channel handles under short shard read locks and releases them before
/// any caller touches a channel, so no lock is ever held across a write.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    channels: DashMap<Identity, Channel>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Inserts or replaces the entry for the channel's identity.
    ///
    /// Returns the replaced channel. The registry does not close it; that
    /// is the caller's call.
    pub fn register(&self, channel: Channel) -> Option<Channel> {
        self.channels.insert(channel.identity().clone(), channel)
    }

    /// Removes the entry for `identity` if present. No-op otherwise.
    pub fn unregister(&self, identity: &Identity) -> Option<Channel> {
        self.channels.remove(identity).map(|(_, channel)| channel)
    }

    /// Removes the entry for `identity` only while it still holds
    /// `connection_id`.
    ///
    /// Returns `true` if an entry was removed. A session that was replaced
    /// by a newer connection gets `false` and leaves the newer entry alone.
    pub fn unregister_connection(&self, identity: &Identity, connection_id: ConnectionId) -> bool {
        self.channels
            .remove_if(identity, |_, channel| channel.connection_id() == connection_id)
            .is_some()
    }

    /// Returns a handle to the channel registered for `identity`.
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<Channel> {
        self.channels.get(identity).map(|entry| entry.value().clone())
    }

    /// Returns `true` if `identity` currently has a registered channel.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.channels.contains_key(identity)
    }

    /// Copies the current channel set.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Calls `f` for every channel registered at the time of the call, in
    /// unspecified order.
    ///
    /// `f` runs on a snapshot, so it may freely register or unregister.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Channel),
    {
        for channel in &self.snapshot() {
            f(channel);
        }
    }

    /// Returns the registered identities, sorted.
    #[must_use]
    pub fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> =
            self.channels.iter().map(|entry| entry.key().clone()).collect();
        identities.sort();
        identities
    }

    /// Returns the number of registered identities.
    #[must_use]
    pub fn size(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ChannelReceiver;

    fn identity(raw: &str) -> Identity {
        let Ok(id) = Identity::new(raw) else {
            panic!("valid identity");
        };
        id
    }

    fn channel(raw: &str) -> (Channel, ChannelReceiver) {
        let (channel, rx, _signal) = Channel::open(identity(raw));
        (channel, rx)
    }

    #[test]
    fn register_and_size() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());

        let (a, _rx_a) = channel("1");
        let (b, _rx_b) = channel("2");
        assert!(registry.register(a).is_none());
        assert!(registry.register(b).is_none());

        assert_eq!(registry.size(), 2);
        assert!(registry.contains(&identity("1")));
    }

    #[test]
    fn duplicate_register_replaces() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = channel("42");
        let (second, _rx2) = channel("42");
        let first_id = first.connection_id();
        let second_id = second.connection_id();

        let _ = registry.register(first);
        let replaced = registry.register(second);

        assert_eq!(registry.size(), 1);
        assert_eq!(replaced.map(|c| c.connection_id()), Some(first_id));
        assert_eq!(
            registry.get(&identity("42")).map(|c| c.connection_id()),
            Some(second_id)
        );
    }

    #[test]
    fn unregister_missing_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister(&identity("ghost")).is_none());
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn unregister_connection_ignores_stale_connection() {
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = channel("42");
        let (new, _rx2) = channel("42");
        let old_id = old.connection_id();
        let new_id = new.connection_id();

        let _ = registry.register(old);
        let _ = registry.register(new);

        assert!(!registry.unregister_connection(&identity("42"), old_id));
        assert_eq!(registry.size(), 1);
        assert!(registry.unregister_connection(&identity("42"), new_id));
        assert!(registry.is_empty());
    }

    #[test]
    fn size_tracks_distinct_identities_over_sequences() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        let ops: &[(&str, bool)] = &[
            ("a", true),
            ("b", true),
            ("a", true),
            ("c", true),
            ("b", false),
            ("b", false),
            ("d", false),
            ("c", true),
        ];
        let mut expected = std::collections::HashSet::new();
        for (raw, register) in ops {
            if *register {
                let (ch, rx) = channel(raw);
                receivers.push(rx);
                let _ = registry.register(ch);
                expected.insert(*raw);
            } else {
                let _ = registry.unregister(&identity(raw));
                expected.remove(raw);
            }
            assert_eq!(registry.size(), expected.len());
        }
    }

    #[test]
    fn for_each_may_mutate_registry() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = channel("1");
        let (b, _rx_b) = channel("2");
        let _ = registry.register(a);
        let _ = registry.register(b);

        let mut visited = 0;
        registry.for_each(|ch| {
            visited += 1;
            let _ = registry.unregister(ch.identity());
        });

        assert_eq!(visited, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn identities_are_sorted() {
        let registry = ConnectionRegistry::new();
        let (b, _rx_b) = channel("b");
        let (a, _rx_a) = channel("a");
        let _ = registry.register(b);
        let _ = registry.register(a);
        assert_eq!(registry.identities(), vec![identity("a"), identity("b")]);
    }
}
