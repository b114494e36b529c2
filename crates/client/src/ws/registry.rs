//! Subscription bookkeeping.
//!
//! Entries outlive the socket: when the connection drops only the live
//! handles are released, so every `{id, topic, callback}` can be issued again
//! after the next successful handshake.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Callback invoked with each decoded inbound payload.
pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Protocol-level subscription id, valid only on the socket that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveHandle(String);

impl LiveHandle {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct SubscriptionEntry {
    pub topic: String,
    pub callback: MessageCallback,
    pub live: Option<LiveHandle>,
}

impl fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("topic", &self.topic)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// Map from caller-chosen subscription id to its entry. At most one entry per id.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`, without a live handle.
    ///
    /// Returns the live handle of the replaced entry, which the caller must release.
    pub fn upsert(
        &mut self,
        id: &str,
        topic: &str,
        callback: MessageCallback,
    ) -> Option<LiveHandle> {
        let previous = self.entries.insert(
            id.to_string(),
            SubscriptionEntry {
                topic: topic.to_string(),
                callback,
                live: None,
            },
        );
        previous.and_then(|entry| entry.live)
    }

    /// Record the live handle issued for `id`. Returns false if `id` is unknown.
    pub fn attach(&mut self, id: &str, live: LiveHandle) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.live = Some(live);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<SubscriptionEntry> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop every live handle but keep the entries for re-subscription.
    pub fn release_live(&mut self) -> Vec<LiveHandle> {
        self.entries
            .values_mut()
            .filter_map(|entry| entry.live.take())
            .collect()
    }

    /// Remove everything, returning the live handles that were still held.
    pub fn clear_all(&mut self) -> Vec<LiveHandle> {
        self.entries
            .drain()
            .filter_map(|(_, entry)| entry.live)
            .collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.values()
    }

    /// Owned copy of all entries, so the registry can be mutated while the
    /// caller walks the list.
    pub fn snapshot(&self) -> Vec<(String, SubscriptionEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Entry currently holding the given live handle.
    pub fn find_by_live(&self, live: &str) -> Option<&SubscriptionEntry> {
        self.entries
            .values()
            .find(|entry| entry.live.as_ref().is_some_and(|l| l.as_str() == live))
    }

    /// First live entry subscribed to `topic`.
    pub fn find_by_topic(&self, topic: &str) -> Option<&SubscriptionEntry> {
        self.entries
            .values()
            .find(|entry| entry.live.is_some() && entry.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> MessageCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn upsert_returns_replaced_live_handle() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.upsert("chat-7", "/topic/chat/7", noop()).is_none());
        assert!(registry.attach("chat-7", LiveHandle::new("chat-7#1")));

        let replaced = registry.upsert("chat-7", "/topic/chat/8", noop());
        assert_eq!(replaced, Some(LiveHandle::new("chat-7#1")));
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_live("chat-7#1").is_none());
    }

    #[test]
    fn attach_to_unknown_id_fails() {
        let mut registry = SubscriptionRegistry::new();
        assert!(!registry.attach("missing", LiveHandle::new("x")));
    }

    #[test]
    fn release_live_keeps_entries() {
        let mut registry = SubscriptionRegistry::new();
        registry.upsert("a", "/topic/a", noop());
        registry.upsert("b", "/topic/b", noop());
        registry.attach("a", LiveHandle::new("a#1"));

        let released = registry.release_live();
        assert_eq!(released, vec![LiveHandle::new("a#1")]);
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.values().all(|entry| entry.live.is_none()));
    }

    #[test]
    fn clear_all_empties_registry() {
        let mut registry = SubscriptionRegistry::new();
        registry.upsert("a", "/topic/a", noop());
        registry.attach("a", LiveHandle::new("a#1"));
        registry.upsert("b", "/topic/b", noop());

        assert_eq!(registry.clear_all(), vec![LiveHandle::new("a#1")]);
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_by_topic_ignores_entries_without_live_handle() {
        let mut registry = SubscriptionRegistry::new();
        registry.upsert("a", "/topic/a", noop());
        assert!(registry.find_by_topic("/topic/a").is_none());

        registry.attach("a", LiveHandle::new("a#1"));
        assert!(registry.find_by_topic("/topic/a").is_some());
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut registry = SubscriptionRegistry::new();
        registry.upsert(
            "a",
            "/topic/a",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let snapshot = registry.snapshot();
        registry.clear_all();

        for (_, entry) in snapshot {
            (entry.callback)(Value::Null);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
