//! Persistence adapters behind the task list.
//!
//! A store is the source of truth for the task records. The task list never
//! mutates its own copy directly: it sends requests here and applies the
//! [`StoreEvent`]s it receives back through its subscription.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::task::Task;

/// Store-assigned identity of a task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keyed record as held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Key,
    #[serde(flatten)]
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(Entry),
    Changed(Entry),
    Removed(Key),
}

pub trait TodoStore {
    /// Appends a task and returns the key the store assigned to it.
    fn append(&mut self, task: Task) -> StoreResult<Key>;

    fn remove(&mut self, key: &Key) -> StoreResult<()>;

    fn update(&mut self, key: &Key, task: Task) -> StoreResult<()>;

    /// Opens a change feed. The current contents are replayed as `Added`
    /// events, in order, before any later change.
    fn subscribe(&mut self) -> Receiver<StoreEvent>;

    /// Checks for changes made outside this store and notifies subscribers.
    fn poll(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Fan-out of store events to every live subscription.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<Sender<StoreEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, current: &[Entry]) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        for entry in current {
            // The receiver is still in scope, so the send cannot fail.
            let _ = tx.send(StoreEvent::Added(entry.clone()));
        }
        self.senders.push(tx);
        rx
    }

    pub(crate) fn notify(&mut self, event: StoreEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, text: &str) -> Entry {
        Entry {
            key: Key::new(key),
            task: Task::new(text),
        }
    }

    #[test]
    fn subscribe_replays_current_entries_in_order() {
        let mut subscribers = Subscribers::default();
        let rx = subscribers.subscribe(&[entry("a", "Shave"), entry("b", "Clean the house")]);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                StoreEvent::Added(entry("a", "Shave")),
                StoreEvent::Added(entry("b", "Clean the house")),
            ]
        );
    }

    #[test]
    fn notify_drops_disconnected_subscribers() {
        let mut subscribers = Subscribers::default();
        let kept = subscribers.subscribe(&[]);
        drop(subscribers.subscribe(&[]));

        subscribers.notify(StoreEvent::Removed(Key::new("a")));

        assert_eq!(subscribers.len(), 1);
        assert_eq!(
            kept.try_recv().unwrap(),
            StoreEvent::Removed(Key::new("a"))
        );
    }

    #[test]
    fn entry_serializes_flat() {
        let json = serde_json::to_value(entry("k1", "Shave")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "key": "k1", "text": "Shave", "done": false })
        );
    }
}
