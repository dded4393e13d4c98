use std::sync::mpsc::Receiver;

use tracing::debug;

use super::{Entry, Key, StoreEvent, Subscribers, TodoStore};
use crate::error::{StoreError, StoreResult};
use crate::task::Task;

/// In-process store. Nothing survives the session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<Entry>,
    next_id: u64,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with the three sample tasks.
    pub fn with_sample_data() -> Self {
        let mut store = Self::new();
        for task in [
            Task::new("Shave"),
            Task::new("Clean the house"),
            Task::new("Share selfies on FB").with_done(true),
        ] {
            store.insert(task);
        }
        store
    }

    fn insert(&mut self, task: Task) -> Key {
        self.next_id += 1;
        let key = Key::new(format!("mem-{}", self.next_id));
        self.entries.push(Entry {
            key: key.clone(),
            task,
        });
        key
    }

    fn position(&self, key: &Key) -> StoreResult<usize> {
        self.entries
            .iter()
            .position(|e| &e.key == key)
            .ok_or_else(|| StoreError::UnknownKey(key.clone()))
    }
}

impl TodoStore for MemoryStore {
    fn append(&mut self, task: Task) -> StoreResult<Key> {
        let key = self.insert(task);
        debug!(%key, "memory store append");
        if let Some(entry) = self.entries.last() {
            let event = StoreEvent::Added(entry.clone());
            self.subscribers.notify(event);
        }
        Ok(key)
    }

    fn remove(&mut self, key: &Key) -> StoreResult<()> {
        let index = self.position(key)?;
        self.entries.remove(index);
        debug!(%key, "memory store remove");
        self.subscribers.notify(StoreEvent::Removed(key.clone()));
        Ok(())
    }

    fn update(&mut self, key: &Key, task: Task) -> StoreResult<()> {
        let index = self.position(key)?;
        self.entries[index].task = task;
        let event = StoreEvent::Changed(self.entries[index].clone());
        self.subscribers.notify(event);
        Ok(())
    }

    fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.subscribers.subscribe(&self.entries)
    }
}
