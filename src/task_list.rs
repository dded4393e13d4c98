use std::sync::mpsc::Receiver;

use tracing::{debug, info, warn};

use crate::error::{Result, TaskListError};
use crate::store::{Entry, Key, StoreEvent, TodoStore};
use crate::task::Task;

/// Ordered tasks mirrored from a store, plus the pending "new task" text.
///
/// The local list is a cache: mutations are sent to the store and only show
/// up here once its events are applied by [`TaskList::sync`].
pub struct TaskList {
    store: Box<dyn TodoStore>,
    events: Receiver<StoreEvent>,
    entries: Vec<Entry>,
    pub new_todo_text: String,
}

impl TaskList {
    pub fn new(mut store: Box<dyn TodoStore>) -> Self {
        let events = store.subscribe();
        let mut list = Self {
            store,
            events,
            entries: Vec::new(),
            new_todo_text: String::new(),
        };
        list.sync();
        list
    }

    /// Adds `new_todo_text` as a new task and clears the field. Blank text is
    /// ignored and returns `Ok(None)`.
    pub fn add_new_todo(&mut self) -> Result<Option<Key>> {
        if self.new_todo_text.trim().is_empty() {
            return Ok(None);
        }

        let task = Task::new(self.new_todo_text.as_str());
        let key = self.store.append(task)?;
        info!(%key, text = %self.new_todo_text, "added task");
        self.new_todo_text.clear();
        self.sync();
        Ok(Some(key))
    }

    pub fn delete_todo(&mut self, position: usize) -> Result<()> {
        let key = self.entry(position)?.key.clone();
        self.store.remove(&key)?;
        info!(%key, position, "deleted task");
        self.sync();
        Ok(())
    }

    /// Flips `done` on the task at `position` and returns the updated task.
    pub fn toggle_done(&mut self, position: usize) -> Result<Task> {
        let entry = self.entry(position)?;
        let key = entry.key.clone();
        let task = entry.task.clone().with_done(!entry.task.done);
        self.store.update(&key, task.clone())?;
        info!(%key, done = task.done, "toggled task");
        self.sync();
        Ok(task)
    }

    /// Polls the store, then applies every pending store event. Returns how
    /// many were applied.
    pub fn sync(&mut self) -> usize {
        if let Err(err) = self.store.poll() {
            warn!(%err, "store poll failed");
        }
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Added(entry) => {
                debug!(key = %entry.key, "task added by store");
                self.entries.push(entry);
            }
            StoreEvent::Changed(entry) => {
                match self.entries.iter_mut().find(|e| e.key == entry.key) {
                    Some(existing) => existing.task = entry.task,
                    None => debug!(key = %entry.key, "change for unknown task ignored"),
                }
            }
            StoreEvent::Removed(key) => {
                match self.entries.iter().position(|e| e.key == key) {
                    Some(index) => {
                        self.entries.remove(index);
                    }
                    None => debug!(%key, "removal of unknown task ignored"),
                }
            }
        }
    }

    fn entry(&self, position: usize) -> Result<&Entry> {
        self.entries.get(position).ok_or(TaskListError::OutOfRange {
            position,
            len: self.entries.len(),
        })
    }

    pub fn get(&self, position: usize) -> Option<&Task> {
        self.entries.get(position).map(|e| &e.task)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter().map(|e| &e.task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.iter().filter(|t| !t.done).count()
    }
}
