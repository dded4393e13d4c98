use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use chrono::Utc;
use tracing::{debug, info};

use super::{Entry, Key, StoreEvent, Subscribers, TodoStore};
use crate::error::{StoreError, StoreResult};
use crate::task::Task;

const MAX_SEQ: u32 = 0xffff;

/// Store backed by a JSON file. Every mutation rewrites the file before
/// subscribers are notified, so a reopened store sees the same list.
///
/// Other writers may share the file. The store re-reads it before each
/// mutation and on [`TodoStore::poll`], and turns whatever they changed into
/// events.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Vec<Entry>,
    /// File contents as last read or written by this store.
    contents: String,
    last_millis: u64,
    seq: u32,
    subscribers: Subscribers,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty list.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = read_contents(&path)?;
        let entries = parse_entries(&contents)?;
        info!(path = %path.display(), tasks = entries.len(), "opened file store");

        let mut store = Self {
            path,
            entries: Vec::new(),
            contents,
            last_millis: 0,
            seq: 0,
            subscribers: Subscribers::default(),
        };
        store.observe_keys(&entries);
        store.entries = entries;
        Ok(store)
    }

    /// Push-style key: hex milliseconds then a hex sequence, so keys sort in
    /// the order they were handed out.
    fn next_key(&mut self) -> Key {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        if millis > self.last_millis {
            self.last_millis = millis;
            self.seq = 0;
        } else if self.seq >= MAX_SEQ {
            // Sequence is full: borrow the next millisecond so the key keeps
            // its fixed width.
            self.last_millis += 1;
            self.seq = 0;
        } else {
            self.seq += 1;
        }
        Key::new(format!("{:012x}{:04x}", self.last_millis, self.seq))
    }

    /// Keeps the key generator ahead of every key seen in the file.
    fn observe_keys(&mut self, entries: &[Entry]) {
        if let Some(max) = entries.iter().filter_map(|e| parse_key(&e.key)).max() {
            if max > (self.last_millis, self.seq) {
                (self.last_millis, self.seq) = max;
            }
        }
    }

    /// Re-reads the file and notifies subscribers of changes made by other
    /// writers.
    fn reload(&mut self) -> StoreResult<()> {
        let contents = read_contents(&self.path)?;
        if contents == self.contents {
            return Ok(());
        }

        let fresh = parse_entries(&contents)?;
        let events = diff(&self.entries, &fresh);
        debug!(path = %self.path.display(), changes = events.len(), "file changed on disk");
        self.observe_keys(&fresh);
        self.entries = fresh;
        self.contents = contents;
        for event in events {
            self.subscribers.notify(event);
        }
        Ok(())
    }

    fn save(&mut self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, &content).map_err(|source| self.io_error(source))?;
        self.contents = content;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn position(&self, key: &Key) -> StoreResult<usize> {
        self.entries
            .iter()
            .position(|e| &e.key == key)
            .ok_or_else(|| StoreError::UnknownKey(key.clone()))
    }
}

fn read_contents(path: &Path) -> StoreResult<String> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(StoreError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn parse_entries(contents: &str) -> StoreResult<Vec<Entry>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(contents)?)
}

/// Events that turn `old` into `new`: removals, then changes, then additions
/// in file order.
fn diff(old: &[Entry], new: &[Entry]) -> Vec<StoreEvent> {
    let mut events: Vec<StoreEvent> = old
        .iter()
        .filter(|o| !new.iter().any(|n| n.key == o.key))
        .map(|o| StoreEvent::Removed(o.key.clone()))
        .collect();
    for entry in new {
        if let Some(o) = old.iter().find(|o| o.key == entry.key) {
            if o.task != entry.task {
                events.push(StoreEvent::Changed(entry.clone()));
            }
        }
    }
    events.extend(
        new.iter()
            .filter(|n| !old.iter().any(|o| o.key == n.key))
            .map(|n| StoreEvent::Added(n.clone())),
    );
    events
}

fn parse_key(key: &Key) -> Option<(u64, u32)> {
    let s = key.as_str();
    let millis = s.get(..12)?;
    let seq = s.get(12..)?;
    if seq.is_empty() {
        return None;
    }
    Some((
        u64::from_str_radix(millis, 16).ok()?,
        u32::from_str_radix(seq, 16).ok()?,
    ))
}

impl TodoStore for FileStore {
    fn append(&mut self, task: Task) -> StoreResult<Key> {
        self.reload()?;
        let key = self.next_key();
        self.entries.push(Entry {
            key: key.clone(),
            task,
        });
        if let Err(err) = self.save() {
            self.entries.pop();
            return Err(err);
        }
        debug!(%key, "file store append");
        if let Some(entry) = self.entries.last() {
            let event = StoreEvent::Added(entry.clone());
            self.subscribers.notify(event);
        }
        Ok(key)
    }

    fn remove(&mut self, key: &Key) -> StoreResult<()> {
        self.reload()?;
        let index = self.position(key)?;
        let removed = self.entries.remove(index);
        if let Err(err) = self.save() {
            self.entries.insert(index, removed);
            return Err(err);
        }
        debug!(%key, "file store remove");
        self.subscribers.notify(StoreEvent::Removed(key.clone()));
        Ok(())
    }

    fn update(&mut self, key: &Key, task: Task) -> StoreResult<()> {
        self.reload()?;
        let index = self.position(key)?;
        let previous = std::mem::replace(&mut self.entries[index].task, task);
        if let Err(err) = self.save() {
            self.entries[index].task = previous;
            return Err(err);
        }
        let event = StoreEvent::Changed(self.entries[index].clone());
        self.subscribers.notify(event);
        Ok(())
    }

    fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.subscribers.subscribe(&self.entries)
    }

    fn poll(&mut self) -> StoreResult<()> {
        self.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn replayed(store: &mut FileStore) -> Vec<Entry> {
        store
            .subscribe()
            .try_iter()
            .filter_map(|event| match event {
                StoreEvent::Added(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path().join("todos.json")).unwrap();
        assert!(replayed(&mut store).is_empty());
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("todos.json");

        let mut store = FileStore::open(&path).unwrap();
        let shave = store.append(Task::new("Shave")).unwrap();
        let clean = store.append(Task::new("Clean the house")).unwrap();
        store.append(Task::new("Buy milk")).unwrap();
        store.remove(&clean).unwrap();
        store.update(&shave, Task::new("Shave").with_done(true)).unwrap();
        drop(store);

        let mut reopened = FileStore::open(&path).unwrap();
        let tasks: Vec<_> = replayed(&mut reopened)
            .into_iter()
            .map(|e| e.task)
            .collect();
        assert_eq!(
            tasks,
            vec![Task::new("Shave").with_done(true), Task::new("Buy milk")]
        );
    }

    #[test]
    fn keys_increase_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");

        let mut store = FileStore::open(&path).unwrap();
        let first = store.append(Task::new("a")).unwrap();
        let second = store.append(Task::new("b")).unwrap();
        assert!(first < second);
        drop(store);

        let mut reopened = FileStore::open(&path).unwrap();
        let third = reopened.append(Task::new("c")).unwrap();
        assert!(second < third);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path().join("todos.json")).unwrap();
        let err = store
            .update(&Key::new("missing"), Task::new("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownKey(_)));
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, "{ not json").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn parse_key_reads_generated_keys() {
        assert_eq!(
            parse_key(&Key::new("00000000000a0003")),
            Some((10, 3))
        );
        assert_eq!(parse_key(&Key::new("mem-1")), None);
    }

    #[test]
    fn non_ascii_key_in_file_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, r#"[{"key":"aéééééééé","text":"x","done":false}]"#).unwrap();

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(replayed(&mut store).len(), 1);
        store.append(Task::new("y")).unwrap();
        assert_eq!(parse_key(&Key::new("aéééééééé")), None);
    }

    #[test]
    fn full_sequence_moves_to_next_millisecond() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path().join("todos.json")).unwrap();
        // far enough ahead that the clock never catches up during the test
        store.last_millis = 0xffff_ffff_fff0;
        store.seq = MAX_SEQ - 1;

        let before = store.next_key();
        let after = store.next_key();

        assert_eq!(before.as_str(), "fffffffffff0ffff");
        assert_eq!(after.as_str(), "fffffffffff10000");
        assert!(before < after);
    }

    #[test]
    fn writes_from_another_store_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        let mut tui = FileStore::open(&path).unwrap();
        let mut cli = FileStore::open(&path).unwrap();

        cli.append(Task::new("from cli")).unwrap();
        tui.append(Task::new("from tui")).unwrap();

        let mut reopened = FileStore::open(&path).unwrap();
        let texts: Vec<_> = replayed(&mut reopened)
            .into_iter()
            .map(|e| e.task.text)
            .collect();
        assert_eq!(texts, ["from cli", "from tui"]);
    }

    #[test]
    fn poll_reports_changes_made_by_another_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        let mut other = FileStore::open(&path).unwrap();
        let shave = other.append(Task::new("Shave")).unwrap();
        let clean = other.append(Task::new("Clean the house")).unwrap();

        let mut store = FileStore::open(&path).unwrap();
        let rx = store.subscribe();
        assert_eq!(rx.try_iter().count(), 2);

        other.remove(&clean).unwrap();
        other.update(&shave, Task::new("Shave").with_done(true)).unwrap();
        let milk = other.append(Task::new("Buy milk")).unwrap();

        store.poll().unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                StoreEvent::Removed(clean),
                StoreEvent::Changed(Entry {
                    key: shave,
                    task: Task::new("Shave").with_done(true),
                }),
                StoreEvent::Added(Entry {
                    key: milk,
                    task: Task::new("Buy milk"),
                }),
            ]
        );

        store.poll().unwrap();
        assert_eq!(rx.try_iter().count(), 0);
    }
}
