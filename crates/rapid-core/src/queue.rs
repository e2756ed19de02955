use std::collections::VecDeque;
use std::sync::Arc;

use crate::entry::Entry;

/// In-memory FIFO of entries waiting for a downloader slot.
#[derive(Default)]
pub struct EntryQueue {
    entries: VecDeque<Arc<Entry>>,
}

impl EntryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Arc<Entry>) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<Arc<Entry>> {
        self.entries.pop_front()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Entry>> {
        self.entries.get(index)
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
    use crate::entry::test_entry;
    use tempfile::TempDir;

    fn entry(dir: &std::path::Path, name: &str) -> Arc<Entry> {
        Arc::new(test_entry(
            &format!("https://example.com/{name}"),
            dir,
            name,
            Some(1024),
            true,
            1,
        ))
    }

    #[test]
    fn test_fifo_order() {
        let tmp = TempDir::new().unwrap();
        let mut queue = EntryQueue::new();
        assert!(queue.is_empty());

        queue.push(entry(tmp.path(), "a.bin"));
        queue.push(entry(tmp.path(), "b.bin"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().unwrap().name(), "a.bin");
        assert_eq!(queue.pop().unwrap().name(), "b.bin");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_get_does_not_remove() {
        let tmp = TempDir::new().unwrap();
        let mut queue = EntryQueue::new();
        queue.push(entry(tmp.path(), "a.bin"));

        assert_eq!(queue.get(0).unwrap().name(), "a.bin");
        assert_eq!(queue.len(), 1);
        assert!(queue.get(1).is_none());
    }
}
