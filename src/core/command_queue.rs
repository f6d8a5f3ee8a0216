//! Append-only command history with main and setup FIFOs.
//!
//! The history is the permanent record of a run: commands are only ever
//! appended or replaced in place, never removed. The two FIFOs hold IDs of
//! commands waiting to execute and behave like ordered sets, so an ID is never
//! waiting twice.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::{Command, EngineError};

/// A recorded command together with its insertion index.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    /// The current version of the command.
    pub command: Command,
    /// Position in insertion order, starting at 0.
    pub index: usize,
}

/// FIFO of IDs with ordered-set semantics.
#[derive(Debug, Default, Clone)]
struct OrderedIdSet {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl OrderedIdSet {
    fn insert(&mut self, id: &str) {
        if self.members.insert(id.to_owned()) {
            self.order.push_back(id.to_owned());
        }
    }

    fn pop_front(&mut self) -> Option<String> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.members.remove(id) {
            self.order.retain(|queued| queued != id);
            true
        } else {
            false
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn head(&self) -> Option<&str> {
        self.order.front().map(String::as_str)
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Command history plus the main and setup wait-lists.
///
/// Owned by the single execution context of a run; it carries no locking of
/// its own.
#[derive(Debug, Default, Clone)]
pub struct CommandQueue {
    entries: Vec<CommandEntry>,
    index_by_id: HashMap<String, usize>,
    main_queue: OrderedIdSet,
    setup_queue: OrderedIdSet,
    running_id: Option<String>,
    last_dequeued_id: Option<String>,
}

impl CommandQueue {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no command has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a command under its ID with the next insertion index.
    pub fn add(&mut self, command: Command) -> Result<(), EngineError> {
        if self.index_by_id.contains_key(&command.id) {
            return Err(EngineError::DuplicateId(command.id));
        }
        let index = self.entries.len();
        self.index_by_id.insert(command.id.clone(), index);
        self.entries.push(CommandEntry { command, index });
        Ok(())
    }

    /// Replace the stored version of a command, keeping its insertion index.
    pub fn replace(&mut self, command: Command) -> Result<(), EngineError> {
        let Some(&index) = self.index_by_id.get(&command.id) else {
            return Err(EngineError::CommandNotFound(command.id));
        };
        self.entries[index].command = command;
        Ok(())
    }

    /// Get the entry for an ID.
    pub fn get(&self, id: &str) -> Result<&CommandEntry, EngineError> {
        self.get_if_present(id)
            .ok_or_else(|| EngineError::CommandNotFound(id.to_owned()))
    }

    /// Get the entry for an ID, or `None` if it was never added.
    pub fn get_if_present(&self, id: &str) -> Option<&CommandEntry> {
        self.index_by_id.get(id).map(|&index| &self.entries[index])
    }

    /// Whether a command with this ID was added.
    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    /// The entry inserted right after `id`, or `None` if `id` is the tail.
    pub fn get_next(&self, id: &str) -> Result<Option<&CommandEntry>, EngineError> {
        let entry = self.get(id)?;
        Ok(self.entries.get(entry.index + 1))
    }

    /// All commands in insertion order.
    pub fn get_all(&self) -> Vec<Command> {
        self.entries.iter().map(|e| e.command.clone()).collect()
    }

    /// Commands in `[start, stop)` by insertion index, clamped to the history.
    pub fn get_slice(&self, start: usize, stop: usize) -> Vec<Command> {
        let stop = stop.min(self.entries.len());
        let start = start.min(stop);
        self.entries[start..stop]
            .iter()
            .map(|e| e.command.clone())
            .collect()
    }

    /// The most recently inserted entry.
    pub fn get_tail(&self) -> Option<&CommandEntry> {
        self.entries.last()
    }

    /// Append an added command to the main FIFO.
    ///
    /// Re-queueing an ID that is already waiting is a no-op. An ID waiting in
    /// the setup FIFO is moved, so it never waits in both.
    pub fn enqueue_main(&mut self, id: &str) -> Result<(), EngineError> {
        self.ensure_known(id)?;
        self.setup_queue.remove(id);
        self.main_queue.insert(id);
        Ok(())
    }

    /// Append an added command to the setup FIFO.
    ///
    /// Same set semantics as [`enqueue_main`](Self::enqueue_main).
    pub fn enqueue_setup(&mut self, id: &str) -> Result<(), EngineError> {
        self.ensure_known(id)?;
        self.main_queue.remove(id);
        self.setup_queue.insert(id);
        Ok(())
    }

    /// Pop the front of the main FIFO.
    pub fn dequeue_main(&mut self) -> Option<String> {
        let id = self.main_queue.pop_front()?;
        self.last_dequeued_id = Some(id.clone());
        Some(id)
    }

    /// Pop the front of the setup FIFO.
    pub fn dequeue_setup(&mut self) -> Option<String> {
        let id = self.setup_queue.pop_front()?;
        self.last_dequeued_id = Some(id.clone());
        Some(id)
    }

    /// Set or clear the running command.
    ///
    /// The ID is not validated here; callers look the command up first.
    pub fn set_running(&mut self, id: Option<String>) {
        self.running_id = id;
    }

    /// ID of the running command.
    pub fn get_running_id(&self) -> Option<&str> {
        self.running_id.as_deref()
    }

    /// Entry of the running command.
    pub fn get_running(&self) -> Option<&CommandEntry> {
        self.running_id
            .as_deref()
            .and_then(|id| self.get_if_present(id))
    }

    /// Most recent ID removed from either FIFO by a dequeue.
    pub fn get_last_dequeued(&self) -> Option<&str> {
        self.last_dequeued_id.as_deref()
    }

    /// Empty the main FIFO without touching the history.
    pub fn clear_queue(&mut self) {
        self.main_queue.clear();
    }

    /// Empty the setup FIFO without touching the history.
    pub fn clear_setup_queue(&mut self) {
        self.setup_queue.clear();
    }

    /// Remove an ID from the main FIFO if it is waiting there.
    pub fn remove_from_queue(&mut self, id: &str) {
        self.main_queue.remove(id);
    }

    /// Remove an ID from the setup FIFO if it is waiting there.
    pub fn remove_from_setup_queue(&mut self, id: &str) {
        self.setup_queue.remove(id);
    }

    /// IDs waiting in the main FIFO, front first.
    pub fn queue_ids(&self) -> impl Iterator<Item = &str> {
        self.main_queue.iter()
    }

    /// IDs waiting in the setup FIFO, front first.
    pub fn setup_queue_ids(&self) -> impl Iterator<Item = &str> {
        self.setup_queue.iter()
    }

    /// Front of the main FIFO without removing it.
    pub fn queue_head(&self) -> Option<&str> {
        self.main_queue.head()
    }

    /// Front of the setup FIFO without removing it.
    pub fn setup_queue_head(&self) -> Option<&str> {
        self.setup_queue.head()
    }

    /// Number of IDs in the main FIFO.
    pub fn queue_len(&self) -> usize {
        self.main_queue.len()
    }

    /// Number of IDs in the setup FIFO.
    pub fn setup_queue_len(&self) -> usize {
        self.setup_queue.len()
    }

    /// Whether an ID is waiting in either FIFO.
    pub fn is_queued(&self, id: &str) -> bool {
        self.main_queue.contains(id) || self.setup_queue.contains(id)
    }

    fn ensure_known(&self, id: &str) -> Result<(), EngineError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(EngineError::CommandNotFound(id.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CommandIntent, CommandStatus};

    fn make_command(id: &str) -> Command {
        Command::queued(id, None, CommandIntent::Protocol, serde_json::json!({ "name": id }), 0)
    }

    fn queue_with(ids: &[&str]) -> CommandQueue {
        let mut q = CommandQueue::new();
        for id in ids {
            q.add(make_command(id)).unwrap();
        }
        q
    }

    #[test]
    fn test_add_and_get() {
        let q = queue_with(&["a", "b"]);
        assert_eq!(q.get("a").unwrap().index, 0);
        assert_eq!(q.get("b").unwrap().index, 1);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_add_duplicate_id() {
        let mut q = queue_with(&["a"]);
        let result = q.add(make_command("a"));
        assert_eq!(result, Err(EngineError::DuplicateId("a".into())));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let q = queue_with(&["a"]);
        assert_eq!(q.get("nope"), Err(EngineError::CommandNotFound("nope".into())));
        assert!(q.get_if_present("nope").is_none());
    }

    #[test]
    fn test_get_next() {
        let q = queue_with(&["a", "b", "c"]);
        assert_eq!(q.get_next("a").unwrap().unwrap().command.id, "b");
        assert_eq!(q.get_next("b").unwrap().unwrap().command.id, "c");
        assert!(q.get_next("c").unwrap().is_none());
        assert!(q.get_next("z").is_err());
    }

    #[test]
    fn test_slice_and_tail() {
        let q = queue_with(&["a", "b", "c", "d"]);
        let ids: Vec<_> = q.get_slice(1, 3).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(q.get_slice(2, 100).len(), 2);
        assert!(q.get_slice(3, 1).is_empty());
        assert_eq!(q.get_tail().unwrap().command.id, "d");
        assert!(CommandQueue::new().get_tail().is_none());
    }

    #[test]
    fn test_replace_keeps_index() {
        let mut q = queue_with(&["a", "b"]);
        let mut updated = q.get("a").unwrap().command.clone();
        updated.status = CommandStatus::Succeeded;
        q.replace(updated).unwrap();

        let entry = q.get("a").unwrap();
        assert_eq!(entry.index, 0);
        assert_eq!(entry.command.status, CommandStatus::Succeeded);
        assert_eq!(q.get_all()[0].id, "a");
    }

    #[test]
    fn test_enqueue_unknown_id() {
        let mut q = CommandQueue::new();
        assert!(q.enqueue_main("ghost").is_err());
        assert!(q.enqueue_setup("ghost").is_err());
    }

    #[test]
    fn test_main_fifo_order_and_set_semantics() {
        let mut q = queue_with(&["a", "b", "c"]);
        q.enqueue_main("a").unwrap();
        q.enqueue_main("b").unwrap();
        q.enqueue_main("a").unwrap();
        q.enqueue_main("c").unwrap();
        assert_eq!(q.queue_len(), 3);

        assert_eq!(q.dequeue_main().as_deref(), Some("a"));
        assert_eq!(q.dequeue_main().as_deref(), Some("b"));
        assert_eq!(q.get_last_dequeued(), Some("b"));
        assert_eq!(q.dequeue_main().as_deref(), Some("c"));
        assert!(q.dequeue_main().is_none());
        assert_eq!(q.get_last_dequeued(), Some("c"));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_setup_queue_is_independent() {
        let mut q = queue_with(&["a", "s"]);
        q.enqueue_main("a").unwrap();
        q.enqueue_setup("s").unwrap();
        assert_eq!(q.dequeue_setup().as_deref(), Some("s"));
        assert!(q.dequeue_setup().is_none());
        assert_eq!(q.queue_head(), Some("a"));
    }

    #[test]
    fn test_id_waits_in_one_fifo_only() {
        let mut q = queue_with(&["a"]);
        q.enqueue_main("a").unwrap();
        q.enqueue_setup("a").unwrap();
        assert_eq!(q.queue_len(), 0);
        assert_eq!(q.setup_queue_len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut q = queue_with(&["a", "b", "c"]);
        for id in ["a", "b", "c"] {
            q.enqueue_main(id).unwrap();
        }
        q.remove_from_queue("b");
        q.remove_from_queue("b");
        q.remove_from_setup_queue("zzz");
        assert_eq!(q.queue_ids().collect::<Vec<_>>(), vec!["a", "c"]);

        q.clear_queue();
        assert_eq!(q.queue_len(), 0);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_running_pointer() {
        let mut q = queue_with(&["a"]);
        assert!(q.get_running().is_none());
        q.set_running(Some("a".into()));
        assert_eq!(q.get_running().unwrap().command.id, "a");
        q.set_running(None);
        assert!(q.get_running_id().is_none());
    }
}
