// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::types::{AccountId, ModuleType, Task};

/// FIFO queue of pending tasks, deduplicated by `(account, module)`.
///
/// Semantics:
/// - Insertion order is execution order, across every trigger source.
/// - A task whose key is already queued is dropped on insert; the queued
///   instance keeps its position.
/// - Tasks leave the queue only via `pop_front`, `remove_account` or `clear`.
///   Nothing is ever re-enqueued automatically.
///
/// The queue is only ever mutated from behind the core's lock, so it carries
/// no synchronisation of its own.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
    /// Keys of every queued task; always mirrors `tasks`.
    pending: HashSet<(AccountId, ModuleType)>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, account_id: &str, module: ModuleType) -> bool {
        self.pending.contains(&(account_id.to_string(), module))
    }

    /// Append `task` unless a task with the same key is already queued.
    ///
    /// Returns `true` if the task was inserted.
    pub fn insert_if_absent(&mut self, task: Task) -> bool {
        if self.contains(&task.account_id, task.module) {
            debug!(
                account = %task.account_id,
                module = %task.module,
                task_id = task.id,
                "task already queued; dropping duplicate"
            );
            return false;
        }

        debug!(
            account = %task.account_id,
            module = %task.module,
            task_id = task.id,
            position = self.tasks.len(),
            "task queued"
        );
        self.pending.insert((task.account_id.clone(), task.module));
        self.tasks.push_back(task);
        true
    }

    pub fn pop_front(&mut self) -> Option<Task> {
        let task = self.tasks.pop_front()?;
        self.pending.remove(&(task.account_id.clone(), task.module));
        Some(task)
    }

    /// Drop every queued task belonging to `account_id`; returns how many.
    pub fn remove_account(&mut self, account_id: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.account_id != account_id);
        self.pending.retain(|(id, _)| id != account_id);
        let removed = before - self.tasks.len();
        if removed > 0 {
            debug!(account = %account_id, removed, "removed queued tasks for account");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Pending tasks for one account, in queue order.
    pub fn for_account(&self, account_id: &str) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }
}
