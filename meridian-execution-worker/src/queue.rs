// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! The execution queue tracks every block between "announced" and "results
//! persisted". It enforces the scheduling rules of the engine:
//! parent-before-child, at most one entry per block id, and no descendant of
//! an executing block may start executing.

use meridian_execution_exports::ExecutableBlock;
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionId};
use meridian_models::commitment::StateCommitment;
use meridian_models::prehash::{PreHashMap, PreHashSet};
use tracing::debug;

/// Execution status of a queue entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryStatus {
    /// announced, still missing collections
    Received,
    /// every guaranteed collection is in hand
    Complete,
    /// handed to an executor thread
    Executing,
}

/// One tracked block.
pub struct QueueEntry {
    /// the block being assembled
    pub executable: ExecutableBlock,
    /// where the entry stands
    pub status: EntryStatus,
    /// guaranteed collections not yet stored
    pub missing_collections: PreHashSet<CollectionId>,
}

/// The set of pending and in-flight blocks, with the parent → children edges
/// needed to trigger children when parents finish.
#[derive(Default)]
pub struct ExecutionQueue {
    /// entries, keyed by block id
    entries: PreHashMap<BlockId, QueueEntry>,
    /// children waiting for a parent, keyed by parent id.
    /// Kept independently of `entries` so that a child arriving before its
    /// parent still gets its start state when the parent executes.
    waiting_on_parent: PreHashMap<BlockId, PreHashSet<BlockId>>,
    /// ids currently in `Executing` status, kept explicit so ancestor checks
    /// are a set lookup per hop
    executing: PreHashSet<BlockId>,
}

impl ExecutionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new block. Idempotent: returns false and mutates nothing if
    /// the id is already present.
    pub fn enqueue(&mut self, executable: ExecutableBlock) -> bool {
        let block_id = executable.id();
        if self.entries.contains_key(&block_id) {
            debug!("queue: block {} already enqueued", block_id);
            return false;
        }
        let missing_collections = executable.missing_collections();
        let status = if missing_collections.is_empty() {
            EntryStatus::Complete
        } else {
            EntryStatus::Received
        };
        self.waiting_on_parent
            .entry(executable.parent_id())
            .or_default()
            .insert(block_id);
        self.entries.insert(
            block_id,
            QueueEntry {
                executable,
                status,
                missing_collections,
            },
        );
        true
    }

    /// Whether a block is tracked.
    pub fn contains(&self, block_id: &BlockId) -> bool {
        self.entries.contains_key(block_id)
    }

    /// Number of tracked blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry is currently executing.
    pub fn has_executing(&self) -> bool {
        !self.executing.is_empty()
    }

    /// Look at an entry.
    pub fn get(&self, block_id: &BlockId) -> Option<&QueueEntry> {
        self.entries.get(block_id)
    }

    /// Record the parent's post-state for a tracked block.
    pub fn set_start_state(&mut self, block_id: &BlockId, commitment: StateCommitment) {
        if let Some(entry) = self.entries.get_mut(block_id) {
            entry.executable.start_state = Some(commitment);
        }
    }

    /// Fill one fetched collection into a tracked block. Returns true when
    /// the entry just became complete.
    pub fn store_collection(
        &mut self,
        block_id: &BlockId,
        collection_id: CollectionId,
        collection: Collection,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(block_id) else {
            return false;
        };
        if !entry.missing_collections.remove(&collection_id) {
            // duplicate delivery, nothing to do
            return false;
        }
        entry.executable.fill_collection(collection_id, collection);
        if entry.missing_collections.is_empty() && entry.status == EntryStatus::Received {
            entry.status = EntryStatus::Complete;
            return true;
        }
        false
    }

    /// Every block allowed to execute right now: complete, start state known,
    /// not already executing, no executing ancestor, and accepted by
    /// `should_execute`. Siblings are ordered lower height first, then by id.
    pub fn ready_blocks<F>(&self, should_execute: F) -> Vec<BlockId>
    where
        F: Fn(u64) -> bool,
    {
        let mut ready: Vec<(u64, BlockId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.status == EntryStatus::Complete)
            .filter(|(_, entry)| entry.executable.start_state.is_some())
            .filter(|(_, entry)| should_execute(entry.executable.height()))
            .filter(|(block_id, _)| !self.has_executing_ancestor(block_id))
            .map(|(block_id, entry)| (entry.executable.height(), *block_id))
            .collect();
        ready.sort_unstable();
        ready.into_iter().map(|(_, block_id)| block_id).collect()
    }

    /// Walk the parent chain through tracked entries; true if any ancestor is
    /// in `Executing` status.
    fn has_executing_ancestor(&self, block_id: &BlockId) -> bool {
        let mut current = self
            .entries
            .get(block_id)
            .map(|entry| entry.executable.parent_id());
        while let Some(parent_id) = current {
            if self.executing.contains(&parent_id) {
                return true;
            }
            current = self
                .entries
                .get(&parent_id)
                .map(|entry| entry.executable.parent_id());
        }
        false
    }

    /// Transition a ready entry to `Executing` and hand out the executable
    /// block. Returns None if the entry is missing or already executing.
    pub fn start_executing(&mut self, block_id: &BlockId) -> Option<ExecutableBlock> {
        let entry = self.entries.get_mut(block_id)?;
        if entry.status != EntryStatus::Complete || entry.executable.start_state.is_none() {
            return None;
        }
        entry.status = EntryStatus::Executing;
        self.executing.insert(*block_id);
        Some(entry.executable.clone())
    }

    /// Remove an executed entry and propagate its post-state to every child
    /// waiting on it. Returns the children whose start state was just set.
    pub fn on_executed(
        &mut self,
        block_id: &BlockId,
        new_state_commitment: StateCommitment,
    ) -> Vec<BlockId> {
        if let Some(entry) = self.entries.remove(block_id) {
            self.unlink_parent_edge(&entry.executable.parent_id(), block_id);
        }
        self.executing.remove(block_id);

        let mut updated = Vec::new();
        if let Some(children) = self.waiting_on_parent.remove(block_id) {
            for child_id in children {
                if let Some(child) = self.entries.get_mut(&child_id) {
                    child.executable.start_state = Some(new_state_commitment);
                    updated.push(child_id);
                }
            }
        }
        updated
    }

    /// Drop an entry after a fatal error.
    pub fn on_fatal(&mut self, block_id: &BlockId) {
        if let Some(entry) = self.entries.remove(block_id) {
            self.unlink_parent_edge(&entry.executable.parent_id(), block_id);
        }
        self.executing.remove(block_id);
    }

    fn unlink_parent_edge(&mut self, parent_id: &BlockId, child_id: &BlockId) {
        if let Some(children) = self.waiting_on_parent.get_mut(parent_id) {
            children.remove(child_id);
            if children.is_empty() {
                self.waiting_on_parent.remove(parent_id);
            }
        }
    }
}
