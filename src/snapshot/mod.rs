// Snapshot history for reverse execution, and memory inspection

use crate::interpreter::engine::State;
use crate::interpreter::errors::RuntimeError;
use crate::memory::stack;
use crate::memory::value::{PointerValue, Value};
use crate::memory::{refs_intersect, LogEntry, Memory};

/// Fixed cost charged for every snapshot
const SNAPSHOT_OVERHEAD: usize = 256;
/// Rough cost of one logged access
const LOG_ENTRY_SIZE: usize = 64;
/// Rough cost of one scope frame
const FRAME_SIZE: usize = 96;

/// A state kept in the history
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: State,
    size: usize,
}

impl Snapshot {
    /// Estimate the memory this snapshot adds on top of `previous`
    ///
    /// Memory storage is persistent: a state that did not write memory
    /// shares its bytes with the previous snapshot and is not charged for
    /// them again.
    pub fn estimated_size(state: &State, previous: Option<&Snapshot>) -> usize {
        let memory = match previous {
            Some(previous) if state.memory.shares_storage(&previous.state.memory) => 0,
            _ => state.memory.capacity(),
        };
        let frames = stack::frames(&state.scope).count();
        SNAPSHOT_OVERHEAD + memory + state.memory_log.len() * LOG_ENTRY_SIZE + frames * FRAME_SIZE
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Ordered snapshots under a memory budget
#[derive(Debug)]
pub struct History {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
}

impl History {
    pub fn new(max_memory: usize) -> Self {
        History {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
        }
    }

    /// Add a state to the history
    pub fn push(&mut self, state: State) -> Result<(), RuntimeError> {
        let size = Snapshot::estimated_size(&state, self.snapshots.last());
        if self.current_memory + size > self.max_memory {
            return Err(RuntimeError::SnapshotLimitExceeded {
                current: self.current_memory,
                limit: self.max_memory,
            });
        }
        self.current_memory += size;
        self.snapshots.push(Snapshot { state, size });
        Ok(())
    }

    /// Get a snapshot by index
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Drop every snapshot from `len` on
    pub fn truncate(&mut self, len: usize) {
        for dropped in self.snapshots.drain(len.min(self.snapshots.len())..) {
            self.current_memory -= dropped.size;
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get current memory usage
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    /// Get max memory limit
    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}

/// What the log says about one object
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    /// Most recent logged access overlapping the object
    pub entry: LogEntry,
    /// Value in the current memory
    pub current: Option<Value>,
    /// Value in the memory version the log window started from
    pub previous: Option<Value>,
}

/// Report the latest access to the object at `reference`
///
/// `log` is the access log since `old_memory` was captured. Values that
/// cannot be read (out of range, incomplete type) are `None`.
pub fn inspect_pointer(
    reference: &PointerValue,
    log: &[LogEntry],
    memory: &Memory,
    old_memory: &Memory,
) -> Option<Inspection> {
    let entry = log
        .iter()
        .rev()
        .find(|entry| refs_intersect(&entry.reference, reference))?;
    Some(Inspection {
        entry: entry.clone(),
        current: memory.read(reference).ok(),
        previous: old_memory.read(reference).ok(),
    })
}
