//! Frame-synchronized variable write batching
//!
//! [`VariableWriteBatcher`] is the single arbitrating owner of the shared
//! render-surface namespace. Producers hand it immutable write requests via
//! [`VariableWriteBatcher::enqueue`]; nothing else mutates the surface.
//!
//! Within one cycle, a second enqueue for the same key overwrites the first
//! regardless of priority (last-write-wins by arrival order). Priority
//! governs flush scheduling, not conflict resolution.

use crate::config::BatcherConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Flush scheduling class of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WritePriority {
    /// Flushed every cycle, never dropped
    Critical,
    /// Flushed every cycle, never dropped
    High,
    /// Flushed every cycle, droppable only after all Low writes are gone
    Normal,
    /// Flushed at reduced cadence, first to be dropped under backpressure
    Low,
}

/// One pending write; created and consumed within a single flush cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableWriteRequest {
    /// Variable name in the render-surface namespace
    pub key: String,
    /// Preformatted value string
    pub value: String,
    /// Flush scheduling class
    pub priority: WritePriority,
    /// Producer that requested the write
    pub owner: String,
}

/// The shared, globally visible key/value variable namespace
///
/// The batcher is the only component permitted to call `set_variable`;
/// read-back via `get_variable` is open to everyone (values read back may
/// need sanitization, see [`crate::palette::sanitize_hex`]).
pub trait RenderSurface {
    /// Set one variable
    fn set_variable(&mut self, key: &str, value: &str);
    /// Read one variable back as a raw string
    fn get_variable(&self, key: &str) -> Option<String>;
}

/// HashMap-backed render surface with a cloneable shared handle
///
/// Hosts keep one clone to read published values while the engine owns
/// another; the interior lock makes the handle cheap to share.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRenderSurface {
    vars: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRenderSurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables currently set
    pub fn len(&self) -> usize {
        self.vars.lock().len()
    }

    /// Whether no variables are set
    pub fn is_empty(&self) -> bool {
        self.vars.lock().is_empty()
    }
}

impl RenderSurface for InMemoryRenderSurface {
    fn set_variable(&mut self, key: &str, value: &str) {
        self.vars.lock().insert(key.to_string(), value.to_string());
    }

    fn get_variable(&self, key: &str) -> Option<String> {
        self.vars.lock().get(key).cloned()
    }
}

/// Coalesces many independent variable writes into one mutation per frame
#[derive(Debug)]
pub struct VariableWriteBatcher {
    config: BatcherConfig,
    pending: HashMap<String, VariableWriteRequest>,
    /// Coalesces multiple same-frame enqueues into one flush
    flush_scheduled: bool,
    frame: u64,
    dropped: u64,
    flushes: u64,
    writes_applied: u64,
}

impl VariableWriteBatcher {
    /// Create a batcher with the given configuration
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            flush_scheduled: false,
            frame: 0,
            dropped: 0,
            flushes: 0,
            writes_applied: 0,
        }
    }

    /// Queue one write; synchronous and non-blocking
    ///
    /// A second enqueue for the same key within the same cycle overwrites
    /// the first regardless of priority.
    pub fn enqueue(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        priority: WritePriority,
        owner: impl Into<String>,
    ) {
        let key = key.into();
        let request = VariableWriteRequest {
            key: key.clone(),
            value: value.into(),
            priority,
            owner: owner.into(),
        };
        self.pending.insert(key, request);
        self.flush_scheduled = true;
    }

    /// Apply pending writes to the render surface; exactly one flush per
    /// render-frame tick
    ///
    /// Low-priority entries are retained until their cadence frame comes
    /// up. Returns the number of writes applied.
    pub fn flush(&mut self, surface: &mut dyn RenderSurface) -> usize {
        self.frame += 1;

        if !self.flush_scheduled {
            return 0;
        }

        self.enforce_cap();

        let emit_low = self.config.low_cadence <= 1 || self.frame % self.config.low_cadence == 0;
        let mut applied = 0;

        // Deterministic application order: key-sorted
        let mut due: Vec<VariableWriteRequest> = Vec::with_capacity(self.pending.len());
        self.pending.retain(|_, request| {
            if request.priority == WritePriority::Low && !emit_low {
                true
            } else {
                due.push(request.clone());
                false
            }
        });
        due.sort_by(|a, b| a.key.cmp(&b.key));

        for request in due {
            surface.set_variable(&request.key, &request.value);
            applied += 1;
            trace!("flush {} = {} ({})", request.key, request.value, request.owner);
        }

        self.writes_applied += applied as u64;
        self.flushes += 1;
        // Retained Low entries keep the next flush scheduled
        self.flush_scheduled = !self.pending.is_empty();

        applied
    }

    /// Whether a flush is currently scheduled
    pub fn is_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Pending writes not yet applied
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total writes dropped under backpressure
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Total flush cycles that had scheduled work
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Total writes applied across all flushes
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied
    }

    /// Discard all pending writes and scheduling state
    pub fn reset(&mut self) {
        self.pending.clear();
        self.flush_scheduled = false;
    }

    /// Drop excess low-priority entries when the pending set exceeds the
    /// hard cap; Critical/High writes are never dropped
    fn enforce_cap(&mut self) {
        if self.pending.len() <= self.config.max_pending {
            return;
        }
        let mut excess = self.pending.len() - self.config.max_pending;
        let before = excess;

        // Drop Low first, then Normal; key-sorted so the policy is
        // deterministic under test
        for class in [WritePriority::Low, WritePriority::Normal] {
            if excess == 0 {
                break;
            }
            let mut keys: Vec<String> = self
                .pending
                .iter()
                .filter(|(_, r)| r.priority == class)
                .map(|(k, _)| k.clone())
                .collect();
            keys.sort();
            for key in keys.into_iter().rev().take(excess) {
                self.pending.remove(&key);
            }
            excess = self
                .pending
                .len()
                .saturating_sub(self.config.max_pending);
        }

        let dropped_now = before - excess;
        if dropped_now > 0 {
            self.dropped += dropped_now as u64;
            warn!(
                "Write batch overflow: dropped {} pending writes (cap {})",
                dropped_now, self.config.max_pending
            );
        }
    }
}

impl Default for VariableWriteBatcher {
    fn default() -> Self {
        Self::new(BatcherConfig::default())
    }
}
