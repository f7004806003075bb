//! Music feature tracking and kinetic parameter smoothing
//!
//! [`MusicStateTracker`] ingests feature-stream ticks and produces bounded,
//! smoothed kinetic parameters for the render surface: a geometrically
//! decaying beat pulse, a bpm-derived breathing scale, and a momentum
//! signal computed over a bounded history of recent snapshots.
//!
//! Faulty input (NaN, out-of-range) is clamped at ingestion and counted;
//! it is never propagated downstream.

use crate::config::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// One sample from the external music feature stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSample {
    /// Track energy (expected in [0, 1])
    pub energy: f32,
    /// Track valence (expected in [0, 1])
    pub valence: f32,
    /// Tempo in beats per minute (expected > 0)
    pub bpm: f32,
    /// Whether a beat onset was detected on this tick
    pub beat_onset: bool,
    /// Sample time in seconds on the engine clock
    pub timestamp: f64,
}

/// Smoothed per-tick music state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicSnapshot {
    /// Clamped energy in [0, 1]
    pub energy: f32,
    /// Clamped valence in [0, 1]
    pub valence: f32,
    /// Clamped tempo, floored at the configured minimum
    pub bpm: f32,
    /// Position inside the current beat, wraps modulo 1
    pub beat_phase: f32,
    /// Decaying beat recency in [0, 1]
    pub beat_pulse: f32,
    /// Snapshot time in seconds
    pub timestamp: f64,
}

/// Fixed-capacity ring buffer of recent snapshots
///
/// Oldest entry is evicted FIFO on overflow. Used only for smoothing and
/// momentum, never for identification.
#[derive(Debug, Clone)]
pub struct MusicalMemory {
    entries: VecDeque<MusicSnapshot>,
    capacity: usize,
}

impl Default for MusicalMemory {
    fn default() -> Self {
        Self::new(TrackerConfig::default().memory_capacity)
    }
}

impl MusicalMemory {
    /// Create a memory holding at most `capacity` snapshots
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot, evicting the oldest entry on overflow
    pub fn push(&mut self, snapshot: MusicSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Number of retained snapshots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no snapshots are retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean energy over the most recent `window` snapshots
    pub fn windowed_energy(&self, window: usize) -> f32 {
        let window = window.min(self.entries.len());
        if window == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .entries
            .iter()
            .rev()
            .take(window)
            .map(|s| s.energy)
            .sum();
        sum / window as f32
    }

    /// Iterate snapshots oldest-first
    pub fn iter(&self) -> impl Iterator<Item = &MusicSnapshot> {
        self.entries.iter()
    }

    /// Drop all retained snapshots
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Tracker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// No active track
    Idle,
    /// Receiving feature ticks
    Tracking,
}

/// State machine turning feature ticks into bounded kinetic parameters
#[derive(Debug)]
pub struct MusicStateTracker {
    config: TrackerConfig,
    state: TrackerState,
    last_timestamp: f64,
    beat_phase: f32,
    beat_pulse: f32,
    breathing_phase: f64,
    memory: MusicalMemory,
    momentum: f32,
    latest: Option<MusicSnapshot>,
    /// How often ingestion clamping fired (observability, not errors)
    clamp_count: u64,
}

impl MusicStateTracker {
    /// Create a tracker with the given configuration
    pub fn new(config: TrackerConfig) -> Self {
        let memory = MusicalMemory::new(config.memory_capacity);
        Self {
            config,
            state: TrackerState::Idle,
            last_timestamp: 0.0,
            beat_phase: 0.0,
            beat_pulse: 0.0,
            breathing_phase: 0.0,
            memory,
            momentum: 0.0,
            latest: None,
            clamp_count: 0,
        }
    }

    /// Ingest one feature tick and return the resulting snapshot
    ///
    /// The first tick after a track starts transitions Idle -> Tracking.
    /// Ticks must be processed strictly in arrival order; every tick
    /// updates the musical memory.
    pub fn update(&mut self, sample: &FeatureSample) -> MusicSnapshot {
        if self.state == TrackerState::Idle {
            debug!("MusicStateTracker: Idle -> Tracking");
            self.state = TrackerState::Tracking;
            self.last_timestamp = sample.timestamp;
        }

        let energy = self.clamp_unit(sample.energy, "energy");
        let valence = self.clamp_unit(sample.valence, "valence");
        let bpm = self.clamp_bpm(sample.bpm);

        let dt = (sample.timestamp - self.last_timestamp).max(0.0);
        self.last_timestamp = sample.timestamp;

        // Beat phase accumulates at bpm rate and wraps modulo 1
        self.beat_phase = (self.beat_phase + dt as f32 * bpm / 60.0).fract();

        // Pulse snaps to 1.0 on onset, decays geometrically per tick
        if sample.beat_onset {
            self.beat_pulse = 1.0f32.max(self.beat_pulse);
        } else {
            self.beat_pulse *= self.config.pulse_decay;
        }

        // Breathing cycle spans a fixed number of beats; bpm is floored at
        // ingestion so this never divides by zero
        let breath_period = self.config.beats_per_breath as f64 * 60.0 / bpm as f64;
        self.breathing_phase = (self.breathing_phase + dt / breath_period).fract();

        let snapshot = MusicSnapshot {
            energy,
            valence,
            bpm,
            beat_phase: self.beat_phase,
            beat_pulse: self.beat_pulse,
            timestamp: sample.timestamp,
        };

        // Momentum: smoothed delta of current energy against the windowed
        // average of recent memory
        let avg = self.memory.windowed_energy(self.config.momentum_window);
        let delta = if self.memory.is_empty() {
            0.0
        } else {
            energy - avg
        };
        let s = self.config.momentum_smoothing;
        self.momentum = self.momentum * s + delta * (1.0 - s);

        self.memory.push(snapshot);
        self.latest = Some(snapshot);

        trace!(
            "tick t={:.3} energy={:.3} pulse={:.3} phase={:.3}",
            sample.timestamp,
            energy,
            self.beat_pulse,
            self.beat_phase
        );

        snapshot
    }

    /// Explicit stop signal: Tracking -> Idle, kinetic state reset
    pub fn stop(&mut self) {
        if self.state == TrackerState::Tracking {
            debug!("MusicStateTracker: Tracking -> Idle");
        }
        self.state = TrackerState::Idle;
        self.beat_phase = 0.0;
        self.beat_pulse = 0.0;
        self.breathing_phase = 0.0;
        self.momentum = 0.0;
        self.memory.clear();
        self.latest = None;
    }

    /// Current lifecycle state
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Bounded breathing scale derived from the current breathing phase
    pub fn breathing_scale(&self) -> f32 {
        let raw = 1.0
            + self.config.breathing_amplitude
                * (self.breathing_phase * std::f64::consts::TAU).sin() as f32;
        raw.clamp(self.config.breathing_min, self.config.breathing_max)
    }

    /// Smoothed energy delta against recent memory
    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Most recent snapshot, if any tick has been ingested
    pub fn latest(&self) -> Option<&MusicSnapshot> {
        self.latest.as_ref()
    }

    /// Bounded history of recent snapshots
    pub fn memory(&self) -> &MusicalMemory {
        &self.memory
    }

    /// How often ingestion clamping fired
    pub fn clamp_count(&self) -> u64 {
        self.clamp_count
    }

    fn clamp_unit(&mut self, value: f32, name: &str) -> f32 {
        if !value.is_finite() {
            self.clamp_count += 1;
            trace!("Clamped non-finite {} to 0.0", name);
            return 0.0;
        }
        if !(0.0..=1.0).contains(&value) {
            self.clamp_count += 1;
            return value.clamp(0.0, 1.0);
        }
        value
    }

    fn clamp_bpm(&mut self, bpm: f32) -> f32 {
        if !bpm.is_finite() {
            self.clamp_count += 1;
            return self.config.min_bpm;
        }
        if bpm < self.config.min_bpm || bpm > self.config.max_bpm {
            self.clamp_count += 1;
            return bpm.clamp(self.config.min_bpm, self.config.max_bpm);
        }
        bpm
    }
}

impl Default for MusicStateTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
