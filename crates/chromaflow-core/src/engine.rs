//! Engine orchestrator
//!
//! [`ChromaEngine`] wires the palette pipeline (cache -> deriver ->
//! batcher) and the kinetics pipeline (tracker -> batcher) together and
//! owns the per-frame cadence: drain extraction replies, enforce the
//! extraction deadline, then perform the single batched surface mutation.
//!
//! Everything runs single-threaded and cooperatively; the only
//! asynchronous boundary is the extraction reply channel, and stale
//! replies are discarded by generation rather than cancelled.

use crate::batcher::{RenderSurface, VariableWriteBatcher, WritePriority};
use crate::cache::PaletteCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::extraction::{ColorExtractor, ExtractionReply};
use crate::music::{FeatureSample, MusicStateTracker};
use crate::palette::{Palette, PaletteDeriver, SwatchMap};
use chrono::Utc;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Render-surface variable names published by the engine
pub mod keys {
    /// Primary palette color, `#rrggbb`
    pub const PALETTE_PRIMARY: &str = "palette.primary";
    /// Primary palette color, `R,G,B`
    pub const PALETTE_PRIMARY_RGB: &str = "palette.primary.rgb";
    /// Secondary palette color, `#rrggbb`
    pub const PALETTE_SECONDARY: &str = "palette.secondary";
    /// Secondary palette color, `R,G,B`
    pub const PALETTE_SECONDARY_RGB: &str = "palette.secondary.rgb";
    /// Accent palette color, `#rrggbb`
    pub const PALETTE_ACCENT: &str = "palette.accent";
    /// Accent palette color, `R,G,B`
    pub const PALETTE_ACCENT_RGB: &str = "palette.accent.rgb";
    /// Derived highlight token, `#rrggbb`
    pub const PALETTE_HIGHLIGHT: &str = "palette.highlight";
    /// Derived highlight token, `R,G,B`
    pub const PALETTE_HIGHLIGHT_RGB: &str = "palette.highlight.rgb";
    /// Derived shadow token, `#rrggbb`
    pub const PALETTE_SHADOW: &str = "palette.shadow";
    /// Derived shadow token, `R,G,B`
    pub const PALETTE_SHADOW_RGB: &str = "palette.shadow.rgb";
    /// Decaying beat recency, 3-decimal string in [0, 1]
    pub const KINETIC_BEAT_PULSE: &str = "kinetic.beatPulse";
    /// Bounded breathing scale, 3-decimal string in [0.95, 1.05]
    pub const KINETIC_BREATHING_SCALE: &str = "kinetic.breathingScale";
    /// Tempo, integer string
    pub const KINETIC_BPM: &str = "kinetic.bpm";
    /// Clamped energy, 3-decimal string
    pub const KINETIC_ENERGY: &str = "kinetic.energy";
    /// Smoothed energy delta, 3-decimal string
    pub const KINETIC_MOMENTUM: &str = "kinetic.momentum";
    /// Base background color the shadow token derives from (read-back)
    pub const BASE_BACKGROUND: &str = "surface.baseBackground";
}

const OWNER_PALETTE: &str = "palette";
const OWNER_KINETICS: &str = "kinetics";

/// Format a kinetic scalar for the outbound contract (3 decimals)
pub fn format_scalar(value: f32) -> String {
    format!("{:.3}", value)
}

/// Format bpm for the outbound contract (integer string)
pub fn format_bpm(bpm: f32) -> String {
    format!("{}", bpm.round() as i64)
}

/// An extraction request the engine is still waiting on
#[derive(Debug, Clone)]
struct PendingExtraction {
    generation: u64,
    track_id: String,
    deadline: f64,
}

/// Observable counters across all components; never an error surface
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineDiagnostics {
    /// Music features clamped at ingestion
    pub feature_clamps: u64,
    /// Swatch strings unparsable after sanitization
    pub malformed_swatches: u64,
    /// Token conversions clipped into gamut
    pub gamut_clamps: u64,
    /// Writes dropped under backpressure
    pub dropped_writes: u64,
    /// Flush cycles that had scheduled work
    pub flushes: u64,
    /// Writes applied to the surface
    pub writes_applied: u64,
    /// Extraction replies discarded for generation mismatch
    pub stale_replies_discarded: u64,
    /// Extraction requests that hit their deadline
    pub extraction_timeouts: u64,
    /// Palette cache hits
    pub cache_hits: u64,
    /// Palette cache misses
    pub cache_misses: u64,
}

/// Color harmony and reactive variable propagation engine
///
/// Constructed explicitly with its collaborators injected; there is no
/// global instance. Hosts drive it with `on_track_change` /
/// `on_feature_tick` between frames and call `on_frame` once per render
/// tick, after all same-frame producer calls (settle, then mutate).
pub struct ChromaEngine<X: ColorExtractor, S: RenderSurface> {
    config: EngineConfig,
    deriver: PaletteDeriver,
    cache: PaletteCache,
    tracker: MusicStateTracker,
    batcher: VariableWriteBatcher,
    extractor: X,
    replies: Receiver<ExtractionReply>,
    surface: S,
    /// Tags outstanding extraction requests; bumped on every track change
    generation: u64,
    current_track: Option<String>,
    pending: Option<PendingExtraction>,
    stale_replies_discarded: u64,
    extraction_timeouts: u64,
    cache_hits: u64,
    cache_misses: u64,
}

impl<X: ColorExtractor, S: RenderSurface> ChromaEngine<X, S> {
    /// Create an engine with injected collaborators
    pub fn new(config: EngineConfig, extractor: X, replies: Receiver<ExtractionReply>, surface: S) -> Self {
        Self {
            deriver: PaletteDeriver::new(config.deriver.clone()),
            cache: PaletteCache::new(config.cache.clone()),
            tracker: MusicStateTracker::new(config.tracker.clone()),
            batcher: VariableWriteBatcher::new(config.batcher.clone()),
            config,
            extractor,
            replies,
            surface,
            generation: 0,
            current_track: None,
            pending: None,
            stale_replies_discarded: 0,
            extraction_timeouts: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Handle a track change
    ///
    /// Bumps the generation (any in-flight extraction becomes stale), then
    /// publishes either the cached palette or an immediate default while
    /// a fresh extraction is requested.
    pub fn on_track_change(&mut self, track_id: &str, now: f64) {
        self.generation += 1;
        self.pending = None;
        self.current_track = Some(track_id.to_string());

        if let Some(palette) = self.cache.get(track_id).cloned() {
            self.cache_hits += 1;
            debug!("Track change to {}: palette cache hit", track_id);
            self.publish_palette(&palette);
            return;
        }

        self.cache_misses += 1;
        // Publish the default palette right away so the surface never keeps
        // showing the previous track's colors while extraction is in flight
        let placeholder = self.deriver.derive(track_id, &SwatchMap::new(), Utc::now());
        self.publish_palette(&placeholder);

        self.pending = Some(PendingExtraction {
            generation: self.generation,
            track_id: track_id.to_string(),
            deadline: now + self.config.extraction_timeout_secs,
        });
        debug!(
            "Track change to {}: extraction requested (generation {})",
            track_id, self.generation
        );
        self.extractor.request(track_id, self.generation);
    }

    /// Handle an explicit playback stop
    pub fn on_track_stop(&mut self) {
        // Bump so a reply for the stopped track is discarded on arrival
        self.generation += 1;
        self.pending = None;
        self.current_track = None;
        self.tracker.stop();
    }

    /// Ingest one feature tick and queue the kinetic variables
    ///
    /// Ticks are processed strictly in arrival order; every tick updates
    /// the musical memory.
    pub fn on_feature_tick(&mut self, sample: &FeatureSample) {
        let snapshot = self.tracker.update(sample);

        self.batcher.enqueue(
            keys::KINETIC_BEAT_PULSE,
            format_scalar(snapshot.beat_pulse),
            WritePriority::Critical,
            OWNER_KINETICS,
        );
        self.batcher.enqueue(
            keys::KINETIC_BREATHING_SCALE,
            format_scalar(self.tracker.breathing_scale()),
            WritePriority::Normal,
            OWNER_KINETICS,
        );
        self.batcher.enqueue(
            keys::KINETIC_ENERGY,
            format_scalar(snapshot.energy),
            WritePriority::Normal,
            OWNER_KINETICS,
        );
        self.batcher.enqueue(
            keys::KINETIC_MOMENTUM,
            format_scalar(self.tracker.momentum()),
            WritePriority::Normal,
            OWNER_KINETICS,
        );
        self.batcher.enqueue(
            keys::KINETIC_BPM,
            format_bpm(snapshot.bpm),
            WritePriority::Low,
            OWNER_KINETICS,
        );
    }

    /// Per-frame work: drain extraction replies, enforce the extraction
    /// deadline, then flush once
    ///
    /// Hosts must call this after all same-frame producer calls so the
    /// surface mutation observes settled state. Returns the number of
    /// writes applied.
    pub fn on_frame(&mut self, now: f64) -> usize {
        while let Ok(reply) = self.replies.try_recv() {
            if reply.generation != self.generation {
                self.stale_replies_discarded += 1;
                debug!(
                    "Discarding stale extraction reply for {} (generation {} != {})",
                    reply.track_id, reply.generation, self.generation
                );
                continue;
            }
            let palette = self
                .deriver
                .derive(&reply.track_id, &reply.swatches, Utc::now());
            self.cache.put(&reply.track_id, palette.clone());
            self.publish_palette(&palette);
            self.pending = None;
        }

        if let Some(pending) = &self.pending {
            if now >= pending.deadline {
                let fault = EngineError::ExtractionTimeout(self.config.extraction_timeout_secs);
                warn!("{} for {}; default palette stands", fault, pending.track_id);
                self.extraction_timeouts += 1;
                self.pending = None;
            }
        }

        self.batcher.flush(&mut self.surface)
    }

    /// Queue the full palette variable set (slots plus derived tokens)
    fn publish_palette(&mut self, palette: &Palette) {
        let base_background = self.surface.get_variable(keys::BASE_BACKGROUND);
        let tokens = self
            .deriver
            .derive_tokens(&palette.primary, base_background.as_deref());

        let writes = [
            (keys::PALETTE_PRIMARY, keys::PALETTE_PRIMARY_RGB, &palette.primary),
            (keys::PALETTE_SECONDARY, keys::PALETTE_SECONDARY_RGB, &palette.secondary),
            (keys::PALETTE_ACCENT, keys::PALETTE_ACCENT_RGB, &palette.accent),
            (keys::PALETTE_HIGHLIGHT, keys::PALETTE_HIGHLIGHT_RGB, &tokens.highlight),
            (keys::PALETTE_SHADOW, keys::PALETTE_SHADOW_RGB, &tokens.shadow),
        ];
        for (hex_key, rgb_key, color) in writes {
            self.batcher
                .enqueue(hex_key, color.hex(), WritePriority::High, OWNER_PALETTE);
            self.batcher
                .enqueue(rgb_key, color.rgb_string(), WritePriority::High, OWNER_PALETTE);
        }
    }

    /// Current generation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Track currently driving the palette, if any
    pub fn current_track(&self) -> Option<&str> {
        self.current_track.as_deref()
    }

    /// Whether an extraction request is still outstanding
    pub fn has_pending_extraction(&self) -> bool {
        self.pending.is_some()
    }

    /// Read access to the render surface handle
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Read access to the music tracker
    pub fn tracker(&self) -> &MusicStateTracker {
        &self.tracker
    }

    /// Snapshot of all observability counters
    pub fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            feature_clamps: self.tracker.clamp_count(),
            malformed_swatches: self.deriver.malformed_count(),
            gamut_clamps: self.deriver.gamut_clamp_count(),
            dropped_writes: self.batcher.dropped(),
            flushes: self.batcher.flushes(),
            writes_applied: self.batcher.writes_applied(),
            stale_replies_discarded: self.stale_replies_discarded,
            extraction_timeouts: self.extraction_timeouts,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
        }
    }
}
