//! ChromaFlow Core - Color Harmony & Reactive Variable Propagation
//!
//! This crate contains the core engine for ChromaFlow, including:
//! - Perceptual color space math (sRGB <-> Oklab) with gamut clamping
//! - Palette derivation from noisy, partially-missing color swatches
//! - Smoothing of live music features into bounded kinetic parameters
//! - Frame-synchronized batching of variable writes into a single
//!   render-surface mutation
//!
//! The engine is single-threaded and cooperative: producers run to
//! completion between frames, and the batcher performs the one outbound
//! mutation per render tick. The only asynchronous collaborator is the
//! color extraction service, bridged by a generation-tagged reply channel.

#![warn(missing_docs)]

pub mod batcher;
pub mod cache;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod music;
pub mod palette;

// --- Re-exports grouped by category ---

// Color & Palette
pub use color::{oklab_to_srgb, srgb_to_oklab, Color, Oklab};
pub use palette::{
    parse_swatch, sanitize_hex, DerivedTokens, Palette, PaletteDeriver, SwatchMap,
};

// Caching
pub use cache::PaletteCache;

// Music & Kinetics
pub use music::{FeatureSample, MusicSnapshot, MusicStateTracker, MusicalMemory, TrackerState};

// Variable Propagation
pub use batcher::{
    InMemoryRenderSurface, RenderSurface, VariableWriteBatcher, VariableWriteRequest,
    WritePriority,
};

// Extraction Boundary
pub use extraction::{reply_channel, ColorExtractor, ExtractionReply};

// Engine & Configuration
pub use config::{BatcherConfig, CacheConfig, DeriverConfig, EngineConfig, TrackerConfig};
pub use engine::{format_bpm, format_scalar, ChromaEngine, EngineDiagnostics};
pub use error::{EngineError, Result};
