//! Palette derivation from extracted swatches
//!
//! This module resolves ordered fallback chains over the partial swatch map
//! returned by the extraction service, normalizes malformed color strings,
//! and synthesizes the highlight/shadow tokens in perceptual space.
//!
//! # Features
//!
//! - **sanitize_hex**: normalizes hex strings read back from live style
//!   state (which can carry stacked `#` prefixes).
//! - **PaletteDeriver**: deterministic, total slot resolution; every slot
//!   ends up populated, falling back to documented defaults.
//! - **Palette**: only ever observable fully populated.

use crate::color::Color;
use crate::config::DeriverConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Swatch names as delivered by the extraction service
pub mod swatches {
    /// Most saturated representative color
    pub const VIBRANT: &str = "vibrant";
    /// Saturated color from the dark end
    pub const DARK_VIBRANT: &str = "dark-vibrant";
    /// Saturated color from the light end
    pub const LIGHT_VIBRANT: &str = "light-vibrant";
    /// Most frequent color in the artwork
    pub const PROMINENT: &str = "prominent";
    /// Muted representative color
    pub const DESATURATED: &str = "desaturated";
    /// Vibrant variant screened against alarm-red hues
    pub const VIBRANT_NON_ALARMING: &str = "vibrant-non-alarming";
}

/// Ordered fallback chain for the primary slot
pub const PRIMARY_CHAIN: &[&str] = &[
    swatches::VIBRANT,
    swatches::LIGHT_VIBRANT,
    swatches::PROMINENT,
];

/// Ordered fallback chain for the secondary slot
pub const SECONDARY_CHAIN: &[&str] = &[
    swatches::DARK_VIBRANT,
    swatches::DESATURATED,
    swatches::VIBRANT,
];

/// Ordered fallback chain for the accent slot
pub const ACCENT_CHAIN: &[&str] = &[
    swatches::VIBRANT_NON_ALARMING,
    swatches::LIGHT_VIBRANT,
    swatches::VIBRANT,
];

/// Partial map of named swatches; absent entries are legitimate
pub type SwatchMap = HashMap<String, String>;

/// A fully derived color palette for one track
///
/// Invariant: all three slots are populated before a `Palette` leaves the
/// deriver; partially derived palettes are never visible outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    /// Primary theme color
    pub primary: Color,
    /// Secondary theme color
    pub secondary: Color,
    /// Accent color
    pub accent: Color,
    /// Track the palette was derived for
    pub source_track_id: String,
    /// Wall-clock time of derivation
    pub derived_at: DateTime<Utc>,
}

/// Highlight and shadow tokens synthesized in perceptual space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTokens {
    /// Bright, near-neutral, hue-linked highlight
    pub highlight: Color,
    /// Damped, hue-retaining shadow
    pub shadow: Color,
}

/// Strip every `#` from a raw hex string and prepend exactly one
///
/// Values read back from the render surface can arrive with stacked `#`
/// prefixes; this makes them parseable again without guessing how many
/// layers of prefixing happened.
pub fn sanitize_hex(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| *c != '#').collect();
    format!("#{}", digits)
}

/// Sanitize then parse; `None` if the string is unparsable either way
pub fn parse_swatch(raw: &str) -> Option<Color> {
    Color::parse(&sanitize_hex(raw)).ok()
}

/// Derives palettes from swatch maps with total, deterministic fallback
#[derive(Debug)]
pub struct PaletteDeriver {
    config: DeriverConfig,
    /// Swatch strings that failed to parse after sanitization
    malformed_count: u64,
    /// Token conversions that left the sRGB gamut and were clipped
    gamut_clamp_count: u64,
}

impl PaletteDeriver {
    /// Create a deriver with the given configuration
    pub fn new(config: DeriverConfig) -> Self {
        Self {
            config,
            malformed_count: 0,
            gamut_clamp_count: 0,
        }
    }

    /// Derive a complete palette for `track_id` from a (possibly partial)
    /// swatch map
    ///
    /// Every slot walks its fallback chain; the first present, well-formed
    /// entry wins, otherwise the documented default constant is used. The
    /// result is byte-identical for identical input (the caller supplies
    /// `derived_at` so repeated derivation stays reproducible).
    pub fn derive(
        &mut self,
        track_id: &str,
        swatch_map: &SwatchMap,
        derived_at: DateTime<Utc>,
    ) -> Palette {
        let primary = self.resolve_slot(swatch_map, PRIMARY_CHAIN, &self.config.default_primary.clone());
        let secondary =
            self.resolve_slot(swatch_map, SECONDARY_CHAIN, &self.config.default_secondary.clone());
        let accent = self.resolve_slot(swatch_map, ACCENT_CHAIN, &self.config.default_accent.clone());

        debug!(
            "Derived palette for {}: primary={} secondary={} accent={}",
            track_id,
            primary.hex(),
            secondary.hex(),
            accent.hex()
        );

        Palette {
            primary,
            secondary,
            accent,
            source_track_id: track_id.to_string(),
            derived_at,
        }
    }

    /// Synthesize the highlight/shadow tokens for a resolved primary and
    /// the current base background color
    ///
    /// `base_background` is a raw string read back from the render surface
    /// and is sanitized before parsing; an unreadable value falls back to
    /// the configured default background.
    pub fn derive_tokens(&mut self, primary: &Color, base_background: Option<&str>) -> DerivedTokens {
        let base = base_background
            .and_then(|raw| {
                let parsed = parse_swatch(raw);
                if parsed.is_none() {
                    self.malformed_count += 1;
                    warn!("Unparsable base background {:?}, using default", raw);
                }
                parsed
            })
            .unwrap_or_else(|| self.fallback_color(&self.config.default_base_background.clone()));

        let (highlight, highlight_clamped) = primary.bright_highlight();
        let (shadow, shadow_clamped) = base.dynamic_shadow();
        if highlight_clamped {
            self.gamut_clamp_count += 1;
        }
        if shadow_clamped {
            self.gamut_clamp_count += 1;
        }

        DerivedTokens { highlight, shadow }
    }

    /// How many swatch strings failed to parse after sanitization
    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    /// How many token conversions were clipped into gamut
    pub fn gamut_clamp_count(&self) -> u64 {
        self.gamut_clamp_count
    }

    /// Walk a fallback chain; first present, well-formed entry wins
    fn resolve_slot(&mut self, swatch_map: &SwatchMap, chain: &[&str], default_hex: &str) -> Color {
        for name in chain {
            if let Some(raw) = swatch_map.get(*name) {
                match parse_swatch(raw) {
                    Some(color) => return color,
                    None => {
                        self.malformed_count += 1;
                        warn!("Swatch {:?} is unparsable: {:?}", name, raw);
                    }
                }
            }
        }
        self.fallback_color(default_hex)
    }

    /// Parse a configured default, falling back to a hard constant if the
    /// configuration itself is malformed
    fn fallback_color(&self, default_hex: &str) -> Color {
        Color::parse(default_hex).unwrap_or_else(|_| Color::from_rgb(0xca, 0x9e, 0xe6))
    }
}

impl Default for PaletteDeriver {
    fn default() -> Self {
        Self::new(DeriverConfig::default())
    }
}
