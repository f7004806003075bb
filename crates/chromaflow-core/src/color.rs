//! Perceptual color space conversion (sRGB <-> Oklab) and derived tokens
//!
//! All palette math happens in Oklab so that equal numeric steps correspond
//! to roughly equal perceived differences. Conversions are pure; the only
//! state is the per-instance lazy cache of perceptual coordinates.
//!
//! # Gamut policy
//!
//! `oklab_to_srgb` clamps out-of-gamut results per channel to [0, 255]
//! (clip, not rescale) and reports that it did so. Callers count clamps for
//! diagnostics; the clamped color is used as-is.

use crate::error::{EngineError, Result};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

/// Lightness target for the bright highlight token
pub const HIGHLIGHT_LIGHTNESS: f32 = 0.97;
/// Chroma scale for the bright highlight token (near-neutral, hue-linked)
pub const HIGHLIGHT_CHROMA_SCALE: f32 = 0.05;
/// Lightness damping factor for the dynamic shadow token
pub const SHADOW_LIGHTNESS_SCALE: f32 = 0.3;
/// Lightness floor for the dynamic shadow token (avoids pure black)
pub const SHADOW_LIGHTNESS_FLOOR: f32 = 0.05;
/// Chroma scale for the dynamic shadow token (retains hue identity)
pub const SHADOW_CHROMA_SCALE: f32 = 0.4;

/// Coordinates in the Oklab perceptually uniform color space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oklab {
    /// Perceived lightness (0.0 = black, 1.0 = white)
    pub l: f32,
    /// Green-red axis
    pub a: f32,
    /// Blue-yellow axis
    pub b: f32,
}

/// An sRGB color with canonical hex form and cached perceptual coordinates
///
/// Invariants: `hex` is always exactly one `#` followed by six lowercase
/// hex digits and stays consistent with the rgb channels. Both are only
/// writable through the constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    hex: String,
    perceptual: OnceCell<Oklab>,
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.hex
    }
}

impl TryFrom<String> for Color {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Color::parse(&value)
    }
}

impl Color {
    /// Create a color from rgb channels
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r,
            g,
            b,
            hex: format!("#{:02x}{:02x}{:02x}", r, g, b),
            perceptual: OnceCell::new(),
        }
    }

    /// Parse a strict `#RRGGBB` string (case-insensitive)
    ///
    /// Inputs read back from live style state must go through
    /// [`crate::palette::sanitize_hex`] first; this parser expects exactly
    /// one leading `#` and six hex digits.
    pub fn parse(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .ok_or_else(|| EngineError::ExtractionMalformed(hex.to_string()))?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::ExtractionMalformed(hex.to_string()));
        }
        // Length and digit checks above make these infallible
        let r = u8::from_str_radix(&digits[0..2], 16)
            .map_err(|_| EngineError::ExtractionMalformed(hex.to_string()))?;
        let g = u8::from_str_radix(&digits[2..4], 16)
            .map_err(|_| EngineError::ExtractionMalformed(hex.to_string()))?;
        let b = u8::from_str_radix(&digits[4..6], 16)
            .map_err(|_| EngineError::ExtractionMalformed(hex.to_string()))?;
        Ok(Self::from_rgb(r, g, b))
    }

    /// Convert Oklab coordinates to the nearest displayable color
    ///
    /// Returns the color plus whether any channel had to be clamped into
    /// [0, 255] (the documented clip-not-rescale gamut policy).
    pub fn from_oklab(lab: Oklab) -> (Self, bool) {
        let ([r, g, b], clamped) = oklab_to_srgb(lab);
        (Self::from_rgb(r, g, b), clamped)
    }

    /// Red channel
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green channel
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue channel
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Canonical `#rrggbb` form
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// `R,G,B` form (no spaces, no parens) for the render surface contract
    pub fn rgb_string(&self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    /// Oklab coordinates, computed on first access and cached per instance
    pub fn perceptual(&self) -> Oklab {
        *self
            .perceptual
            .get_or_init(|| srgb_to_oklab(self.r, self.g, self.b))
    }

    /// Bright highlight token: high fixed lightness, near-neutral chroma
    /// that stays hue-linked to this color
    pub fn bright_highlight(&self) -> (Self, bool) {
        let lab = self.perceptual();
        Self::from_oklab(Oklab {
            l: HIGHLIGHT_LIGHTNESS,
            a: lab.a * HIGHLIGHT_CHROMA_SCALE,
            b: lab.b * HIGHLIGHT_CHROMA_SCALE,
        })
    }

    /// Dynamic shadow token: damped lightness with a floor, moderate chroma
    /// so the base color's hue identity survives
    ///
    /// The lightness floor sits below the sRGB quantization threshold, so
    /// the floored result can still round to all-zero channels; pure black
    /// is lifted to the darkest displayable step to keep the floor visible.
    pub fn dynamic_shadow(&self) -> (Self, bool) {
        let lab = self.perceptual();
        let ([r, g, b], clamped) = oklab_to_srgb(Oklab {
            l: (lab.l * SHADOW_LIGHTNESS_SCALE).max(SHADOW_LIGHTNESS_FLOOR),
            a: lab.a * SHADOW_CHROMA_SCALE,
            b: lab.b * SHADOW_CHROMA_SCALE,
        });
        if r == 0 && g == 0 && b == 0 {
            return (Self::from_rgb(1, 1, 1), clamped);
        }
        (Self::from_rgb(r, g, b), clamped)
    }
}

/// Convert sRGB channels to Oklab
pub fn srgb_to_oklab(r: u8, g: u8, b: u8) -> Oklab {
    let r = srgb_to_linear(r as f32 / 255.0);
    let g = srgb_to_linear(g as f32 / 255.0);
    let b = srgb_to_linear(b as f32 / 255.0);

    let l = 0.412_221_46 * r + 0.536_332_54 * g + 0.051_445_995 * b;
    let m = 0.211_903_5 * r + 0.680_699_5 * g + 0.107_396_96 * b;
    let s = 0.088_302_46 * r + 0.281_718_85 * g + 0.629_978_7 * b;

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    Oklab {
        l: 0.210_454_26 * l_ + 0.793_617_8 * m_ - 0.004_072_047 * s_,
        a: 1.977_998_5 * l_ - 2.428_592_2 * m_ + 0.450_593_7 * s_,
        b: 0.025_904_037 * l_ + 0.782_771_77 * m_ - 0.808_675_77 * s_,
    }
}

/// Convert Oklab to sRGB channels, clipping out-of-gamut values per channel
///
/// Returns the channels plus whether any channel was clipped.
pub fn oklab_to_srgb(lab: Oklab) -> ([u8; 3], bool) {
    let l_ = lab.l + 0.396_337_78 * lab.a + 0.215_803_76 * lab.b;
    let m_ = lab.l - 0.105_561_346 * lab.a - 0.063_854_17 * lab.b;
    let s_ = lab.l - 0.089_484_18 * lab.a - 1.291_485_5 * lab.b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    let r = 4.076_741_7 * l - 3.307_711_6 * m + 0.230_969_93 * s;
    let g = -1.268_438 * l + 2.609_757_4 * m - 0.341_319_4 * s;
    let b = -0.004_196_086_3 * l - 0.703_418_6 * m + 1.707_614_7 * s;

    let mut clamped = false;
    let mut channel = |linear: f32| -> u8 {
        let v = linear_to_srgb(linear) * 255.0;
        let rounded = v.round();
        if !(0.0..=255.0).contains(&rounded) {
            clamped = true;
        }
        rounded.clamp(0.0, 255.0) as u8
    };

    let out = [channel(r), channel(g), channel(b)];
    (out, clamped)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}
