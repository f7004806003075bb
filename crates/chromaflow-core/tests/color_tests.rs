use chromaflow_core::color::SHADOW_LIGHTNESS_FLOOR;
use chromaflow_core::{oklab_to_srgb, parse_swatch, sanitize_hex, srgb_to_oklab, Color};
use proptest::prelude::*;

proptest! {
    /// Any number of stacked or interior '#' collapses to exactly one
    /// leading '#', and the result parses whenever the digits are valid.
    #[test]
    fn prop_sanitize_yields_one_leading_hash(raw in "#{0,3}[0-9a-fA-F]{6}") {
        let sanitized = sanitize_hex(&raw);
        prop_assert!(sanitized.starts_with('#'));
        prop_assert_eq!(sanitized.matches('#').count(), 1);
        prop_assert_eq!(sanitized.len(), 7);
        prop_assert!(parse_swatch(&raw).is_some());
    }

    /// Sanitization never panics and never leaves a non-leading '#',
    /// whatever garbage comes back from live style state.
    #[test]
    fn prop_sanitize_total_on_arbitrary_input(raw in "[#0-9a-fx ]{0,16}") {
        let sanitized = sanitize_hex(&raw);
        prop_assert!(sanitized.starts_with('#'));
        prop_assert!(!sanitized[1..].contains('#'));
    }

    /// Canonical hex output is lowercase regardless of the input case.
    #[test]
    fn prop_parse_canonicalizes_case(digits in "[0-9a-fA-F]{6}") {
        let color = Color::parse(&format!("#{digits}")).unwrap();
        prop_assert_eq!(color.hex(), format!("#{}", digits.to_lowercase()));
    }

    /// Perceptual roundtrip drifts at most one step per channel across the
    /// whole sRGB cube.
    #[test]
    fn prop_oklab_roundtrip_within_one(r: u8, g: u8, b: u8) {
        let lab = srgb_to_oklab(r, g, b);
        let ([r2, g2, b2], _) = oklab_to_srgb(lab);
        prop_assert!((r as i16 - r2 as i16).abs() <= 1, "r: {} -> {}", r, r2);
        prop_assert!((g as i16 - g2 as i16).abs() <= 1, "g: {} -> {}", g, g2);
        prop_assert!((b as i16 - b2 as i16).abs() <= 1, "b: {} -> {}", b, b2);
    }

    /// The highlight token stays bright and near-neutral for every source
    /// color, including the extremes.
    #[test]
    fn prop_highlight_always_bright(r: u8, g: u8, b: u8) {
        let (highlight, _) = Color::from_rgb(r, g, b).bright_highlight();
        let lab = highlight.perceptual();
        prop_assert!(lab.l > 0.85, "highlight L was {}", lab.l);
        prop_assert!(lab.a.abs() < 0.05 && lab.b.abs() < 0.05);
    }

    /// The shadow token is darker than its base (down to the floor) for
    /// every base color.
    #[test]
    fn prop_shadow_darker_with_floor(r: u8, g: u8, b: u8) {
        let base = Color::from_rgb(r, g, b);
        let (shadow, _) = base.dynamic_shadow();
        let shadow_l = shadow.perceptual().l;
        prop_assert!(shadow_l >= SHADOW_LIGHTNESS_FLOOR - 0.02);
        prop_assert!(
            shadow_l <= base.perceptual().l.max(SHADOW_LIGHTNESS_FLOOR) + 0.02,
            "shadow L {} exceeded base L {}",
            shadow_l,
            base.perceptual().l
        );
    }

    /// Near-black bases, where the floored lightness quantizes hardest,
    /// never shadow to pure black.
    #[test]
    fn prop_shadow_never_pure_black(r in 0u8..=24, g in 0u8..=24, b in 0u8..=24) {
        let (shadow, _) = Color::from_rgb(r, g, b).dynamic_shadow();
        prop_assert_ne!((shadow.r(), shadow.g(), shadow.b()), (0, 0, 0));
    }
}
