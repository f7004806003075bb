use chromaflow_core::engine::keys;
use chromaflow_core::{
    reply_channel, ChromaEngine, ColorExtractor, EngineConfig, ExtractionReply, FeatureSample,
    InMemoryRenderSurface, RenderSurface, SwatchMap,
};
use crossbeam_channel::Sender;

/// Extractor stub; tests play the service by pushing replies into the
/// channel themselves, so the request side is a no-op.
struct ScriptedExtractor;

impl ColorExtractor for ScriptedExtractor {
    fn request(&mut self, _track_id: &str, _generation: u64) {}
}

fn setup() -> (
    ChromaEngine<ScriptedExtractor, InMemoryRenderSurface>,
    Sender<ExtractionReply>,
    InMemoryRenderSurface,
) {
    let (tx, rx) = reply_channel(16);
    let surface = InMemoryRenderSurface::new();
    let engine = ChromaEngine::new(EngineConfig::default(), ScriptedExtractor, rx, surface.clone());
    (engine, tx, surface)
}

fn swatches(entries: &[(&str, &str)]) -> SwatchMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn tick(timestamp: f64, beat_onset: bool) -> FeatureSample {
    FeatureSample {
        energy: 0.6,
        valence: 0.4,
        bpm: 128.0,
        beat_onset,
        timestamp,
    }
}

#[test]
fn test_stale_extraction_result_is_discarded() {
    let (mut engine, tx, surface) = setup();

    // Track A starts; its extraction is slow
    engine.on_track_change("track-a", 0.0);
    let generation_a = engine.generation();
    engine.on_frame(0.016);

    // Track B starts before A resolves; B's extraction will time out
    engine.on_track_change("track-b", 0.5);
    engine.on_frame(0.516);

    // B times out (default deadline 3s after the change)
    engine.on_frame(4.0);
    assert_eq!(engine.diagnostics().extraction_timeouts, 1);
    assert_eq!(
        surface.get_variable(keys::PALETTE_PRIMARY).as_deref(),
        Some("#ca9ee6"),
        "B's palette must be the documented default after timeout"
    );

    // A's late result finally arrives; generation mismatch, silently dropped
    tx.send(ExtractionReply {
        generation: generation_a,
        track_id: "track-a".to_string(),
        swatches: swatches(&[("vibrant", "#ca9ee6"), ("dark-vibrant", "#112233")]),
    })
    .unwrap();
    engine.on_frame(4.016);

    assert_eq!(engine.diagnostics().stale_replies_discarded, 1);
    assert_eq!(
        surface.get_variable(keys::PALETTE_PRIMARY).as_deref(),
        Some("#ca9ee6"),
        "late result for A must never overwrite B's published palette"
    );
    assert_eq!(
        surface.get_variable(keys::PALETTE_SECONDARY).as_deref(),
        Some("#8caaee"),
        "secondary still carries the default, not A's dark-vibrant"
    );
}

#[test]
fn test_resolved_extraction_updates_palette() {
    let (mut engine, tx, surface) = setup();

    engine.on_track_change("track-a", 0.0);
    engine.on_frame(0.016);

    tx.send(ExtractionReply {
        generation: engine.generation(),
        track_id: "track-a".to_string(),
        swatches: swatches(&[
            ("vibrant", "#ca9ee6"),
            ("dark-vibrant", "#303446"),
            ("vibrant-non-alarming", "#a6d189"),
        ]),
    })
    .unwrap();
    engine.on_frame(0.5);

    assert_eq!(
        surface.get_variable(keys::PALETTE_PRIMARY).as_deref(),
        Some("#ca9ee6")
    );
    assert_eq!(
        surface.get_variable(keys::PALETTE_PRIMARY_RGB).as_deref(),
        Some("202,158,230")
    );
    assert_eq!(
        surface.get_variable(keys::PALETTE_SECONDARY).as_deref(),
        Some("#303446")
    );
    assert_eq!(
        surface.get_variable(keys::PALETTE_ACCENT).as_deref(),
        Some("#a6d189")
    );
    // Derived tokens are published in the same bit-exact formats
    let highlight = surface.get_variable(keys::PALETTE_HIGHLIGHT).unwrap();
    assert!(highlight.starts_with('#') && highlight.len() == 7);
    let shadow_rgb = surface.get_variable(keys::PALETTE_SHADOW_RGB).unwrap();
    assert_eq!(shadow_rgb.split(',').count(), 3);
}

#[test]
fn test_rapid_navigation_hits_cache_without_new_extraction() {
    let (mut engine, tx, _surface) = setup();

    engine.on_track_change("track-a", 0.0);
    tx.send(ExtractionReply {
        generation: engine.generation(),
        track_id: "track-a".to_string(),
        swatches: swatches(&[("vibrant", "#112233")]),
    })
    .unwrap();
    engine.on_frame(0.016);

    // Skip away and back
    engine.on_track_change("track-b", 1.0);
    engine.on_track_change("track-a", 1.2);

    let diag = engine.diagnostics();
    assert_eq!(diag.cache_hits, 1);
    // Only track-a's original miss and track-b requested extraction
    assert_eq!(engine.diagnostics().cache_misses, 2);
    assert!(!engine.has_pending_extraction());
}

#[test]
fn test_beat_pulse_decays_on_surface() {
    let (mut engine, _tx, surface) = setup();

    engine.on_feature_tick(&tick(0.0, true));
    engine.on_frame(0.016);
    let initial: f32 = surface
        .get_variable(keys::KINETIC_BEAT_PULSE)
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(initial, 1.0);

    // 10 ticks without an onset, one frame each
    for i in 1..=10 {
        let t = i as f64 * 0.1;
        engine.on_feature_tick(&tick(t, false));
        engine.on_frame(t + 0.016);
    }

    let decayed: f32 = surface
        .get_variable(keys::KINETIC_BEAT_PULSE)
        .unwrap()
        .parse()
        .unwrap();
    // Geometric decay bound: pulse(10) <= 0.9^10 (+ formatting rounding)
    assert!(decayed <= 0.9f32.powi(10) + 0.001, "pulse was {}", decayed);
    assert!(decayed > 0.0);
}

#[test]
fn test_settle_then_mutate_ordering() {
    let (mut engine, _tx, surface) = setup();

    // Several producer calls land in the same frame; the surface must not
    // change until the frame flush
    engine.on_track_change("track-a", 0.0);
    engine.on_feature_tick(&tick(0.0, true));
    engine.on_feature_tick(&tick(0.033, false));
    assert!(surface.is_empty(), "no mutation before the frame tick");

    engine.on_frame(0.04);
    assert!(!surface.is_empty());

    // The later tick's value won within the frame (last write wins)
    let pulse: f32 = surface
        .get_variable(keys::KINETIC_BEAT_PULSE)
        .unwrap()
        .parse()
        .unwrap();
    assert!(pulse < 1.0, "second tick (decayed) should be the visible one");
}

#[test]
fn test_timeout_then_same_generation_late_reply_still_applies() {
    let (mut engine, tx, surface) = setup();

    engine.on_track_change("track-a", 0.0);
    let generation = engine.generation();
    engine.on_frame(4.0); // deadline passes
    assert_eq!(engine.diagnostics().extraction_timeouts, 1);

    // Discard is generation-based, not deadline-based: a late reply for
    // the still-current generation converges the surface to real colors
    tx.send(ExtractionReply {
        generation,
        track_id: "track-a".to_string(),
        swatches: swatches(&[("vibrant", "#445566")]),
    })
    .unwrap();
    engine.on_frame(4.1);
    assert_eq!(
        surface.get_variable(keys::PALETTE_PRIMARY).as_deref(),
        Some("#445566")
    );
}

#[test]
fn test_feature_stream_with_bad_values_stays_bounded() {
    let (mut engine, _tx, surface) = setup();

    for i in 0..20 {
        engine.on_feature_tick(&FeatureSample {
            energy: if i % 3 == 0 { f32::NAN } else { 0.5 },
            valence: 1.5,
            bpm: if i % 2 == 0 { 0.0 } else { 128.0 },
            beat_onset: i % 8 == 0,
            timestamp: i as f64 * 0.1,
        });
        engine.on_frame(i as f64 * 0.1 + 0.016);
    }

    let diag = engine.diagnostics();
    assert!(diag.feature_clamps > 0);

    for key in [
        keys::KINETIC_BEAT_PULSE,
        keys::KINETIC_BREATHING_SCALE,
        keys::KINETIC_ENERGY,
    ] {
        let value: f32 = surface.get_variable(key).unwrap().parse().unwrap();
        assert!(value.is_finite(), "{key} must stay finite");
    }
    let scale: f32 = surface
        .get_variable(keys::KINETIC_BREATHING_SCALE)
        .unwrap()
        .parse()
        .unwrap();
    assert!((0.95..=1.05).contains(&scale));
}
