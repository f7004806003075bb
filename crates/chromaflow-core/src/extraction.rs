//! Boundary to the asynchronous color extraction service
//!
//! Extraction is the engine's only asynchronous collaborator. Requests are
//! fire-and-forget and tagged with the generation that was current when
//! they were issued; replies come back over a bounded channel the engine
//! drains once per frame. There is no true cancellation; a reply whose
//! generation no longer matches is simply discarded on arrival.

use crate::palette::SwatchMap;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Default bound of the reply channel
pub const REPLY_CHANNEL_CAPACITY: usize = 16;

/// One resolved extraction, tagged with its request generation
///
/// `swatches` may be partial (the service resolved only some names) or
/// empty (the service failed); the deriver's fallback chains absorb both.
#[derive(Debug, Clone)]
pub struct ExtractionReply {
    /// Generation the request carried when it was issued
    pub generation: u64,
    /// Track the swatches belong to
    pub track_id: String,
    /// Named swatches, possibly partial
    pub swatches: SwatchMap,
}

/// Fire-and-forget request side of the extraction service
///
/// Implementations resolve swatches however they like (HTTP call, IPC,
/// lookup table in tests) and deliver an [`ExtractionReply`] on the sender
/// half of [`reply_channel`]. A slow or dead service simply never replies;
/// the engine's deadline handles that.
pub trait ColorExtractor {
    /// Request swatches for `track_id`, tagged with `generation`
    fn request(&mut self, track_id: &str, generation: u64);
}

/// Create the bounded reply channel shared between an extractor
/// implementation and the engine
pub fn reply_channel(capacity: usize) -> (Sender<ExtractionReply>, Receiver<ExtractionReply>) {
    bounded(capacity)
}
