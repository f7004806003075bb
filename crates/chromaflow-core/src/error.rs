//! Error types for the engine
//!
//! Every variant here is recovered locally at the component that produced
//! it (substitute default, clamp, or drop); none of them crosses a
//! component boundary as a panic.

use thiserror::Error;

/// Engine fault taxonomy
#[derive(Error, Debug)]
pub enum EngineError {
    /// Color extraction did not resolve within the configured deadline
    #[error("color extraction timed out after {0:.1}s")]
    ExtractionTimeout(f64),

    /// A swatch string could not be parsed even after sanitization
    #[error("unparsable swatch color: {0:?}")]
    ExtractionMalformed(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
