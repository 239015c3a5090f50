//! Encoder error types

use thiserror::Error;

/// Errors raised while marshalling a value tree.
///
/// Every variant carries the diagnostic field path at the point the encoding
/// failed, e.g. `Outer/Inner/field3`. All errors are fatal to the current
/// encoding: the output is abandoned and the first error is returned.
#[derive(Debug, Error)]
pub enum NdrError {
    /// The input contains a kind the encoder cannot represent
    #[error("unsupported type {kind} at {path}")]
    UnsupportedType { path: String, kind: String },

    /// A union discriminant does not map to any declared arm
    #[error("no union arm of {union} matches discriminant {discriminant} at {path}")]
    UnionSelection {
        path: String,
        union: String,
        discriminant: i64,
    },

    /// Contradictory attributes on one field
    #[error("bad attributes at {path}: {detail}")]
    BadAttributes { path: String, detail: String },

    /// The output sink refused a write
    ///
    /// Cannot occur with the in-memory buffer, but alternate sinks report
    /// their failures through this variant.
    #[error("write failed at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, NdrError>;
