use thiserror::Error;

/// Schema violations between a message and its metadata
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XvizError {
    #[error("stream '{0}' is not declared in metadata")]
    UndeclaredStream(String),

    #[error("primitive stream '{0}' has no primitive_type")]
    MissingPrimitiveType(String),

    #[error("stream '{stream}' declared as {declared}, used as {used}")]
    CategoryMismatch {
        stream: String,
        declared: String,
        used: String,
    },

    #[error("point primitive on '{stream}' has {points} point values and {colors} color values")]
    MalformedPrimitive {
        stream: String,
        points: usize,
        colors: usize,
    },
}
