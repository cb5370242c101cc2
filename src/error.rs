use thiserror::Error;

/// Errors raised by the comparison panel and its collaborators.
///
/// Missing images, degenerate containers and pointer events that miss the
/// image are valid states and never show up here.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Payload was not valid base64
    #[error("Invalid base64 payload for image {slot}: {source}")]
    Base64 {
        slot: char,
        #[source]
        source: base64::DecodeError,
    },

    /// Payload bytes could not be decoded into a bitmap
    #[error("Failed to decode image {slot}: {source}")]
    Decode {
        slot: char,
        #[source]
        source: image::ImageError,
    },

    /// Encoding an image for export failed
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// File system error during export
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State record or workflow JSON could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blend mode name outside the supported set
    #[error("Unknown blend mode: {0}")]
    UnknownBlendMode(String),

    /// A new view for the image could not be created
    #[error("Could not open a new view: {0}")]
    ViewBlocked(String),
}

pub type Result<T> = std::result::Result<T, CompareError>;
