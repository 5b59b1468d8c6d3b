//! Custom error types for sidemerge.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::image::OutputFormat;

/// Which of the two merge inputs an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The model/person image, placed on the left.
    Model,
    /// The product image, placed on the right.
    Product,
}

impl Input {
    /// Field name used for this input on the HTTP surface.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Model => "model_image",
            Self::Product => "product_image",
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model image"),
            Self::Product => f.write_str("product image"),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, undecodable or zero-area image, or an unreachable source.
    InvalidInput,
    /// A request parameter outside the accepted set.
    ParameterOutOfRange,
    /// Canvas dimensions exceed representable or practical limits.
    GeometryOverflow,
    /// Serializing the canvas failed.
    EncodeFailure,
    /// Reading or writing stored outputs failed.
    Storage,
}

impl ErrorKind {
    /// Stable snake-case name, used in JSON error bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ParameterOutOfRange => "parameter_out_of_range",
            Self::GeometryOverflow => "geometry_overflow",
            Self::EncodeFailure => "encode_failure",
            Self::Storage => "storage",
        }
    }
}

/// Main error type for the sidemerge library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file from disk.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image bytes could not be decoded.
    #[error("failed to decode {input}: {source}")]
    Decode {
        input: Input,
        #[source]
        source: image::ImageError,
    },

    /// Image decoded to a zero-area bitmap.
    #[error("{input} has zero area ({width}x{height})")]
    EmptyImage {
        input: Input,
        width: u32,
        height: u32,
    },

    /// Inline payload was not valid base64.
    #[error("{input} is not valid base64: {source}")]
    Base64 {
        input: Input,
        #[source]
        source: base64::DecodeError,
    },

    /// Remote image could not be fetched.
    #[error("failed to fetch {input} from {url}: {source}")]
    Fetch {
        input: Input,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote image exceeded the configured size cap.
    #[error("{input} at {url} exceeds {limit} bytes")]
    FetchTooLarge {
        input: Input,
        url: String,
        limit: u64,
    },

    /// A required input was not supplied.
    #[error("missing {0}")]
    MissingInput(Input),

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Canvas would be too large to allocate or encode.
    #[error("canvas of {width}x{height} exceeds limits: {reason}")]
    GeometryOverflow {
        width: u64,
        height: u64,
        reason: &'static str,
    },

    /// Failed to encode the canvas.
    #[error("failed to encode {format} output: {source}")]
    Encode {
        format: OutputFormat,
        #[source]
        source: image::ImageError,
    },

    /// Failed to create the output directory.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageLoad { .. }
            | Self::Decode { .. }
            | Self::EmptyImage { .. }
            | Self::Base64 { .. }
            | Self::Fetch { .. }
            | Self::FetchTooLarge { .. }
            | Self::MissingInput(_) => ErrorKind::InvalidInput,
            Self::InvalidParameter { .. } => ErrorKind::ParameterOutOfRange,
            Self::GeometryOverflow { .. } => ErrorKind::GeometryOverflow,
            Self::Encode { .. } => ErrorKind::EncodeFailure,
            Self::OutputDir { .. } | Self::Io(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for sidemerge operations.
pub type Result<T> = std::result::Result<T, Error>;
