//! Image encoding and saving utilities.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

/// JPEG quality used for every lossy output.
pub const JPEG_QUALITY: u8 = 100;

/// Raster formats a merged canvas can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// Baseline JPEG, quality 100, 4:4:4 sampling.
    #[default]
    Jpeg,
    /// PNG at maximum compression effort.
    Png,
    /// Lossless WebP.
    WebP,
}

impl OutputFormat {
    /// Every supported format, in the order they are advertised.
    pub const ALL: [Self; 3] = [Self::Jpeg, Self::Png, Self::WebP];

    /// File extension used for stored outputs.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// MIME type served for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Whether a decode of the output reproduces the canvas exactly.
    #[must_use]
    pub const fn is_lossless(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Look up a format by file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Infer a format from a path's extension.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim()).ok_or_else(|| {
            Error::invalid_parameter("output_format", "must be one of jpg, jpeg, png, webp")
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("JPG"),
            Self::Png => f.write_str("PNG"),
            Self::WebP => f.write_str("WEBP"),
        }
    }
}

/// Encode a canvas at the highest quality the format offers.
///
/// The JPEG encoder samples every component at full resolution, so chroma is
/// never subsampled.
///
/// # Errors
///
/// Returns [`Error::Encode`] if serialization fails.
pub fn encode(canvas: &RgbImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            canvas.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            canvas.write_with_encoder(encoder)
        }
        OutputFormat::WebP => canvas.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP),
    }
    .map_err(|source| Error::Encode { format, source })?;

    tracing::debug!(
        "Encoded {}x{} canvas as {format} ({} bytes)",
        canvas.width(),
        canvas.height(),
        buf.len()
    );

    Ok(buf)
}

/// Encode a canvas and write it to disk.
///
/// # Errors
///
/// Returns an error if encoding or writing the file fails.
pub fn save_image<P: AsRef<Path>>(canvas: &RgbImage, path: P, format: OutputFormat) -> Result<()> {
    let bytes = encode(canvas, format)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}
