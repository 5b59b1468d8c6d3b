//! Image loading utilities.
//!
//! Inputs reach the compositor from three places: files on disk (CLI),
//! uploaded bytes (multipart), and strings that are either a remote URL or an
//! inline base64 payload (JSON). Everything ends up in [`decode`].

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageError, ImageReader};

use crate::error::{Error, Input, Result};

/// Standard alphabet, accepting payloads with or without trailing padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Load and decode an image from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded, or has zero area.
pub fn load_image<P: AsRef<Path>>(path: P, input: Input) -> Result<DynamicImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage {
            input,
            width,
            height,
        });
    }

    Ok(img)
}

/// Decode raw image bytes, guessing the codec from the content.
///
/// # Errors
///
/// Returns [`Error::Decode`] for corrupt or unsupported data and
/// [`Error::EmptyImage`] for a zero-area result.
pub fn decode(bytes: &[u8], input: Input) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).map_err(|source| Error::Decode { input, source })?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage {
            input,
            width,
            height,
        });
    }

    tracing::debug!("Decoded {input}: {width}x{height} {:?}", img.color());
    Ok(img)
}

/// Read image dimensions from the header without decoding pixel data.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the format is unknown or the header is
/// corrupt.
pub fn peek_dimensions(bytes: &[u8], input: Input) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| Error::Decode {
            input,
            source: ImageError::IoError(err),
        })?;

    reader.into_dimensions().map_err(|source| Error::Decode { input, source })
}

/// Where the bytes of a JSON-supplied image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An `http://` or `https://` URL to fetch.
    Url(String),
    /// Bytes decoded from a base64 payload or data URL.
    Inline(Vec<u8>),
}

impl ImageSource {
    /// Classify a string as a URL, a data URL, or raw base64.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty or the payload is not base64.
    pub fn parse(value: &str, input: Input) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::MissingInput(input));
        }

        if is_http_url(value) {
            return Ok(Self::Url(value.to_string()));
        }

        let payload = match value.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
            None => value,
        };

        // Line-wrapped base64 is common in pasted payloads.
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|source| Error::Base64 { input, source })?;

        Ok(Self::Inline(bytes))
    }
}

fn is_http_url(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, _)) => {
            scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
        }
        None => false,
    }
}

/// Fetches remote images with a bounded timeout and size cap.
#[derive(Debug, Clone)]
pub struct Loader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl Loader {
    /// Create a loader.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, max_bytes: u64) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sidemerge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_bytes })
    }

    /// Resolve a source to raw bytes, fetching it if it is a URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn resolve(&self, source: ImageSource, input: Input) -> Result<Vec<u8>> {
        match source {
            ImageSource::Url(url) => self.fetch(&url, input).await,
            ImageSource::Inline(bytes) => Ok(bytes),
        }
    }

    /// Download a URL into memory.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or a body
    /// larger than the configured cap.
    pub async fn fetch(&self, url: &str, input: Input) -> Result<Vec<u8>> {
        tracing::info!("Fetching {input} from {url}");

        let fetch_error = |source| Error::Fetch {
            input,
            url: url.to_string(),
            source,
        };
        let too_large = || Error::FetchTooLarge {
            input,
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?;

        let declared = response.content_length();
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} bytes for {input}", body.len());
        Ok(body)
    }
}
