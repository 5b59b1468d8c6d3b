//! Request parameter validation, applied before any image is decoded.

use crate::compositor::{LayoutPolicy, MergeRequest};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::image::OutputFormat;

/// Raw, optional merge parameters as they arrive on the wire.
#[derive(Debug, Clone, Default)]
pub struct RawParams<'a> {
    pub target_height: Option<i64>,
    pub output_format: Option<&'a str>,
    pub layout: Option<&'a str>,
}

impl RawParams<'_> {
    /// Apply defaults and range checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an out-of-range height, or an
    /// unknown format or layout.
    pub fn validate(&self, config: &ServerConfig) -> Result<MergeRequest> {
        let heights = config.min_target_height..=config.max_target_height;
        let target_height = match self.target_height {
            None => config.default_target_height,
            Some(height) => u32::try_from(height)
                .ok()
                .filter(|h| heights.contains(h))
                .ok_or_else(|| {
                    Error::invalid_parameter(
                        "target_height",
                        format!("must be between {} and {}", heights.start(), heights.end()),
                    )
                })?,
        };

        let format = match non_empty(self.output_format) {
            None => config.default_format,
            Some(format) => format.parse::<OutputFormat>()?,
        };

        let layout = match non_empty(self.layout) {
            None => LayoutPolicy::default(),
            Some(layout) => layout.parse::<LayoutPolicy>()?,
        };

        Ok(MergeRequest {
            target_height,
            format,
            layout,
        })
    }
}

/// Parse a multipart text field as a target height.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if the text is not an integer.
pub fn parse_target_height(text: &str) -> Result<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| Error::invalid_parameter("target_height", "must be an integer"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
