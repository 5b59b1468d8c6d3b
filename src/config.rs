//! Service configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::compositor::{DEFAULT_TARGET_HEIGHT, MAX_CANVAS_PIXELS};
use crate::error::{Error, Result};
use crate::image::OutputFormat;

/// Configuration for the merge service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,

    /// Port to bind.
    pub port: u16,

    /// Directory merged outputs are written to and served from.
    pub output_dir: PathBuf,

    /// Prefix prepended to output URLs, e.g. `https://merge.example.com`.
    /// Relative `/outputs/...` paths are returned when unset.
    pub public_base_url: Option<String>,

    /// Target height used when a request omits it.
    pub default_target_height: u32,

    /// Smallest accepted target height.
    pub min_target_height: u32,

    /// Largest accepted target height.
    pub max_target_height: u32,

    /// Output format used when a request omits it.
    pub default_format: OutputFormat,

    /// Largest merged canvas the service will build, in pixels.
    pub max_canvas_pixels: u64,

    /// Timeout for fetching remote images.
    pub fetch_timeout: Duration,

    /// Largest remote image body accepted, in bytes.
    pub max_fetch_bytes: u64,

    /// Largest request body accepted, in bytes.
    pub max_upload_bytes: usize,

    /// Outputs older than this are removed by the cleanup task.
    pub retention: Duration,

    /// How often the cleanup task runs.
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            output_dir: PathBuf::from("outputs"),
            public_base_url: None,
            default_target_height: DEFAULT_TARGET_HEIGHT,
            min_target_height: 100,
            max_target_height: 5000,
            default_format: OutputFormat::Jpeg,
            max_canvas_pixels: 40_000_000,
            fetch_timeout: Duration::from_secs(30),
            max_fetch_bytes: 50 * 1024 * 1024,
            max_upload_bytes: 50 * 1024 * 1024,
            retention: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.min_target_height == 0 || self.min_target_height > self.max_target_height {
            return Err(Error::invalid_parameter(
                "min_target_height",
                "must be positive and not above max_target_height",
            ));
        }

        let heights = self.min_target_height..=self.max_target_height;
        if !heights.contains(&self.default_target_height) {
            return Err(Error::invalid_parameter(
                "default_target_height",
                format!(
                    "must be between {} and {}",
                    self.min_target_height, self.max_target_height
                ),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(Error::invalid_parameter("fetch_timeout", "must be greater than 0"));
        }

        if self.max_canvas_pixels == 0 || self.max_canvas_pixels > MAX_CANVAS_PIXELS {
            return Err(Error::invalid_parameter(
                "max_canvas_pixels",
                format!("must be between 1 and {MAX_CANVAS_PIXELS}"),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(Error::invalid_parameter("cleanup_interval", "must be greater than 0"));
        }

        Ok(())
    }
}
