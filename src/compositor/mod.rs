//! Side-by-side compositing of a model image and a product image.

mod geometry;
mod normalize;

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::image::OutputFormat;

pub use geometry::{
    check_pixel_budget, plan, scaled_width, Layout, Placement, Size, MAX_CANVAS_PIXELS,
    MAX_CANVAS_SIDE,
};
pub use normalize::{flatten_on_white, to_opaque_rgb};

/// Default resize basis when a caller does not supply one.
pub const DEFAULT_TARGET_HEIGHT: u32 = 1200;

/// Canvas fill wherever no source pixel lands.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// How the two images are resized and positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutPolicy {
    /// Both images scaled to the target height.
    #[default]
    UniformHeight,
    /// Only the model image is scaled; the product keeps its native size and
    /// both are centered vertically.
    PreserveProductSize,
}

impl LayoutPolicy {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UniformHeight => "uniform_height",
            Self::PreserveProductSize => "preserve_product_size",
        }
    }
}

impl FromStr for LayoutPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "uniform_height" | "uniform" => Ok(Self::UniformHeight),
            "preserve_product_size" | "preserve" => Ok(Self::PreserveProductSize),
            _ => Err(Error::invalid_parameter(
                "layout",
                "must be uniform_height or preserve_product_size",
            )),
        }
    }
}

impl fmt::Display for LayoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a single merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequest {
    /// Height every scaled image is resized to.
    pub target_height: u32,
    /// Encoding applied by [`Composite::encode`].
    pub format: OutputFormat,
    pub layout: LayoutPolicy,
}

impl Default for MergeRequest {
    fn default() -> Self {
        Self {
            target_height: DEFAULT_TARGET_HEIGHT,
            format: OutputFormat::default(),
            layout: LayoutPolicy::default(),
        }
    }
}

/// A finished canvas and where each input was placed on it.
#[derive(Debug, Clone)]
pub struct Composite {
    pub canvas: RgbImage,
    pub layout: Layout,
    pub format: OutputFormat,
}

impl Composite {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Encode the canvas in the requested format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        crate::image::encode(&self.canvas, self.format)
    }
}

/// Merge a model image (left) and a product image (right) onto one canvas.
///
/// Geometry is validated before any conversion or allocation. Inputs are
/// consumed and dropped as soon as they have been drawn.
///
/// # Errors
///
/// Returns an error for zero-area inputs, a zero target height, or a canvas
/// exceeding the size limits.
pub fn merge(
    model: DynamicImage,
    product: DynamicImage,
    request: &MergeRequest,
) -> Result<Composite> {
    let (model_width, model_height) = model.dimensions();
    let (product_width, product_height) = product.dimensions();

    let layout = plan(
        Size::new(model_width, model_height),
        Size::new(product_width, product_height),
        request.target_height,
        request.layout,
    )?;

    tracing::debug!(
        "Merging {model_width}x{model_height} + {product_width}x{product_height} with {}: {:?}",
        request.layout,
        layout
    );

    let mut canvas = RgbImage::from_pixel(layout.canvas.width, layout.canvas.height, BACKGROUND);

    draw(&mut canvas, to_opaque_rgb(model), layout.model);
    draw(&mut canvas, to_opaque_rgb(product), layout.product);

    Ok(Composite {
        canvas,
        layout,
        format: request.format,
    })
}

fn draw(canvas: &mut RgbImage, img: RgbImage, placement: Placement) {
    let Size { width, height } = placement.size;
    let img = if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, FilterType::Lanczos3)
    };

    imageops::replace(canvas, &img, i64::from(placement.x), i64::from(placement.y));
}
