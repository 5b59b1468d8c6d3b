//! Canvas geometry for the two layout policies.
//!
//! Pure arithmetic on dimensions, computed before any pixel is touched so
//! that oversized requests fail without allocating.

use crate::error::{Error, Input, Result};

use super::LayoutPolicy;

/// Largest width or height of a canvas. This is also the JPEG side limit.
pub const MAX_CANVAS_SIDE: u32 = 65_535;

/// Largest pixel count of a canvas (about 768 MiB of RGB data).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count.
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Where one source image lands on the canvas, after resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub size: Size,
}

/// Result of planning a merge: canvas size and both placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub canvas: Size,
    pub model: Placement,
    pub product: Placement,
}

/// Aspect-preserving width for an image scaled to `target_height`.
///
/// Rounds half up and never returns less than one pixel.
///
/// # Errors
///
/// Returns [`Error::GeometryOverflow`] if the width exceeds [`MAX_CANVAS_SIDE`].
pub fn scaled_width(source: Size, target_height: u32) -> Result<u32> {
    let height = u64::from(source.height);
    let width = (u64::from(target_height) * u64::from(source.width) + height / 2) / height;
    let width = width.max(1);

    u32::try_from(width)
        .ok()
        .filter(|w| *w <= MAX_CANVAS_SIDE)
        .ok_or(Error::GeometryOverflow {
            width,
            height: u64::from(target_height),
            reason: "scaled width above the maximum canvas side",
        })
}

/// Compute the canvas and placements for a merge.
///
/// # Errors
///
/// Returns an error for a zero target height, a zero-area source, or a
/// canvas exceeding [`MAX_CANVAS_SIDE`] or [`MAX_CANVAS_PIXELS`].
pub fn plan(
    model: Size,
    product: Size,
    target_height: u32,
    policy: LayoutPolicy,
) -> Result<Layout> {
    if target_height == 0 {
        return Err(Error::invalid_parameter("target_height", "must be a positive integer"));
    }
    check_area(model, Input::Model)?;
    check_area(product, Input::Product)?;

    let model_size = Size::new(scaled_width(model, target_height)?, target_height);
    let product_size = match policy {
        LayoutPolicy::UniformHeight => {
            Size::new(scaled_width(product, target_height)?, target_height)
        }
        LayoutPolicy::PreserveProductSize => product,
    };

    let canvas_width = u64::from(model_size.width) + u64::from(product_size.width);
    let canvas_height = model_size.height.max(product_size.height);
    let canvas = checked_canvas(canvas_width, u64::from(canvas_height))?;

    Ok(Layout {
        canvas,
        model: Placement {
            x: 0,
            y: centered(canvas.height, model_size.height),
            size: model_size,
        },
        product: Placement {
            x: model_size.width,
            y: centered(canvas.height, product_size.height),
            size: product_size,
        },
    })
}

/// Reject a canvas holding more than `max_pixels` pixels.
///
/// # Errors
///
/// Returns [`Error::GeometryOverflow`] when the area is above the budget.
pub fn check_pixel_budget(canvas: Size, max_pixels: u64) -> Result<()> {
    if canvas.area() > max_pixels {
        return Err(Error::GeometryOverflow {
            width: u64::from(canvas.width),
            height: u64::from(canvas.height),
            reason: "pixel count above the configured limit",
        });
    }
    Ok(())
}

fn check_area(size: Size, input: Input) -> Result<()> {
    if size.width == 0 || size.height == 0 {
        return Err(Error::EmptyImage {
            input,
            width: size.width,
            height: size.height,
        });
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn checked_canvas(width: u64, height: u64) -> Result<Size> {
    let overflow = |reason| Error::GeometryOverflow {
        width,
        height,
        reason,
    };

    if width > u64::from(MAX_CANVAS_SIDE) {
        return Err(overflow("width above the maximum canvas side"));
    }
    if height > u64::from(MAX_CANVAS_SIDE) {
        return Err(overflow("height above the maximum canvas side"));
    }
    if width * height > MAX_CANVAS_PIXELS {
        return Err(overflow("pixel count above the maximum canvas area"));
    }

    // Safe: both sides were just bounded by MAX_CANVAS_SIDE
    Ok(Size::new(width as u32, height as u32))
}

const fn centered(outer: u32, inner: u32) -> u32 {
    (outer - inner) / 2
}
