//! Color normalization ahead of compositing.

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Convert any decoded image into opaque 8-bit RGB.
///
/// Images with an alpha channel are flattened over white; everything else is
/// converted channel-wise.
#[must_use]
pub fn to_opaque_rgb(img: DynamicImage) -> RgbImage {
    if img.color().has_alpha() {
        flatten_on_white(&img.into_rgba8())
    } else {
        img.into_rgb8()
    }
}

/// Composite an RGBA image over an opaque white background.
#[must_use]
pub fn flatten_on_white(rgba: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
    }
    out
}

/// `c * a + 255 * (1 - a)` in 8-bit fixed point, rounded to nearest.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn over_white(c: u8, a: u8) -> u8 {
    let (c, a) = (c as u16, a as u16);
    // Safe: at most 255 * 255 + 127, and the quotient is at most 255
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use image::{GrayAlphaImage, GrayImage, Luma, LumaA, Rgba};

    use super::*;

    #[test]
    fn test_over_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(200, 255), 200);
        assert_eq!(over_white(0, 128), 127);
    }

    #[test]
    fn test_rgba_flattened() {
        let mut rgba = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 0]));
        rgba.put_pixel(1, 1, Rgba([10, 20, 30, 255]));

        let rgb = to_opaque_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_gray_alpha_flattened() {
        let mut gray = GrayAlphaImage::from_pixel(2, 1, LumaA([0, 0]));
        gray.put_pixel(1, 0, LumaA([0, 255]));

        let rgb = to_opaque_rgb(DynamicImage::ImageLumaA8(gray));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_gray_converted_without_alpha() {
        let gray = GrayImage::from_pixel(4, 4, Luma([128]));
        let rgb = to_opaque_rgb(DynamicImage::ImageLuma8(gray));
        assert!(rgb.pixels().all(|p| *p == Rgb([128, 128, 128])));
    }

    #[test]
    fn test_flatten_idempotent() {
        let rgba = RgbaImage::from_fn(16, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 16 + y) as u8;
            Rgba([v, v.wrapping_mul(3), 255 - v, v])
        });

        let once = flatten_on_white(&rgba);
        let again = flatten_on_white(&rgba);
        assert_eq!(once, again);

        let reflattened = to_opaque_rgb(DynamicImage::ImageRgb8(once.clone()));
        assert_eq!(reflattened, once);
    }
}
