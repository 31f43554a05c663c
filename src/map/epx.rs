// src/map/epx.rs
//! EPX 3x pixel-art magnification.
//!
//! Each source pixel `E` with neighbourhood
//!
//! ```text
//! A B C
//! D E F
//! G H I
//! ```
//!
//! becomes a 3x3 block `1..9` that defaults to `E` and takes an edge colour
//! where two orthogonal neighbours agree and the opposite ones do not.
//!
//! The last source row and column are not expanded, so a `W x H` input yields
//! `3(W-1) x 3(H-1)` output. Neighbours outside the image clamp to the edge.

use image::{DynamicImage, ImageBuffer, Pixel};

/// Output dimensions for a `width x height` source
pub fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    (
        width.saturating_sub(1) * 3,
        height.saturating_sub(1) * 3,
    )
}

/// Scale a pixel buffer up by EPX3x
pub fn scale_epx<P>(source: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + PartialEq,
{
    let (width, height) = source.dimensions();
    let (out_width, out_height) = scaled_dimensions(width, height);
    let mut scaled = ImageBuffer::new(out_width, out_height);

    let at = |x: i64, y: i64| -> P {
        let cx = x.clamp(0, width as i64 - 1) as u32;
        let cy = y.clamp(0, height as i64 - 1) as u32;
        *source.get_pixel(cx, cy)
    };

    for y in 0..height.saturating_sub(1) {
        for x in 0..width.saturating_sub(1) {
            let (sx, sy) = (x as i64, y as i64);
            let a = at(sx - 1, sy - 1);
            let b = at(sx, sy - 1);
            let c = at(sx + 1, sy - 1);
            let d = at(sx - 1, sy);
            let e = at(sx, sy);
            let f = at(sx + 1, sy);
            let g = at(sx - 1, sy + 1);
            let h = at(sx, sy + 1);
            let i = at(sx + 1, sy + 1);

            let block = expand(a, b, c, d, e, f, g, h, i);

            let (ox, oy) = (x * 3, y * 3);
            for (index, pixel) in block.into_iter().enumerate() {
                let index = index as u32;
                scaled.put_pixel(ox + index % 3, oy + index / 3, pixel);
            }
        }
    }

    scaled
}

/// The nine output pixels for one source pixel, row-major
#[allow(clippy::too_many_arguments)]
fn expand<P: PartialEq + Copy>(a: P, b: P, c: P, d: P, e: P, f: P, g: P, h: P, i: P) -> [P; 9] {
    let mut out = [e; 9];

    let top_left = d == b && d != h && b != f;
    let top_right = b == f && b != d && f != h;
    let bottom_left = h == d && h != f && d != b;
    let bottom_right = f == h && f != b && h != d;

    if top_left {
        out[0] = d;
    }
    if (top_left && e != c) || (top_right && e != a) {
        out[1] = b;
    }
    if top_right {
        out[2] = f;
    }
    if (bottom_left && e != a) || (top_left && e != g) {
        out[3] = d;
    }
    if (top_right && e != i) || (bottom_right && e != c) {
        out[5] = f;
    }
    if bottom_left {
        out[6] = d;
    }
    if (bottom_right && e != g) || (bottom_left && e != i) {
        out[7] = h;
    }
    if bottom_right {
        out[8] = f;
    }

    out
}

/// Scale a decoded image, keeping its colour type where it is one of the common ones
pub fn scale_dynamic(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(buffer) => DynamicImage::ImageLuma8(scale_epx(buffer)),
        DynamicImage::ImageLumaA8(buffer) => DynamicImage::ImageLumaA8(scale_epx(buffer)),
        DynamicImage::ImageRgb8(buffer) => DynamicImage::ImageRgb8(scale_epx(buffer)),
        DynamicImage::ImageRgba8(buffer) => DynamicImage::ImageRgba8(scale_epx(buffer)),
        DynamicImage::ImageLuma16(buffer) => DynamicImage::ImageLuma16(scale_epx(buffer)),
        DynamicImage::ImageLumaA16(buffer) => DynamicImage::ImageLumaA16(scale_epx(buffer)),
        DynamicImage::ImageRgb16(buffer) => DynamicImage::ImageRgb16(scale_epx(buffer)),
        DynamicImage::ImageRgba16(buffer) => DynamicImage::ImageRgba16(scale_epx(buffer)),
        other => DynamicImage::ImageRgba32F(scale_epx(&other.to_rgba32f())),
    }
}
