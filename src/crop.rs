//! The magnified title-block view.
//!
//! The crop is cut from the image's natural pixels (not its on-screen size) and
//! re-rastered at the zoomed size, so small print stays legible.

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use crate::geometry::{NormRect, PageFrame};

/// Displayed width of the zoomed crop, in logical points.
pub const ZOOM_TARGET_WIDTH: f32 = 800.0;

/// Very flat title blocks still get this much height so they can be dragged on.
pub const ZOOM_MIN_HEIGHT: f32 = 120.0;

/// Upper bound on either side of the zoomed raster, on top of the GPU's own limit.
pub const ZOOM_MAX_SIDE: f32 = 4096.0;

/// Pixel window of `region` in an image of `natural` size. Always at least 1x1
/// and inside the image.
pub fn crop_window(region: &NormRect<PageFrame>, natural: (u32, u32)) -> (u32, u32, u32, u32) {
    let (w, h) = (f64::from(natural.0.max(1)), f64::from(natural.1.max(1)));
    let x = ((region.left * w).floor() as u32).min(natural.0.saturating_sub(1));
    let y = ((region.top * h).floor() as u32).min(natural.1.saturating_sub(1));
    let cw = ((region.width * w).round() as u32).clamp(1, natural.0.saturating_sub(x).max(1));
    let ch = ((region.height * h).round() as u32).clamp(1, natural.1.saturating_sub(y).max(1));
    (x, y, cw, ch)
}

/// On-screen size of the zoomed surface for `region`: fixed width, aspect kept,
/// height floored. Tall crops are scaled down so neither side exceeds
/// `max_side` (the renderer's texture limit) or [`ZOOM_MAX_SIDE`].
pub fn zoomed_size(region: &NormRect<PageFrame>, natural: (u32, u32), max_side: usize) -> (f32, f32) {
    let (_, _, cw, ch) = crop_window(region, natural);
    let scale = ZOOM_TARGET_WIDTH / cw as f32;
    let (w, h) = (ZOOM_TARGET_WIDTH, (ch as f32 * scale).max(ZOOM_MIN_HEIGHT));
    let limit = ZOOM_MAX_SIDE.min(max_side.max(1) as f32);
    let fit = (limit / w).min(limit / h).min(1.0);
    ((w * fit).max(1.0), (h * fit).max(1.0))
}

/// Cut `region` out of `image` and resize it to [`zoomed_size`].
pub fn render_crop(image: &DynamicImage, region: &NormRect<PageFrame>, max_side: usize) -> RgbaImage {
    let natural = (image.width(), image.height());
    let (x, y, cw, ch) = crop_window(region, natural);
    let (zw, zh) = zoomed_size(region, natural, max_side);
    let cropped = image.crop_imm(x, y, cw, ch);
    image::imageops::resize(
        &cropped.to_rgba8(),
        (zw.round() as u32).max(1),
        (zh.round() as u32).max(1),
        FilterType::CatmullRom,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const GPU_LIMIT: usize = 16384;

    fn region(l: f64, t: f64, w: f64, h: f64) -> NormRect<PageFrame> {
        NormRect::new(l, t, w, h).unwrap()
    }

    #[test]
    fn window_uses_natural_pixels() {
        let r = region(0.5, 0.75, 0.5, 0.25);
        assert_eq!(crop_window(&r, (2000, 1000)), (1000, 750, 1000, 250));
    }

    #[test]
    fn window_never_leaves_the_image() {
        let r = region(1.0, 1.0, 1.0, 1.0);
        assert_eq!(crop_window(&r, (10, 10)), (9, 9, 1, 1));
        let tiny = region(0.3, 0.3, 0.0001, 0.0001);
        let (_, _, w, h) = crop_window(&tiny, (100, 100));
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn zoom_keeps_aspect_and_floors_height() {
        let r = region(0.0, 0.0, 0.5, 0.25);
        assert_eq!(zoomed_size(&r, (1600, 1600), GPU_LIMIT), (800.0, 400.0));

        let flat = region(0.0, 0.9, 1.0, 0.02);
        let (w, h) = zoomed_size(&flat, (1000, 1000), GPU_LIMIT);
        assert_eq!(w, 800.0);
        assert_eq!(h, ZOOM_MIN_HEIGHT);
    }

    #[test]
    fn renders_the_region_content() {
        let mut img = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
        for y in 50..100 {
            for x in 100..200 {
                img.put_pixel(x, y, Rgba([200, 0, 0, 255]));
            }
        }
        let out = render_crop(&DynamicImage::ImageRgba8(img), &region(0.5, 0.5, 0.5, 0.5), GPU_LIMIT);
        assert_eq!(out.dimensions(), (800, 400));
        let Rgba([r, g, b, _]) = *out.get_pixel(400, 200);
        assert!(r > 190 && g < 10 && b < 10, "got {r},{g},{b}");
    }

    #[test]
    fn tall_region_is_scaled_down_with_aspect_kept() {
        let tall = region(0.9, 0.05, 0.02, 0.9);
        let (_, _, cw, ch) = crop_window(&tall, (1000, 1414));
        assert_eq!((cw, ch), (20, 1273));

        let (w, h) = zoomed_size(&tall, (1000, 1414), GPU_LIMIT);
        assert!((h - ZOOM_MAX_SIDE).abs() < 0.01, "{w}x{h}");
        assert!((w / h - 20.0 / 1273.0).abs() < 1e-4);

        let (w, h) = zoomed_size(&tall, (1000, 1414), 2048);
        assert!((h - 2048.0).abs() < 0.01, "{w}x{h}");
        assert!(w < 800.0);
    }

    #[test]
    fn tall_render_fits_the_texture_limit() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 1000, Rgba([0, 0, 0, 255])));
        let out = render_crop(&img, &region(0.5, 0.0, 0.02, 1.0), 1024);
        assert!(out.height() <= 1024 && out.width() >= 1, "{:?}", out.dimensions());
    }
}
