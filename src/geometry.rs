//! Normalized (0..1) points and rectangles, tagged with the frame they are measured in.
//!
//! Two frames exist: the full rendered page and the confirmed title-block crop.
//! Values from one frame never silently mix with the other; moving a crop value onto
//! the page requires the title-block rectangle as the transform.

use std::fmt;
use std::marker::PhantomData;

// ── Frames ──────────────────────────────────────────────────────────────────

pub trait Frame: Copy + Default + PartialEq + fmt::Debug {
    const NAME: &'static str;
}

/// The full page image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageFrame;

/// The confirmed title-block region, as its own unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropFrame;

impl Frame for PageFrame {
    const NAME: &'static str = "page";
}

impl Frame for CropFrame {
    const NAME: &'static str = "crop";
}

/// Clamp into `[0, 1]`. NaN and infinities collapse to the nearest sensible bound.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

fn in_unit(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

// ── Points ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
pub struct NormPoint<F: Frame> {
    pub x: f64,
    pub y: f64,
    frame: PhantomData<F>,
}

impl<F: Frame> NormPoint<F> {
    /// Both coordinates are clamped into the frame.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp01(x),
            y: clamp01(y),
            frame: PhantomData,
        }
    }
}

impl NormPoint<CropFrame> {
    pub fn to_page(self, region: &NormRect<PageFrame>) -> NormPoint<PageFrame> {
        NormPoint::new(
            region.left + self.x * region.width,
            region.top + self.y * region.height,
        )
    }
}

impl<F: Frame> fmt::Debug for NormPoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormPoint<{}>({:.4}, {:.4})", F::NAME, self.x, self.y)
    }
}

// ── Rectangles ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
pub struct NormRect<F: Frame> {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    frame: PhantomData<F>,
}

impl<F: Frame> NormRect<F> {
    /// Accepts only finite values with `left, top` in `[0, 1]` and `width, height` in `(0, 1]`.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Option<Self> {
        let ok = in_unit(left) && in_unit(top) && in_unit(width) && in_unit(height);
        if !ok || width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            left,
            top,
            width,
            height,
            frame: PhantomData,
        })
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> NormPoint<F> {
        NormPoint::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

impl NormRect<CropFrame> {
    /// Re-express a crop-frame rectangle against the full page.
    pub fn to_page(&self, region: &NormRect<PageFrame>) -> NormRect<PageFrame> {
        NormRect {
            left: region.left + self.left * region.width,
            top: region.top + self.top * region.height,
            width: self.width * region.width,
            height: self.height * region.height,
            frame: PhantomData,
        }
    }
}

impl<F: Frame> fmt::Debug for NormRect<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NormRect<{}>(left={:.4}, top={:.4}, w={:.4}, h={:.4})",
            F::NAME,
            self.left,
            self.top,
            self.width,
            self.height
        )
    }
}

/// The axis-aligned rectangle spanned by a drag. `None` when the drag has no extent
/// on either axis.
pub fn compute_norm_rect<F: Frame>(start: NormPoint<F>, current: NormPoint<F>) -> Option<NormRect<F>> {
    let (x0, y0) = (clamp01(start.x), clamp01(start.y));
    let (x1, y1) = (clamp01(current.x), clamp01(current.y));
    let width = (x1 - x0).abs();
    let height = (y1 - y0).abs();
    if width == 0.0 || height == 0.0 {
        return None;
    }
    Some(NormRect {
        left: x0.min(x1),
        top: y0.min(y1),
        width,
        height,
        frame: PhantomData,
    })
}

// ── On-screen surfaces ──────────────────────────────────────────────────────

/// Where a frame is currently displayed, in screen pixels.
///
/// Must be rebuilt from the live widget bounds every frame: the page surface and
/// the zoomed surface have independent boxes, and the zoomed one changes size
/// whenever a new region is confirmed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceBox<F: Frame> {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    frame: PhantomData<F>,
}

/// A screen-space rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl<F: Frame> SurfaceBox<F> {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
            frame: PhantomData,
        }
    }

    /// Map a pointer position to the frame. `None` if the surface has no extent yet.
    pub fn to_normalized(&self, client_x: f32, client_y: f32) -> Option<NormPoint<F>> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let x = f64::from((client_x - self.origin_x) / self.width);
        let y = f64::from((client_y - self.origin_y) / self.height);
        Some(NormPoint::new(x, y))
    }

    pub fn rect_to_screen(&self, rect: &NormRect<F>) -> PixelRect {
        PixelRect {
            x: self.origin_x + rect.left as f32 * self.width,
            y: self.origin_y + rect.top as f32 * self.height,
            width: rect.width as f32 * self.width,
            height: rect.height as f32 * self.height,
        }
    }
}
