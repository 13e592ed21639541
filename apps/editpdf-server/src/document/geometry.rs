//! Coordinate contract
//!
//! Three spaces are involved when a page is edited:
//!
//! - **User space**: the PDF's own coordinates, origin at the bottom-left of
//!   the media box, y growing upward. Content streams speak this.
//! - **Page space**: what clients see. Origin at the top-left corner of the
//!   page as displayed (crop box, `/Rotate` applied), y growing downward,
//!   units in points. Every coordinate in the HTTP API is page space.
//! - **Pixel space**: a rendered raster at some scale. Only the presentation
//!   layer converts to and from pixels; the helpers here exist so it can do so
//!   consistently with the renderer.

use serde::Serialize;

/// 2D affine transform in PDF notation `[a b c d e f]`.
///
/// Points are row vectors: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
/// `m.then(&n)` applies `m` first and `n` second, which matches how PDF
/// composes `cm` with the current transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Compose: apply `self`, then `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Length of the transformed unit y vector. Used as the effective
    /// vertical scale of text.
    pub fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// True when both matrices share the same linear part (rotation, scale,
    /// skew), ignoring translation.
    pub fn same_orientation(&self, other: &Matrix) -> bool {
        const EPS: f64 = 1e-3;
        let scale = self.a.abs().max(self.d.abs()).max(1.0);
        (self.a - other.a).abs() <= EPS * scale
            && (self.b - other.b).abs() <= EPS * scale
            && (self.c - other.c).abs() <= EPS * scale
            && (self.d - other.d).abs() <= EPS * scale
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned rectangle `(x0, y0)`-`(x1, y1)` with `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Bounding box of this rectangle after an affine transform.
    pub fn transform(&self, m: &Matrix) -> Rect {
        let corners = [
            m.apply(self.x0, self.y0),
            m.apply(self.x1, self.y0),
            m.apply(self.x0, self.y1),
            m.apply(self.x1, self.y1),
        ];
        let mut out = Rect {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            out.x0 = out.x0.min(x);
            out.y0 = out.y0.min(y);
            out.x1 = out.x1.max(x);
            out.y1 = out.y1.max(y);
        }
        out
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Intersect with `[0, width] x [0, height]`. Returns `None` when nothing
    /// of the rectangle remains on the page.
    pub fn clamp_to(&self, width: f64, height: f64) -> Option<Rect> {
        let clamped = Rect {
            x0: self.x0.max(0.0),
            y0: self.y0.max(0.0),
            x1: self.x1.min(width),
            y1: self.y1.min(height),
        };
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }

    /// Round each coordinate to two decimals for stable JSON output.
    pub fn rounded(&self) -> Rect {
        Rect {
            x0: round2(self.x0),
            y0: round2(self.y0),
            x1: round2(self.x1),
            y1: round2(self.y1),
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Place a box of `width` x `height` at `(x, y)` so it stays on the page when
/// it fits. Boxes larger than the page are pinned to the origin on that axis.
pub fn clamp_origin(x: f64, y: f64, width: f64, height: f64, page_w: f64, page_h: f64) -> (f64, f64) {
    let clamp_axis = |v: f64, size: f64, limit: f64| {
        if size >= limit {
            0.0
        } else {
            v.clamp(0.0, limit - size)
        }
    };
    (clamp_axis(x, width, page_w), clamp_axis(y, height, page_h))
}

/// Geometry of one page: the visible box in user space plus its rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Crop box (or media box) in user space.
    pub bounds: Rect,
    /// Clockwise display rotation, one of 0, 90, 180, 270.
    pub rotation: u16,
}

impl PageGeometry {
    pub fn new(bounds: Rect, rotation: i64) -> Self {
        let rotation = rotation.rem_euclid(360);
        // Non-right-angle rotations are invalid PDF; round to the nearest.
        let rotation = (((rotation + 45) / 90) * 90 % 360) as u16;
        Self { bounds, rotation }
    }

    /// Width of the page as displayed, in points.
    pub fn width(&self) -> f64 {
        match self.rotation {
            90 | 270 => self.bounds.height(),
            _ => self.bounds.width(),
        }
    }

    /// Height of the page as displayed, in points.
    pub fn height(&self) -> f64 {
        match self.rotation {
            90 | 270 => self.bounds.width(),
            _ => self.bounds.height(),
        }
    }

    /// Transform from PDF user space to page space.
    pub fn user_to_page(&self) -> Matrix {
        let bw = self.bounds.width();
        let bh = self.bounds.height();
        let flip = Matrix::new(1.0, 0.0, 0.0, -1.0, -self.bounds.x0, self.bounds.y1);
        let rotate = match self.rotation {
            90 => Matrix::new(0.0, 1.0, -1.0, 0.0, bh, 0.0),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, bw, bh),
            270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, bw),
            _ => Matrix::IDENTITY,
        };
        flip.then(&rotate)
    }

    /// Transform from page space back to PDF user space.
    pub fn page_to_user(&self) -> Matrix {
        // user_to_page is a flip plus a right-angle rotation, always invertible
        self.user_to_page().invert().unwrap_or(Matrix::IDENTITY)
    }

    /// Transform from page space to pixel space for a render at `scale`.
    pub fn page_to_pixels(&self, scale: f64) -> Matrix {
        Matrix::scale(scale, scale)
    }

    /// Pixel dimensions of a render at `scale`.
    pub fn pixel_size(&self, scale: f64) -> (u32, u32) {
        (
            (self.width() * scale).round().max(1.0) as u32,
            (self.height() * scale).round().max(1.0) as u32,
        )
    }
}
