// Geometry: points, sizes, min/max rectangles and 4x4 transforms.

use std::ops::{Add, Mul, Sub};

// ──────────────────────────────────────────────
// Vec2 / Size
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3-D cross product.
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

// ──────────────────────────────────────────────
// Rect
// ──────────────────────────────────────────────

/// Axis-aligned rectangle stored as its min and max corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const EMPTY: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ZERO,
    };

    pub const fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Rectangle that covers the whole plane; used as the unclipped clip.
    pub fn infinite() -> Self {
        Self {
            min: Vec2::new(f32::MIN, f32::MIN),
            max: Vec2::new(f32::MAX, f32::MAX),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// True when `other` lies fully inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.min.x >= self.min.x
                && other.min.y >= self.min.y
                && other.max.x <= self.max.x
                && other.max.y <= self.max.y)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Intersection of two rectangles. A disjoint pair yields an empty
    /// rectangle anchored inside `self`, so the result is always a subset.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let min = Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Vec2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if max.x < min.x || max.y < min.y {
            let anchor = Vec2::new(
                min.x.clamp(self.min.x, self.max.x),
                min.y.clamp(self.min.y, self.max.y),
            );
            return Rect::from_min_max(anchor, anchor);
        }
        Rect::from_min_max(min, max)
    }

    pub fn translate(&self, offset: Vec2) -> Rect {
        Rect::from_min_max(self.min + offset, self.max + offset)
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.min.x, self.min.y, self.max.x, self.max.y]
    }
}

// ──────────────────────────────────────────────
// Mat4
// ──────────────────────────────────────────────

/// Column-major 4x4 homogeneous transform.
///
/// Only 2-D affine transforms with a depth component are produced by the
/// toolkit, but the full matrix is kept so rotation and scale around an
/// arbitrary pivot compose without special cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = [x, y, z, 1.0];
        m
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[0][0] = sx;
        m.cols[1][1] = sy;
        m
    }

    /// Rotation by `radians` around the Z axis.
    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        let mut m = Self::IDENTITY;
        m.cols[0] = [c, s, 0.0, 0.0];
        m.cols[1] = [-s, c, 0.0, 0.0];
        m
    }

    /// Rotate and scale around `pivot`.
    pub fn around(pivot: Vec2, inner: Mat4) -> Self {
        Mat4::translation(pivot.x, pivot.y, 0.0) * inner * Mat4::translation(-pivot.x, -pivot.y, 0.0)
    }

    /// Maps window pixels (origin top-left, y down) to clip space.
    pub fn window_projection(extent: crate::Size) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[0][0] = 2.0 / extent.width.max(1.0);
        m.cols[1][1] = -2.0 / extent.height.max(1.0);
        m.cols[3] = [-1.0, 1.0, 0.0, 1.0];
        m
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        let c = &self.cols;
        let x = c[0][0] * p.x + c[1][0] * p.y + c[3][0];
        let y = c[0][1] * p.x + c[1][1] * p.y + c[3][1];
        let w = c[0][3] * p.x + c[1][3] * p.y + c[3][3];
        if w != 0.0 && w != 1.0 {
            Vec2::new(x / w, y / w)
        } else {
            Vec2::new(x, y)
        }
    }

    pub fn translation_z(&self) -> f32 {
        self.cols[3][2]
    }

    /// Axis-aligned bounds of a rectangle after transformation.
    pub fn transform_rect_bounds(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.min),
            self.transform_point(Vec2::new(rect.max.x, rect.min.y)),
            self.transform_point(Vec2::new(rect.min.x, rect.max.y)),
            self.transform_point(rect.max),
        ];
        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Rect::from_min_max(min, max)
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0f32; 4]; 4];
        for (col, out_col) in out.iter_mut().enumerate() {
            for (row, value) in out_col.iter_mut().enumerate() {
                *value = (0..4).map(|k| self.cols[k][row] * rhs.cols[col][k]).sum();
            }
        }
        Mat4 { cols: out }
    }
}
