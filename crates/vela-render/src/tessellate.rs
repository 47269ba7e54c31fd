// Filled-shape tessellation into horizontal trapezoids, and the cache that
// keeps each distinct path's tessellation across frames.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use vela_core::{BezierPath, Vec2};

/// Flattening tolerance in path units.
pub const SHAPE_TOLERANCE: f32 = 0.1;

const MAX_CACHED_SHAPES: usize = 1024;

const EPSILON: f32 = 1e-4;

/// A trapezoid with horizontal top and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trapezoid {
    pub top: f32,
    pub bottom: f32,
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl Trapezoid {
    /// Corners TL, TR, BL, BR.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.top_left, self.top),
            Vec2::new(self.top_right, self.top),
            Vec2::new(self.bottom_left, self.bottom),
            Vec2::new(self.bottom_right, self.bottom),
        ]
    }

    pub fn area(&self) -> f32 {
        let top = self.top_right - self.top_left;
        let bottom = self.bottom_right - self.bottom_left;
        (top + bottom) * 0.5 * (self.bottom - self.top)
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    top: Vec2,
    bottom: Vec2,
    winding: i32,
}

impl Edge {
    fn x_at(&self, y: f32) -> f32 {
        let dy = self.bottom.y - self.top.y;
        if dy.abs() < EPSILON {
            return self.top.x;
        }
        let t = ((y - self.top.y) / dy).clamp(0.0, 1.0);
        self.top.x + (self.bottom.x - self.top.x) * t
    }
}

/// Split the area enclosed by `path` (non-zero rule) into trapezoids.
pub fn tessellate(path: &BezierPath, tolerance: f32) -> Vec<Trapezoid> {
    let mut edges = Vec::new();
    for contour in path.flatten(tolerance) {
        for seg in &contour.segments {
            if (seg.a.y - seg.b.y).abs() < EPSILON {
                continue;
            }
            let (top, bottom, winding) = if seg.a.y < seg.b.y {
                (seg.a, seg.b, 1)
            } else {
                (seg.b, seg.a, -1)
            };
            edges.push(Edge { top, bottom, winding });
        }
    }
    if edges.is_empty() {
        return Vec::new();
    }

    let mut ys: Vec<f32> = edges.iter().flat_map(|e| [e.top.y, e.bottom.y]).collect();
    // Crossing edges swap order mid-band; split bands at every crossing.
    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            let y0 = a.top.y.max(b.top.y);
            let y1 = a.bottom.y.min(b.bottom.y);
            if y1 - y0 <= EPSILON {
                continue;
            }
            let d0 = a.x_at(y0) - b.x_at(y0);
            let d1 = a.x_at(y1) - b.x_at(y1);
            if d0 * d1 < 0.0 {
                ys.push(y0 + (y1 - y0) * d0 / (d0 - d1));
            }
        }
    }
    ys.sort_by(f32::total_cmp);
    ys.dedup_by(|a, b| (*a - *b).abs() < EPSILON);

    let mut out = Vec::new();
    let mut active: Vec<(f32, &Edge)> = Vec::new();
    for band in ys.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        let mid = (y0 + y1) * 0.5;
        active.clear();
        active.extend(
            edges
                .iter()
                .filter(|e| e.top.y < mid && e.bottom.y > mid)
                .map(|e| (e.x_at(mid), e)),
        );
        active.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut left: Option<&Edge> = None;
        for &(_, edge) in &active {
            let before = winding;
            winding += edge.winding;
            if before == 0 && winding != 0 {
                left = Some(edge);
            } else if before != 0 && winding == 0 {
                if let Some(l) = left.take() {
                    out.push(Trapezoid {
                        top: y0,
                        bottom: y1,
                        top_left: l.x_at(y0),
                        top_right: edge.x_at(y0),
                        bottom_left: l.x_at(y1),
                        bottom_right: edge.x_at(y1),
                    });
                }
            }
        }
    }
    out
}

/// Tessellations keyed by the exact path, shared across frames.
#[derive(Debug, Default)]
pub struct ShapeCache {
    shapes: HashMap<u64, (BezierPath, Arc<[Trapezoid]>)>,
    hits: u64,
    misses: u64,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_tessellate(&mut self, path: &BezierPath) -> Arc<[Trapezoid]> {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let key = hasher.finish();
        if let Some((cached, traps)) = self.shapes.get(&key) {
            if cached == path {
                self.hits += 1;
                return traps.clone();
            }
        }
        self.misses += 1;
        if self.shapes.len() >= MAX_CACHED_SHAPES {
            log::debug!("shape cache full, clearing {} entries", self.shapes.len());
            self.shapes.clear();
        }
        let traps: Arc<[Trapezoid]> = tessellate(path, SHAPE_TOLERANCE).into();
        self.shapes.insert(key, (path.clone(), traps.clone()));
        traps
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::Rect;

    fn total_area(traps: &[Trapezoid]) -> f32 {
        traps.iter().map(Trapezoid::area).sum()
    }

    #[test]
    fn rectangle_is_one_trapezoid() {
        let traps = tessellate(&BezierPath::rect(Rect::new(2.0, 3.0, 10.0, 4.0)), 0.1);
        assert_eq!(traps.len(), 1);
        let t = traps[0];
        assert_eq!((t.top, t.bottom), (3.0, 7.0));
        assert_eq!((t.top_left, t.top_right), (2.0, 12.0));
    }

    #[test]
    fn triangle_area_is_preserved() {
        let mut path = BezierPath::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(10.0, 10.0));
        path.line_to(Vec2::new(0.0, 10.0));
        path.close();
        let traps = tessellate(&path, 0.1);
        assert!((total_area(&traps) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn hole_with_opposite_winding_is_left_empty() {
        let mut path = BezierPath::rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        path.move_to(Vec2::new(3.0, 3.0));
        path.line_to(Vec2::new(3.0, 7.0));
        path.line_to(Vec2::new(7.0, 7.0));
        path.line_to(Vec2::new(7.0, 3.0));
        path.close();
        let traps = tessellate(&path, 0.1);
        assert!((total_area(&traps) - 84.0).abs() < 1e-3);
        let inside_hole = traps.iter().any(|t| {
            t.top <= 5.0 && t.bottom >= 5.0 && t.top_left <= 5.0 && t.top_right >= 5.0
        });
        assert!(!inside_hole);
    }

    #[test]
    fn self_intersecting_bowtie_splits_at_crossing() {
        let mut path = BezierPath::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(10.0, 10.0));
        path.line_to(Vec2::new(10.0, 0.0));
        path.line_to(Vec2::new(0.0, 10.0));
        path.close();
        let traps = tessellate(&path, 0.1);
        assert!(traps.iter().any(|t| (t.bottom - 5.0).abs() < 1e-3));
        assert!((total_area(&traps) - 50.0).abs() < 1e-2);
    }

    #[test]
    fn circle_area_matches_pi_r_squared() {
        let r = 20.0;
        let k = 0.552_284_8 * r;
        let mut path = BezierPath::new();
        path.move_to(Vec2::new(r, 0.0));
        path.cubic_to(Vec2::new(r, k), Vec2::new(k, r), Vec2::new(0.0, r));
        path.cubic_to(Vec2::new(-k, r), Vec2::new(-r, k), Vec2::new(-r, 0.0));
        path.cubic_to(Vec2::new(-r, -k), Vec2::new(-k, -r), Vec2::new(0.0, -r));
        path.cubic_to(Vec2::new(k, -r), Vec2::new(r, -k), Vec2::new(r, 0.0));
        path.close();
        let area = total_area(&tessellate(&path, 0.05));
        let expected = std::f32::consts::PI * r * r;
        assert!((area - expected).abs() / expected < 0.01, "area {area}");
    }

    #[test]
    fn cache_reuses_identical_paths() {
        let mut cache = ShapeCache::new();
        let a = BezierPath::rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        let b = BezierPath::rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        let first = cache.get_or_tessellate(&a);
        let second = cache.get_or_tessellate(&b);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len(), 1);
    }
}
