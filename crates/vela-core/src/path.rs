// Bezier paths: the shape description shared by glyph outlines and filled shapes.

use std::hash::{Hash, Hasher};

use crate::{Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo(Vec2, Vec2),
    CubicTo(Vec2, Vec2, Vec2),
    Close,
}

/// A sequence of closed or open contours made of lines, quadratic and
/// cubic Bezier segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BezierPath {
    commands: Vec<PathCommand>,
}

/// One straight piece of a flattened contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub a: Vec2,
    pub b: Vec2,
    /// Index of the path segment (line or curve) this piece came from,
    /// counted per contour.
    pub edge: u32,
}

/// A flattened contour; always implicitly closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contour {
    pub segments: Vec<LineSegment>,
    /// Number of source edges (lines and curves) in this contour.
    pub edge_count: u32,
}

impl BezierPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(rect: Rect) -> Self {
        let mut path = Self::new();
        path.move_to(rect.min);
        path.line_to(Vec2::new(rect.max.x, rect.min.y));
        path.line_to(rect.max);
        path.line_to(Vec2::new(rect.min.x, rect.max.y));
        path.close();
        path
    }

    pub fn move_to(&mut self, p: Vec2) {
        self.commands.push(PathCommand::MoveTo(p));
    }

    pub fn line_to(&mut self, p: Vec2) {
        self.commands.push(PathCommand::LineTo(p));
    }

    pub fn quad_to(&mut self, c: Vec2, p: Vec2) {
        self.commands.push(PathCommand::QuadTo(c, p));
    }

    pub fn cubic_to(&mut self, c1: Vec2, c2: Vec2, p: Vec2) {
        self.commands.push(PathCommand::CubicTo(c1, c2, p));
    }

    pub fn close(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        !self
            .commands
            .iter()
            .any(|c| !matches!(c, PathCommand::MoveTo(_) | PathCommand::Close))
    }

    /// Control-point bounds; a superset of the exact curve bounds.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.commands.iter().flat_map(|c| match *c {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => vec![p],
            PathCommand::QuadTo(c, p) => vec![c, p],
            PathCommand::CubicTo(c1, c2, p) => vec![c1, c2, p],
            PathCommand::Close => Vec::new(),
        });
        let first = points.next()?;
        let mut bounds = Rect::from_min_max(first, first);
        for p in points {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    /// Apply `f` to every point of the path.
    pub fn map_points(&self, f: impl Fn(Vec2) -> Vec2) -> BezierPath {
        let commands = self
            .commands
            .iter()
            .map(|c| match *c {
                PathCommand::MoveTo(p) => PathCommand::MoveTo(f(p)),
                PathCommand::LineTo(p) => PathCommand::LineTo(f(p)),
                PathCommand::QuadTo(c, p) => PathCommand::QuadTo(f(c), f(p)),
                PathCommand::CubicTo(c1, c2, p) => PathCommand::CubicTo(f(c1), f(c2), f(p)),
                PathCommand::Close => PathCommand::Close,
            })
            .collect();
        BezierPath { commands }
    }

    /// Flatten curves into line segments whose distance from the true curve
    /// is at most `tolerance`. Every contour is closed.
    pub fn flatten(&self, tolerance: f32) -> Vec<Contour> {
        let tolerance = tolerance.max(1e-4);
        let mut contours = Vec::new();
        let mut current = Contour::default();
        let mut start = Vec2::ZERO;
        let mut pen = Vec2::ZERO;

        let finish = |current: &mut Contour, pen: Vec2, start: Vec2, out: &mut Vec<Contour>| {
            if current.segments.is_empty() {
                return;
            }
            if pen != start {
                current.segments.push(LineSegment {
                    a: pen,
                    b: start,
                    edge: current.edge_count,
                });
                current.edge_count += 1;
            }
            out.push(std::mem::take(current));
        };

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    finish(&mut current, pen, start, &mut contours);
                    start = p;
                    pen = p;
                }
                PathCommand::LineTo(p) => {
                    if p != pen {
                        current.segments.push(LineSegment {
                            a: pen,
                            b: p,
                            edge: current.edge_count,
                        });
                        current.edge_count += 1;
                    }
                    pen = p;
                }
                PathCommand::QuadTo(c, p) => {
                    let steps = curve_steps(pen.lerp(p, 0.5) - c, tolerance);
                    push_curve(&mut current, steps, |t| quad_point(pen, c, p, t));
                    pen = p;
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    let dd1 = pen - c1 * 2.0 + c2;
                    let dd2 = c1 - c2 * 2.0 + p;
                    let dev = Vec2::new(dd1.x.abs().max(dd2.x.abs()), dd1.y.abs().max(dd2.y.abs()));
                    let steps = curve_steps(dev * 0.75, tolerance);
                    push_curve(&mut current, steps, |t| cubic_point(pen, c1, c2, p, t));
                    pen = p;
                }
                PathCommand::Close => {
                    finish(&mut current, pen, start, &mut contours);
                    pen = start;
                }
            }
        }
        finish(&mut current, pen, start, &mut contours);
        contours
    }

    /// Non-zero winding test against the flattened path.
    pub fn contains(&self, point: Vec2, tolerance: f32) -> bool {
        winding_number(&self.flatten(tolerance), point) != 0
    }
}

fn hash_point<H: Hasher>(p: Vec2, state: &mut H) {
    p.x.to_bits().hash(state);
    p.y.to_bits().hash(state);
}

/// Hashes the exact bit patterns of the path so identical shapes share a
/// tessellation cache entry.
impl Hash for BezierPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    0u8.hash(state);
                    hash_point(p, state);
                }
                PathCommand::LineTo(p) => {
                    1u8.hash(state);
                    hash_point(p, state);
                }
                PathCommand::QuadTo(c, p) => {
                    2u8.hash(state);
                    hash_point(c, state);
                    hash_point(p, state);
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    3u8.hash(state);
                    hash_point(c1, state);
                    hash_point(c2, state);
                    hash_point(p, state);
                }
                PathCommand::Close => 4u8.hash(state),
            }
        }
    }
}

fn curve_steps(deviation: Vec2, tolerance: f32) -> u32 {
    let dev = deviation.length();
    let steps = (dev / tolerance).sqrt().ceil() as u32;
    steps.clamp(1, 64)
}

fn push_curve(contour: &mut Contour, steps: u32, eval: impl Fn(f32) -> Vec2) {
    let edge = contour.edge_count;
    let mut prev = eval(0.0);
    for i in 1..=steps {
        let next = eval(i as f32 / steps as f32);
        if next != prev {
            contour.segments.push(LineSegment { a: prev, b: next, edge });
        }
        prev = next;
    }
    contour.edge_count += 1;
}

fn quad_point(p0: Vec2, c: Vec2, p1: Vec2, t: f32) -> Vec2 {
    let a = p0.lerp(c, t);
    let b = c.lerp(p1, t);
    a.lerp(b, t)
}

fn cubic_point(p0: Vec2, c1: Vec2, c2: Vec2, p1: Vec2, t: f32) -> Vec2 {
    let a = quad_point(p0, c1, c2, t);
    let b = quad_point(c1, c2, p1, t);
    a.lerp(b, t)
}

/// Sum of signed crossings of a ray from `point` towards +x.
pub fn winding_number(contours: &[Contour], point: Vec2) -> i32 {
    let mut winding = 0;
    for contour in contours {
        for seg in &contour.segments {
            if seg.a.y <= point.y {
                if seg.b.y > point.y && (seg.b - seg.a).cross(point - seg.a) > 0.0 {
                    winding += 1;
                }
            } else if seg.b.y <= point.y && (seg.b - seg.a).cross(point - seg.a) < 0.0 {
                winding -= 1;
            }
        }
    }
    winding
}
