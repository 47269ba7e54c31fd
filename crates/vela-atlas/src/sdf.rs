// Multi-channel signed distance fields.
//
// Edges of each contour are colored so that at every corner the two
// meeting edges share at most one channel. Each of R, G and B holds the
// pseudo-distance to the nearest edge carrying that channel; the median of
// the three reconstructs sharp corners. Alpha holds the true distance.
// Distances are positive inside and clamped to `±range` before being mapped
// to [0, 1] as `0.5 + d / (2 * range)`.

use vela_core::{winding_number, BezierPath, Contour, LineSegment, Vec2};

/// sin of the angle above which a joint between edges counts as a corner.
const CORNER_SIN_THRESHOLD: f32 = 0.141;

const RED: u8 = 1;
const GREEN: u8 = 2;
const BLUE: u8 = 4;
const WHITE: u8 = RED | GREEN | BLUE;
const PALETTE: [u8; 3] = [GREEN | BLUE, RED | BLUE, RED | GREEN];

/// Distance field in normalized units, row-major, top row first.
#[derive(Debug, Clone)]
pub struct SdfField {
    pub width: u32,
    pub height: u32,
    pub range: f32,
    pub texels: Vec<[f32; 4]>,
}

impl SdfField {
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[(y * self.width + x) as usize]
    }

    /// Bilinear sample at continuous texel coordinates; texel centers sit
    /// at half-integers. Coordinates clamp to the edge.
    pub fn sample(&self, x: f32, y: f32) -> [f32; 4] {
        let fx = (x - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (y - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let (a, b, c, d) = (self.get(x0, y0), self.get(x1, y0), self.get(x0, y1), self.get(x1, y1));
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * tx;
            let bottom = c[i] + (d[i] - c[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }

    /// 8-bit RGBA texels for the GPU.
    pub fn quantize(&self) -> Vec<[u8; 4]> {
        self.texels
            .iter()
            .map(|t| t.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

pub fn median(v: [f32; 4]) -> f32 {
    let [r, g, b, _] = v;
    r.min(g).max(r.max(g).min(b))
}

struct ColoredSegment {
    seg: LineSegment,
    color: u8,
    /// First and last piece of their source edge; only those get the
    /// pseudo-distance extension past the edge ends.
    edge_start: bool,
    edge_end: bool,
}

/// Generate a `width`×`height` field for a path already in texel
/// coordinates (y down). `tolerance` is the curve flattening tolerance.
pub fn generate_msdf(path: &BezierPath, width: u32, height: u32, range: f32, tolerance: f32) -> SdfField {
    let contours = path.flatten(tolerance);
    let orientation = if signed_area(&contours) >= 0.0 { 1.0 } else { -1.0 };
    let segments = color_edges(&contours);
    let range = range.max(f32::EPSILON);

    let mut texels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let inside = winding_number(&contours, p) != 0;
            let mut texel = [0.0f32; 4];
            for (i, channel) in [RED, GREEN, BLUE].into_iter().enumerate() {
                let d = channel_distance(&segments, channel, p, orientation)
                    .unwrap_or(if inside { range } else { -range });
                texel[i] = encode(d, range);
            }
            let true_dist = segments
                .iter()
                .map(|s| segment_distance(&s.seg, p).0)
                .fold(f32::INFINITY, f32::min);
            let true_dist = if true_dist.is_finite() { true_dist } else { range };
            texel[3] = encode(if inside { true_dist } else { -true_dist }, range);
            texels.push(texel);
        }
    }

    SdfField {
        width,
        height,
        range,
        texels,
    }
}

fn encode(d: f32, range: f32) -> f32 {
    0.5 + d.clamp(-range, range) / (2.0 * range)
}

fn signed_area(contours: &[Contour]) -> f32 {
    contours
        .iter()
        .flat_map(|c| c.segments.iter())
        .map(|s| s.a.cross(s.b))
        .sum::<f32>()
        * 0.5
}

fn direction(seg: &LineSegment) -> Vec2 {
    let d = seg.b - seg.a;
    let len = d.length();
    if len > 0.0 {
        d * (1.0 / len)
    } else {
        Vec2::ZERO
    }
}

/// Assign channel masks to every source edge of every contour.
fn color_edges(contours: &[Contour]) -> Vec<ColoredSegment> {
    let mut out = Vec::new();
    for contour in contours {
        let edges = contour.edge_count as usize;
        if edges == 0 {
            continue;
        }
        // First and last flattened piece of each edge.
        let mut first: Vec<Option<LineSegment>> = vec![None; edges];
        let mut last: Vec<Option<LineSegment>> = vec![None; edges];
        for seg in &contour.segments {
            let e = seg.edge as usize;
            if first[e].is_none() {
                first[e] = Some(*seg);
            }
            last[e] = Some(*seg);
        }

        // corner[i]: a corner where edge i begins.
        let mut corners = Vec::new();
        for i in 0..edges {
            let prev = (i + edges - 1) % edges;
            let (Some(incoming), Some(outgoing)) = (last[prev], first[i]) else {
                continue;
            };
            let a = direction(&incoming);
            let b = direction(&outgoing);
            if a.dot(b) <= 0.0 || a.cross(b).abs() > CORNER_SIN_THRESHOLD {
                corners.push(i);
            }
        }

        let colors = edge_colors(edges, &corners);
        for seg in &contour.segments {
            let e = seg.edge as usize;
            out.push(ColoredSegment {
                seg: *seg,
                color: colors[e],
                edge_start: first[e] == Some(*seg),
                edge_end: last[e] == Some(*seg),
            });
        }
    }
    out
}

fn edge_colors(edges: usize, corners: &[usize]) -> Vec<u8> {
    match corners.len() {
        0 => vec![WHITE; edges],
        1 => {
            // Teardrop: split the single run into three colored thirds.
            if edges < 3 {
                return vec![WHITE; edges];
            }
            let start = corners[0];
            let mut colors = vec![WHITE; edges];
            for k in 0..edges {
                let e = (start + k) % edges;
                colors[e] = PALETTE[(k * 3 / edges).min(2)];
            }
            colors
        }
        n => {
            let mut group_color: Vec<u8> = (0..n).map(|k| PALETTE[k % 3]).collect();
            if n % 3 == 1 {
                group_color[n - 1] = PALETTE[1];
            }
            let mut colors = vec![WHITE; edges];
            for (k, &start) in corners.iter().enumerate() {
                let end = corners[(k + 1) % n];
                let mut e = start;
                loop {
                    colors[e] = group_color[k];
                    e = (e + 1) % edges;
                    if e == end {
                        break;
                    }
                }
            }
            colors
        }
    }
}

/// Unsigned distance to a segment and the clamped projection parameter.
fn segment_distance(seg: &LineSegment, p: Vec2) -> (f32, f32) {
    let ab = seg.b - seg.a;
    let len2 = ab.dot(ab);
    let t = if len2 > 0.0 { (p - seg.a).dot(ab) / len2 } else { 0.0 };
    let tc = t.clamp(0.0, 1.0);
    let closest = seg.a + ab * tc;
    ((p - closest).length(), t)
}

/// Signed pseudo-distance to the nearest segment carrying `channel`.
fn channel_distance(segments: &[ColoredSegment], channel: u8, p: Vec2, orientation: f32) -> Option<f32> {
    let mut best: Option<(f32, f32, &ColoredSegment, f32)> = None;
    for s in segments.iter().filter(|s| s.color & channel != 0) {
        let (dist, t) = segment_distance(&s.seg, p);
        // Tie-break at shared endpoints: prefer the segment the point is
        // more perpendicular to.
        let dir = direction(&s.seg);
        let ortho = if dist > 0.0 {
            let tc = t.clamp(0.0, 1.0);
            let closest = s.seg.a + (s.seg.b - s.seg.a) * tc;
            (dir.cross(p - closest) / dist).abs()
        } else {
            1.0
        };
        let better = match best {
            None => true,
            Some((bd, bo, _, _)) => dist < bd - 1e-5 || (dist <= bd + 1e-5 && ortho > bo),
        };
        if better {
            best = Some((dist, ortho, s, t));
        }
    }
    let (dist, _, s, t) = best?;
    let dir = direction(&s.seg);
    let side = dir.cross(p - s.seg.a) * orientation;
    let sign = if side >= 0.0 { 1.0 } else { -1.0 };

    let pseudo = if (t < 0.0 && s.edge_start) || (t > 1.0 && s.edge_end) {
        let perpendicular = dir.cross(p - s.seg.a).abs();
        if perpendicular <= dist {
            perpendicular
        } else {
            dist
        }
    } else {
        dist
    };
    Some(sign * pseudo)
}
