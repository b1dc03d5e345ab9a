//! Point math and path comparison used by the stroke matcher.
//!
//! Everything here is a pure function. Degenerate paths (fewer than two points, or
//! zero length) never panic: distances come back as [`UNMATCHED`] and similarities
//! as `-1.0`.

use serde::{Deserialize, Serialize};

/// Side length of the logical square reference strokes are drawn in.
pub const LOGICAL_SIZE: f64 = 1024.0;

/// Distance reported for paths that cannot be compared.
pub const UNMATCHED: f64 = f64::INFINITY;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Uniform scale/offset from canvas coordinates into the logical space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CanvasTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CanvasTransform {
    /// Stretches a `width` x `height` canvas whose origin is at its top-left corner
    /// over the whole logical square.
    pub fn fit(width: f64, height: f64) -> Self {
        Self {
            scale_x: LOGICAL_SIZE / width.max(EPSILON),
            scale_y: LOGICAL_SIZE / height.max(EPSILON),
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn to_logical(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.offset_x) * self.scale_x,
            (p.y - self.offset_y) * self.scale_y,
        )
    }

    pub fn to_canvas(&self, p: Point) -> Point {
        Point::new(
            p.x / self.scale_x + self.offset_x,
            p.y / self.scale_y + self.offset_y,
        )
    }
}

pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Evenly re-spaces `path` into `target` points along its arc length.
///
/// Returns an empty vector for empty input and repeats the single point of a
/// zero-length path.
pub fn resample(path: &[Point], target: usize) -> Vec<Point> {
    let Some(&first) = path.first() else {
        return vec![];
    };
    if target == 0 {
        return vec![];
    }
    let total = path_length(path);
    if path.len() < 2 || total < EPSILON || target == 1 {
        return vec![first; target];
    }

    let step = total / (target - 1) as f64;
    let mut out = Vec::with_capacity(target);
    out.push(first);

    let mut segment = 1;
    let mut walked = 0.0;
    let mut seg_start = first;
    for i in 1..target - 1 {
        let wanted = step * i as f64;
        loop {
            let seg_len = seg_start.distance(path[segment]);
            if walked + seg_len >= wanted || segment == path.len() - 1 {
                let t = if seg_len < EPSILON {
                    0.0
                } else {
                    ((wanted - walked) / seg_len).clamp(0.0, 1.0)
                };
                let end = path[segment];
                out.push(Point::new(
                    seg_start.x + t * (end.x - seg_start.x),
                    seg_start.y + t * (end.y - seg_start.y),
                ));
                break;
            }
            walked += seg_len;
            seg_start = path[segment];
            segment += 1;
        }
    }
    out.push(path[path.len() - 1]);
    out
}

pub fn point_to_segment_distance(point: Point, start: Point, end: Point) -> f64 {
    let seg = end.sub(start);
    let len_sq = seg.dot(seg);
    if len_sq < EPSILON {
        return point.distance(start);
    }
    let t = (point.sub(start).dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(Point::new(start.x + t * seg.x, start.y + t * seg.y))
}

fn point_to_path_distance(point: Point, path: &[Point]) -> f64 {
    path.windows(2)
        .map(|w| point_to_segment_distance(point, w[0], w[1]))
        .fold(UNMATCHED, f64::min)
}

fn is_degenerate(path: &[Point]) -> bool {
    path.len() < 2 || path_length(path) < EPSILON
}

/// Mean distance between two paths, measured both ways so that a stroke covering
/// only part of the other does not score as a perfect trace.
///
/// Both inputs should already be resampled to a common point count.
pub fn average_deviation(user: &[Point], reference: &[Point]) -> f64 {
    if is_degenerate(user) || is_degenerate(reference) {
        return UNMATCHED;
    }
    let one_way = |from: &[Point], to: &[Point]| {
        from.iter().map(|&p| point_to_path_distance(p, to)).sum::<f64>() / from.len() as f64
    };
    (one_way(user, reference) + one_way(reference, user)) / 2.0
}

/// Mean cosine between corresponding segments of two equally sampled paths.
///
/// `1.0` means both were drawn the same way, `-1.0` means one is the other drawn
/// backwards.
pub fn direction_similarity(user: &[Point], reference: &[Point]) -> f64 {
    if is_degenerate(user) || is_degenerate(reference) || user.len() != reference.len() {
        return -1.0;
    }
    let mut total = 0.0;
    let mut counted = 0usize;
    for (u, r) in user.windows(2).zip(reference.windows(2)) {
        let du = u[1].sub(u[0]);
        let dr = r[1].sub(r[0]);
        let (nu, nr) = (du.norm(), dr.norm());
        if nu < EPSILON || nr < EPSILON {
            continue;
        }
        total += du.dot(dr) / (nu * nr);
        counted += 1;
    }
    if counted == 0 {
        return -1.0;
    }
    (total / counted as f64).clamp(-1.0, 1.0)
}
