//! Polygon geometry for antenna footprints.
//!
//! Contains helpers for:
//! - Building closed polygon rings (including area-preserving circle approximations)
//! - Shoelace area with degenerate-ring handling
//! - Simplicity and convexity tests built on segment-segment intersection
//! - Convex clipping (Sutherland–Hodgman) for polygon-polygon intersection
//! - Rigid transforms (translation, rotation about a pivot)
//!
//! Degenerate rings are never an error: fewer than three vertices, zero area
//! and self-intersecting rings all report an area of 0.

use std::f64::consts::PI;

use super::types::Point;

/// A closed polygon ring. The closing edge from the last vertex back to the
/// first is implicit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Build a ring from its vertices.
    ///
    /// Consecutive duplicate vertices are merged and an explicit closing
    /// vertex (equal to the first one) is dropped.
    pub fn new(vertices: Vec<Point>) -> Self {
        let mut ring: Vec<Point> = Vec::with_capacity(vertices.len());
        for v in vertices {
            if ring.last().is_some_and(|last| nearly_equal(last, &v)) {
                continue;
            }
            ring.push(v);
        }
        while ring.len() > 1 && nearly_equal(&ring[0], &ring[ring.len() - 1]) {
            ring.pop();
        }
        Self { vertices: ring }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Regular `segments`-gon approximating a circle, counter-clockwise.
    ///
    /// The circumradius is scaled so that the polygon area equals π·radius²
    /// exactly (up to rounding), which keeps normalized overlaps at 1 when the
    /// circle is fully covered.
    pub fn circle(center: Point, radius: f64, segments: usize) -> Self {
        if radius <= 0.0 || segments < 3 {
            return Self::empty();
        }
        let n = segments as f64;
        let step = 2.0 * PI / n;
        let circumradius = radius * (2.0 * PI / (n * step.sin())).sqrt();
        let vertices = (0..segments)
            .map(|k| {
                let angle = step * k as f64;
                Point::new(center.x + circumradius * angle.cos(), center.y + circumradius * angle.sin())
            })
            .collect();
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Shoelace area, positive for counter-clockwise rings.
    fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc = 0.0;
        for i in 0..n {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % n];
            acc += a.x * b.y - b.x * a.y;
        }
        acc / 2.0
    }

    /// Non-negative area. Degenerate and self-intersecting rings give 0.
    pub fn area(&self) -> f64 {
        if self.vertices.len() < 3 || !self.is_simple() {
            return 0.0;
        }
        self.signed_area().abs()
    }

    /// True if no two non-adjacent edges touch.
    pub fn is_simple(&self) -> bool {
        let n = self.vertices.len();
        if n < 4 {
            return true;
        }
        for i in 0..n {
            let p1 = &self.vertices[i];
            let q1 = &self.vertices[(i + 1) % n];
            for j in (i + 2)..n {
                // Edge n-1 wraps around to vertex 0 and is adjacent to edge 0.
                if i == 0 && j == n - 1 {
                    continue;
                }
                let p2 = &self.vertices[j];
                let q2 = &self.vertices[(j + 1) % n];
                if segments_intersect(p1, q1, p2, q2) {
                    return false;
                }
            }
        }
        true
    }

    /// True for simple rings whose turns all go the same way.
    /// Collinear vertices are tolerated.
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut turn = 0;
        for i in 0..n {
            let o = orientation(&self.vertices[i], &self.vertices[(i + 1) % n], &self.vertices[(i + 2) % n]);
            if o == 0 {
                continue;
            }
            if turn == 0 {
                turn = o;
            } else if o != turn {
                return false;
            }
        }
        turn != 0 && self.is_simple()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Polygon {
        Polygon {
            vertices: self.vertices.iter().map(|v| Point::new(v.x + dx, v.y + dy)).collect(),
        }
    }

    /// Rotate counter-clockwise by `angle` radians around `pivot`.
    pub fn rotate_about(&self, pivot: Point, angle: f64) -> Polygon {
        if angle == 0.0 {
            return self.clone();
        }
        let (sin, cos) = angle.sin_cos();
        Polygon {
            vertices: self
                .vertices
                .iter()
                .map(|v| {
                    let dx = v.x - pivot.x;
                    let dy = v.y - pivot.y;
                    Point::new(pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos)
                })
                .collect(),
        }
    }

    fn counter_clockwise(&self) -> Vec<Point> {
        let mut ring = self.vertices.clone();
        if self.signed_area() < 0.0 {
            ring.reverse();
        }
        ring
    }

    /// Intersection of two polygons as a new polygon.
    ///
    /// At least one operand must be convex; it is used as the clip window
    /// and the other one is clipped against it. Two non-convex operands
    /// yield an empty polygon.
    pub fn intersection(&self, other: &Polygon) -> Polygon {
        if self.vertices.len() < 3 || other.vertices.len() < 3 {
            return Polygon::empty();
        }
        let (subject, clip) = if other.is_convex() {
            (self, other)
        } else if self.is_convex() {
            (other, self)
        } else {
            log::warn!("Polygon intersection needs a convex operand, got {} and {} vertices", self.len(), other.len());
            return Polygon::empty();
        };

        let window = clip.counter_clockwise();
        let mut output = subject.vertices.clone();
        for i in 0..window.len() {
            let a = window[i];
            let b = window[(i + 1) % window.len()];
            let input = std::mem::take(&mut output);
            let Some(&last) = input.last() else {
                break;
            };
            let mut prev = last;
            for &cur in &input {
                let prev_inside = side(&a, &b, &prev) >= 0.0;
                let cur_inside = side(&a, &b, &cur) >= 0.0;
                if cur_inside {
                    if !prev_inside {
                        output.push(edge_crossing(&prev, &cur, &a, &b));
                    }
                    output.push(cur);
                } else if prev_inside {
                    output.push(edge_crossing(&prev, &cur, &a, &b));
                }
                prev = cur;
            }
        }
        Polygon::new(output)
    }
}

// ---------- Geometry helpers ----------

fn nearly_equal(a: &Point, b: &Point) -> bool {
    let scale = 1.0 + a.x.abs().max(a.y.abs()).max(b.x.abs()).max(b.y.abs());
    (a.x - b.x).abs() <= 1e-12 * scale && (a.y - b.y).abs() <= 1e-12 * scale
}

/// Cross product of (b - a) and (p - a): positive when p lies left of a→b.
fn side(a: &Point, b: &Point, p: &Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Point where segment p→q crosses the infinite line through a and b.
/// Only called when p and q lie on opposite sides of that line.
fn edge_crossing(p: &Point, q: &Point, a: &Point, b: &Point) -> Point {
    let sp = side(a, b, p);
    let sq = side(a, b, q);
    let t = sp / (sp - sq);
    Point::new(p.x + t * (q.x - p.x), p.y + t * (q.y - p.y))
}

/// Orientation of ordered triplet (a,b,c): returns 1 if clockwise, -1 if
/// counter-clockwise, and 0 if collinear.
fn orientation(a: &Point, b: &Point, c: &Point) -> i32 {
    let val = (b.y - a.y) * (c.x - b.x) - (b.x - a.x) * (c.y - b.y);
    if val > 0.0 {
        1
    } else if val < 0.0 {
        -1
    } else {
        0
    }
}

/// True if point b lies on segment a–c, assuming collinearity.
fn on_segment(a: &Point, b: &Point, c: &Point) -> bool {
    let min_x = a.x.min(c.x);
    let max_x = a.x.max(c.x);
    let min_y = a.y.min(c.y);
    let max_y = a.y.max(c.y);
    b.x >= min_x && b.x <= max_x && b.y >= min_y && b.y <= max_y
}

/// Robust segment–segment intersection including collinear overlap.
///
/// Uses the orientation-based test: the segments intersect if each one
/// separates the endpoints of the other, or if a collinear endpoint lies on
/// the opposite segment (touching and overlapping cases).
pub fn segments_intersect(p1: &Point, q1: &Point, p2: &Point, q2: &Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(p1, p2, q1)) || (o2 == 0 && on_segment(p1, q2, q1)) || (o3 == 0 && on_segment(p2, p1, q2)) || (o4 == 0 && on_segment(p2, q1, q2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    fn square(x0: f64, y0: f64, side: f64) -> Polygon {
        Polygon::new(vec![p(x0, y0), p(x0 + side, y0), p(x0 + side, y0 + side), p(x0, y0 + side)])
    }

    #[test]
    fn geometry_segments_intersect_basic_cases() {
        assert!(segments_intersect(&p(0.0, 0.0), &p(10.0, 10.0), &p(0.0, 10.0), &p(10.0, 0.0)));
        // Collinear overlap
        assert!(segments_intersect(&p(0.0, 0.0), &p(10.0, 0.0), &p(5.0, 0.0), &p(15.0, 0.0)));
        // Disjoint
        assert!(!segments_intersect(&p(0.0, 0.0), &p(1.0, 1.0), &p(2.0, 2.0), &p(3.0, 3.0)));
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let ring = Polygon::new(vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)]);
        assert_eq!(ring.len(), 3);
        assert!((ring.area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn area_is_orientation_independent() {
        let ccw = square(0.0, 0.0, 2.0);
        let cw = Polygon::new(ccw.vertices().iter().rev().copied().collect());
        assert!((ccw.area() - 4.0).abs() < 1e-12);
        assert!((cw.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_rings_have_zero_area() {
        assert_eq!(Polygon::empty().area(), 0.0);
        assert_eq!(Polygon::new(vec![p(0.0, 0.0), p(1.0, 1.0)]).area(), 0.0);
        // Collinear ring
        assert_eq!(Polygon::new(vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]).area(), 0.0);
        // Bow-tie
        let bowtie = Polygon::new(vec![p(0.0, 0.0), p(2.0, 2.0), p(2.0, 0.0), p(0.0, 2.0)]);
        assert!(!bowtie.is_simple());
        assert_eq!(bowtie.area(), 0.0);
    }

    #[test]
    fn circle_area_matches_disc() {
        for segments in [8, 64, 256] {
            let c = Polygon::circle(p(3.0, -1.0), 0.04, segments);
            assert!(c.is_convex());
            let disc = PI * 0.04 * 0.04;
            assert!((c.area() - disc).abs() < 1e-12 * disc, "segments={segments}");
        }
        assert!(Polygon::circle(p(0.0, 0.0), 0.0, 64).is_empty());
    }

    #[test]
    fn convexity() {
        assert!(square(0.0, 0.0, 1.0).is_convex());
        let notch = Polygon::new(vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(2.0, 1.0), p(0.0, 4.0)]);
        assert!(!notch.is_convex());
    }

    #[test]
    fn overlapping_squares_intersect() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let overlap = a.intersection(&b);
        assert!((overlap.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_polygons_have_empty_intersection() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        assert_eq!(a.intersection(&b).area(), 0.0);
    }

    #[test]
    fn contained_polygon_is_returned_whole() {
        let outer = Polygon::circle(p(0.0, 0.0), 1.0, 64);
        let inner = Polygon::circle(p(0.1, 0.0), 0.2, 64);
        let overlap = inner.intersection(&outer);
        assert_eq!(overlap.vertices(), inner.vertices());
        assert_eq!(overlap.area(), inner.area());
    }

    #[test]
    fn identical_polygons_overlap_fully() {
        let c = Polygon::circle(p(0.0, 0.0), 0.04, 64);
        assert!((c.intersection(&c).area() - c.area()).abs() < 1e-18);
    }

    #[test]
    fn non_convex_subject_is_clipped_by_convex_window() {
        let notch = Polygon::new(vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(2.0, 1.0), p(0.0, 4.0)]);
        let window = square(0.0, 0.0, 4.0);
        // The notch lies entirely inside the window
        assert!((notch.intersection(&window).area() - notch.area()).abs() < 1e-12);
        assert!((window.intersection(&notch).area() - notch.area()).abs() < 1e-12);
    }

    #[test]
    fn rotation_and_translation_preserve_area() {
        let sq = square(0.0, 0.0, 1.0);
        let moved = sq.translate(3.0, -2.0).rotate_about(p(1.0, 1.0), 0.7);
        assert!((moved.area() - 1.0).abs() < 1e-12);
        let quarter = sq.rotate_about(p(0.0, 0.0), PI / 2.0);
        assert!((quarter.vertices()[1].x - 0.0).abs() < 1e-12);
        assert!((quarter.vertices()[1].y - 1.0).abs() < 1e-12);
    }
}
