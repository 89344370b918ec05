//! Curve flattening at a fixed recursive subdivision depth.
//!
//! Each quadratic or cubic segment is split in half `depth` times with
//! de Casteljau, giving `2^depth` line segments regardless of size on screen.

use super::font::{GlyphOutline, PathSegment};
use crate::geometry::Point;
use crate::transform::Transform;

fn mid(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

fn subdivide_quad(p0: Point, p1: Point, p2: Point, depth: u32, out: &mut Vec<Point>) {
    if depth == 0 {
        out.push(p2);
        return;
    }
    let p01 = mid(p0, p1);
    let p12 = mid(p1, p2);
    let p012 = mid(p01, p12);
    subdivide_quad(p0, p01, p012, depth - 1, out);
    subdivide_quad(p012, p12, p2, depth - 1, out);
}

fn subdivide_cubic(p0: Point, p1: Point, p2: Point, p3: Point, depth: u32, out: &mut Vec<Point>) {
    if depth == 0 {
        out.push(p3);
        return;
    }
    let p01 = mid(p0, p1);
    let p12 = mid(p1, p2);
    let p23 = mid(p2, p3);
    let p012 = mid(p01, p12);
    let p123 = mid(p12, p23);
    let p0123 = mid(p012, p123);
    subdivide_cubic(p0, p01, p012, p0123, depth - 1, out);
    subdivide_cubic(p0123, p123, p23, p3, depth - 1, out);
}

/// Map `outline` through `transform` and flatten it into closed polygons.
///
/// The transform is applied to control points before subdivision, which is
/// exact for affine transforms. Contours with fewer than three points are dropped.
pub fn flatten_outline(outline: &GlyphOutline, transform: &Transform, depth: u32) -> Vec<Vec<Point>> {
    let map = |p: Point| {
        let (x, y) = transform.transform_point(p.x, p.y);
        Point::new(x, y)
    };

    let mut contours = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut finish = |contour: &mut Vec<Point>| {
        if contour.len() > 1 && contour.first() == contour.last() {
            contour.pop();
        }
        if contour.len() >= 3 {
            contours.push(std::mem::take(contour));
        } else {
            contour.clear();
        }
    };

    for segment in &outline.segments {
        match *segment {
            PathSegment::MoveTo(p) => {
                finish(&mut current);
                current.push(map(p));
            }
            PathSegment::LineTo(p) => current.push(map(p)),
            PathSegment::QuadTo(c, p) => {
                let Some(&start) = current.last() else { continue };
                subdivide_quad(start, map(c), map(p), depth, &mut current);
            }
            PathSegment::CubicTo(c1, c2, p) => {
                let Some(&start) = current.last() else { continue };
                subdivide_cubic(start, map(c1), map(c2), map(p), depth, &mut current);
            }
            PathSegment::Close => finish(&mut current),
        }
    }
    finish(&mut current);
    contours
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_depth_controls_segment_count() {
        let outline = GlyphOutline {
            segments: vec![
                PathSegment::MoveTo(Point::new(0.0, 0.0)),
                PathSegment::QuadTo(Point::new(5.0, 10.0), Point::new(10.0, 0.0)),
                PathSegment::Close,
            ],
        };
        for depth in 0..5 {
            let contours = flatten_outline(&outline, &Transform::IDENTITY, depth);
            if depth == 0 {
                // Start and end only: degenerate, dropped.
                assert!(contours.is_empty());
            } else {
                assert_eq!(contours[0].len(), 1 + (1 << depth));
            }
        }
    }

    #[test]
    fn test_cubic_endpoints_are_exact() {
        let outline = GlyphOutline {
            segments: vec![
                PathSegment::MoveTo(Point::new(0.0, 0.0)),
                PathSegment::CubicTo(
                    Point::new(0.0, 10.0),
                    Point::new(10.0, 10.0),
                    Point::new(10.0, 0.0),
                ),
                PathSegment::Close,
            ],
        };
        let contours = flatten_outline(&outline, &Transform::IDENTITY, 3);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 9);
        assert_eq!(contours[0][8], Point::new(10.0, 0.0));
        // Midpoint of the symmetric cubic sits at t = 0.5.
        assert_eq!(contours[0][4], Point::new(5.0, 7.5));
    }

    #[test]
    fn test_transform_applies_before_flattening() {
        let outline = GlyphOutline {
            segments: vec![
                PathSegment::MoveTo(Point::new(0.0, 0.0)),
                PathSegment::LineTo(Point::new(1.0, 0.0)),
                PathSegment::LineTo(Point::new(1.0, 1.0)),
                PathSegment::LineTo(Point::new(0.0, 0.0)),
                PathSegment::Close,
            ],
        };
        let flip = Transform::translate(10.0, 20.0).then(&Transform::scale_xy(2.0, -2.0));
        let contours = flatten_outline(&outline, &flip, 3);
        assert_eq!(
            contours[0],
            vec![
                Point::new(10.0, 20.0),
                Point::new(12.0, 20.0),
                Point::new(12.0, 18.0)
            ]
        );
    }
}
