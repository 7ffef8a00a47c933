//! Two-dimensional shapes used by `inside`, area mappings and hotspots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::value::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    /// The whole area; coordinates are ignored.
    Default,
    Rect,
    Circle,
    Poly,
    Ellipse,
}

impl Shape {
    pub fn from_name(name: &str) -> Result<Shape, ModelError> {
        match name {
            "default" => Ok(Shape::Default),
            "rect" => Ok(Shape::Rect),
            "circle" => Ok(Shape::Circle),
            "poly" => Ok(Shape::Poly),
            "ellipse" => Ok(Shape::Ellipse),
            other => Err(ModelError::UnknownShape(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Default => "default",
            Shape::Rect => "rect",
            Shape::Circle => "circle",
            Shape::Poly => "poly",
            Shape::Ellipse => "ellipse",
        }
    }

    /// Check that `coords` describe a shape of this kind.
    ///
    /// rect: left, top, right, bottom. circle: x, y, radius. ellipse: x, y,
    /// h-radius, v-radius. poly: at least three x/y pairs.
    pub fn validate_coords(self, coords: &[i64]) -> Result<(), ModelError> {
        let ok = match self {
            Shape::Default => true,
            Shape::Rect | Shape::Ellipse => coords.len() == 4,
            Shape::Circle => coords.len() == 3,
            Shape::Poly => coords.len() >= 6 && coords.len() % 2 == 0,
        };
        if ok {
            Ok(())
        } else {
            Err(ModelError::InvalidCoords {
                shape: self,
                count: coords.len(),
            })
        }
    }

    /// Whether `p` lies within the shape. Boundaries are inside.
    ///
    /// `coords` are assumed valid for the shape.
    pub fn contains_point(self, coords: &[i64], p: Point) -> bool {
        let (x, y) = (p.x as f64, p.y as f64);
        let c = |i: usize| coords.get(i).copied().unwrap_or(0) as f64;
        match self {
            Shape::Default => true,
            Shape::Rect => {
                let (left, right) = (c(0).min(c(2)), c(0).max(c(2)));
                let (top, bottom) = (c(1).min(c(3)), c(1).max(c(3)));
                x >= left && x <= right && y >= top && y <= bottom
            }
            Shape::Circle => {
                let (dx, dy, r) = (x - c(0), y - c(1), c(2));
                dx * dx + dy * dy <= r * r
            }
            Shape::Ellipse => {
                let (h, v) = (c(2), c(3));
                if h == 0.0 || v == 0.0 {
                    return false;
                }
                let (dx, dy) = ((x - c(0)) / h, (y - c(1)) / v);
                dx * dx + dy * dy <= 1.0
            }
            Shape::Poly => polygon_contains(coords, x, y),
        }
    }
}

/// Even-odd ray casting. A trailing vertex equal to the first is allowed.
fn polygon_contains(coords: &[i64], x: f64, y: f64) -> bool {
    let vertices: Vec<(f64, f64)> = coords
        .chunks_exact(2)
        .map(|pair| (pair[0] as f64, pair[1] as f64))
        .collect();
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if on_segment((xi, yi), (xj, yj), (x, y)) {
            return true;
        }
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    cross == 0.0
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_shape_is_a_model_error() {
        assert_eq!(
            Shape::from_name("star"),
            Err(ModelError::UnknownShape("star".to_string()))
        );
    }

    #[test]
    fn coordinate_counts_are_checked() {
        assert!(Shape::Rect.validate_coords(&[0, 0, 10, 10]).is_ok());
        assert!(Shape::Circle.validate_coords(&[0, 0]).is_err());
        assert!(Shape::Poly.validate_coords(&[0, 0, 1, 1]).is_err());
        assert!(Shape::Poly.validate_coords(&[0, 0, 4, 0, 4, 4]).is_ok());
        assert!(Shape::Default.validate_coords(&[]).is_ok());
    }

    #[test]
    fn rect_and_circle_containment() {
        assert!(Shape::Rect.contains_point(&[0, 0, 10, 10], Point::new(5, 5)));
        assert!(Shape::Rect.contains_point(&[0, 0, 10, 10], Point::new(10, 0)));
        assert!(!Shape::Rect.contains_point(&[0, 0, 10, 10], Point::new(11, 5)));
        assert!(Shape::Circle.contains_point(&[5, 5, 3], Point::new(7, 7)));
        assert!(!Shape::Circle.contains_point(&[5, 5, 3], Point::new(8, 8)));
    }

    #[test]
    fn ellipse_and_polygon_containment() {
        assert!(Shape::Ellipse.contains_point(&[0, 0, 4, 2], Point::new(3, 1)));
        assert!(!Shape::Ellipse.contains_point(&[0, 0, 4, 2], Point::new(0, 3)));
        let triangle = [0, 0, 10, 0, 0, 10];
        assert!(Shape::Poly.contains_point(&triangle, Point::new(2, 2)));
        assert!(Shape::Poly.contains_point(&triangle, Point::new(5, 0)));
        assert!(!Shape::Poly.contains_point(&triangle, Point::new(8, 8)));
    }
}
