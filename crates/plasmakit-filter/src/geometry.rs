//! Arc geometry for small hole handling
//!
//! Classifies G2/G3 arcs as holes, decides when velocity reduction applies
//! and computes the overburn end point that carries a hole cut past its
//! start with the torch off.

use serde::{Deserialize, Serialize};

/// A point in program units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Arc direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcDirection {
    /// G2
    Clockwise,
    /// G3
    CounterClockwise,
}

impl ArcDirection {
    /// G-code motion number
    pub fn code(self) -> u8 {
        match self {
            Self::Clockwise => 2,
            Self::CounterClockwise => 3,
        }
    }
}

/// An arc move with its center given relative to the start point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcMove {
    pub direction: ArcDirection,
    pub start: Point,
    pub end: Point,
    /// I word
    pub i: f64,
    /// J word
    pub j: f64,
}

impl ArcMove {
    pub fn radius(&self) -> f64 {
        (self.i * self.i + self.j * self.j).sqrt()
    }

    pub fn center(&self) -> Point {
        Point::new(self.start.x + self.i, self.start.y + self.j)
    }

    /// A full circle: the arc ends exactly where it starts
    pub fn is_hole(&self) -> bool {
        self.end == self.start
    }

    /// Whether velocity reduction applies to this arc
    pub fn needs_velocity_reduction(&self, max_small_radius: f64, arc_assist: bool) -> bool {
        self.radius() <= max_small_radius && (self.is_hole() || arc_assist)
    }

    /// End point after continuing `length` further along the circle
    ///
    /// Returns `None` for a zero radius.
    pub fn overburn_end(&self, length: f64) -> Option<Point> {
        let radius = self.radius();
        if radius <= 0.0 {
            return None;
        }
        let center = self.center();
        let a = length / radius;
        let (sin_a, cos_a) = a.sin_cos();
        let cos_b = (self.start.x - center.x) / radius;
        let sin_b = (self.start.y - center.y) / radius;

        let (dx, dy) = match self.direction {
            ArcDirection::Clockwise => (cos_b * cos_a + sin_b * sin_a, sin_b * cos_a - cos_b * sin_a),
            ArcDirection::CounterClockwise => {
                (cos_b * cos_a - sin_b * sin_a, sin_b * cos_a + cos_b * sin_a)
            }
        };
        Some(Point::new(center.x + radius * dx, center.y + radius * dy))
    }
}

/// Format the arc that continues a hole to `end`
pub fn continuation_arc(arc: &ArcMove, end: Point, precision: usize) -> String {
    format!(
        "g{} x{:.p$} y{:.p$} i{:.p$} j{:.p$}",
        arc.direction.code(),
        end.x,
        end.y,
        arc.i,
        arc.j,
        p = precision
    )
}
