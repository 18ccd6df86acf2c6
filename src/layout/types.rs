use serde::Serialize;

use crate::ir::Point;

/// Axis-aligned box derived from a node (or a label) for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Owning node id; label boxes carry their edge id.
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(id: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive on every edge.
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow by `pad` on every side. Non-positive padding is a no-op.
    pub fn expand(&self, pad: f32) -> Self {
        if pad <= 0.0 {
            return self.clone();
        }
        Self {
            id: self.id.clone(),
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
            height: self.height + pad * 2.0,
        }
    }

    /// Width and height of the overlap region, each clamped at zero.
    pub fn overlap_extent(&self, other: &BoundingBox) -> (f32, f32) {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        (w.max(0.0), h.max(0.0))
    }
}

/// Unordered pair of overlapping nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlap {
    pub a: String,
    pub b: String,
    /// Intersection area over the smaller box's area, in `[0, 1]`.
    pub severity: f32,
}

impl Overlap {
    pub fn same_pair(&self, a: &str, b: &str) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionReport {
    pub overlaps: Vec<Overlap>,
    pub count: usize,
    pub average_severity: f32,
    pub max_severity: f32,
    /// Boxes that took part in detection after filtering.
    pub checked_nodes: usize,
}

impl CollisionReport {
    pub fn has_collisions(&self) -> bool {
        self.count > 0
    }
}
