use crate::config::DimensionDefaults;
use crate::ir::{Dimensions, Node, Point};

use super::hierarchy::Hierarchy;
use super::types::BoundingBox;

fn usable(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Resolve a node's size per axis: measured, then explicit, then style,
/// then the kind default.
pub fn dimensions_of(node: &Node, defaults: &DimensionDefaults) -> Dimensions {
    let (default_w, default_h) = defaults.for_kind(node.kind);
    let measured = node.measured.unwrap_or_default();
    let style = node.style.unwrap_or_default();
    let width = usable(measured.width)
        .or(usable(node.width))
        .or(usable(style.width))
        .unwrap_or(default_w);
    let height = usable(measured.height)
        .or(usable(node.height))
        .or(usable(style.height))
        .unwrap_or(default_h);
    Dimensions { width, height }
}

/// Box in the node's own (parent-relative) frame.
pub fn bounding_box_of(node: &Node, defaults: &DimensionDefaults) -> BoundingBox {
    let dims = dimensions_of(node, defaults);
    BoundingBox::new(
        node.id.clone(),
        node.position.x,
        node.position.y,
        dims.width,
        dims.height,
    )
}

/// Position in the root frame: local position summed over the ancestor chain.
pub fn absolute_position(hierarchy: &Hierarchy<'_>, id: &str) -> Option<Point> {
    let node = hierarchy.node(id)?;
    let mut pos = node.position;
    for ancestor in hierarchy.ancestor_chain(id) {
        if let Some(parent) = hierarchy.node(ancestor) {
            pos = pos.offset(parent.position.x, parent.position.y);
        }
    }
    Some(pos)
}

pub fn absolute_bounding_box(
    hierarchy: &Hierarchy<'_>,
    id: &str,
    defaults: &DimensionDefaults,
) -> Option<BoundingBox> {
    let node = hierarchy.node(id)?;
    let pos = absolute_position(hierarchy, id)?;
    let dims = dimensions_of(node, defaults);
    Some(BoundingBox::new(
        node.id.clone(),
        pos.x,
        pos.y,
        dims.width,
        dims.height,
    ))
}

/// Absolute boxes for every node, in collection order.
pub fn absolute_boxes(hierarchy: &Hierarchy<'_>, defaults: &DimensionDefaults) -> Vec<BoundingBox> {
    hierarchy
        .nodes()
        .iter()
        .filter_map(|node| absolute_bounding_box(hierarchy, &node.id, defaults))
        .collect()
}

/// Union extent `(min_x, min_y, max_x, max_y)` of a set of boxes.
pub fn extent_of<'b>(boxes: impl IntoIterator<Item = &'b BoundingBox>) -> Option<(f32, f32, f32, f32)> {
    let mut extent: Option<(f32, f32, f32, f32)> = None;
    for b in boxes {
        extent = Some(match extent {
            None => (b.x, b.y, b.right(), b.bottom()),
            Some((x0, y0, x1, y1)) => (x0.min(b.x), y0.min(b.y), x1.max(b.right()), y1.max(b.bottom())),
        });
    }
    extent
}
