//! Drag and drop against the containment tree.
//!
//! Every interaction goes through one query, [`innermost_boundary_at`]. Hover
//! feedback only reads it; [`commit_drop`] applies the result and runs the
//! parent consistency pass.

use serde::Serialize;

use crate::config::DimensionDefaults;
use crate::ir::{Node, Point, SanitizeReport, sanitize_nodes};

use super::bounds::{absolute_bounding_box, absolute_position, dimensions_of};
use super::hierarchy::Hierarchy;

/// Innermost boundary whose absolute box contains `point`.
///
/// `exclude` and everything nested under it are never candidates, so a
/// boundary can't be dropped into itself. Ties on depth go to the smaller
/// box, then to the lower id.
pub fn innermost_boundary_at<'a>(
    hierarchy: &Hierarchy<'a>,
    point: Point,
    exclude: Option<&str>,
    defaults: &DimensionDefaults,
) -> Option<&'a str> {
    hierarchy
        .nodes()
        .iter()
        .filter(|node| node.is_boundary())
        .filter(|node| match exclude {
            Some(excluded) => node.id != excluded && !hierarchy.is_ancestor_of(excluded, &node.id),
            None => true,
        })
        .filter_map(|node| {
            let bbox = absolute_bounding_box(hierarchy, &node.id, defaults)?;
            bbox.contains_point(point)
                .then(|| (hierarchy.depth(&node.id), bbox.area(), node.id.as_str()))
        })
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| b.2.cmp(a.2))
        })
        .map(|(_, _, id)| id)
}

/// Boundary the node would land in if dropped now. Cosmetic only.
pub fn drag_hover_target<'a>(hierarchy: &Hierarchy<'a>, id: &str, defaults: &DimensionDefaults) -> Option<&'a str> {
    let point = absolute_position(hierarchy, id)?;
    innermost_boundary_at(hierarchy, point, Some(id), defaults)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum DropChange {
    Reparented { from: Option<String>, to: String },
    Detached { from: String },
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOutcome {
    pub nodes: Vec<Node>,
    pub change: DropChange,
    pub sanitized: SanitizeReport,
}

/// Commit a finished drag of `id`. The node's current (already moved) local
/// position decides the target.
pub fn commit_drop(nodes: &[Node], id: &str, defaults: &DimensionDefaults) -> DropOutcome {
    let mut out = nodes.to_vec();
    let change = {
        let hierarchy = Hierarchy::new(nodes);
        plan_drop(&hierarchy, id, defaults)
    };

    if let Some((change, position, target)) = change {
        if let Some(node) = out.iter_mut().find(|node| node.id == id) {
            node.position = position;
            node.constrained = target.is_some();
            node.parent_id = target;
        }
        let sanitized = sanitize_nodes(&mut out);
        tracing::debug!(node = id, ?change, "committed drop");
        return DropOutcome {
            nodes: out,
            change,
            sanitized,
        };
    }

    let sanitized = sanitize_nodes(&mut out);
    DropOutcome {
        nodes: out,
        change: DropChange::Unchanged,
        sanitized,
    }
}

fn plan_drop(
    hierarchy: &Hierarchy<'_>,
    id: &str,
    defaults: &DimensionDefaults,
) -> Option<(DropChange, Point, Option<String>)> {
    let absolute = absolute_position(hierarchy, id)?;
    let current = hierarchy.parent_of(id);
    let target = innermost_boundary_at(hierarchy, absolute, Some(id), defaults);

    match (current, target) {
        (Some(from), Some(to)) if from == to => None,
        (from, Some(to)) => {
            let origin = absolute_position(hierarchy, to)?;
            let local = Point::new(absolute.x - origin.x, absolute.y - origin.y);
            let change = DropChange::Reparented {
                from: from.map(str::to_string),
                to: to.to_string(),
            };
            Some((change, local, Some(to.to_string())))
        }
        (Some(from), None) => Some((
            DropChange::Detached {
                from: from.to_string(),
            },
            absolute,
            None,
        )),
        (None, None) => None,
    }
}

/// Pull constrained children back inside their parent's box. Children
/// larger than the parent are pinned to its top-left corner. Returns the ids
/// that moved.
pub fn clamp_constrained_positions(nodes: &mut [Node], defaults: &DimensionDefaults) -> Vec<String> {
    let snapshot = nodes.to_vec();
    let hierarchy = Hierarchy::new(&snapshot);
    let mut clamped = Vec::new();
    for node in nodes.iter_mut().filter(|node| node.constrained) {
        let Some(parent) = hierarchy.parent_of(&node.id).and_then(|id| hierarchy.node(id)) else {
            continue;
        };
        let outer = dimensions_of(parent, defaults);
        let inner = dimensions_of(node, defaults);
        let max_x = (outer.width - inner.width).max(0.0);
        let max_y = (outer.height - inner.height).max(0.0);
        let next = Point::new(node.position.x.clamp(0.0, max_x), node.position.y.clamp(0.0, max_y));
        if next != node.position {
            node.position = next;
            clamped.push(node.id.clone());
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_plan() -> Vec<Node> {
        vec![
            Node::boundary("site", 0.0, 0.0).with_size(1000.0, 600.0),
            Node::boundary("rack", 100.0, 100.0)
                .with_size(300.0, 300.0)
                .with_parent("site"),
            Node::boundary("x", 2000.0, 0.0).with_size(200.0, 200.0),
            Node::device("d", 10.0, 10.0).with_size(50.0, 50.0).with_parent("x"),
        ]
    }

    #[test]
    fn innermost_prefers_depth() {
        let nodes = floor_plan();
        let h = Hierarchy::new(&nodes);
        let defaults = DimensionDefaults::default();
        assert_eq!(innermost_boundary_at(&h, Point::new(150.0, 150.0), None, &defaults), Some("rack"));
        assert_eq!(innermost_boundary_at(&h, Point::new(900.0, 500.0), None, &defaults), Some("site"));
        assert_eq!(innermost_boundary_at(&h, Point::new(-5.0, 0.0), None, &defaults), None);
    }

    #[test]
    fn excluded_subtree_is_never_a_candidate() {
        let nodes = floor_plan();
        let h = Hierarchy::new(&nodes);
        let defaults = DimensionDefaults::default();
        let hit = innermost_boundary_at(&h, Point::new(150.0, 150.0), Some("site"), &defaults);
        assert_eq!(hit, None);
        let hit = innermost_boundary_at(&h, Point::new(150.0, 150.0), Some("rack"), &defaults);
        assert_eq!(hit, Some("site"));
    }

    #[test]
    fn hover_does_not_mutate() {
        let mut nodes = floor_plan();
        nodes[3].position = Point::new(-1850.0, 200.0);
        let h = Hierarchy::new(&nodes);
        assert_eq!(drag_hover_target(&h, "d", &DimensionDefaults::default()), Some("rack"));
        assert_eq!(nodes[3].parent_id.as_deref(), Some("x"));
    }

    #[test]
    fn drop_into_nested_boundary_reparents() {
        let mut nodes = floor_plan();
        // Dragged to absolute (150, 160).
        nodes[3].position = Point::new(-1850.0, 160.0);
        let outcome = commit_drop(&nodes, "d", &DimensionDefaults::default());
        assert_eq!(
            outcome.change,
            DropChange::Reparented {
                from: Some("x".into()),
                to: "rack".into()
            }
        );
        let d = &outcome.nodes[3];
        assert_eq!(d.parent_id.as_deref(), Some("rack"));
        assert_eq!(d.position, Point::new(50.0, 60.0));
        assert!(d.constrained);
    }

    #[test]
    fn drop_in_empty_space_detaches() {
        let mut nodes = floor_plan();
        nodes[3].position = Point::new(500.0, 900.0);
        let outcome = commit_drop(&nodes, "d", &DimensionDefaults::default());
        assert_eq!(outcome.change, DropChange::Detached { from: "x".into() });
        let d = &outcome.nodes[3];
        assert_eq!(d.parent_id, None);
        assert!(!d.constrained);
        assert_eq!(d.position, Point::new(2500.0, 900.0));
    }

    #[test]
    fn drop_inside_current_parent_is_unchanged() {
        let nodes = floor_plan();
        let outcome = commit_drop(&nodes, "d", &DimensionDefaults::default());
        assert_eq!(outcome.change, DropChange::Unchanged);
        assert_eq!(outcome.nodes, nodes);
    }

    #[test]
    fn boundary_cannot_drop_into_its_descendant() {
        let nodes = vec![
            Node::boundary("outer", 0.0, 0.0).with_size(400.0, 400.0),
            Node::boundary("inner", 0.0, 0.0)
                .with_size(400.0, 400.0)
                .with_parent("outer"),
        ];
        let outcome = commit_drop(&nodes, "outer", &DimensionDefaults::default());
        assert_eq!(outcome.change, DropChange::Unchanged);
        let h = Hierarchy::new(&outcome.nodes);
        assert!(!h.ancestor_chain("outer").contains(&"outer"));
    }

    #[test]
    fn root_level_device_joins_boundary() {
        let nodes = vec![
            Node::boundary("zone", 0.0, 0.0).with_size(200.0, 200.0),
            Node::device("d", 20.0, 30.0),
        ];
        let outcome = commit_drop(&nodes, "d", &DimensionDefaults::default());
        assert_eq!(
            outcome.change,
            DropChange::Reparented {
                from: None,
                to: "zone".into()
            }
        );
        assert_eq!(outcome.nodes[1].position, Point::new(20.0, 30.0));
    }

    #[test]
    fn unknown_node_is_a_no_op() {
        let nodes = floor_plan();
        let outcome = commit_drop(&nodes, "ghost", &DimensionDefaults::default());
        assert_eq!(outcome.change, DropChange::Unchanged);
    }

    #[test]
    fn clamp_pulls_children_inside() {
        let mut nodes = vec![
            Node::boundary("zone", 0.0, 0.0).with_size(200.0, 100.0),
            Node::device("d", 190.0, -20.0).with_size(50.0, 50.0).with_parent("zone"),
            Node::device("free", 900.0, 900.0),
        ];
        let moved = clamp_constrained_positions(&mut nodes, &DimensionDefaults::default());
        assert_eq!(moved, vec!["d".to_string()]);
        assert_eq!(nodes[1].position, Point::new(150.0, 0.0));
        assert_eq!(nodes[2].position, Point::new(900.0, 900.0));
    }
}
