//! Property-based invariant tests for the geometry layer.
//!
//! 1. Intersection test and intersection area agree at zero clearance
//! 2. Severity stays in [0, 1], hits 1 only on containment and 0 only when disjoint
//! 3. Hashed and pairwise detection report the same overlaps
//! 4. Hierarchy queries are symmetric and handler chains track sibling-ness
//! 5. Channel numbers per handler are exactly 1..=k
//! 6. Sanitizing and dropping never leave a parent cycle
//! 7. Auto-tidy is idempotent

use proptest::prelude::*;
use topology_layout::config::{Config, DimensionDefaults};
use topology_layout::ir::sanitize_nodes;
use topology_layout::layout::collision::{
    CollisionOptions, boxes_intersect, detect_collisions, detect_node_overlaps, intersection_area,
    overlap_severity,
};
use topology_layout::layout::drag::commit_drop;
use topology_layout::layout::routing::{assign_channel_numbers, build_handler_chain};
use topology_layout::{BoundingBox, Edge, GridLayout, Hierarchy, Node, auto_tidy};

// ── Strategies ──────────────────────────────────────────────────────────

fn box_strategy(id: &'static str) -> impl Strategy<Value = BoundingBox> {
    (-200i32..200, -200i32..200, 1i32..200, 1i32..200)
        .prop_map(move |(x, y, w, h)| BoundingBox::new(id, x as f32, y as f32, w as f32, h as f32))
}

/// Node blueprint: boundary flag, parent pick, position and size.
type Blueprint = (bool, Option<usize>, (i32, i32), (i32, i32));

fn blueprint_strategy() -> impl Strategy<Value = Blueprint> {
    (
        any::<bool>(),
        proptest::option::of(0usize..64),
        (0i32..600, 0i32..600),
        (10i32..200, 10i32..200),
    )
}

/// Parents always point at an earlier node, so the result is a forest.
fn forest(blueprints: &[Blueprint]) -> Vec<Node> {
    blueprints
        .iter()
        .enumerate()
        .map(|(idx, (boundary, parent, (x, y), (w, h)))| {
            let id = format!("n{idx}");
            let node = if *boundary || idx == 0 {
                Node::boundary(id, *x as f32, *y as f32)
            } else {
                Node::device(id, *x as f32, *y as f32)
            };
            let node = node.with_size(*w as f32, *h as f32);
            match parent {
                Some(pick) if idx > 0 => node.with_parent(format!("n{}", pick % idx)),
                _ => node,
            }
        })
        .collect()
}

fn forest_strategy() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(blueprint_strategy(), 1..14).prop_map(|bps| forest(&bps))
}

fn edges_for(nodes: &[Node], pairs: &[(usize, usize)]) -> Vec<Edge> {
    pairs
        .iter()
        .enumerate()
        .map(|(idx, (s, t))| {
            let source = &nodes[s % nodes.len()].id;
            let target = &nodes[t % nodes.len()].id;
            Edge::new(format!("e{idx}"), source.clone(), target.clone())
        })
        .collect()
}

/// Walk parent pointers without the hierarchy's own cycle guard.
fn reaches_root(nodes: &[Node], id: &str) -> bool {
    let mut current = id.to_string();
    for _ in 0..=nodes.len() {
        let Some(node) = nodes.iter().find(|n| n.id == current) else {
            return true;
        };
        match node.parent_id.as_ref() {
            Some(parent) => current = parent.clone(),
            None => return true,
        }
    }
    false
}

// ═══════════════════════════════════════════════════════════════════════
// 1-2. Box geometry
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn intersect_agrees_with_area(a in box_strategy("a"), b in box_strategy("b")) {
        prop_assert_eq!(boxes_intersect(&a, &b, 0.0), intersection_area(&a, &b) > 0.0);
    }

    #[test]
    fn severity_is_bounded_and_exact_at_extremes(a in box_strategy("a"), b in box_strategy("b")) {
        let s = overlap_severity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert_eq!(s == 0.0, intersection_area(&a, &b) == 0.0);
        prop_assert_eq!(s == 1.0, a.contains_box(&b) || b.contains_box(&a));
        prop_assert_eq!(s, overlap_severity(&b, &a));
    }

    #[test]
    fn identical_boxes_score_one(a in box_strategy("a")) {
        let b = BoundingBox::new("b", a.x, a.y, a.width, a.height);
        prop_assert_eq!(overlap_severity(&a, &b), 1.0);
    }

    #[test]
    fn single_node_never_overlaps(bp in blueprint_strategy()) {
        let nodes = forest(&[bp]);
        prop_assert!(detect_node_overlaps(&nodes, 10.0, &DimensionDefaults::default()).is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Spatial hash equivalence
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn hashed_detection_matches_pairwise(
        nodes in forest_strategy(),
        clearance in 0i32..30,
    ) {
        let defaults = DimensionDefaults::default();
        let pairwise = CollisionOptions {
            min_clearance: clearance as f32,
            spatial_hash_threshold: usize::MAX,
            ..CollisionOptions::default()
        };
        let hashed = CollisionOptions {
            spatial_hash_threshold: 0,
            ..pairwise.clone()
        };
        let expected = detect_collisions(&nodes, &pairwise, &defaults);
        let actual = detect_collisions(&nodes, &hashed, &defaults);
        prop_assert_eq!(expected.overlaps, actual.overlaps);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4-5. Hierarchy and routing
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn common_ancestor_is_symmetric(nodes in forest_strategy(), i in 0usize..64, j in 0usize..64) {
        let h = Hierarchy::new(&nodes);
        let a = &nodes[i % nodes.len()].id;
        let b = &nodes[j % nodes.len()].id;
        prop_assert_eq!(h.common_ancestor(a, b), h.common_ancestor(b, a));
    }

    #[test]
    fn handler_chain_empty_iff_siblings(nodes in forest_strategy(), i in 0usize..64, j in 0usize..64) {
        let h = Hierarchy::new(&nodes);
        let a = &nodes[i % nodes.len()].id;
        let b = &nodes[j % nodes.len()].id;
        let chain = build_handler_chain(&h, a, b);
        prop_assert_eq!(chain.is_empty(), h.are_siblings_of_same_boundary(a, b));
    }

    #[test]
    fn channel_numbers_are_contiguous(
        nodes in forest_strategy(),
        pairs in prop::collection::vec((0usize..64, 0usize..64), 0..20),
    ) {
        let edges = edges_for(&nodes, &pairs);
        let h = Hierarchy::new(&nodes);
        for bundle in assign_channel_numbers(&h, &edges).values() {
            let mut lanes: Vec<u32> = bundle.values().copied().collect();
            lanes.sort_unstable();
            let expected: Vec<u32> = (1..=bundle.len() as u32).collect();
            prop_assert_eq!(lanes, expected);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 6. Parent consistency
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sanitize_leaves_a_forest(
        nodes in forest_strategy(),
        rewires in prop::collection::vec((0usize..64, proptest::option::of(0usize..80)), 0..8),
    ) {
        let mut nodes = nodes;
        let len = nodes.len();
        for (target, parent) in rewires {
            // Indices past the end produce dangling references.
            nodes[target % len].parent_id = parent.map(|p| format!("n{p}"));
            nodes[target % len].constrained = true;
        }
        sanitize_nodes(&mut nodes);
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        for node in &nodes {
            if let Some(parent) = &node.parent_id {
                prop_assert!(ids.contains(parent));
            }
            prop_assert!(!node.constrained || node.parent_id.is_some());
            prop_assert!(reaches_root(&nodes, &node.id));
        }
    }

    #[test]
    fn drops_never_create_cycles(
        nodes in forest_strategy(),
        pick in 0usize..64,
        at in (0i32..800, 0i32..800),
    ) {
        let mut nodes = nodes;
        let idx = pick % nodes.len();
        let h = Hierarchy::new(&nodes);
        let origin = topology_layout::layout::absolute_position(&h, &nodes[idx].id)
            .unwrap_or_default();
        let current = nodes[idx].position;
        nodes[idx].position = topology_layout::Point::new(
            current.x - origin.x + at.0 as f32,
            current.y - origin.y + at.1 as f32,
        );
        let outcome = commit_drop(&nodes, &nodes[idx].id.clone(), &DimensionDefaults::default());
        for node in &outcome.nodes {
            prop_assert!(reaches_root(&outcome.nodes, &node.id));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 7. Auto-tidy
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn auto_tidy_is_idempotent(nodes in forest_strategy()) {
        let config = Config::default();
        let first = auto_tidy(&nodes, &[], &GridLayout, &config).expect("first pass");
        let second = auto_tidy(&first.nodes, &[], &GridLayout, &config).expect("second pass");
        prop_assert_eq!(second.stats.devices_repositioned, 0);
        for (a, b) in first.nodes.iter().zip(&second.nodes) {
            prop_assert!((a.position.x - b.position.x).abs() < 1e-3);
            prop_assert!((a.position.y - b.position.y).abs() < 1e-3);
            prop_assert_eq!(a.width, b.width);
            prop_assert_eq!(a.height, b.height);
        }
    }
}
