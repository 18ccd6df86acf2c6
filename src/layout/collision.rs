//! Pairwise overlap detection between node boxes.
//!
//! Boxes are compared in the root frame. A node is never reported as
//! colliding with one of its own ancestors: containment is the hierarchy,
//! not a collision.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::config::{CellSize, CollisionConfig, DimensionDefaults};
use crate::ir::{Node, NodeKind};

use super::bounds::absolute_bounding_box;
use super::hierarchy::Hierarchy;
use super::spatial::{SpatialHash, candidate_pairs, resolve_cell_size};
use super::types::{BoundingBox, CollisionReport, Overlap};

/// Largest severity a pair can score without full containment.
const PARTIAL_SEVERITY_CAP: f32 = 1.0 - f32::EPSILON;
/// Extra gap left between siblings pushed apart by `resolve_node_overlaps`.
const OVERLAP_PUSH_GAP: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct CollisionOptions {
    pub min_clearance: f32,
    pub devices_only: bool,
    pub boundaries_only: bool,
    pub cell_size: CellSize,
    pub spatial_hash_threshold: usize,
}

impl Default for CollisionOptions {
    fn default() -> Self {
        Self::from_config(&CollisionConfig::default())
    }
}

impl CollisionOptions {
    pub fn from_config(config: &CollisionConfig) -> Self {
        Self {
            min_clearance: config.min_clearance,
            devices_only: false,
            boundaries_only: false,
            cell_size: config.cell_size,
            spatial_hash_threshold: config.spatial_hash_threshold,
        }
    }

    pub fn devices_only(mut self) -> Self {
        self.devices_only = true;
        self.boundaries_only = false;
        self
    }

    pub fn boundaries_only(mut self) -> Self {
        self.boundaries_only = true;
        self.devices_only = false;
        self
    }

    fn admits(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Device => !self.boundaries_only,
            NodeKind::Boundary => !self.devices_only,
        }
    }
}

pub fn intersection_area(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let (w, h) = a.overlap_extent(b);
    w * h
}

/// Intersection test after growing both boxes by half the clearance.
/// At zero clearance this agrees exactly with `intersection_area > 0`.
pub fn boxes_intersect(a: &BoundingBox, b: &BoundingBox, min_clearance: f32) -> bool {
    let pad = min_clearance.max(0.0) / 2.0;
    intersection_area(&a.expand(pad), &b.expand(pad)) > 0.0
}

/// Intersection area over the smaller area. Exactly 1 for containment,
/// exactly 0 for disjoint boxes.
pub fn overlap_severity(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let area = intersection_area(a, b);
    if area <= 0.0 {
        return 0.0;
    }
    if a.contains_box(b) || b.contains_box(a) {
        return 1.0;
    }
    let smaller = a.area().min(b.area());
    if smaller <= 0.0 {
        return 0.0;
    }
    (area / smaller).clamp(0.0, PARTIAL_SEVERITY_CAP)
}

fn sort_overlaps(overlaps: &mut [Overlap]) {
    overlaps.sort_by(|x, y| {
        y.severity
            .partial_cmp(&x.severity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
}

/// Overlaps among raw boxes. `eligible(i, j)` filters pairs before the exact test.
pub(crate) fn overlaps_among<F>(
    boxes: &[BoundingBox],
    min_clearance: f32,
    cell_size: CellSize,
    spatial_hash_threshold: usize,
    eligible: F,
) -> Vec<Overlap>
where
    F: Fn(usize, usize) -> bool,
{
    if boxes.len() < 2 {
        return Vec::new();
    }
    let pad = min_clearance.max(0.0) / 2.0;
    let expanded: Vec<BoundingBox> = boxes.iter().map(|b| b.expand(pad)).collect();

    let pairs: Vec<(usize, usize)> = if expanded.len() >= spatial_hash_threshold.max(2) {
        let cell = resolve_cell_size(cell_size, &expanded, 0.0);
        candidate_pairs(&SpatialHash::with_boxes(cell, &expanded))
    } else {
        (0..expanded.len())
            .flat_map(|i| ((i + 1)..expanded.len()).map(move |j| (i, j)))
            .collect()
    };

    let mut overlaps = Vec::new();
    for (i, j) in pairs {
        if !eligible(i, j) {
            continue;
        }
        let (a, b) = (&expanded[i], &expanded[j]);
        if intersection_area(a, b) <= 0.0 {
            continue;
        }
        overlaps.push(Overlap {
            a: boxes[i].id.clone(),
            b: boxes[j].id.clone(),
            severity: overlap_severity(a, b),
        });
    }
    sort_overlaps(&mut overlaps);
    overlaps
}

fn collect_boxes<'a>(
    hierarchy: &Hierarchy<'a>,
    options: &CollisionOptions,
    defaults: &DimensionDefaults,
) -> Vec<BoundingBox> {
    hierarchy
        .nodes()
        .iter()
        .filter(|node| options.admits(node.kind))
        .filter_map(|node| absolute_bounding_box(hierarchy, &node.id, defaults))
        .collect()
}

fn not_nested(hierarchy: &Hierarchy<'_>, a: &str, b: &str) -> bool {
    a != b && !hierarchy.is_ancestor_of(a, b) && !hierarchy.is_ancestor_of(b, a)
}

/// Every overlapping pair at the given clearance, most severe first.
pub fn detect_node_overlaps(
    nodes: &[Node],
    min_clearance: f32,
    defaults: &DimensionDefaults,
) -> Vec<Overlap> {
    let options = CollisionOptions {
        min_clearance,
        ..CollisionOptions::default()
    };
    detect_collisions(nodes, &options, defaults).overlaps
}

pub fn detect_collisions(
    nodes: &[Node],
    options: &CollisionOptions,
    defaults: &DimensionDefaults,
) -> CollisionReport {
    let hierarchy = Hierarchy::new(nodes);
    let boxes = collect_boxes(&hierarchy, options, defaults);
    let overlaps = overlaps_among(
        &boxes,
        options.min_clearance,
        options.cell_size,
        options.spatial_hash_threshold,
        |i, j| not_nested(&hierarchy, &boxes[i].id, &boxes[j].id),
    );
    let count = overlaps.len();
    let total: f32 = overlaps.iter().map(|o| o.severity).sum();
    let max_severity = overlaps.first().map(|o| o.severity).unwrap_or(0.0);
    tracing::trace!(checked = boxes.len(), count, "collision pass");
    CollisionReport {
        average_severity: if count == 0 { 0.0 } else { total / count as f32 },
        max_severity,
        count,
        checked_nodes: boxes.len(),
        overlaps,
    }
}

/// 1.0 minus the summed severity normalised by node count, floored at 0.
pub fn calculate_layout_quality(overlaps: &[Overlap], node_count: usize) -> f32 {
    if overlaps.is_empty() {
        return 1.0;
    }
    let total: f32 = overlaps.iter().map(|o| o.severity).sum();
    let penalty = total / node_count.max(1) as f32;
    (1.0 - penalty).clamp(0.0, 1.0)
}

impl CollisionReport {
    pub fn quality(&self) -> f32 {
        calculate_layout_quality(&self.overlaps, self.checked_nodes)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapResolution {
    pub nodes: Vec<Node>,
    pub passes: usize,
    pub moved: Vec<String>,
    pub remaining: Vec<Overlap>,
    pub all_resolved: bool,
}

/// Push overlapping siblings apart, bounded to `config.overlap_passes`.
///
/// Only siblings are moved, since their local positions share a frame. The
/// later node of each pair (collection order) moves along the axis of least
/// penetration.
pub fn resolve_node_overlaps(
    nodes: &[Node],
    config: &CollisionConfig,
    defaults: &DimensionDefaults,
) -> OverlapResolution {
    let mut working = nodes.to_vec();
    let mut moved: Vec<String> = Vec::new();
    let mut passes = 0;
    let order: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.clone(), idx))
        .collect();

    for _ in 0..config.overlap_passes {
        let pending = sibling_overlaps(&working, config, defaults);
        if pending.is_empty() {
            break;
        }
        passes += 1;
        for overlap in pending {
            let (first, second) = if order.get(&overlap.a) <= order.get(&overlap.b) {
                (overlap.a, overlap.b)
            } else {
                (overlap.b, overlap.a)
            };
            let hierarchy = Hierarchy::new(&working);
            let (Some(a), Some(b)) = (
                hierarchy.node(&first).map(|n| super::bounds::bounding_box_of(n, defaults)),
                hierarchy.node(&second).map(|n| super::bounds::bounding_box_of(n, defaults)),
            ) else {
                continue;
            };
            let pad = config.min_clearance.max(0.0) / 2.0;
            let (ow, oh) = a.expand(pad).overlap_extent(&b.expand(pad));
            if ow <= 0.0 || oh <= 0.0 {
                continue;
            }
            let (ca, cb) = (a.center(), b.center());
            let (dx, dy) = if ow <= oh {
                let sign = if cb.x >= ca.x { 1.0 } else { -1.0 };
                (sign * (ow + OVERLAP_PUSH_GAP), 0.0)
            } else {
                let sign = if cb.y >= ca.y { 1.0 } else { -1.0 };
                (0.0, sign * (oh + OVERLAP_PUSH_GAP))
            };
            if let Some(node) = working.iter_mut().find(|n| n.id == second) {
                node.position = node.position.offset(dx, dy);
                if !moved.contains(&second) {
                    moved.push(second.clone());
                }
            }
        }
    }

    let remaining = sibling_overlaps(&working, config, defaults);
    if !remaining.is_empty() {
        tracing::debug!(remaining = remaining.len(), passes, "node overlaps left unresolved");
    }
    OverlapResolution {
        nodes: working,
        passes,
        moved,
        all_resolved: remaining.is_empty(),
        remaining,
    }
}

fn sibling_overlaps(nodes: &[Node], config: &CollisionConfig, defaults: &DimensionDefaults) -> Vec<Overlap> {
    let hierarchy = Hierarchy::new(nodes);
    let options = CollisionOptions::from_config(config);
    let boxes = collect_boxes(&hierarchy, &options, defaults);
    overlaps_among(
        &boxes,
        options.min_clearance,
        options.cell_size,
        options.spatial_hash_threshold,
        |i, j| hierarchy.are_siblings_of_same_boundary(&boxes[i].id, &boxes[j].id),
    )
}
