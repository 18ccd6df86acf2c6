// Edge label placement and collision relaxation.
// Labels start on the straight line between endpoint centres and are nudged
// apart for a bounded number of passes. Some inputs have no collision-free
// arrangement, so the result reports whatever is left instead of looping.

use serde::Serialize;

use crate::config::{CellSize, Config, LabelConfig};
use crate::ir::{Edge, EdgeLabel, Node, Point};
use crate::text_metrics;

use super::bounds::absolute_bounding_box;
use super::collision::{overlap_severity, overlaps_among};
use super::hierarchy::Hierarchy;
use super::spatial::{SpatialHash, auto_cell_size};
use super::types::BoundingBox;

/// Direction comparisons below this are treated as ties.
const DIRECTION_EPS: f32 = 1e-4;
/// Added to computed clearance distances so boxes end up strictly apart.
const CLEAR_NUDGE: f32 = 0.5;
/// Label counts at which label-label tests go through the spatial hash.
const LABEL_HASH_THRESHOLD: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelBox {
    pub edge_id: String,
    /// Where the label was first anchored on its edge.
    pub anchor: Point,
    pub center: Point,
    /// Axis-aligned extent, after rotation.
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees, kept upright in (-90, 90].
    pub angle: f32,
    #[serde(skip)]
    normal: (f32, f32),
}

impl LabelBox {
    pub fn rect(&self) -> BoundingBox {
        BoundingBox::new(
            self.edge_id.clone(),
            self.center.x - self.width / 2.0,
            self.center.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    pub fn displaced(&self) -> bool {
        (self.center.x - self.anchor.x).abs() > DIRECTION_EPS
            || (self.center.y - self.anchor.y).abs() > DIRECTION_EPS
    }

    /// Unit normal of the carrying edge.
    pub fn normal(&self) -> (f32, f32) {
        self.normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelCollisionKind {
    Label,
    Device,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCollision {
    pub edge_id: String,
    /// The other label's edge id, or the device id.
    pub other: String,
    pub kind: LabelCollisionKind,
    pub severity: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelResolution {
    pub labels: Vec<LabelBox>,
    /// Collisions still present after the last pass.
    pub collisions: Vec<LabelCollision>,
    pub iterations: usize,
    pub all_resolved: bool,
}

/// Content-based size estimate: widest line times the character advance,
/// one line height plus a fixed increment per extra line, plus padding.
pub fn estimate_label_size(label: &EdgeLabel, config: &LabelConfig) -> (f32, f32) {
    let lines = label.lines();
    let text_w = text_metrics::estimate_block_width(&lines, config.char_width);
    let extra_lines = lines.len().saturating_sub(1) as f32;
    let text_h = if lines.is_empty() {
        0.0
    } else {
        config.line_height + extra_lines * config.extra_line_height
    };
    (
        text_w + config.padding_x * 2.0,
        text_h + config.padding_y * 2.0,
    )
}

pub fn label_anchor(source: Point, target: Point, fraction: f32) -> Point {
    let t = fraction.clamp(0.0, 1.0);
    Point::new(
        source.x + (target.x - source.x) * t,
        source.y + (target.y - source.y) * t,
    )
}

/// Edge angle in degrees, folded into (-90, 90] so text never reads upside down.
pub fn upright_angle(dx: f32, dy: f32) -> f32 {
    if dx.abs() < DIRECTION_EPS && dy.abs() < DIRECTION_EPS {
        return 0.0;
    }
    let mut angle = dy.atan2(dx).to_degrees();
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle <= -90.0 {
        angle += 180.0;
    }
    angle
}

/// Axis-aligned extent of a `w` x `h` box rotated by `angle` degrees.
pub fn rotated_extent(w: f32, h: f32, angle: f32) -> (f32, f32) {
    let rad = angle.to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    (w * cos + h * sin, w * sin + h * cos)
}

fn unit_normal(dx: f32, dy: f32) -> (f32, f32) {
    let len = (dx * dx + dy * dy).sqrt();
    if len < DIRECTION_EPS {
        return (0.0, -1.0);
    }
    (-dy / len, dx / len)
}

/// Initial label boxes for every labelled edge whose endpoints exist.
pub fn place_edge_labels(nodes: &[Node], edges: &[Edge], config: &Config) -> Vec<LabelBox> {
    let hierarchy = Hierarchy::new(nodes);
    let labels = &config.labels;
    edges
        .iter()
        .filter_map(|edge| {
            let label = edge.label.as_ref().filter(|label| !label.is_empty())?;
            let source = absolute_bounding_box(&hierarchy, &edge.source, &config.dimensions)?;
            let target = absolute_bounding_box(&hierarchy, &edge.target, &config.dimensions)?;
            let (sc, tc) = (source.center(), target.center());
            let (dx, dy) = (tc.x - sc.x, tc.y - sc.y);
            let (w, h) = estimate_label_size(label, labels);
            let angle = if labels.rotate_with_edge {
                upright_angle(dx, dy)
            } else {
                0.0
            };
            let (width, height) = rotated_extent(w, h, angle);
            let anchor = label_anchor(sc, tc, labels.anchor_fraction);
            Some(LabelBox {
                edge_id: edge.id.clone(),
                anchor,
                center: anchor,
                width,
                height,
                angle,
                normal: unit_normal(dx, dy),
            })
        })
        .collect()
}

fn device_boxes(nodes: &[Node], config: &Config) -> Vec<BoundingBox> {
    let hierarchy = Hierarchy::new(nodes);
    nodes
        .iter()
        .filter(|node| node.is_device())
        .filter_map(|node| absolute_bounding_box(&hierarchy, &node.id, &config.dimensions))
        .collect()
}

/// Label-label overlaps among expanded label boxes, then label-device
/// overlaps against raw device boxes.
pub fn detect_label_collisions(
    labels: &[LabelBox],
    devices: &SpatialHash,
    config: &LabelConfig,
) -> Vec<LabelCollision> {
    let rects: Vec<BoundingBox> = labels.iter().map(|label| label.rect()).collect();
    let mut collisions: Vec<LabelCollision> = overlaps_among(
        &rects,
        config.min_label_separation,
        CellSize::Auto,
        LABEL_HASH_THRESHOLD,
        |_, _| true,
    )
    .into_iter()
    .map(|overlap| LabelCollision {
        edge_id: overlap.a,
        other: overlap.b,
        kind: LabelCollisionKind::Label,
        severity: overlap.severity,
    })
    .collect();

    let pad = config.min_label_separation.max(0.0) / 2.0;
    for rect in &rects {
        let expanded = rect.expand(pad);
        for idx in devices.query(&expanded) {
            let Some(device) = devices.get(idx) else {
                continue;
            };
            let severity = overlap_severity(&expanded, device);
            if severity > 0.0 {
                collisions.push(LabelCollision {
                    edge_id: rect.id.clone(),
                    other: device.id.clone(),
                    kind: LabelCollisionKind::Device,
                    severity,
                });
            }
        }
    }
    collisions
}

/// Distance to move `label` along `dir` until it clears `device`.
fn clearance_along(label: &BoundingBox, device: &BoundingBox, dir: (f32, f32)) -> f32 {
    let (lc, dc) = (label.center(), device.center());
    let gap_x = (label.width + device.width) / 2.0 - (lc.x - dc.x).abs();
    let gap_y = (label.height + device.height) / 2.0 - (lc.y - dc.y).abs();
    let along_x = if dir.0.abs() > DIRECTION_EPS {
        gap_x / dir.0.abs()
    } else {
        f32::INFINITY
    };
    let along_y = if dir.1.abs() > DIRECTION_EPS {
        gap_y / dir.1.abs()
    } else {
        f32::INFINITY
    };
    along_x.min(along_y).max(0.0) + CLEAR_NUDGE
}

fn label_push_sign(normal: (f32, f32), away: (f32, f32), tie: f32) -> f32 {
    let dot = normal.0 * away.0 + normal.1 * away.1;
    if dot > DIRECTION_EPS {
        1.0
    } else if dot < -DIRECTION_EPS {
        -1.0
    } else {
        tie
    }
}

fn relax_once(
    labels: &mut [LabelBox],
    collisions: &[LabelCollision],
    devices: &SpatialHash,
    config: &LabelConfig,
) {
    let mut deltas: Vec<(f32, f32)> = vec![(0.0, 0.0); labels.len()];
    let position = |edge_id: &str| labels.iter().position(|label| label.edge_id == edge_id);
    let pad = config.min_label_separation.max(0.0) / 2.0;

    for collision in collisions {
        let Some(i) = position(&collision.edge_id) else {
            continue;
        };
        match collision.kind {
            LabelCollisionKind::Label => {
                let Some(j) = position(&collision.other) else {
                    continue;
                };
                let (a, b) = (&labels[i], &labels[j]);
                let amount =
                    ((a.height + b.height) / 2.0 * config.push_factor).min(config.max_push);
                let away = (a.center.x - b.center.x, a.center.y - b.center.y);
                let sa = label_push_sign(a.normal, away, 1.0);
                let sb = label_push_sign(b.normal, (-away.0, -away.1), -1.0);
                deltas[i].0 += a.normal.0 * sa * amount;
                deltas[i].1 += a.normal.1 * sa * amount;
                deltas[j].0 += b.normal.0 * sb * amount;
                deltas[j].1 += b.normal.1 * sb * amount;
            }
            LabelCollisionKind::Device => {
                let Some(device) = devices.boxes().iter().find(|d| d.id == collision.other) else {
                    continue;
                };
                let label = &labels[i];
                let dc = device.center();
                let (mut dx, mut dy) = (label.center.x - dc.x, label.center.y - dc.y);
                let len = (dx * dx + dy * dy).sqrt();
                if len < DIRECTION_EPS {
                    (dx, dy) = label.normal;
                } else {
                    dx /= len;
                    dy /= len;
                }
                let amount =
                    clearance_along(&label.rect().expand(pad), device, (dx, dy)).min(config.max_push);
                deltas[i].0 += dx * amount;
                deltas[i].1 += dy * amount;
            }
        }
    }

    for (label, (dx, dy)) in labels.iter_mut().zip(deltas) {
        label.center = label.center.offset(dx, dy);
    }
}

/// Place every label and relax collisions for at most
/// `config.labels.max_iterations` passes.
pub fn resolve_label_collisions(nodes: &[Node], edges: &[Edge], config: &Config) -> LabelResolution {
    let mut labels = place_edge_labels(nodes, edges, config);
    let devices = device_boxes(nodes, config);
    let cell = auto_cell_size(&devices, config.labels.min_label_separation);
    let device_grid = SpatialHash::with_boxes(cell, &devices);

    let mut iterations = 0;
    let mut collisions = detect_label_collisions(&labels, &device_grid, &config.labels);
    while !collisions.is_empty() && iterations < config.labels.max_iterations {
        relax_once(&mut labels, &collisions, &device_grid, &config.labels);
        iterations += 1;
        collisions = detect_label_collisions(&labels, &device_grid, &config.labels);
        tracing::trace!(iteration = iterations, remaining = collisions.len(), "label pass");
    }

    let all_resolved = collisions.is_empty();
    if !all_resolved {
        tracing::debug!(
            remaining = collisions.len(),
            iterations,
            "label collisions left after relaxation"
        );
    }
    LabelResolution {
        labels,
        collisions,
        iterations,
        all_resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::LabelField;

    fn device(id: &str, x: f32, y: f32) -> Node {
        Node::device(id, x, y).with_size(120.0, 80.0)
    }

    #[test]
    fn label_size_grows_with_lines() {
        let config = LabelConfig::default();
        let single = estimate_label_size(&EdgeLabel::Text("abc".into()), &config);
        assert_eq!(single, (33.0, 24.0));
        let double = estimate_label_size(&EdgeLabel::Text("abc\nde".into()), &config);
        assert_eq!(double, (33.0, 38.0));
    }

    #[test]
    fn structured_fields_add_lines() {
        let config = LabelConfig::default();
        let label = EdgeLabel::Fields {
            title: None,
            fields: vec![
                LabelField {
                    key: "vlan".into(),
                    value: "10".into(),
                },
                LabelField {
                    key: "mtu".into(),
                    value: "9000".into(),
                },
            ],
        };
        let (_, h) = estimate_label_size(&label, &config);
        assert_eq!(h, 16.0 + 14.0 + 8.0);
    }

    #[test]
    fn anchor_follows_fraction() {
        let p = label_anchor(Point::new(0.0, 0.0), Point::new(100.0, 40.0), 0.25);
        assert_eq!(p, Point::new(25.0, 10.0));
    }

    #[test]
    fn angle_stays_upright() {
        assert_eq!(upright_angle(-10.0, 0.0), 0.0);
        assert_eq!(upright_angle(0.0, 5.0), 90.0);
        assert_eq!(upright_angle(0.0, -5.0), 90.0);
        assert!((upright_angle(-1.0, -1.0) - 45.0).abs() < 1e-4);
        assert_eq!(upright_angle(0.0, 0.0), 0.0);
    }

    #[test]
    fn rotated_extent_swaps_axes_at_ninety() {
        let (w, h) = rotated_extent(40.0, 10.0, 90.0);
        assert!((w - 10.0).abs() < 1e-3);
        assert!((h - 40.0).abs() < 1e-3);
    }

    #[test]
    fn parallel_labels_are_pushed_apart() {
        let nodes = vec![
            device("a1", 0.0, 0.0),
            device("b1", 400.0, 0.0),
            device("a2", 0.0, 10.0),
            device("b2", 400.0, 10.0),
        ];
        let edges = vec![
            Edge::new("e1", "a1", "b1").with_label("abc"),
            Edge::new("e2", "a2", "b2").with_label("abc"),
        ];
        let result = resolve_label_collisions(&nodes, &edges, &Config::default());
        assert!(result.all_resolved);
        assert!(result.collisions.is_empty());
        assert!(result.iterations >= 1);
        let (l1, l2) = (&result.labels[0], &result.labels[1]);
        assert!(l1.center.y < l1.anchor.y);
        assert!(l2.center.y > l2.anchor.y);
        assert!(l1.displaced() && l2.displaced());
    }

    #[test]
    fn label_is_pushed_off_a_device() {
        let nodes = vec![
            device("a", 0.0, 0.0),
            device("b", 600.0, 0.0),
            Node::device("mid", 340.0, 30.0).with_size(40.0, 40.0),
        ];
        let edges = vec![Edge::new("e", "a", "b").with_label("abc")];
        let result = resolve_label_collisions(&nodes, &edges, &Config::default());
        assert!(result.all_resolved);
        let label = &result.labels[0];
        assert_eq!(label.anchor, Point::new(360.0, 40.0));
        assert!(label.center.y < 40.0 - 24.0);
        assert_eq!(label.center.x, 360.0);
    }

    #[test]
    fn exhausted_passes_report_residual_collisions() {
        let nodes = vec![device("a", 0.0, 0.0), device("b", 400.0, 0.0)];
        let edges = vec![
            Edge::new("e1", "a", "b").with_label("one"),
            Edge::new("e2", "a", "b").with_label("two"),
        ];
        let mut config = Config::default();
        config.labels.max_iterations = 0;
        let result = resolve_label_collisions(&nodes, &edges, &config);
        assert!(!result.all_resolved);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.collisions[0].kind, LabelCollisionKind::Label);
    }

    #[test]
    fn unlabelled_and_dangling_edges_are_skipped() {
        let nodes = vec![device("a", 0.0, 0.0), device("b", 400.0, 0.0)];
        let edges = vec![
            Edge::new("plain", "a", "b"),
            Edge::new("blank", "a", "b").with_label("  "),
            Edge::new("dangling", "a", "ghost").with_label("x"),
        ];
        assert!(place_edge_labels(&nodes, &edges, &Config::default()).is_empty());
    }

    #[test]
    fn boundaries_are_not_label_obstacles() {
        let nodes = vec![
            Node::boundary("zone", 0.0, 0.0).with_size(1000.0, 400.0),
            device("a", 10.0, 10.0).with_parent("zone"),
            device("b", 600.0, 10.0).with_parent("zone"),
        ];
        let edges = vec![Edge::new("e", "a", "b").with_label("uplink")];
        let result = resolve_label_collisions(&nodes, &edges, &Config::default());
        assert!(result.all_resolved);
        assert_eq!(result.iterations, 0);
    }
}
