use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::{Config, RoutingMode};
use crate::ir::{Edge, HandlerSide, Node, Point};

use super::bounds::absolute_bounding_box;
use super::hierarchy::Hierarchy;

/// Coordinates closer than this are considered aligned.
const ALIGN_EPS: f32 = 1e-3;
/// Handler percentages are clamped into this range.
const HANDLER_PERCENT_MIN: f32 = 0.0;
const HANDLER_PERCENT_MAX: f32 = 100.0;

/// Boundaries an edge crosses, in travel order from source to target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerChain {
    pub boundaries: Vec<String>,
    pub common_ancestor: Option<String>,
}

impl HandlerChain {
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.boundaries.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WaypointKind {
    Source,
    Handler {
        #[serde(rename = "boundaryId")]
        boundary_id: String,
    },
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub point: Point,
    #[serde(flatten)]
    pub kind: WaypointKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRoute {
    /// SVG path data, empty for degenerate input.
    pub path: String,
    pub points: Vec<Point>,
    pub label_anchor: Point,
}

impl ChannelRoute {
    fn empty(anchor: Point) -> Self {
        Self {
            path: String::new(),
            points: Vec::new(),
            label_anchor: anchor,
        }
    }
}

/// Handler chain for an edge from `a` to `b`.
///
/// Empty when both share the same immediate container. Otherwise climbs
/// from `a` up to and including the deepest shared ancestor, then descends
/// towards `b`. Without a shared ancestor both full chains are joined, `a`'s
/// going up and `b`'s coming down.
pub fn build_handler_chain(hierarchy: &Hierarchy<'_>, a: &str, b: &str) -> HandlerChain {
    if hierarchy.are_siblings_of_same_boundary(a, b) {
        return HandlerChain::default();
    }
    let chain_a = hierarchy.ancestor_chain(a);
    let chain_b = hierarchy.ancestor_chain(b);
    let common = hierarchy.common_ancestor(a, b);

    let mut boundaries: Vec<String> = Vec::with_capacity(chain_a.len() + chain_b.len());
    match common {
        Some(common) => {
            boundaries.extend(
                chain_a
                    .iter()
                    .take_while(|id| **id != common)
                    .map(|id| id.to_string()),
            );
            boundaries.push(common.to_string());
            let down: Vec<&str> = chain_b.iter().copied().take_while(|id| *id != common).collect();
            boundaries.extend(down.into_iter().rev().map(str::to_string));
        }
        None => {
            boundaries.extend(chain_a.iter().map(|id| id.to_string()));
            boundaries.extend(chain_b.iter().rev().map(|id| id.to_string()));
        }
    }

    HandlerChain {
        boundaries,
        common_ancestor: common.map(str::to_string),
    }
}

/// Absolute point where channel-routed edges cross `boundary_id`'s border.
///
/// The node's own handler spec wins over the configured side and percentage.
pub fn get_handler_position(hierarchy: &Hierarchy<'_>, boundary_id: &str, config: &Config) -> Option<Point> {
    let node = hierarchy.node(boundary_id)?;
    let bbox = absolute_bounding_box(hierarchy, boundary_id, &config.dimensions)?;
    let spec = node.handler.unwrap_or_default();
    let side = spec.side.unwrap_or(config.routing.handler_side);
    let percent = spec
        .position
        .filter(|p| p.is_finite())
        .unwrap_or(config.routing.handler_position);
    let t = percent.clamp(HANDLER_PERCENT_MIN, HANDLER_PERCENT_MAX) / 100.0;
    Some(match side {
        HandlerSide::Top => Point::new(bbox.x + bbox.width * t, bbox.y),
        HandlerSide::Bottom => Point::new(bbox.x + bbox.width * t, bbox.bottom()),
        HandlerSide::Left => Point::new(bbox.x, bbox.y + bbox.height * t),
        HandlerSide::Right => Point::new(bbox.right(), bbox.y + bbox.height * t),
    })
}

/// Lane numbers per handler: `handler -> edge id -> 1..=k`, edges in id order.
pub fn assign_channel_numbers(
    hierarchy: &Hierarchy<'_>,
    edges: &[Edge],
) -> BTreeMap<String, BTreeMap<String, u32>> {
    let mut bundles: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for edge in edges {
        if !hierarchy.contains(&edge.source) || !hierarchy.contains(&edge.target) {
            continue;
        }
        let chain = build_handler_chain(hierarchy, &edge.source, &edge.target);
        for boundary in chain.boundaries {
            bundles.entry(boundary).or_default().insert(edge.id.as_str());
        }
    }
    bundles
        .into_iter()
        .map(|(handler, ids)| {
            let lanes = ids
                .into_iter()
                .zip(1u32..)
                .map(|(id, lane)| (id.to_string(), lane))
                .collect();
            (handler, lanes)
        })
        .collect()
}

fn center_of(hierarchy: &Hierarchy<'_>, id: &str, config: &Config) -> Option<Point> {
    absolute_bounding_box(hierarchy, id, &config.dimensions).map(|bbox| bbox.center())
}

/// Source centre, one handler point per crossed boundary, target centre.
/// Empty when either endpoint is missing.
pub fn generate_channel_route_path(hierarchy: &Hierarchy<'_>, edge: &Edge, config: &Config) -> Vec<Waypoint> {
    let (Some(source), Some(target)) = (
        center_of(hierarchy, &edge.source, config),
        center_of(hierarchy, &edge.target, config),
    ) else {
        return Vec::new();
    };
    let chain = build_handler_chain(hierarchy, &edge.source, &edge.target);
    let mut waypoints = Vec::with_capacity(chain.boundaries.len() + 2);
    waypoints.push(Waypoint {
        point: source,
        kind: WaypointKind::Source,
    });
    for boundary in chain.boundaries {
        if let Some(point) = get_handler_position(hierarchy, &boundary, config) {
            waypoints.push(Waypoint {
                point,
                kind: WaypointKind::Handler { boundary_id: boundary },
            });
        }
    }
    waypoints.push(Waypoint {
        point: target,
        kind: WaypointKind::Target,
    });
    waypoints
}

// ── Path geometry ───────────────────────────────────────────────────

/// Perpendicular lane offset for the `edge_index`-th (1-based) of
/// `bundle_size` edges. The first lane runs on the centre line.
pub fn lane_offset(edge_index: u32, bundle_size: u32, max_offset: f32) -> f32 {
    if bundle_size <= 1 || edge_index == 0 {
        return 0.0;
    }
    let slot = (edge_index - 1).min(bundle_size - 1) as f32;
    max_offset * slot / bundle_size as f32
}

fn push_point(points: &mut Vec<Point>, point: Point) {
    let duplicate = points.last().is_some_and(|last| {
        (last.x - point.x).abs() < ALIGN_EPS && (last.y - point.y).abs() < ALIGN_EPS
    });
    if !duplicate {
        points.push(point);
    }
}

/// Aligned runs with a lane offset leave the shared line a quarter of the way
/// along, travel at the offset, and rejoin a quarter before the end.
fn orthogonal_points(waypoints: &[Waypoint], offset: f32) -> Vec<Point> {
    let mut points = Vec::with_capacity(waypoints.len() * 5);
    push_point(&mut points, waypoints[0].point);
    let shifted = offset.abs() >= ALIGN_EPS;
    for pair in waypoints.windows(2) {
        let (from, to) = (pair[0].point, pair[1].point);
        let same_x = (from.x - to.x).abs() < ALIGN_EPS;
        let same_y = (from.y - to.y).abs() < ALIGN_EPS;
        match (same_x, same_y) {
            (true, true) => {}
            (false, true) if shifted => {
                let step = (to.x - from.x) / 4.0;
                push_point(&mut points, Point::new(from.x + step, from.y));
                push_point(&mut points, Point::new(from.x + step, from.y + offset));
                push_point(&mut points, Point::new(to.x - step, to.y + offset));
                push_point(&mut points, Point::new(to.x - step, to.y));
            }
            (true, false) if shifted => {
                let step = (to.y - from.y) / 4.0;
                push_point(&mut points, Point::new(from.x, from.y + step));
                push_point(&mut points, Point::new(from.x + offset, from.y + step));
                push_point(&mut points, Point::new(to.x + offset, to.y - step));
                push_point(&mut points, Point::new(to.x, to.y - step));
            }
            (false, false) => {
                let mid_x = (from.x + to.x) / 2.0 + offset;
                push_point(&mut points, Point::new(mid_x, from.y));
                push_point(&mut points, Point::new(mid_x, to.y));
            }
            _ => {}
        }
        push_point(&mut points, to);
    }
    points
}

fn points_to_path(points: &[Point]) -> String {
    let Some(first) = points.first() else {
        return String::new();
    };
    let mut d = format!("M {:.2} {:.2}", first.x, first.y);
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.x, point.y));
    }
    d
}

/// Point halfway along the polyline by arc length.
fn arc_midpoint(points: &[Point]) -> Option<Point> {
    let lengths: Vec<f32> = points
        .windows(2)
        .map(|seg| (seg[1].x - seg[0].x).hypot(seg[1].y - seg[0].y))
        .collect();
    let total: f32 = lengths.iter().sum();
    if total <= ALIGN_EPS {
        return None;
    }
    let mut remaining = total / 2.0;
    for (seg, len) in points.windows(2).zip(&lengths) {
        if remaining <= *len && *len > 0.0 {
            let t = remaining / len;
            return Some(Point::new(
                seg[0].x + (seg[1].x - seg[0].x) * t,
                seg[0].y + (seg[1].y - seg[0].y) * t,
            ));
        }
        remaining -= len;
    }
    points.last().copied()
}

/// Orthogonal polyline through the waypoints. Each run is shifted sideways
/// by the lane offset so bundled edges do not draw on top of each other.
pub fn generate_channel_route_svg_path(
    waypoints: &[Waypoint],
    edge_index: u32,
    bundle_size: u32,
    max_offset: f32,
) -> ChannelRoute {
    if waypoints.len() < 2 {
        return ChannelRoute::empty(Point::default());
    }
    let offset = lane_offset(edge_index, bundle_size, max_offset);
    let points = orthogonal_points(waypoints, offset);
    match arc_midpoint(&points) {
        Some(label_anchor) => ChannelRoute {
            path: points_to_path(&points),
            points,
            label_anchor,
        },
        None => ChannelRoute::empty(waypoints[0].point),
    }
}

pub fn should_use_channel_routing(mode: RoutingMode, hierarchy: &Hierarchy<'_>, a: &str, b: &str) -> bool {
    match mode {
        RoutingMode::Direct => false,
        RoutingMode::Channel => !hierarchy.are_siblings_of_same_boundary(a, b),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRoute {
    pub edge_id: String,
    pub channel: bool,
    pub chain: HandlerChain,
    pub waypoints: Vec<Waypoint>,
    /// Lane at the first handler, when channel-routed.
    pub lane: Option<u32>,
    pub bundle_size: u32,
    pub route: ChannelRoute,
}

fn direct_route(hierarchy: &Hierarchy<'_>, edge: &Edge, config: &Config) -> Option<EdgeRoute> {
    let source = center_of(hierarchy, &edge.source, config)?;
    let target = center_of(hierarchy, &edge.target, config)?;
    let waypoints = vec![
        Waypoint {
            point: source,
            kind: WaypointKind::Source,
        },
        Waypoint {
            point: target,
            kind: WaypointKind::Target,
        },
    ];
    let points: Vec<Point> = waypoints.iter().map(|w| w.point).collect();
    let route = match arc_midpoint(&points) {
        Some(label_anchor) => ChannelRoute {
            path: points_to_path(&points),
            points,
            label_anchor,
        },
        None => ChannelRoute::empty(source),
    };
    Some(EdgeRoute {
        edge_id: edge.id.clone(),
        channel: false,
        chain: HandlerChain::default(),
        waypoints,
        lane: None,
        bundle_size: 0,
        route,
    })
}

/// Route every edge whose endpoints exist. Bundled edges take their lane
/// from the first handler they pass through.
pub fn route_all_edges(nodes: &[Node], edges: &[Edge], config: &Config) -> Vec<EdgeRoute> {
    let hierarchy = Hierarchy::new(nodes);
    let lanes = assign_channel_numbers(&hierarchy, edges);
    let max_offset = config.routing.max_perpendicular_offset;

    edges
        .iter()
        .filter_map(|edge| {
            if !should_use_channel_routing(config.routing.mode, &hierarchy, &edge.source, &edge.target) {
                return direct_route(&hierarchy, edge, config);
            }
            let waypoints = generate_channel_route_path(&hierarchy, edge, config);
            if waypoints.is_empty() {
                return None;
            }
            let chain = build_handler_chain(&hierarchy, &edge.source, &edge.target);
            let bundle = chain.first().and_then(|handler| lanes.get(handler));
            let lane = bundle.and_then(|bundle| bundle.get(&edge.id)).copied();
            let bundle_size = bundle.map(|bundle| bundle.len() as u32).unwrap_or(0);
            let route = generate_channel_route_svg_path(&waypoints, lane.unwrap_or(1), bundle_size, max_offset);
            Some(EdgeRoute {
                edge_id: edge.id.clone(),
                channel: true,
                chain,
                waypoints,
                lane,
                bundle_size,
                route,
            })
        })
        .collect()
}
