//! Geometry layer: boxes, containment, collisions, labels, routing, tidy
//! and drag. Everything here is a pure transformation over node and edge
//! collections; callers get new collections back.

pub mod bounds;
pub mod collision;
pub mod drag;
pub mod error;
pub mod hierarchy;
pub mod label_placement;
pub mod routing;
pub mod spatial;
pub mod tidy;
pub(crate) mod types;
pub use types::*;

pub use bounds::{absolute_bounding_box, absolute_position, bounding_box_of, dimensions_of};
pub use collision::{
    CollisionOptions, OverlapResolution, boxes_intersect, calculate_layout_quality, detect_collisions,
    detect_node_overlaps, intersection_area, overlap_severity, resolve_node_overlaps,
};
pub use drag::{DropChange, DropOutcome, clamp_constrained_positions, commit_drop, drag_hover_target, innermost_boundary_at};
pub use error::LayoutError;
pub use hierarchy::Hierarchy;
pub use label_placement::{LabelBox, LabelCollision, LabelCollisionKind, LabelResolution, resolve_label_collisions};
pub use routing::{
    ChannelRoute, EdgeRoute, HandlerChain, Waypoint, WaypointKind, assign_channel_numbers, build_handler_chain,
    generate_channel_route_path, generate_channel_route_svg_path, get_handler_position, route_all_edges,
    should_use_channel_routing,
};
pub use spatial::SpatialHash;
pub use tidy::{
    AsyncLayoutAlgorithm, GridLayout, LayeredLayout, LayoutAlgorithm, TidyResult, TidyStats, auto_tidy,
    auto_tidy_async, auto_tidy_boundary, auto_tidy_boundary_async, layout_algorithm,
};
