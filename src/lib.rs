#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod text_metrics;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config, parse_config};
pub use ir::{Diagram, Edge, EdgeLabel, Node, NodeKind, Point, SanitizeReport};
pub use layout::{
    BoundingBox, CollisionReport, GridLayout, Hierarchy, LayeredLayout, LayoutAlgorithm, LayoutError, Overlap,
    auto_tidy, detect_collisions, resolve_label_collisions, route_all_edges,
};
