use crate::config::Config;
use crate::ir::{Diagram, NodeKind};
use crate::layout::bounds::absolute_bounding_box;
use crate::layout::collision::{CollisionOptions, detect_collisions};
use crate::layout::hierarchy::Hierarchy;
use crate::layout::label_placement::{LabelResolution, resolve_label_collisions};
use crate::layout::routing::{EdgeRoute, route_all_edges};
use crate::layout::CollisionReport;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flattened view of a diagram in root coordinates, plus every validator's
/// verdict. Used for debugging and regression snapshots.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub collisions: CollisionReport,
    pub quality: f32,
    pub labels: LabelResolution,
    pub routes: Vec<EdgeRoute>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub kind: NodeKind,
    pub parent_id: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutDump {
    pub fn from_diagram(diagram: &Diagram, config: &Config) -> Self {
        let hierarchy = Hierarchy::new(&diagram.nodes);
        let mut width: f32 = 0.0;
        let mut height: f32 = 0.0;
        let mut nodes = Vec::with_capacity(diagram.nodes.len());
        for node in &diagram.nodes {
            let Some(bbox) = absolute_bounding_box(&hierarchy, &node.id, &config.dimensions) else {
                continue;
            };
            width = width.max(bbox.right());
            height = height.max(bbox.bottom());
            nodes.push(NodeDump {
                id: node.id.clone(),
                kind: node.kind,
                parent_id: hierarchy.parent_of(&node.id).map(str::to_string),
                depth: hierarchy.depth(&node.id),
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
            });
        }

        let collisions = detect_collisions(
            &diagram.nodes,
            &CollisionOptions::from_config(&config.collision),
            &config.dimensions,
        );
        let quality = collisions.quality();

        LayoutDump {
            width,
            height,
            nodes,
            collisions,
            quality,
            labels: resolve_label_collisions(&diagram.nodes, &diagram.edges, config),
            routes: route_all_edges(&diagram.nodes, &diagram.edges, config),
        }
    }
}

pub fn write_layout_dump(path: &Path, diagram: &Diagram, config: &Config) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_diagram(diagram, config);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
