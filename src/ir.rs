use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Device,
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

/// Size hints coming from the node's visual style.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeStyle {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

/// Measured size reported by the editing surface. Either axis may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasuredSize {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerSide {
    Top,
    #[default]
    Right,
    Bottom,
    Left,
}

impl HandlerSide {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "top" => Some(Self::Top),
            "right" => Some(Self::Right),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            _ => None,
        }
    }
}

/// Per-boundary override of where channel-routed edges cross its border.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandlerSpec {
    #[serde(default)]
    pub side: Option<HandlerSide>,
    /// Percentage along the side, 0 at the top/left end.
    #[serde(default)]
    pub position: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    /// Local position, relative to the parent boundary when `parent_id` is set.
    #[serde(default)]
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<MeasuredSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Position is clamped to the parent's box.
    #[serde(default)]
    pub constrained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerSpec>,
}

impl Node {
    pub fn device(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(id, NodeKind::Device, x, y)
    }

    pub fn boundary(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(id, NodeKind::Boundary, x, y)
    }

    fn new(id: impl Into<String>, kind: NodeKind, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Point::new(x, y),
            width: None,
            height: None,
            measured: None,
            style: None,
            parent_id: None,
            constrained: false,
            handler: None,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self.constrained = true;
        self
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == NodeKind::Boundary
    }

    pub fn is_device(&self) -> bool {
        self.kind == NodeKind::Device
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeLabel {
    Text(String),
    Fields {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        fields: Vec<LabelField>,
    },
}

impl EdgeLabel {
    /// Visible text lines, one per structured field.
    pub fn lines(&self) -> Vec<String> {
        match self {
            EdgeLabel::Text(text) => crate::text_metrics::split_lines(text),
            EdgeLabel::Fields { title, fields } => {
                let mut lines = Vec::with_capacity(fields.len() + 1);
                if let Some(title) = title.as_deref().filter(|t| !t.trim().is_empty()) {
                    lines.extend(crate::text_metrics::split_lines(title));
                }
                for field in fields {
                    lines.push(format!("{}: {}", field.key, field.value));
                }
                lines
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines().iter().all(|line| line.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<EdgeLabel>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, text: impl Into<String>) -> Self {
        self.label = Some(EdgeLabel::Text(text.into()));
        self
    }
}

/// Node and edge collection as handed over by the editing surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// What [`Diagram::sanitize`] had to heal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeReport {
    pub dangling_parents: Vec<String>,
    pub broken_cycles: Vec<String>,
    pub cleared_constraints: Vec<String>,
    pub dropped_edges: Vec<String>,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_parents.is_empty()
            && self.broken_cycles.is_empty()
            && self.cleared_constraints.is_empty()
            && self.dropped_edges.is_empty()
    }
}

impl Diagram {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Heals dangling references in place: parent ids pointing at missing
    /// nodes or closing a cycle, `constrained` flags without a parent, and
    /// edges whose endpoints do not exist.
    pub fn sanitize(&mut self) -> SanitizeReport {
        let mut report = sanitize_nodes(&mut self.nodes);
        let ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        let mut dropped = Vec::new();
        self.edges.retain(|edge| {
            let keep = ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str());
            if !keep {
                dropped.push(edge.id.clone());
            }
            keep
        });
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "dropped edges with missing endpoints");
        }
        report.dropped_edges = dropped;
        report
    }
}

/// Parent-pointer consistency pass over a node collection.
pub fn sanitize_nodes(nodes: &mut [Node]) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        index.entry(node.id.clone()).or_insert(idx);
    }

    for node in nodes.iter_mut() {
        let dangling = node
            .parent_id
            .as_deref()
            .is_some_and(|parent| !index.contains_key(parent));
        if dangling {
            tracing::debug!(node = %node.id, "clearing dangling parent reference");
            node.parent_id = None;
            report.dangling_parents.push(node.id.clone());
        }
    }

    // Break cycles at the first member encountered in collection order.
    for start in 0..nodes.len() {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut current = start;
        seen.insert(current);
        loop {
            let Some(parent_idx) = nodes[current]
                .parent_id
                .as_deref()
                .and_then(|parent| index.get(parent).copied())
            else {
                break;
            };
            if parent_idx == start {
                tracing::debug!(node = %nodes[start].id, "breaking parent cycle");
                nodes[start].parent_id = None;
                report.broken_cycles.push(nodes[start].id.clone());
                break;
            }
            if !seen.insert(parent_idx) {
                // Cycle further up; it is broken when its own members are visited.
                break;
            }
            current = parent_idx;
        }
    }

    for node in nodes.iter_mut() {
        if node.constrained && node.parent_id.is_none() {
            node.constrained = false;
            report.cleared_constraints.push(node.id.clone());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clears_dangling_parent_and_constraint() {
        let mut diagram = Diagram::new(
            vec![Node::device("a", 0.0, 0.0).with_parent("ghost")],
            vec![Edge::new("e1", "a", "missing")],
        );
        let report = diagram.sanitize();
        assert_eq!(report.dangling_parents, vec!["a".to_string()]);
        assert_eq!(report.cleared_constraints, vec!["a".to_string()]);
        assert_eq!(report.dropped_edges, vec!["e1".to_string()]);
        assert!(diagram.nodes[0].parent_id.is_none());
        assert!(!diagram.nodes[0].constrained);
        assert!(diagram.edges.is_empty());
    }

    #[test]
    fn sanitize_breaks_parent_cycles() {
        let mut diagram = Diagram::new(
            vec![
                Node::boundary("x", 0.0, 0.0).with_parent("y"),
                Node::boundary("y", 0.0, 0.0).with_parent("x"),
            ],
            Vec::new(),
        );
        let report = diagram.sanitize();
        assert_eq!(report.broken_cycles, vec!["x".to_string()]);
        assert!(diagram.nodes[0].parent_id.is_none());
        assert_eq!(diagram.nodes[1].parent_id.as_deref(), Some("x"));
    }

    #[test]
    fn sanitize_breaks_self_parent() {
        let mut nodes = vec![Node::boundary("solo", 0.0, 0.0).with_parent("solo")];
        let report = sanitize_nodes(&mut nodes);
        assert_eq!(report.broken_cycles, vec!["solo".to_string()]);
        assert!(!nodes[0].constrained);
    }

    #[test]
    fn clean_diagram_reports_nothing() {
        let mut diagram = Diagram::new(
            vec![
                Node::boundary("b", 0.0, 0.0),
                Node::device("d", 5.0, 5.0).with_parent("b"),
            ],
            vec![Edge::new("e", "b", "d")],
        );
        assert!(diagram.sanitize().is_clean());
    }

    #[test]
    fn structured_label_has_one_line_per_field() {
        let label = EdgeLabel::Fields {
            title: Some("uplink".to_string()),
            fields: vec![
                LabelField {
                    key: "port".to_string(),
                    value: "443".to_string(),
                },
                LabelField {
                    key: "proto".to_string(),
                    value: "tcp".to_string(),
                },
            ],
        };
        assert_eq!(label.lines(), vec!["uplink", "port: 443", "proto: tcp"]);
    }

    #[test]
    fn diagram_json_uses_camel_case() {
        let json = r#"{
            "nodes": [
                {"id": "b", "kind": "boundary", "position": {"x": 0, "y": 0}},
                {"id": "d", "kind": "device", "position": {"x": 10, "y": 20},
                 "parentId": "b", "constrained": true}
            ],
            "edges": [{"id": "e", "source": "b", "target": "d", "label": "link"}]
        }"#;
        let diagram: Diagram = serde_json::from_str(json).expect("diagram parses");
        assert_eq!(diagram.nodes[1].parent_id.as_deref(), Some("b"));
        assert_eq!(
            diagram.edges[0].label,
            Some(EdgeLabel::Text("link".to_string()))
        );
    }
}
