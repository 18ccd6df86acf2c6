use crate::ir::{HandlerSide, NodeKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionDefaults {
    pub device_width: f32,
    pub device_height: f32,
    pub boundary_width: f32,
    pub boundary_height: f32,
}

impl Default for DimensionDefaults {
    fn default() -> Self {
        Self {
            device_width: 120.0,
            device_height: 80.0,
            boundary_width: 320.0,
            boundary_height: 220.0,
        }
    }
}

impl DimensionDefaults {
    pub fn for_kind(&self, kind: NodeKind) -> (f32, f32) {
        match kind {
            NodeKind::Device => (self.device_width, self.device_height),
            NodeKind::Boundary => (self.boundary_width, self.boundary_height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    #[default]
    Grid,
    Layered,
}

impl AlgorithmKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(Self::Grid),
            "layered" | "layer" | "dagre" => Some(Self::Layered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidyConfig {
    /// Space between a boundary's border and its children.
    pub boundary_padding: f32,
    /// Extra size added to boundaries that are themselves nested.
    pub nested_boundary_spacing: f32,
    /// Gap between siblings placed by the built-in algorithms.
    pub node_spacing: f32,
    pub min_boundary_width: f32,
    pub min_boundary_height: f32,
    pub algorithm: AlgorithmKind,
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self {
            boundary_padding: 45.0,
            nested_boundary_spacing: 20.0,
            node_spacing: 40.0,
            min_boundary_width: 160.0,
            min_boundary_height: 120.0,
            algorithm: AlgorithmKind::Grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Direct,
    #[default]
    Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub mode: RoutingMode,
    pub handler_side: HandlerSide,
    /// Percentage along the handler side.
    pub handler_position: f32,
    pub max_perpendicular_offset: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Channel,
            handler_side: HandlerSide::Right,
            handler_position: 50.0,
            max_perpendicular_offset: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellSize {
    #[default]
    Auto,
    Fixed(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    pub min_clearance: f32,
    pub cell_size: CellSize,
    /// Inputs with at least this many boxes go through the spatial hash.
    pub spatial_hash_threshold: usize,
    pub overlap_passes: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_clearance: 0.0,
            cell_size: CellSize::Auto,
            spatial_hash_threshold: 48,
            overlap_passes: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub char_width: f32,
    pub line_height: f32,
    /// Height added per line after the first.
    pub extra_line_height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    /// Where along the centre-to-centre line the label is anchored.
    pub anchor_fraction: f32,
    pub rotate_with_edge: bool,
    pub min_label_separation: f32,
    pub max_iterations: usize,
    pub push_factor: f32,
    pub max_push: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 16.0,
            extra_line_height: 14.0,
            padding_x: 6.0,
            padding_y: 4.0,
            anchor_fraction: 0.5,
            rotate_with_edge: false,
            min_label_separation: 6.0,
            max_iterations: 10,
            push_factor: 0.6,
            max_push: 24.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub dimensions: DimensionDefaults,
    pub tidy: TidyConfig,
    pub routing: RoutingConfig,
    pub collision: CollisionConfig,
    pub labels: LabelConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_cell_size(&self) -> Option<CellSize> {
        match self {
            NumberOrString::Number(val) if *val > 0.0 => Some(CellSize::Fixed(*val)),
            NumberOrString::Number(_) => None,
            NumberOrString::String(val) => {
                let trimmed = val.trim();
                if trimmed.eq_ignore_ascii_case("auto") {
                    Some(CellSize::Auto)
                } else {
                    trimmed
                        .parse::<f32>()
                        .ok()
                        .filter(|v| *v > 0.0)
                        .map(CellSize::Fixed)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DimensionsConfigFile {
    device_width: Option<f32>,
    device_height: Option<f32>,
    boundary_width: Option<f32>,
    boundary_height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TidyConfigFile {
    boundary_padding: Option<f32>,
    nested_boundary_spacing: Option<f32>,
    node_spacing: Option<f32>,
    min_boundary_width: Option<f32>,
    min_boundary_height: Option<f32>,
    algorithm: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    mode: Option<RoutingMode>,
    handler_side: Option<String>,
    handler_position: Option<f32>,
    max_perpendicular_offset: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CollisionConfigFile {
    min_clearance: Option<f32>,
    cell_size: Option<NumberOrString>,
    spatial_hash_threshold: Option<usize>,
    overlap_passes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LabelConfigFile {
    char_width: Option<f32>,
    line_height: Option<f32>,
    extra_line_height: Option<f32>,
    padding_x: Option<f32>,
    padding_y: Option<f32>,
    anchor_fraction: Option<f32>,
    rotate_with_edge: Option<bool>,
    min_label_separation: Option<f32>,
    max_iterations: Option<usize>,
    push_factor: Option<f32>,
    max_push: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    dimensions: Option<DimensionsConfigFile>,
    tidy: Option<TidyConfigFile>,
    routing: Option<RoutingConfigFile>,
    collision: Option<CollisionConfigFile>,
    labels: Option<LabelConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse a JSON5 config document, applying present keys over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(dims) = parsed.dimensions {
        if let Some(v) = dims.device_width {
            config.dimensions.device_width = v;
        }
        if let Some(v) = dims.device_height {
            config.dimensions.device_height = v;
        }
        if let Some(v) = dims.boundary_width {
            config.dimensions.boundary_width = v;
        }
        if let Some(v) = dims.boundary_height {
            config.dimensions.boundary_height = v;
        }
    }

    if let Some(tidy) = parsed.tidy {
        if let Some(v) = tidy.boundary_padding {
            config.tidy.boundary_padding = v.max(0.0);
        }
        if let Some(v) = tidy.nested_boundary_spacing {
            config.tidy.nested_boundary_spacing = v.max(0.0);
        }
        if let Some(v) = tidy.node_spacing {
            config.tidy.node_spacing = v.max(0.0);
        }
        if let Some(v) = tidy.min_boundary_width {
            config.tidy.min_boundary_width = v;
        }
        if let Some(v) = tidy.min_boundary_height {
            config.tidy.min_boundary_height = v;
        }
        if let Some(v) = tidy.algorithm {
            config.tidy.algorithm = AlgorithmKind::from_token(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown layout algorithm: {v}"))?;
        }
    }

    if let Some(routing) = parsed.routing {
        if let Some(v) = routing.mode {
            config.routing.mode = v;
        }
        if let Some(v) = routing.handler_side {
            config.routing.handler_side = HandlerSide::from_token(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown handler side: {v}"))?;
        }
        if let Some(v) = routing.handler_position {
            config.routing.handler_position = v.clamp(0.0, 100.0);
        }
        if let Some(v) = routing.max_perpendicular_offset {
            config.routing.max_perpendicular_offset = v.max(0.0);
        }
    }

    if let Some(collision) = parsed.collision {
        if let Some(v) = collision.min_clearance {
            config.collision.min_clearance = v.max(0.0);
        }
        if let Some(v) = collision.cell_size.as_ref().and_then(|v| v.as_cell_size()) {
            config.collision.cell_size = v;
        }
        if let Some(v) = collision.spatial_hash_threshold {
            config.collision.spatial_hash_threshold = v;
        }
        if let Some(v) = collision.overlap_passes {
            config.collision.overlap_passes = v;
        }
    }

    if let Some(labels) = parsed.labels {
        if let Some(v) = labels.char_width {
            config.labels.char_width = v;
        }
        if let Some(v) = labels.line_height {
            config.labels.line_height = v;
        }
        if let Some(v) = labels.extra_line_height {
            config.labels.extra_line_height = v;
        }
        if let Some(v) = labels.padding_x {
            config.labels.padding_x = v;
        }
        if let Some(v) = labels.padding_y {
            config.labels.padding_y = v;
        }
        if let Some(v) = labels.anchor_fraction {
            config.labels.anchor_fraction = v.clamp(0.0, 1.0);
        }
        if let Some(v) = labels.rotate_with_edge {
            config.labels.rotate_with_edge = v;
        }
        if let Some(v) = labels.min_label_separation {
            config.labels.min_label_separation = v.max(0.0);
        }
        if let Some(v) = labels.max_iterations {
            config.labels.max_iterations = v;
        }
        if let Some(v) = labels.push_factor {
            config.labels.push_factor = v;
        }
        if let Some(v) = labels.max_push {
            config.labels.max_push = v;
        }
    }

    Ok(config)
}
