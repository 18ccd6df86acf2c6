//! Recursive auto-layout over the boundary tree.
//!
//! Boundaries are visited innermost first. Each boundary's direct children
//! are handed to a pluggable [`LayoutAlgorithm`] (or [`AsyncLayoutAlgorithm`]),
//! normalised so they start at the configured padding, and the boundary is
//! resized to fit them before its own parent is considered.

use std::collections::{BTreeMap, HashMap};

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::config::{AlgorithmKind, Config};
use crate::ir::{Edge, Node, Point, SanitizeReport, sanitize_nodes};

use super::bounds::{dimensions_of, extent_of};
use super::error::{LayoutError, Result};
use super::hierarchy::Hierarchy;
use super::types::BoundingBox;

/// Position changes at or below this do not count as a move.
const MOVE_EPS: f32 = 1e-3;

/// Positions a boundary's direct children. Returned nodes must carry the
/// same ids as `children`; only their positions are read back.
pub trait LayoutAlgorithm {
    fn layout(&self, children: &[Node], edges: &[Edge], config: &Config) -> Result<Vec<Node>>;
}

/// Same contract as [`LayoutAlgorithm`] for engines that run asynchronously.
pub trait AsyncLayoutAlgorithm {
    fn layout_async<'a>(
        &'a self,
        children: &'a [Node],
        edges: &'a [Edge],
        config: &'a Config,
    ) -> BoxFuture<'a, Result<Vec<Node>>>;
}

impl<T> AsyncLayoutAlgorithm for T
where
    T: LayoutAlgorithm + Sync,
{
    fn layout_async<'a>(
        &'a self,
        children: &'a [Node],
        edges: &'a [Edge],
        config: &'a Config,
    ) -> BoxFuture<'a, Result<Vec<Node>>> {
        futures::future::ready(self.layout(children, edges, config)).boxed()
    }
}

fn sizes(children: &[Node], config: &Config) -> Vec<(f32, f32)> {
    children
        .iter()
        .map(|node| {
            let dims = dimensions_of(node, &config.dimensions);
            (dims.width, dims.height)
        })
        .collect()
}

/// Row-major grid over children sorted by id, `ceil(sqrt(n))` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridLayout;

impl LayoutAlgorithm for GridLayout {
    fn layout(&self, children: &[Node], _edges: &[Edge], config: &Config) -> Result<Vec<Node>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let spacing = config.tidy.node_spacing.max(0.0);
        let dims = sizes(children, config);
        let mut order: Vec<usize> = (0..children.len()).collect();
        order.sort_by(|a, b| children[*a].id.cmp(&children[*b].id));

        let cols = (children.len() as f32).sqrt().ceil().max(1.0) as usize;
        let rows = children.len().div_ceil(cols);
        let mut col_width = vec![0.0f32; cols];
        let mut row_height = vec![0.0f32; rows];
        for (slot, idx) in order.iter().enumerate() {
            let (w, h) = dims[*idx];
            col_width[slot % cols] = col_width[slot % cols].max(w);
            row_height[slot / cols] = row_height[slot / cols].max(h);
        }
        let col_x: Vec<f32> = col_width
            .iter()
            .scan(0.0, |x, w| {
                let start = *x;
                *x += w + spacing;
                Some(start)
            })
            .collect();
        let row_y: Vec<f32> = row_height
            .iter()
            .scan(0.0, |y, h| {
                let start = *y;
                *y += h + spacing;
                Some(start)
            })
            .collect();

        let mut out = children.to_vec();
        for (slot, idx) in order.iter().enumerate() {
            out[*idx].position = Point::new(col_x[slot % cols], row_y[slot / cols]);
        }
        Ok(out)
    }
}

/// Longest-path ranks over the edges between children, ranks laid out left
/// to right and stacked top to bottom by id within a rank. Cycles are broken
/// at the smallest remaining id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout;

impl LayeredLayout {
    fn ranks(children: &[Node], edges: &[Edge]) -> Vec<usize> {
        let index: HashMap<&str, usize> = children
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.as_str(), idx))
            .collect();
        let n = children.len();
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in edges {
            let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
                continue;
            };
            if s != t && !succs[s].contains(&t) {
                succs[s].push(t);
                preds[t].push(s);
            }
        }

        let mut indegree: Vec<usize> = preds.iter().map(Vec::len).collect();
        let mut done = vec![false; n];
        let mut rank = vec![0usize; n];
        let mut by_id: Vec<usize> = (0..n).collect();
        by_id.sort_by(|a, b| children[*a].id.cmp(&children[*b].id));

        for _ in 0..n {
            let next = by_id
                .iter()
                .copied()
                .find(|&v| !done[v] && indegree[v] == 0)
                .or_else(|| by_id.iter().copied().find(|&v| !done[v]));
            let Some(v) = next else {
                break;
            };
            done[v] = true;
            rank[v] = preds[v]
                .iter()
                .filter(|&&u| done[u] && u != v)
                .map(|&u| rank[u] + 1)
                .max()
                .unwrap_or(0);
            for &w in &succs[v] {
                indegree[w] = indegree[w].saturating_sub(1);
            }
        }
        rank
    }
}

impl LayoutAlgorithm for LayeredLayout {
    fn layout(&self, children: &[Node], edges: &[Edge], config: &Config) -> Result<Vec<Node>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let spacing = config.tidy.node_spacing.max(0.0);
        let dims = sizes(children, config);
        let rank = Self::ranks(children, edges);

        let mut layers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, r) in rank.iter().enumerate() {
            layers.entry(*r).or_default().push(idx);
        }
        let mut out = children.to_vec();
        let mut x = 0.0;
        for members in layers.values_mut() {
            members.sort_by(|a, b| children[*a].id.cmp(&children[*b].id));
            let mut y = 0.0;
            let mut layer_width = 0.0f32;
            for &idx in members.iter() {
                let (w, h) = dims[idx];
                out[idx].position = Point::new(x, y);
                y += h + spacing;
                layer_width = layer_width.max(w);
            }
            x += layer_width + spacing;
        }
        Ok(out)
    }
}

pub fn layout_algorithm(kind: AlgorithmKind) -> Box<dyn LayoutAlgorithm + Send + Sync> {
    match kind {
        AlgorithmKind::Grid => Box::new(GridLayout),
        AlgorithmKind::Layered => Box::new(LayeredLayout),
    }
}

impl LayoutAlgorithm for Box<dyn LayoutAlgorithm + Send + Sync> {
    fn layout(&self, children: &[Node], edges: &[Edge], config: &Config) -> Result<Vec<Node>> {
        (**self).layout(children, edges, config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TidyStats {
    pub boundaries_processed: usize,
    pub devices_repositioned: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TidyResult {
    pub nodes: Vec<Node>,
    pub stats: TidyStats,
    pub sanitized: SanitizeReport,
}

/// Boundaries below `root` (all root-level boundaries for `None`), children
/// before parents.
fn post_order<'a>(hierarchy: &Hierarchy<'a>, root: Option<&'a str>) -> Vec<&'a str> {
    fn visit<'a>(hierarchy: &Hierarchy<'a>, id: &'a str, out: &mut Vec<&'a str>) {
        for child in hierarchy.children_of(Some(id)) {
            if child.is_boundary() {
                visit(hierarchy, child.id.as_str(), out);
            }
        }
        out.push(id);
    }

    let mut out = Vec::new();
    match root {
        Some(root) => visit(hierarchy, root, &mut out),
        None => {
            for node in hierarchy.children_of(None) {
                if node.is_boundary() {
                    visit(hierarchy, node.id.as_str(), &mut out);
                }
            }
        }
    }
    out
}

/// The direct child of `boundary` that is `id` or contains it.
fn lift_to_child<'a>(hierarchy: &Hierarchy<'a>, id: &str, boundary: &str) -> Option<&'a str> {
    let own = hierarchy.node(id)?.id.as_str();
    std::iter::once(own)
        .chain(hierarchy.ancestor_chain(id))
        .find(|candidate| hierarchy.parent_of(candidate) == Some(boundary))
}

/// Edges between descendants of `boundary`, re-targeted at its direct children.
fn lifted_edges(hierarchy: &Hierarchy<'_>, edges: &[Edge], boundary: &str) -> Vec<Edge> {
    edges
        .iter()
        .filter_map(|edge| {
            let source = lift_to_child(hierarchy, &edge.source, boundary)?;
            let target = lift_to_child(hierarchy, &edge.target, boundary)?;
            (source != target).then(|| Edge::new(edge.id.clone(), source, target))
        })
        .collect()
}

struct Tidier<'c> {
    config: &'c Config,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    stats: TidyStats,
}

impl<'c> Tidier<'c> {
    fn new(nodes: Vec<Node>, config: &'c Config) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(idx);
        }
        Self {
            config,
            nodes,
            index,
            stats: TidyStats::default(),
        }
    }

    fn apply(&mut self, boundary: &str, nested: bool, child_ids: &[&str], positioned: Vec<Node>) -> Result<()> {
        let by_id: HashMap<&str, Point> = positioned
            .iter()
            .map(|node| (node.id.as_str(), node.position))
            .collect();
        if positioned.len() != child_ids.len() || child_ids.iter().any(|id| !by_id.contains_key(id)) {
            return Err(LayoutError::ChildCountMismatch {
                boundary: boundary.to_string(),
                expected: child_ids.len(),
                returned: positioned.len(),
            });
        }

        let boxes: Vec<BoundingBox> = child_ids
            .iter()
            .filter_map(|id| {
                let node = &self.nodes[*self.index.get(*id)?];
                let dims = dimensions_of(node, &self.config.dimensions);
                let pos = by_id.get(id)?;
                Some(BoundingBox::new(*id, pos.x, pos.y, dims.width, dims.height))
            })
            .collect();
        let Some((min_x, min_y, max_x, max_y)) = extent_of(&boxes) else {
            return Ok(());
        };

        let tidy = &self.config.tidy;
        let padding = tidy.boundary_padding.max(0.0);
        let (dx, dy) = (padding - min_x, padding - min_y);
        for bbox in &boxes {
            let Some(&idx) = self.index.get(&bbox.id) else {
                continue;
            };
            let node = &mut self.nodes[idx];
            let next = Point::new(bbox.x + dx, bbox.y + dy);
            let moved = (node.position.x - next.x).abs() > MOVE_EPS || (node.position.y - next.y).abs() > MOVE_EPS;
            if moved && node.is_device() {
                self.stats.devices_repositioned += 1;
            }
            node.position = next;
        }

        let extra = if nested { tidy.nested_boundary_spacing.max(0.0) } else { 0.0 };
        let width = ((max_x - min_x) + padding * 2.0 + extra).max(tidy.min_boundary_width);
        let height = ((max_y - min_y) + padding * 2.0 + extra).max(tidy.min_boundary_height);
        if let Some(&idx) = self.index.get(boundary) {
            let node = &mut self.nodes[idx];
            node.width = Some(width);
            node.height = Some(height);
            node.measured = None;
        }
        self.stats.boundaries_processed += 1;
        tracing::debug!(boundary, children = child_ids.len(), width, height, "tidied boundary");
        Ok(())
    }
}

async fn run_tidy<A>(
    nodes: &[Node],
    edges: &[Edge],
    root: Option<&str>,
    algorithm: &A,
    config: &Config,
) -> Result<TidyResult>
where
    A: AsyncLayoutAlgorithm + ?Sized,
{
    let mut working = nodes.to_vec();
    let sanitized = sanitize_nodes(&mut working);
    let snapshot = working.clone();
    let hierarchy = Hierarchy::new(&snapshot);

    let root = match root {
        Some(id) => {
            let node = hierarchy.node(id).ok_or_else(|| LayoutError::UnknownBoundary { id: id.to_string() })?;
            if !node.is_boundary() {
                return Err(LayoutError::NotABoundary { id: id.to_string() });
            }
            Some(node.id.as_str())
        }
        None => None,
    };

    let order = post_order(&hierarchy, root);
    let mut tidier = Tidier::new(working, config);
    for boundary in order {
        let child_ids: Vec<&str> = hierarchy
            .children_of(Some(boundary))
            .into_iter()
            .map(|node| node.id.as_str())
            .collect();
        if child_ids.is_empty() {
            continue;
        }
        let children: Vec<Node> = child_ids
            .iter()
            .filter_map(|id| tidier.index.get(*id).map(|&idx| tidier.nodes[idx].clone()))
            .collect();
        let local_edges = lifted_edges(&hierarchy, edges, boundary);
        let positioned = algorithm
            .layout_async(&children, &local_edges, config)
            .await
            .map_err(|err| LayoutError::AlgorithmFailed {
                boundary: boundary.to_string(),
                message: err.to_string(),
            })?;
        let nested = hierarchy.parent_of(boundary).is_some();
        tidier.apply(boundary, nested, &child_ids, positioned)?;
    }

    Ok(TidyResult {
        nodes: tidier.nodes,
        stats: tidier.stats,
        sanitized,
    })
}

/// Tidy every boundary tree in the collection. Root-level nodes keep their
/// positions.
pub async fn auto_tidy_async<A>(nodes: &[Node], edges: &[Edge], algorithm: &A, config: &Config) -> Result<TidyResult>
where
    A: AsyncLayoutAlgorithm + ?Sized,
{
    run_tidy(nodes, edges, None, algorithm, config).await
}

/// Tidy one boundary and everything nested inside it.
pub async fn auto_tidy_boundary_async<A>(
    nodes: &[Node],
    edges: &[Edge],
    boundary_id: &str,
    algorithm: &A,
    config: &Config,
) -> Result<TidyResult>
where
    A: AsyncLayoutAlgorithm + ?Sized,
{
    run_tidy(nodes, edges, Some(boundary_id), algorithm, config).await
}

pub fn auto_tidy<A>(nodes: &[Node], edges: &[Edge], algorithm: &A, config: &Config) -> Result<TidyResult>
where
    A: AsyncLayoutAlgorithm + ?Sized,
{
    futures::executor::block_on(auto_tidy_async(nodes, edges, algorithm, config))
}

pub fn auto_tidy_boundary<A>(
    nodes: &[Node],
    edges: &[Edge],
    boundary_id: &str,
    algorithm: &A,
    config: &Config,
) -> Result<TidyResult>
where
    A: AsyncLayoutAlgorithm + ?Sized,
{
    futures::executor::block_on(auto_tidy_boundary_async(nodes, edges, boundary_id, algorithm, config))
}
