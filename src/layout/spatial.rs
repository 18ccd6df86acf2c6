use std::collections::{HashMap, HashSet};

use crate::config::CellSize;

use super::types::BoundingBox;

/// Smallest cell the grid accepts; tiny cells explode the cell count.
const MIN_CELL_SIZE: f32 = 16.0;
/// Boxes spanning more cells than this live in the oversized list instead.
const MAX_CELLS_PER_BOX: i64 = 1024;

/// Uniform-grid index over boxes.
///
/// `query` returns a candidate set: every box sharing at least one cell with
/// the probe. Callers re-test candidates exactly. Boxes much larger than a
/// cell are not filed per cell; every query returns them.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell: f32,
    /// Maps grid cell (ix, iy) to indices into `boxes`.
    cells: HashMap<(i32, i32), Vec<usize>>,
    oversized: Vec<usize>,
    boxes: Vec<BoundingBox>,
}

impl SpatialHash {
    pub fn new(cell: f32) -> Self {
        Self {
            cell: sanitize_cell(cell),
            cells: HashMap::new(),
            oversized: Vec::new(),
            boxes: Vec::new(),
        }
    }

    pub fn with_boxes(cell: f32, boxes: &[BoundingBox]) -> Self {
        let mut grid = Self::new(cell);
        for b in boxes {
            grid.insert(b.clone());
        }
        grid
    }

    pub fn cell_size(&self) -> f32 {
        self.cell
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn get(&self, idx: usize) -> Option<&BoundingBox> {
        self.boxes.get(idx)
    }

    /// File the box into every cell it touches and return its index.
    pub fn insert(&mut self, bbox: BoundingBox) -> usize {
        let idx = self.boxes.len();
        let range = self.cell_range(&bbox);
        if cell_count(range) > MAX_CELLS_PER_BOX {
            self.oversized.push(idx);
        } else {
            let (x0, y0, x1, y1) = range;
            for ix in x0..=x1 {
                for iy in y0..=y1 {
                    self.cells.entry((ix, iy)).or_default().push(idx);
                }
            }
        }
        self.boxes.push(bbox);
        idx
    }

    /// Indices of boxes sharing a cell with `probe`, ascending and unique.
    /// Oversized boxes are always included, and an oversized probe gets
    /// every box.
    pub fn query(&self, probe: &BoundingBox) -> Vec<usize> {
        let range = self.cell_range(probe);
        if cell_count(range) > MAX_CELLS_PER_BOX {
            return (0..self.boxes.len()).collect();
        }
        let (x0, y0, x1, y1) = range;
        let mut seen = HashSet::new();
        let mut hits: Vec<usize> = (x0..=x1)
            .flat_map(|ix| (y0..=y1).map(move |iy| (ix, iy)))
            .flat_map(|key| {
                self.cells
                    .get(&key)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            })
            .chain(self.oversized.iter().copied())
            .filter(|idx| seen.insert(*idx))
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Drop everything and re-populate from scratch.
    pub fn rebuild(&mut self, cell: f32, boxes: &[BoundingBox]) {
        self.cell = sanitize_cell(cell);
        self.cells.clear();
        self.oversized.clear();
        self.boxes.clear();
        for b in boxes {
            self.insert(b.clone());
        }
    }

    fn cell_range(&self, rect: &BoundingBox) -> (i32, i32, i32, i32) {
        let x0 = (rect.x / self.cell).floor() as i32;
        let y0 = (rect.y / self.cell).floor() as i32;
        let x1 = (rect.right() / self.cell).floor() as i32;
        let y1 = (rect.bottom() / self.cell).floor() as i32;
        (x0, y0, x1.max(x0), y1.max(y0))
    }
}

fn cell_count((x0, y0, x1, y1): (i32, i32, i32, i32)) -> i64 {
    (i64::from(x1) - i64::from(x0) + 1) * (i64::from(y1) - i64::from(y0) + 1)
}

fn sanitize_cell(cell: f32) -> f32 {
    if cell.is_finite() {
        cell.max(MIN_CELL_SIZE)
    } else {
        MIN_CELL_SIZE
    }
}

/// Largest box dimension plus clearance, so a typical query touches O(1) cells.
pub fn auto_cell_size(boxes: &[BoundingBox], clearance: f32) -> f32 {
    let largest = boxes
        .iter()
        .map(|b| b.width.max(b.height))
        .filter(|v| v.is_finite())
        .fold(0.0, f32::max);
    sanitize_cell(largest + clearance.max(0.0))
}

pub fn resolve_cell_size(setting: CellSize, boxes: &[BoundingBox], clearance: f32) -> f32 {
    match setting {
        CellSize::Auto => auto_cell_size(boxes, clearance),
        CellSize::Fixed(size) => sanitize_cell(size),
    }
}

/// Candidate pairs `(i, j)` with `i < j` whose boxes share a cell.
pub fn candidate_pairs(grid: &SpatialHash) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, b) in grid.boxes().iter().enumerate() {
        for j in grid.query(b) {
            if j > i {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
