//! Nearest-neighbour remapping between grids.
//!
//! Two directions are supported:
//!
//! - [`GridMap`] sends every source point to its nearest target cell and
//!   resolves collisions with a [`Reducer`]. Used to aggregate fine model
//!   grids onto the 40 km grid.
//! - [`NearestInterpolator`] gives every target cell the value of its nearest
//!   source point. Used to regrid smoothed probabilities.
//!
//! Both are computed once per grid pair and serialize to JSON for reuse.

use calib_common::{Field2D, GridCoords};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::kdtree::KdTree;

const UNMAPPED: u32 = u32::MAX;

/// How several source values landing on one target cell are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Max,
    Min,
}

impl Reducer {
    fn combine(self, current: f32, value: f32) -> f32 {
        // f32::max/min return the non-NaN operand.
        match self {
            Reducer::Max => current.max(value),
            Reducer::Min => current.min(value),
        }
    }
}

/// Source-to-target index map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    source_shape: (usize, usize),
    target_shape: (usize, usize),
    /// Target cell per source point, row-major.
    targets: Vec<u32>,
}

impl GridMap {
    /// Map each source point to its nearest target point.
    pub fn compute(source: &GridCoords, target: &GridCoords) -> Result<Self> {
        let tree = KdTree::new(target.lats(), target.lons());
        if tree.is_empty() {
            return Err(GridProcessorError::EmptyGrid);
        }
        let targets: Vec<u32> = source
            .lats()
            .iter()
            .zip(source.lons())
            .map(|(&lat, &lon)| tree.nearest(lat, lon).map_or(UNMAPPED, |i| i as u32))
            .collect();
        debug!(
            source_points = source.len(),
            target_points = target.len(),
            "Computed grid map"
        );
        Ok(Self {
            source_shape: source.shape(),
            target_shape: target.shape(),
            targets,
        })
    }

    /// Source shape as (rows, cols).
    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    /// Target shape as (rows, cols).
    pub fn target_shape(&self) -> (usize, usize) {
        self.target_shape
    }

    /// Target index for a flattened source index.
    pub fn target_of(&self, source_index: usize) -> Option<usize> {
        match self.targets.get(source_index) {
            Some(&t) if t != UNMAPPED => Some(t as usize),
            _ => None,
        }
    }

    /// Project a source field onto the target grid. Cells no source point
    /// reaches, and cells that only received NaN, are 0.
    pub fn apply(&self, field: &Field2D, reducer: Reducer) -> Result<Field2D> {
        if field.shape() != self.source_shape {
            return Err(GridProcessorError::map_mismatch(
                self.targets.len(),
                field.len(),
            ));
        }
        let (rows, cols) = self.target_shape;
        let mut out = vec![f32::NAN; rows * cols];
        for (&target, &value) in self.targets.iter().zip(field.data()) {
            if target == UNMAPPED {
                continue;
            }
            let cell = &mut out[target as usize];
            *cell = reducer.combine(*cell, value);
        }
        for v in out.iter_mut().filter(|v| v.is_nan()) {
            *v = 0.0;
        }
        Ok(Field2D::new(cols, rows, out)?)
    }
}

/// Target-to-source nearest-point map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestInterpolator {
    source_shape: (usize, usize),
    target_shape: (usize, usize),
    /// Source point per target cell, row-major.
    sources: Vec<u32>,
}

impl NearestInterpolator {
    pub fn compute(source: &GridCoords, target: &GridCoords) -> Result<Self> {
        let tree = KdTree::new(source.lats(), source.lons());
        if tree.is_empty() {
            return Err(GridProcessorError::EmptyGrid);
        }
        let sources: Vec<u32> = target
            .lats()
            .iter()
            .zip(target.lons())
            .map(|(&lat, &lon)| tree.nearest(lat, lon).map_or(UNMAPPED, |i| i as u32))
            .collect();
        debug!(
            source_points = source.len(),
            target_points = target.len(),
            "Computed nearest interpolator"
        );
        Ok(Self {
            source_shape: source.shape(),
            target_shape: target.shape(),
            sources,
        })
    }

    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    pub fn target_shape(&self) -> (usize, usize) {
        self.target_shape
    }

    /// Sample `field` at each target cell's nearest source point.
    pub fn apply(&self, field: &Field2D) -> Result<Field2D> {
        if field.shape() != self.source_shape {
            return Err(GridProcessorError::map_mismatch(
                self.source_shape.0 * self.source_shape.1,
                field.len(),
            ));
        }
        let data = field.data();
        let out: Vec<f32> = self
            .sources
            .iter()
            .map(|&s| if s == UNMAPPED { f32::NAN } else { data[s as usize] })
            .collect();
        let (rows, cols) = self.target_shape;
        Ok(Field2D::new(cols, rows, out)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::regular_latlon;

    fn grid(width: usize, height: usize, lat0: f64, lon0: f64, step: f64) -> GridCoords {
        let (lats, lons) = regular_latlon(width, height, lat0, lon0, step);
        GridCoords::new(width, height, lats, lons).unwrap()
    }

    #[test]
    fn test_fine_to_coarse_uses_reducer() {
        // 4x4 half-degree grid onto the 2x2 one-degree grid it nests in.
        let fine = grid(4, 4, 30.0, -100.0, 0.5);
        let coarse = grid(2, 2, 30.25, -99.75, 1.0);
        let map = GridMap::compute(&fine, &coarse).unwrap();

        let mut values = vec![0.0f32; 16];
        values[0] = 3.0;
        values[1] = 7.0;
        values[5] = -2.0;
        let field = Field2D::new(4, 4, values).unwrap();

        let max = map.apply(&field, Reducer::Max).unwrap();
        assert_eq!(max.shape(), (2, 2));
        assert_eq!(max.get(0, 0), Some(7.0));
        assert_eq!(max.get(1, 1), Some(0.0));

        let min = map.apply(&field, Reducer::Min).unwrap();
        assert_eq!(min.get(0, 0), Some(-2.0));
    }

    #[test]
    fn test_unreached_cells_are_zero() {
        let source = grid(1, 1, 30.0, -100.0, 1.0);
        let target = grid(3, 1, 30.0, -100.0, 1.0);
        let map = GridMap::compute(&source, &target).unwrap();
        let out = map
            .apply(&Field2D::filled(1, 1, 5.0), Reducer::Max)
            .unwrap();
        assert_eq!(out.data(), &[5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let coords = grid(3, 3, 30.0, -100.0, 1.0);
        let map = GridMap::compute(&coords, &coords).unwrap();
        let err = map.apply(&Field2D::zeros(2, 2), Reducer::Max).unwrap_err();
        assert!(matches!(err, GridProcessorError::MapMismatch { expected: 9, actual: 4 }));
    }

    #[test]
    fn test_interpolator_takes_nearest_source() {
        let source = grid(2, 1, 30.0, -100.0, 1.0);
        let target = grid(4, 1, 30.0, -100.2, 0.4);
        let interp = NearestInterpolator::compute(&source, &target).unwrap();
        let out = interp
            .apply(&Field2D::new(2, 1, vec![1.0, 2.0]).unwrap())
            .unwrap();
        // Target longitudes -100.2, -99.8, -99.4, -99.0.
        assert_eq!(out.data(), &[1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_grid_map_serializes() {
        let coords = grid(3, 2, 30.0, -100.0, 1.0);
        let map = GridMap::compute(&coords, &coords).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        let back: GridMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
        assert_eq!(back.target_of(4), Some(4));
    }
}
