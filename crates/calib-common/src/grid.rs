//! Gridded value containers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// A 2-D field of `f32` values stored row-major.
///
/// Row `r` occupies `data[r * nx .. (r + 1) * nx]`. Missing values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldRepr", into = "FieldRepr")]
pub struct Field2D {
    nx: usize,
    ny: usize,
    data: Vec<f32>,
}

/// Serialized form. NaN is stored as `null` so JSON round-trips.
#[derive(Serialize, Deserialize)]
struct FieldRepr {
    nx: usize,
    ny: usize,
    data: Vec<Option<f32>>,
}

impl TryFrom<FieldRepr> for Field2D {
    type Error = CommonError;

    fn try_from(repr: FieldRepr) -> Result<Self, Self::Error> {
        let data = repr
            .data
            .into_iter()
            .map(|v| v.unwrap_or(f32::NAN))
            .collect();
        Field2D::new(repr.nx, repr.ny, data)
    }
}

impl From<Field2D> for FieldRepr {
    fn from(field: Field2D) -> Self {
        FieldRepr {
            nx: field.nx,
            ny: field.ny,
            data: field
                .data
                .into_iter()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        }
    }
}

impl Field2D {
    /// Wrap row-major data. Fails if `data.len() != nx * ny`.
    pub fn new(nx: usize, ny: usize, data: Vec<f32>) -> CommonResult<Self> {
        if data.len() != nx * ny {
            return Err(CommonError::invalid_dimensions(format!(
                "{} values cannot fill a {}x{} grid",
                data.len(),
                ny,
                nx
            )));
        }
        Ok(Self { nx, ny, data })
    }

    pub fn filled(nx: usize, ny: usize, value: f32) -> Self {
        Self {
            nx,
            ny,
            data: vec![value; nx * ny],
        }
    }

    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self::filled(nx, ny, 0.0)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Shape as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.ny && col < self.nx {
            Some(self.data[row * self.nx + col])
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        if row < self.ny && col < self.nx {
            self.data[row * self.nx + col] = value;
        }
    }

    /// Fail unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &Field2D) -> CommonResult<()> {
        if self.shape() != other.shape() {
            return Err(CommonError::shape_mismatch(self.shape(), other.shape()));
        }
        Ok(())
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Field2D {
        Field2D {
            nx: self.nx,
            ny: self.ny,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two equally shaped fields cell by cell.
    pub fn zip_with(&self, other: &Field2D, f: impl Fn(f32, f32) -> f32) -> CommonResult<Field2D> {
        self.ensure_same_shape(other)?;
        Ok(Field2D {
            nx: self.nx,
            ny: self.ny,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Element-wise maximum. NaN loses to any number.
    pub fn max_with(&self, other: &Field2D) -> CommonResult<Field2D> {
        self.zip_with(other, f32::max)
    }

    /// Element-wise minimum. NaN loses to any number.
    pub fn min_with(&self, other: &Field2D) -> CommonResult<Field2D> {
        self.zip_with(other, f32::min)
    }

    /// Element-wise maximum over a non-empty set of fields.
    pub fn maximum_of<'a, I>(fields: I) -> CommonResult<Field2D>
    where
        I: IntoIterator<Item = &'a Field2D>,
    {
        let mut iter = fields.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CommonError::invalid_dimensions("maximum of zero fields"))?;
        iter.try_fold(first.clone(), |acc, field| acc.max_with(field))
    }

    /// Element-wise sum over a non-empty set of fields.
    pub fn sum_of<'a, I>(fields: I) -> CommonResult<Field2D>
    where
        I: IntoIterator<Item = &'a Field2D>,
    {
        let mut iter = fields.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CommonError::invalid_dimensions("sum of zero fields"))?;
        iter.try_fold(first.clone(), |acc, field| acc.zip_with(field, |a, b| a + b))
    }

    /// Reverse the row order (north-up to south-up and back).
    pub fn flip_rows(&self) -> Field2D {
        let mut data = Vec::with_capacity(self.data.len());
        for row in (0..self.ny).rev() {
            data.extend_from_slice(&self.data[row * self.nx..(row + 1) * self.nx]);
        }
        Field2D {
            nx: self.nx,
            ny: self.ny,
            data,
        }
    }

    /// Replace NaN with `value`.
    pub fn fill_nan(&self, value: f32) -> Field2D {
        self.map(|v| if v.is_nan() { value } else { v })
    }

    /// Largest non-NaN value, if any.
    pub fn max_value(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f32| a.max(v))))
    }

    pub fn all_nan(&self) -> bool {
        self.data.iter().all(|v| v.is_nan())
    }
}

/// Latitude/longitude of every grid point, in storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoords {
    nx: usize,
    ny: usize,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl GridCoords {
    pub fn new(nx: usize, ny: usize, lats: Vec<f64>, lons: Vec<f64>) -> CommonResult<Self> {
        if lats.len() != nx * ny || lons.len() != nx * ny {
            return Err(CommonError::invalid_dimensions(format!(
                "lat/lon arrays of {}/{} points cannot describe a {}x{} grid",
                lats.len(),
                lons.len(),
                ny,
                nx
            )));
        }
        Ok(Self { nx, ny, lats, lons })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// (lat, lon) of the point at flat index `idx`.
    pub fn point(&self, idx: usize) -> (f64, f64) {
        (self.lats[idx], self.lons[idx])
    }
}

/// Values on a grid, together with the grid's coordinates.
#[derive(Debug, Clone)]
pub struct ForecastGrid {
    values: Field2D,
    coords: Arc<GridCoords>,
}

impl ForecastGrid {
    /// Pair values with coordinates, rejecting mismatched shapes.
    pub fn new(values: Field2D, coords: Arc<GridCoords>) -> CommonResult<Self> {
        if values.shape() != coords.shape() {
            return Err(CommonError::shape_mismatch(coords.shape(), values.shape()));
        }
        Ok(Self { values, coords })
    }

    pub fn values(&self) -> &Field2D {
        &self.values
    }

    pub fn coords(&self) -> &Arc<GridCoords> {
        &self.coords
    }

    pub fn into_values(self) -> Field2D {
        self.values
    }
}
