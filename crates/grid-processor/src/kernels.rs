//! Circular structuring elements for neighborhood dilation.

use crate::error::{GridProcessorError, Result};

/// Neighborhood radius of influence in kilometres.
pub const NEIGHBORHOOD_KM: f64 = 40.0;

/// Column half-width of each row of the deployed 25 x 25 disc.
const DISC_25: [usize; 25] = [
    0, 4, 6, 7, 8, 9, 10, 10, 11, 11, 11, 11, 12, 11, 11, 11, 11, 10, 10, 9, 8, 7, 6, 4, 0,
];

/// Radius of influence in grid cells for a grid spacing in km.
pub fn radius_of_influence(dx_km: f64) -> f64 {
    NEIGHBORHOOD_KM / dx_km
}

/// Kernel radius for a grid spacing: the radius of influence rounded half to even.
pub fn radius_for_spacing(dx_km: f64) -> u32 {
    radius_of_influence(dx_km).round_ties_even() as u32
}

/// A symmetric footprint described by the column half-width of each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    radius: u32,
    half_widths: Vec<usize>,
}

impl StructuringElement {
    /// Tabulated element for `radius`. Radii 12 and 13 share one footprint.
    pub fn for_radius(radius: u32) -> Result<Self> {
        let half_widths = match radius {
            0 => vec![0],
            12 | 13 => DISC_25.to_vec(),
            other => return Err(GridProcessorError::UnsupportedRadius(other)),
        };
        Ok(Self {
            radius,
            half_widths,
        })
    }

    pub fn for_spacing(dx_km: f64) -> Result<Self> {
        Self::for_radius(radius_for_spacing(dx_km))
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Rows above (and below) the centre row.
    pub fn reach(&self) -> usize {
        self.half_widths.len() / 2
    }

    /// (row offset, column half-width) for each footprint row.
    pub fn rows(&self) -> impl Iterator<Item = (isize, usize)> + '_ {
        let reach = self.reach() as isize;
        self.half_widths
            .iter()
            .enumerate()
            .map(move |(i, &w)| (i as isize - reach, w))
    }

    /// Number of cells in the footprint.
    pub fn cell_count(&self) -> usize {
        self.half_widths.iter().map(|w| 2 * w + 1).sum()
    }
}
