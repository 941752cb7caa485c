//! Neighborhood probabilities from ensemble member fields.
//!
//! ```text
//! member field ──► threshold ──► dilate ──► RollingMax (4 h)
//!                                                │
//!            all members ◄───────────────────────┘
//!                 │
//!                 ▼
//!      mean x 100 ──► NaN-preserving Gaussian ──► regrid to 40 km
//! ```

use std::collections::VecDeque;

use calib_common::Field2D;
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::kernels::{radius_of_influence, StructuringElement};
use crate::remap::NearestInterpolator;
use crate::smoothing::nan_preserving_gaussian;

/// Hours reduced by [`RollingMax`] for the 4-hour products.
pub const ROLLING_WINDOW_HOURS: usize = 4;

/// 1 where `value >= threshold`, else 0. NaN gives 0.
pub fn threshold(field: &Field2D, threshold: f32) -> Field2D {
    field.map(|v| if v >= threshold { 1.0 } else { 0.0 })
}

/// Binary dilation of a 0/1 mask with a zero border.
pub fn dilate(mask: &Field2D, element: &StructuringElement) -> Field2D {
    let (nx, ny) = (mask.nx(), mask.ny());
    let mut out = Field2D::zeros(nx, ny);
    let src = mask.data();
    let dst = out.data_mut();
    for row in 0..ny {
        for col in 0..nx {
            if src[row * nx + col] == 0.0 {
                continue;
            }
            for (offset, half_width) in element.rows() {
                let r = row as isize + offset;
                if r < 0 || r >= ny as isize {
                    continue;
                }
                let start = col.saturating_sub(half_width);
                let end = (col + half_width + 1).min(nx);
                let base = r as usize * nx;
                dst[base + start..base + end].fill(1.0);
            }
        }
    }
    out
}

/// Threshold-and-dilate settings for one member.
#[derive(Debug, Clone)]
pub struct MemberMask {
    threshold: f32,
    element: StructuringElement,
}

impl MemberMask {
    /// Mask for a member with exceedance `threshold` on a grid of spacing `dx_km`.
    pub fn new(threshold: f32, dx_km: f64) -> Result<Self> {
        Ok(Self {
            threshold,
            element: StructuringElement::for_spacing(dx_km)?,
        })
    }

    pub fn with_element(threshold: f32, element: StructuringElement) -> Self {
        Self { threshold, element }
    }

    pub fn radius(&self) -> u32 {
        self.element.radius()
    }

    pub fn apply(&self, field: &Field2D) -> Field2D {
        dilate(&threshold(field, self.threshold), &self.element)
    }
}

/// Element-wise maximum over the most recent `window` masks.
#[derive(Debug, Clone)]
pub struct RollingMax {
    window: usize,
    masks: VecDeque<Field2D>,
}

impl RollingMax {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            masks: VecDeque::with_capacity(window),
        }
    }

    /// Push the next hour's mask and return the maximum over the window.
    pub fn push(&mut self, mask: Field2D) -> Result<Field2D> {
        if let Some(front) = self.masks.front() {
            front.ensure_same_shape(&mask)?;
        }
        if self.masks.len() == self.window {
            self.masks.pop_front();
        }
        self.masks.push_back(mask);
        self.current()
    }

    /// Maximum over the masks currently held.
    pub fn current(&self) -> Result<Field2D> {
        if self.masks.is_empty() {
            return Err(GridProcessorError::empty_ensemble("rolling window"));
        }
        Ok(Field2D::maximum_of(self.masks.iter())?)
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.masks.len() == self.window
    }
}

impl Default for RollingMax {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW_HOURS)
    }
}

/// Mean of the member masks, in percent.
pub fn ensemble_mean_percent(masks: &[Field2D]) -> Result<Field2D> {
    let first = masks
        .first()
        .ok_or_else(|| GridProcessorError::empty_ensemble("ensemble mean"))?;
    let scale = 100.0 / masks.len() as f32;
    let sum = Field2D::sum_of(masks.iter())?;
    debug!(members = masks.len(), nx = first.nx(), ny = first.ny(), "Averaged member masks");
    Ok(sum.map(|v| v * scale))
}

/// Smoothing and regridding applied to the ensemble mean.
#[derive(Debug, Clone)]
pub struct NeighborhoodProbability {
    sigma: f64,
    regrid: NearestInterpolator,
}

impl NeighborhoodProbability {
    /// `sigma` is in native grid cells; `regrid` maps the native grid to the
    /// verification grid.
    pub fn new(sigma: f64, regrid: NearestInterpolator) -> Self {
        Self { sigma, regrid }
    }

    /// Smoothing scale taken from the reference member's grid spacing.
    pub fn for_reference_spacing(dx_km: f64, regrid: NearestInterpolator) -> Self {
        Self::new(radius_of_influence(dx_km), regrid)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Probability grid (percent) on the verification grid.
    pub fn compute(&self, member_masks: &[Field2D]) -> Result<Field2D> {
        let mean = ensemble_mean_percent(member_masks)?;
        self.smooth_and_regrid(&mean)
    }

    /// Smooth a percent field and sample it onto the verification grid.
    /// Negative values are treated as missing; missing cells end up as 0.
    pub fn smooth_and_regrid(&self, percent: &Field2D) -> Result<Field2D> {
        let masked = percent.map(|v| if v < 0.0 { f32::NAN } else { v });
        let smoothed = nan_preserving_gaussian(&masked, self.sigma)?.fill_nan(0.0);
        self.regrid.apply(&smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let field = Field2D::new(4, 1, vec![74.9, 75.0, 200.0, f32::NAN]).unwrap();
        assert_eq!(threshold(&field, 75.0).data(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_dilate_radius_zero_is_identity() {
        let mask = Field2D::new(3, 2, vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        let element = StructuringElement::for_radius(0).unwrap();
        assert_eq!(dilate(&mask, &element), mask);
    }

    #[test]
    fn test_dilate_disc_footprint() {
        let mut mask = Field2D::zeros(31, 31);
        mask.set(15, 15, 1.0);
        let element = StructuringElement::for_radius(12).unwrap();
        let out = dilate(&mask, &element);
        let set = out.data().iter().filter(|&&v| v == 1.0).count();
        assert_eq!(set, element.cell_count());
        assert_eq!(out.get(3, 15), Some(1.0));
        assert_eq!(out.get(3, 16), Some(0.0));
        assert_eq!(out.get(15, 27), Some(1.0));
        assert_eq!(out.get(15, 28), Some(0.0));
    }

    #[test]
    fn test_dilate_clips_at_border() {
        let mut mask = Field2D::zeros(5, 5);
        mask.set(0, 0, 1.0);
        let out = dilate(&mask, &StructuringElement::for_radius(12).unwrap());
        // Every cell lies within the disc around the corner.
        assert!(out.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_rolling_max_keeps_last_four() {
        let mut rolling = RollingMax::default();
        let hour = |v: f32| Field2D::filled(2, 1, v);
        rolling.push(hour(1.0)).unwrap();
        for _ in 0..3 {
            rolling.push(hour(0.0)).unwrap();
        }
        assert!(rolling.is_full());
        assert_eq!(rolling.current().unwrap().data(), &[1.0, 1.0]);
        let out = rolling.push(hour(0.0)).unwrap();
        assert_eq!(out.data(), &[0.0, 0.0]);
    }

    #[test]
    fn test_rolling_max_rejects_shape_change() {
        let mut rolling = RollingMax::default();
        rolling.push(Field2D::zeros(2, 2)).unwrap();
        assert!(rolling.push(Field2D::zeros(3, 2)).is_err());
    }

    #[test]
    fn test_ensemble_mean_percent() {
        let a = Field2D::new(2, 1, vec![1.0, 0.0]).unwrap();
        let b = Field2D::new(2, 1, vec![1.0, 1.0]).unwrap();
        let mean = ensemble_mean_percent(&[a, b]).unwrap();
        assert_eq!(mean.data(), &[100.0, 50.0]);
        assert!(ensemble_mean_percent(&[]).is_err());
    }
}
