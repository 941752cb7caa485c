//! Grid remapping and neighborhood probabilities for ensemble guidance.
//!
//! Model member grids are turned into probability fields on the 40 km
//! verification grid:
//!
//! ```text
//! member fields (3 km)
//!      │
//!      ▼
//! MemberMask::apply ── threshold, dilate with a disc kernel
//!      │
//!      ▼
//! RollingMax ── trailing 4-hour maximum per member
//!      │
//!      ▼
//! NeighborhoodProbability::compute
//!      ├─► ensemble mean in percent
//!      ├─► NaN-preserving Gaussian smoothing
//!      └─► NearestInterpolator onto the verification grid
//! ```
//!
//! The thunder predictors aggregate fine grids with a [`GridMap`] instead,
//! taking the maximum of every native point that falls in a 40 km cell.

pub mod error;
pub mod kdtree;
pub mod kernels;
pub mod neighborhood;
pub mod remap;
pub mod smoothing;
pub mod thunder;

// Re-export commonly used types at crate root
pub use error::{GridProcessorError, Result};
pub use kdtree::KdTree;
pub use kernels::{radius_for_spacing, radius_of_influence, StructuringElement};
pub use neighborhood::{
    dilate, ensemble_mean_percent, threshold, MemberMask, NeighborhoodProbability, RollingMax,
};
pub use remap::{GridMap, NearestInterpolator, Reducer};
pub use smoothing::{gaussian_filter, nan_preserving_gaussian};
pub use thunder::{thunder_probability, PredictorHour, ThunderMember, ThunderProduct};
