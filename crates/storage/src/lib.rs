//! Durable state shared between invocations of one cycle.
//!
//! - [`ProbabilityCache`]: neighborhood probabilities keyed by valid time,
//!   written per forecast hour and consolidated per cycle
//! - [`TableStore`]: calibration and correction tables with an LRU cache
//! - [`GridMapStore`]: serialized source-to-target grid maps
//! - [`ProductWriter`]: encoded GRIB2 products, also read back on restart
//!
//! Every write goes through [`write_atomic`], so an interrupted job never
//! leaves a truncated file behind.

pub mod atomic;
pub mod error;
pub mod map_store;
pub mod probability_cache;
pub mod products;
pub mod table_store;

pub use atomic::write_atomic;
pub use error::{Result, StorageError};
pub use map_store::GridMapStore;
pub use probability_cache::{ProbabilityCache, ProbabilityFields};
pub use products::{Product, ProductWriter, HAZARD_CATEGORY};
pub use table_store::{TableStore, TableStoreStats};
