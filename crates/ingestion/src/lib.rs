//! Ensemble synchronization for the calibrated HREF products.
//!
//! Upstream model runs land on disk at their own pace. This crate knows
//! where each member's files live, decodes them into the fields the
//! calibration needs, and waits, on a bounded retry budget, until enough
//! of the ensemble is present.
//!
//! # Architecture
//!
//! ```text
//!   MemberDescriptor ──► MemberLoader ──► SevereEnsemble / ThunderEnsemble
//!   (paths, lags)        (GRIB2, gzip)            │
//!                                                 ▼
//!   SrefRequest ──► gdlist.csh ──► listings ──► Synchronizer ──► ready / fatal
//! ```
//!
//! Missing files are never an error on their own; only an exhausted retry
//! budget is. Malformed files fail immediately.

pub mod ensemble;
pub mod error;
pub mod expected;
pub mod gdlist;
pub mod loader;
pub mod members;
pub mod retry;
pub mod sync;

// Re-export commonly used types at crate root
pub use ensemble::{LoadedMember, SevereEnsemble, ThunderEnsemble};
pub use error::{Result, SyncError};
pub use expected::ExpectedCounts;
pub use gdlist::{parse_gdlist, read_gdlist, SrefRequest};
pub use loader::{MemberField, MemberLoader, ReferenceGrid};
pub use members::{
    severe_members, thunder_members, HireswCore, MemberDescriptor, ModelKind, ModelRoots,
};
pub use retry::RetryPolicy;
pub use sync::{Readiness, SyncReport, Synchronizer};
