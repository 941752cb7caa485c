//! GRIB2 codec (WMO FM 92 GRIB Edition 2).
//!
//! Reads ensemble member fields and writes calibrated probability products.
//!
//! ```text
//!  bytes ──scan_fields──> RawField ──decode_values──> Vec<f32>
//!                            │                           │
//!                     GridDefinition ──coordinates──> GridCoords
//!                                                        │
//!                                        DecodedField / ForecastGrid
//! ```
//!
//! Simple packing is decoded and encoded in-house. Complex, PNG and
//! JPEG2000 packed fields (as found in operational model output) are
//! decoded through the `grib` crate.

pub mod codec;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod message;
pub mod sections;
pub mod tables;
pub mod unpacking;
pub mod writer;

pub use codec::{DecodedField, FieldSelector, Grib2Codec, GridCodec};
pub use error::{Grib2Error, Result};
pub use message::{scan_fields, RawField};
pub use sections::{GridDefinition, GridTemplate, LambertGrid, LatLonGrid, ProductDefinition};
pub use writer::{IntervalSpec, MessageSpec, ProbabilitySpec, ProductSpec};
