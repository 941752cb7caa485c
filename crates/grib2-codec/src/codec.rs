//! The codec seam used by the rest of the pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use calib_common::{Field2D, ForecastGrid, GridCoords};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::decode::decode_values;
use crate::error::{Grib2Error, Result};
use crate::message::{scan_fields, RawField};
use crate::sections::{GridDefinition, ProductDefinition};
use crate::tables::parameter_short_name;
use crate::writer::{encode_message, MessageSpec, ProductSpec};

/// Which field to pull out of a file.
///
/// Category and number are required; every other criterion is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub discipline: u8,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub generating_process: Option<u8>,
    pub first_surface_value: Option<i64>,
    /// `Some(true)`: only statistically processed products; `Some(false)`: only instantaneous.
    pub statistical: Option<bool>,
    /// Accepted statistical interval lengths.
    pub interval_lengths: Option<Vec<u32>>,
}

impl FieldSelector {
    pub fn new(parameter_category: u8, parameter_number: u8) -> Self {
        Self {
            discipline: 0,
            parameter_category,
            parameter_number,
            generating_process: None,
            first_surface_value: None,
            statistical: None,
            interval_lengths: None,
        }
    }

    pub fn with_generating_process(mut self, process: u8) -> Self {
        self.generating_process = Some(process);
        self
    }

    pub fn with_first_surface_value(mut self, value: i64) -> Self {
        self.first_surface_value = Some(value);
        self
    }

    pub fn instantaneous(mut self) -> Self {
        self.statistical = Some(false);
        self
    }

    pub fn with_interval_lengths(mut self, lengths: &[u32]) -> Self {
        self.statistical = Some(true);
        self.interval_lengths = Some(lengths.to_vec());
        self
    }

    pub fn matches(&self, discipline: u8, product: &ProductDefinition) -> bool {
        if discipline != self.discipline
            || product.parameter_category != self.parameter_category
            || product.parameter_number != self.parameter_number
        {
            return false;
        }
        if let Some(gen) = self.generating_process {
            if product.generating_process != gen {
                return false;
            }
        }
        if let Some(value) = self.first_surface_value {
            if product.first_surface.scaled_value != value {
                return false;
            }
        }
        if let Some(statistical) = self.statistical {
            if product.statistics.is_some() != statistical {
                return false;
            }
        }
        if let Some(lengths) = &self.interval_lengths {
            match &product.statistics {
                Some(stats) if lengths.contains(&stats.length) => {}
                _ => return false,
            }
        }
        true
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            parameter_short_name((
                self.discipline,
                self.parameter_category,
                self.parameter_number
            ))
        )?;
        if let Some(gen) = self.generating_process {
            write!(f, " process={}", gen)?;
        }
        if let Some(value) = self.first_surface_value {
            write!(f, " level={}", value)?;
        }
        if let Some(lengths) = &self.interval_lengths {
            write!(f, " interval={:?}", lengths)?;
        } else if self.statistical == Some(false) {
            write!(f, " instantaneous")?;
        }
        Ok(())
    }
}

/// A decoded field with its coordinates.
#[derive(Debug, Clone)]
pub struct DecodedField {
    pub discipline: u8,
    pub reference_time: DateTime<Utc>,
    pub product: ProductDefinition,
    pub values: Field2D,
    pub coords: Arc<GridCoords>,
}

impl DecodedField {
    pub fn short_name(&self) -> String {
        parameter_short_name((
            self.discipline,
            self.product.parameter_category,
            self.product.parameter_number,
        ))
    }

    pub fn into_forecast_grid(self) -> Result<ForecastGrid> {
        Ok(ForecastGrid::new(self.values, self.coords)?)
    }
}

/// Reads and writes gridded fields.
pub trait GridCodec: Send + Sync {
    /// Decode every field in a file.
    fn decode(&self, bytes: Bytes) -> Result<Vec<DecodedField>>;

    /// Decode the first field matching `selector`.
    fn find(&self, bytes: Bytes, selector: &FieldSelector) -> Result<DecodedField>;

    /// Encode fields sharing one grid into a single message.
    fn encode(&self, spec: &MessageSpec, fields: &[(ProductSpec, &[f32])]) -> Result<Vec<u8>>;
}

impl<C: GridCodec + ?Sized> GridCodec for Arc<C> {
    fn decode(&self, bytes: Bytes) -> Result<Vec<DecodedField>> {
        (**self).decode(bytes)
    }

    fn find(&self, bytes: Bytes, selector: &FieldSelector) -> Result<DecodedField> {
        (**self).find(bytes, selector)
    }

    fn encode(&self, spec: &MessageSpec, fields: &[(ProductSpec, &[f32])]) -> Result<Vec<u8>> {
        (**self).encode(spec, fields)
    }
}

/// GRIB2 implementation of [`GridCodec`].
///
/// Grid coordinates are computed once per distinct grid definition and
/// shared between fields.
#[derive(Default)]
pub struct Grib2Codec {
    coords: Mutex<HashMap<Bytes, Arc<GridCoords>>>,
}

impl Grib2Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinates for a grid definition, computed on first use.
    pub fn coordinates(&self, grid: &GridDefinition) -> Result<Arc<GridCoords>> {
        let mut cache = self.coords.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(coords) = cache.get(&grid.raw) {
            return Ok(coords.clone());
        }
        let coords = Arc::new(grid.coordinates()?);
        debug!(
            nx = coords.nx(),
            ny = coords.ny(),
            "Computed grid coordinates"
        );
        cache.insert(grid.raw.clone(), coords.clone());
        Ok(coords)
    }

    fn decode_field(&self, raw: RawField) -> Result<DecodedField> {
        let (nx, ny) = raw.grid.dimensions();
        let values = Field2D::new(nx, ny, decode_values(&raw)?)?;
        let coords = self.coordinates(&raw.grid)?;
        Ok(DecodedField {
            discipline: raw.discipline,
            reference_time: raw.identification.reference_time,
            product: raw.product,
            values,
            coords,
        })
    }
}

impl GridCodec for Grib2Codec {
    fn decode(&self, bytes: Bytes) -> Result<Vec<DecodedField>> {
        scan_fields(&bytes)?
            .into_iter()
            .map(|raw| self.decode_field(raw))
            .collect()
    }

    fn find(&self, bytes: Bytes, selector: &FieldSelector) -> Result<DecodedField> {
        let raw = scan_fields(&bytes)?
            .into_iter()
            .find(|raw| selector.matches(raw.discipline, &raw.product))
            .ok_or_else(|| Grib2Error::field_not_found(selector.to_string()))?;
        self.decode_field(raw)
    }

    fn encode(&self, spec: &MessageSpec, fields: &[(ProductSpec, &[f32])]) -> Result<Vec<u8>> {
        encode_message(spec, fields)
    }
}
