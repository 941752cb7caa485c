//! Reading member fields from GRIB2 files.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use calib_common::{Field2D, GridCoords};
use grib2_codec::{scan_fields, DecodedField, FieldSelector, Grib2Error, GridCodec, GridTemplate};
use grid_processor::{MemberMask, PredictorHour};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::members::MemberDescriptor;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Hourly maximum 2-5 km updraft helicity.
pub fn updraft_helicity() -> FieldSelector {
    FieldSelector::new(7, 199)
        .with_generating_process(2)
        .with_first_surface_value(5000)
}

/// Reflectivity at the -10 C isotherm (263 K), instantaneous.
pub fn reflectivity() -> FieldSelector {
    FieldSelector::new(16, 195)
        .with_generating_process(2)
        .with_first_surface_value(263)
        .instantaneous()
}

/// Precipitation accumulated over the last hour.
pub fn hourly_precipitation() -> FieldSelector {
    FieldSelector::new(1, 8)
        .with_generating_process(2)
        .with_interval_lengths(&[0, 1])
}

/// Best four-layer lifted index.
pub fn lifted_index() -> FieldSelector {
    FieldSelector::new(7, 193).with_generating_process(2)
}

/// A member field on its native grid.
#[derive(Debug, Clone)]
pub struct MemberField<T> {
    pub value: T,
    pub coords: Arc<GridCoords>,
}

/// The grid products are written on: coordinates for remapping, and the
/// grid definition to encode with.
#[derive(Debug, Clone)]
pub struct ReferenceGrid {
    pub coords: Arc<GridCoords>,
    pub template: GridTemplate,
}

/// Decodes member files through a [`GridCodec`].
pub struct MemberLoader<C> {
    codec: C,
}

impl<C: GridCodec> MemberLoader<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// File contents, gunzipped when compressed.
    pub fn read(&self, path: &Path) -> Result<Bytes> {
        let data = std::fs::read(path)?;
        if data.starts_with(&GZIP_MAGIC) {
            let mut decoder = flate2::read::GzDecoder::new(data.as_slice());
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SyncError::malformed(path, format!("gzip: {}", e)))?;
            return Ok(Bytes::from(decompressed));
        }
        Ok(Bytes::from(data))
    }

    /// The first field matching `selector`. Absence is malformed input.
    pub fn field(&self, path: &Path, bytes: Bytes, selector: &FieldSelector) -> Result<DecodedField> {
        self.codec.find(bytes, selector).map_err(|e| match e {
            Grib2Error::FieldNotFound(what) => {
                SyncError::malformed(path, format!("no {} field", what))
            }
            other => SyncError::codec(path, other),
        })
    }

    /// Coordinates of the first field in a file, e.g. a reference grid.
    pub fn grid(&self, path: &Path) -> Result<Arc<GridCoords>> {
        let bytes = self.read_grid_file(path)?;
        self.first_coords(path, bytes)
    }

    /// Coordinates and grid definition of the first field in `path`.
    pub fn reference_grid(&self, path: &Path) -> Result<ReferenceGrid> {
        let bytes = self.read_grid_file(path)?;
        let template = scan_fields(&bytes)
            .map_err(|e| SyncError::codec(path, e))?
            .into_iter()
            .next()
            .map(|raw| raw.grid.template.clone())
            .ok_or_else(|| SyncError::malformed(path, "no fields"))?;
        let coords = self.first_coords(path, bytes)?;
        debug!(path = %path.display(), shape = ?coords.shape(), "Loaded reference grid");
        Ok(ReferenceGrid { coords, template })
    }

    fn read_grid_file(&self, path: &Path) -> Result<Bytes> {
        if !path.is_file() {
            return Err(SyncError::missing(format!("grid file {}", path.display())));
        }
        self.read(path)
    }

    fn first_coords(&self, path: &Path, bytes: Bytes) -> Result<Arc<GridCoords>> {
        self.codec
            .decode(bytes)
            .map_err(|e| SyncError::codec(path, e))?
            .into_iter()
            .next()
            .map(|f| f.coords)
            .ok_or_else(|| SyncError::malformed(path, "no fields"))
    }

    /// Thresholded, dilated updraft-helicity mask for one member hour.
    /// `None` while the file has not arrived.
    pub fn uh_mask(&self, member: &MemberDescriptor, fhour: u32) -> Result<Option<MemberField<Field2D>>> {
        let path = member.path(fhour);
        if !path.is_file() {
            return Ok(None);
        }
        let field = self.field(&path, self.read(&path)?, &updraft_helicity())?;
        let mask = MemberMask::new(member.threshold, member.dx_km)?;
        debug!(
            member = %member.name,
            forecast_hour = fhour,
            radius = mask.radius(),
            "Loaded updraft helicity"
        );
        Ok(Some(MemberField {
            value: mask.apply(&field.values),
            coords: field.coords,
        }))
    }

    /// Thunder predictors for one member hour. `None` while the file has
    /// not arrived. A predictor absent from the file (for example the
    /// precipitation at hour 0) is all NaN.
    pub fn predictor_hour(
        &self,
        member: &MemberDescriptor,
        fhour: u32,
    ) -> Result<Option<MemberField<PredictorHour>>> {
        let path = member.path(fhour);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = self.read(&path)?;
        let refl = self.optional(member, fhour, &path, bytes.clone(), &reflectivity())?;
        let precip = self.optional(member, fhour, &path, bytes.clone(), &hourly_precipitation())?;
        let li = self.optional(member, fhour, &path, bytes, &lifted_index())?;

        let Some(reference) = refl.as_ref().or(precip.as_ref()).or(li.as_ref()) else {
            return Err(SyncError::malformed(&path, "no thunder predictor fields"));
        };
        let coords = reference.coords.clone();
        let (nx, ny) = (reference.values.nx(), reference.values.ny());
        // Masked points count as no signal.
        let fill = |field: Option<DecodedField>| {
            field.map_or_else(
                || Field2D::filled(nx, ny, f32::NAN),
                |f| f.values.fill_nan(0.0),
            )
        };
        let hour = PredictorHour {
            reflectivity: fill(refl),
            precipitation: fill(precip),
            lifted_index: fill(li),
        };
        hour.reflectivity.ensure_same_shape(&hour.precipitation)?;
        hour.reflectivity.ensure_same_shape(&hour.lifted_index)?;
        Ok(Some(MemberField { value: hour, coords }))
    }

    fn optional(
        &self,
        member: &MemberDescriptor,
        fhour: u32,
        path: &Path,
        bytes: Bytes,
        selector: &FieldSelector,
    ) -> Result<Option<DecodedField>> {
        match self.codec.find(bytes, selector) {
            Ok(field) => Ok(Some(field)),
            Err(Grib2Error::FieldNotFound(what)) => {
                debug!(member = %member.name, forecast_hour = fhour, field = %what, "Predictor absent");
                Ok(None)
            }
            Err(e) => Err(SyncError::codec(path, e)),
        }
    }
}
