//! Calibrated GRIB2 products in the output directory.
//!
//! An hour's products are all encoded before any is written, so a failed
//! encode leaves nothing behind. Existing products double as restart
//! markers, and the thunder full-period job reads earlier ones back.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use calib_common::Field2D;
use chrono::{DateTime, Utc};
use grib2_codec::{GridCodec, GridTemplate, MessageSpec, ProductSpec};
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::{Result, StorageError};

/// Parameter category of the convective hazard probabilities.
pub const HAZARD_CATEGORY: u8 = 19;

/// One calibrated forecast, in percent.
#[derive(Debug, Clone)]
pub struct Product {
    pub name: String,
    /// Parameter number within [`HAZARD_CATEGORY`].
    pub parameter: u8,
    /// Start of the period, hours after the reference time.
    pub forecast_time: u32,
    pub end_time: DateTime<Utc>,
    /// Period length, hours.
    pub length: u32,
    pub values: Field2D,
}

/// Encodes products on one grid and writes them into one directory.
pub struct ProductWriter<C> {
    codec: C,
    dir: PathBuf,
    grid: GridTemplate,
    table_version: u8,
}

impl<C: GridCodec> ProductWriter<C> {
    pub fn new(codec: C, dir: impl Into<PathBuf>, grid: GridTemplate, table_version: u8) -> Self {
        Self {
            codec,
            dir: dir.into(),
            grid,
            table_version,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn encode(&self, reference_time: DateTime<Utc>, product: &Product) -> Result<Vec<u8>> {
        let spec = MessageSpec::ncep(reference_time, self.table_version, self.grid.clone());
        let definition = ProductSpec::probability(
            HAZARD_CATEGORY,
            product.parameter,
            product.forecast_time,
            product.end_time,
            product.length,
        );
        self.codec
            .encode(&spec, &[(definition, product.values.data())])
            .map_err(|e| StorageError::Build {
                name: product.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Encode every product, then write them. Returns the written paths.
    pub fn write_all(&self, reference_time: DateTime<Utc>, products: &[Product]) -> Result<Vec<PathBuf>> {
        let encoded = products
            .iter()
            .map(|p| Ok((self.path(&p.name), self.encode(reference_time, p)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut written = Vec::with_capacity(encoded.len());
        for (path, bytes) in encoded {
            write_atomic(&path, &bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), "Wrote product");
            written.push(path);
        }
        Ok(written)
    }

    /// Values of a product written earlier, `None` if it does not exist.
    pub fn read(&self, name: &str) -> Result<Option<Field2D>> {
        let path = self.path(name);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_io(&path, e)),
        };
        let field = self
            .codec
            .decode(Bytes::from(data))
            .map_err(|e| StorageError::corrupt(&path, e))?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::corrupt(&path, "no fields"))?;
        debug!(path = %path.display(), "Read earlier product");
        Ok(Some(field.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_common::Cycle;
    use grib2_codec::{Grib2Codec, LatLonGrid};
    use test_utils::Grib2Builder;

    fn latlon_template() -> GridTemplate {
        let bytes = Bytes::from(Grib2Builder::new_uh_member().build());
        let raw = grib2_codec::scan_fields(&bytes).unwrap().remove(0);
        raw.grid.template.clone()
    }

    fn product(name: &str, value: f32) -> Product {
        let cycle = Cycle::parse("20240501", "12").unwrap();
        Product {
            name: name.to_string(),
            parameter: 2,
            forecast_time: 3,
            end_time: cycle.valid_time(4),
            length: 1,
            values: Field2D::filled(4, 3, value),
        }
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ProductWriter::new(Grib2Codec::new(), dir.path(), latlon_template(), 2);
        let reference = Cycle::parse("20240501", "12").unwrap().reference_time();

        assert!(writer.read("a.grib2").unwrap().is_none());
        let written = writer.write_all(reference, &[product("a.grib2", 37.0)]).unwrap();
        assert_eq!(written, vec![dir.path().join("a.grib2")]);
        assert!(writer.exists("a.grib2"));

        let values = writer.read("a.grib2").unwrap().unwrap();
        assert_eq!(values.shape(), (3, 4));
        assert!(values.data().iter().all(|&v| (v - 37.0).abs() < 0.11));
    }

    #[test]
    fn test_nothing_written_when_one_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ProductWriter::new(Grib2Codec::new(), dir.path(), latlon_template(), 1);
        let reference = Cycle::parse("20240501", "00").unwrap().reference_time();
        let mut wrong = product("b.grib2", 5.0);
        wrong.values = Field2D::zeros(2, 2);

        let err = writer
            .write_all(reference, &[product("a.grib2", 5.0), wrong])
            .unwrap_err();
        assert!(matches!(err, StorageError::Build { .. }));
        assert!(!writer.exists("a.grib2"));
    }

    #[test]
    fn test_template_is_latlon() {
        assert!(matches!(latlon_template(), GridTemplate::LatLon(LatLonGrid { ni: 4, nj: 3, .. })));
    }
}
