//! Lambert Conformal Conic projection.
//!
//! Used by GRIB2 grid definition template 3.30. Both the HREF member grids
//! (3 km CONUS) and the 40 km verification grid (NCEP 212) are Lambert grids,
//! so every lat/lon array in the pipeline comes through here.
//!
//! The projection parameters include:
//! - Central meridian (LoV)
//! - Standard parallels Latin1 and Latin2 (equal for a tangent cone)
//! - Grid spacing dx, dy in meters
//! - First grid point lat1, lon1

use std::f64::consts::PI;

use crate::{ProjectionError, Result};

/// Mean earth radius for GRIB2 shape-of-earth code 6.
pub const EARTH_RADIUS_SHAPE_6: f64 = 6_371_229.0;

/// Order in which grid points are stored, from the GRIB2 scanning-mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOrder {
    /// Points along a row run westward.
    pub i_negative: bool,
    /// Rows run northward from the first point.
    pub j_positive: bool,
}

impl ScanOrder {
    /// Decode flag table 3.4 (bit 1 = 0x80, bit 2 = 0x40).
    pub fn from_flags(flags: u8) -> Self {
        Self {
            i_negative: flags & 0x80 != 0,
            j_positive: flags & 0x40 != 0,
        }
    }
}

/// Lambert Conformal Conic projection anchored at the first grid point.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian (LoV) in radians
    pub lon0: f64,
    /// Latitude of first grid point in radians
    pub lat1: f64,
    /// Longitude of first grid point in radians
    pub lon1: f64,
    /// Grid spacing in X direction (meters)
    pub dx: f64,
    /// Grid spacing in Y direction (meters)
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
    pub earth_radius: f64,
    /// Cone constant
    n: f64,
    f: f64,
    /// Rho at the first grid point
    rho0: f64,
    /// First grid point in projection coordinates
    x0: f64,
    y0: f64,
}

impl LambertConformal {
    /// Build a projection from GRIB2 template 3.30 values (degrees, meters).
    #[allow(clippy::too_many_arguments)]
    pub fn from_grib2(
        lat1_deg: f64,
        lon1_deg: f64,
        lov_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        dx: f64,
        dy: f64,
        nx: usize,
        ny: usize,
        earth_radius: f64,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(ProjectionError::InvalidParameters(format!(
                "empty grid {}x{}",
                nx, ny
            )));
        }
        if dx <= 0.0 || dy <= 0.0 || earth_radius <= 0.0 {
            return Err(ProjectionError::InvalidParameters(format!(
                "non-positive spacing or radius (dx={}, dy={}, r={})",
                dx, dy, earth_radius
            )));
        }

        let to_rad = PI / 180.0;
        let lat1 = lat1_deg * to_rad;
        let lon1 = lon1_deg * to_rad;
        let lon0 = lov_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };
        if !n.is_finite() || n.abs() < 1e-12 {
            return Err(ProjectionError::InvalidParameters(format!(
                "degenerate cone constant for standard parallels {} / {}",
                latin1_deg, latin2_deg
            )));
        }

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = earth_radius * f / (PI / 4.0 + lat1 / 2.0).tan().powf(n);

        let theta0 = n * wrap_pi(lon1 - lon0);
        let x0 = rho0 * theta0.sin();
        let y0 = rho0 - rho0 * theta0.cos();

        Ok(Self {
            lon0,
            lat1,
            lon1,
            dx,
            dy,
            nx,
            ny,
            earth_radius,
            n,
            f,
            rho0,
            x0,
            y0,
        })
    }

    /// NCEP grid 212: 185 x 129, 40.635 km, tangent at 25N, LoV 265E.
    pub fn ncep_212() -> Result<Self> {
        Self::from_grib2(
            12.19,
            226.541,
            265.0,
            25.0,
            25.0,
            40_635.0,
            40_635.0,
            185,
            129,
            EARTH_RADIUS_SHAPE_6,
        )
    }

    /// Convert geographic coordinates (degrees) to fractional grid indices (i, j),
    /// with j increasing northward from the first grid point.
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let lon = lon_deg * to_rad;

        let rho = self.earth_radius * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * wrap_pi(lon - self.lon0);

        let x = rho * theta.sin();
        let y = self.rho0 - rho * theta.cos();

        ((x - self.x0) / self.dx, (y - self.y0) / self.dy)
    }

    /// Convert grid indices (i, j) to geographic coordinates (lat, lon) in degrees.
    /// Longitude is returned in [-180, 180).
    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;

        let x = self.x0 + i * self.dx;
        let y = self.y0 + j * self.dy;

        let rho = (x * x + (self.rho0 - y) * (self.rho0 - y)).sqrt();
        let rho = if self.n < 0.0 { -rho } else { rho };
        let theta = (x / (self.rho0 - y)).atan();

        let lat = 2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;

        (lat * to_deg, normalize_lon(lon * to_deg))
    }

    /// Latitude and longitude of every grid point, in storage order.
    pub fn coordinates(&self, scan: ScanOrder) -> (Vec<f64>, Vec<f64>) {
        let mut lats = Vec::with_capacity(self.nx * self.ny);
        let mut lons = Vec::with_capacity(self.nx * self.ny);
        for row in 0..self.ny {
            let j = if scan.j_positive { row as f64 } else { -(row as f64) };
            for col in 0..self.nx {
                let i = if scan.i_negative { -(col as f64) } else { col as f64 };
                let (lat, lon) = self.grid_to_geo(i, j);
                lats.push(lat);
                lons.push(lon);
            }
        }
        (lats, lons)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}

fn wrap_pi(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Map a longitude in degrees into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_grid_point() {
        let proj = LambertConformal::ncep_212().unwrap();

        let (lat, lon) = proj.grid_to_geo(0.0, 0.0);
        assert!((lat - 12.19).abs() < 1e-6, "lat should be 12.19, got {}", lat);
        assert!((lon + 133.459).abs() < 1e-6, "lon should be -133.459, got {}", lon);

        let (i, j) = proj.geo_to_grid(12.19, -133.459);
        assert!(i.abs() < 1e-6, "i should be ~0, got {}", i);
        assert!(j.abs() < 1e-6, "j should be ~0, got {}", j);
    }

    #[test]
    fn test_212_last_grid_point() {
        let proj = LambertConformal::ncep_212().unwrap();

        let (lat, lon) = proj.grid_to_geo(184.0, 128.0);
        assert!((lat - 57.29).abs() < 0.2, "last lat should be ~57.29, got {}", lat);
        assert!((lon + 49.385).abs() < 0.2, "last lon should be ~-49.385, got {}", lon);
    }

    #[test]
    fn test_roundtrip() {
        let proj = LambertConformal::ncep_212().unwrap();

        let (lat, lon) = proj.grid_to_geo(92.0, 64.0);
        let (i, j) = proj.geo_to_grid(lat, lon);

        assert!((i - 92.0).abs() < 0.01, "i roundtrip failed: {}", i);
        assert!((j - 64.0).abs() < 0.01, "j roundtrip failed: {}", j);
    }

    #[test]
    fn test_coordinates_follow_scan_order() {
        let proj = LambertConformal::from_grib2(
            30.0, -100.0, -97.5, 38.5, 38.5, 3000.0, 3000.0, 4, 3, EARTH_RADIUS_SHAPE_6,
        )
        .unwrap();

        let (lats, lons) = proj.coordinates(ScanOrder::from_flags(0x40));
        assert_eq!(lats.len(), 12);
        // Rows march north, columns march east.
        assert!(lats[4] > lats[0]);
        assert!(lons[1] > lons[0]);

        let (lats_down, _) = proj.coordinates(ScanOrder::from_flags(0x00));
        assert!(lats_down[4] < lats_down[0]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LambertConformal::from_grib2(
            30.0, -100.0, -97.5, 38.5, 38.5, 3000.0, 3000.0, 0, 3, EARTH_RADIUS_SHAPE_6
        )
        .is_err());
        assert!(LambertConformal::from_grib2(
            30.0, -100.0, -97.5, 0.0, 0.0, 3000.0, 3000.0, 4, 3, EARTH_RADIUS_SHAPE_6
        )
        .is_err());
    }

    #[test]
    fn test_normalize_lon() {
        assert!((normalize_lon(226.541) + 133.459).abs() < 1e-9);
        assert!((normalize_lon(-190.0) - 170.0).abs() < 1e-9);
        assert_eq!(normalize_lon(180.0), -180.0);
    }
}
