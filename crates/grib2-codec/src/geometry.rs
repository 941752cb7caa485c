//! Grid point coordinates from a grid definition section.

use calib_common::GridCoords;
use projection::{lambert::normalize_lon, LambertConformal, ScanOrder};

use crate::error::{Grib2Error, Result};
use crate::sections::{GridDefinition, GridTemplate, LambertGrid, LatLonGrid};

const MICRO: f64 = 1e-6;

impl GridDefinition {
    /// (nx, ny): points per row and number of rows.
    pub fn dimensions(&self) -> (usize, usize) {
        match &self.template {
            GridTemplate::LatLon(g) => (g.ni as usize, g.nj as usize),
            GridTemplate::Lambert(g) => (g.nx as usize, g.ny as usize),
        }
    }

    pub fn scanning_mode(&self) -> u8 {
        match &self.template {
            GridTemplate::LatLon(g) => g.scanning_mode,
            GridTemplate::Lambert(g) => g.scanning_mode,
        }
    }

    /// Latitude/longitude of every point, in the order values are stored.
    pub fn coordinates(&self) -> Result<GridCoords> {
        let scanning = self.scanning_mode();
        if scanning & 0x30 != 0 {
            return Err(Grib2Error::Grid(format!(
                "scanning mode {:#04x} (column-major or boustrophedon) is not supported",
                scanning
            )));
        }
        let (nx, ny) = self.dimensions();
        if nx * ny != self.num_points as usize {
            return Err(Grib2Error::Grid(format!(
                "{}x{} grid declares {} points",
                nx, ny, self.num_points
            )));
        }

        let (lats, lons) = match &self.template {
            GridTemplate::Lambert(g) => lambert_coordinates(g)?,
            GridTemplate::LatLon(g) => latlon_coordinates(g),
        };
        Ok(GridCoords::new(nx, ny, lats, lons)?)
    }
}

fn lambert_coordinates(g: &LambertGrid) -> Result<(Vec<f64>, Vec<f64>)> {
    let proj = LambertConformal::from_grib2(
        g.la1 as f64 * MICRO,
        g.lo1 as f64 * MICRO,
        g.lov as f64 * MICRO,
        g.latin1 as f64 * MICRO,
        g.latin2 as f64 * MICRO,
        g.dx as f64 / 1000.0,
        g.dy as f64 / 1000.0,
        g.nx as usize,
        g.ny as usize,
        g.earth.radius(),
    )?;
    Ok(proj.coordinates(ScanOrder::from_flags(g.scanning_mode)))
}

fn latlon_coordinates(g: &LatLonGrid) -> (Vec<f64>, Vec<f64>) {
    let scan = ScanOrder::from_flags(g.scanning_mode);
    let (ni, nj) = (g.ni as usize, g.nj as usize);
    let la1 = g.la1 as f64 * MICRO;
    let lo1 = g.lo1 as f64 * MICRO;
    let dlat = g.dj as f64 * MICRO * if scan.j_positive { 1.0 } else { -1.0 };
    let dlon = g.di as f64 * MICRO * if scan.i_negative { -1.0 } else { 1.0 };

    let mut lats = Vec::with_capacity(ni * nj);
    let mut lons = Vec::with_capacity(ni * nj);
    for j in 0..nj {
        for i in 0..ni {
            lats.push(la1 + j as f64 * dlat);
            lons.push(normalize_lon(lo1 + i as f64 * dlon));
        }
    }
    (lats, lons)
}
