//! GRIB2 section parsing.
//!
//! Each function takes the bytes of a single section (starting at its
//! 4-octet length) and returns the decoded metadata. Octet numbers in
//! comments are the 1-based positions used by the WMO tables.
//!
//! Signed quantities in GRIB2 are sign-magnitude, not two's complement:
//! the high bit is the sign and the remaining bits the magnitude.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Grib2Error, Result};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Shape of the earth (code table 3.2) with its scaled radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarthShape {
    pub shape: u8,
    pub radius_scale: u8,
    pub radius_value: u32,
}

impl EarthShape {
    /// Radius in meters. Oblate shapes fall back to the mean sphere.
    pub fn radius(&self) -> f64 {
        match self.shape {
            0 => 6_367_470.0,
            1 => self.radius_value as f64 / 10f64.powi(self.radius_scale as i32),
            8 => 6_371_200.0,
            _ => projection::lambert::EARTH_RADIUS_SHAPE_6,
        }
    }
}

/// Template 3.0: regular latitude/longitude grid. Angles in microdegrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    pub earth: EarthShape,
    pub ni: u32,
    pub nj: u32,
    pub la1: i32,
    pub lo1: i32,
    pub la2: i32,
    pub lo2: i32,
    pub di: u32,
    pub dj: u32,
    pub scanning_mode: u8,
}

/// Template 3.30: Lambert conformal. Angles in microdegrees, lengths in millimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct LambertGrid {
    pub earth: EarthShape,
    pub nx: u32,
    pub ny: u32,
    pub la1: i32,
    pub lo1: u32,
    pub resolution_flags: u8,
    pub lad: i32,
    pub lov: u32,
    pub dx: u32,
    pub dy: u32,
    pub projection_centre: u8,
    pub scanning_mode: u8,
    pub latin1: i32,
    pub latin2: i32,
    pub south_pole_lat: i32,
    pub south_pole_lon: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridTemplate {
    LatLon(LatLonGrid),
    Lambert(LambertGrid),
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub num_points: u32,
    pub template: GridTemplate,
    /// Section bytes, used to recognise repeated grids.
    pub raw: Bytes,
}

/// A fixed surface (code table 4.5) with its scaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSurface {
    pub surface_type: u8,
    pub scale_factor: i8,
    pub scaled_value: i64,
}

/// Statistical processing over a time range (templates 4.8, 4.9, 4.11).
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalInterval {
    pub end_time: DateTime<Utc>,
    pub process: u8,
    pub time_unit: u8,
    pub length: u32,
}

/// Probability description (template 4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbabilityInfo {
    pub number: u8,
    pub total: u8,
    pub probability_type: u8,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub generating_process: u8,
    pub time_unit: u8,
    pub forecast_time: u32,
    pub first_surface: FixedSurface,
    pub second_surface: FixedSurface,
    pub statistics: Option<StatisticalInterval>,
    pub probability: Option<ProbabilityInfo>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

// ===== Octet helpers =====

fn need(data: &[u8], len: usize, section: u8) -> Result<()> {
    if data.len() < len {
        return Err(Grib2Error::invalid_section(
            section,
            format!("expected at least {} bytes, found {}", len, data.len()),
        ));
    }
    Ok(())
}

pub(crate) fn read_u16(data: &[u8], idx: usize) -> u16 {
    u16::from_be_bytes([data[idx], data[idx + 1]])
}

pub(crate) fn read_u32(data: &[u8], idx: usize) -> u32 {
    u32::from_be_bytes([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]])
}

pub(crate) fn read_i8(data: &[u8], idx: usize) -> i8 {
    let raw = data[idx];
    let magnitude = (raw & 0x7F) as i8;
    if raw & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn read_i16(data: &[u8], idx: usize) -> i16 {
    let raw = read_u16(data, idx);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn read_i32(data: &[u8], idx: usize) -> i32 {
    let raw = read_u32(data, idx);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_time(data: &[u8], idx: usize, section: u8) -> Result<DateTime<Utc>> {
    let year = read_u16(data, idx) as i32;
    let (month, day) = (data[idx + 2] as u32, data[idx + 3] as u32);
    let (hour, minute, second) = (
        data[idx + 4] as u32,
        data[idx + 5] as u32,
        data[idx + 6] as u32,
    );
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            Grib2Error::invalid_section(
                section,
                format!(
                    "invalid time {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                ),
            )
        })?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Length and number of the section starting at `data[0]`.
pub fn section_header(data: &[u8]) -> Result<(usize, u8)> {
    if data.len() < 5 {
        return Err(Grib2Error::InvalidFormat(
            "truncated section header".to_string(),
        ));
    }
    Ok((read_u32(data, 0) as usize, data[4]))
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }
    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octet 7 discipline, octet 8 edition, octets 9-16 total length.
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }
    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification> {
    need(data, 21, 1)?;
    Ok(Identification {
        center: read_u16(data, 5),
        sub_center: read_u16(data, 7),
        table_version: data[9],
        local_table_version: data[10],
        significance_of_reference_time: data[11],
        reference_time: read_time(data, 12, 1)?,
        production_status: data[19],
        data_type: data[20],
    })
}

fn parse_earth(data: &[u8]) -> EarthShape {
    EarthShape {
        shape: data[14],
        radius_scale: data[15],
        radius_value: read_u32(data, 16),
    }
}

/// Parse Section 3 (Grid Definition). Supports templates 3.0 and 3.30.
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition> {
    need(data, 14, 3)?;
    let num_points = read_u32(data, 6);
    let template_number = read_u16(data, 12);

    let template = match template_number {
        0 => {
            need(data, 72, 3)?;
            GridTemplate::LatLon(LatLonGrid {
                earth: parse_earth(data),
                ni: read_u32(data, 30),
                nj: read_u32(data, 34),
                la1: read_i32(data, 46),
                lo1: read_i32(data, 50),
                la2: read_i32(data, 55),
                lo2: read_i32(data, 59),
                di: read_u32(data, 63),
                dj: read_u32(data, 67),
                scanning_mode: data[71],
            })
        }
        30 => {
            need(data, 81, 3)?;
            GridTemplate::Lambert(LambertGrid {
                earth: parse_earth(data),
                nx: read_u32(data, 30),
                ny: read_u32(data, 34),
                la1: read_i32(data, 38),
                lo1: read_u32(data, 42),
                resolution_flags: data[46],
                lad: read_i32(data, 47),
                lov: read_u32(data, 51),
                dx: read_u32(data, 55),
                dy: read_u32(data, 59),
                projection_centre: data[63],
                scanning_mode: data[64],
                latin1: read_i32(data, 65),
                latin2: read_i32(data, 69),
                south_pole_lat: read_i32(data, 73),
                south_pole_lon: read_u32(data, 77),
            })
        }
        other => {
            return Err(Grib2Error::UnsupportedTemplate {
                section: 3,
                template: other,
            })
        }
    };

    Ok(GridDefinition {
        num_points,
        template,
        raw: Bytes::copy_from_slice(data),
    })
}

/// Octet at which the "end of overall time interval" block begins.
fn statistics_offset(template: u16) -> Option<usize> {
    match template {
        8 => Some(35),
        9 => Some(48),
        11 => Some(38),
        _ => None,
    }
}

fn parse_statistics(data: &[u8], octet: usize) -> Result<StatisticalInterval> {
    let idx = octet - 1;
    need(data, idx + 19, 4)?;
    let end_time = read_time(data, idx, 4)?;
    Ok(StatisticalInterval {
        end_time,
        process: data[idx + 12],
        time_unit: data[idx + 14],
        length: read_u32(data, idx + 15),
    })
}

/// Parse Section 4 (Product Definition). Supports templates 4.0, 4.1, 4.8, 4.9 and 4.11.
pub fn parse_product_definition(data: &[u8]) -> Result<ProductDefinition> {
    need(data, 9, 4)?;
    let template = read_u16(data, 7);
    if !matches!(template, 0 | 1 | 8 | 9 | 11) {
        return Err(Grib2Error::UnsupportedTemplate {
            section: 4,
            template,
        });
    }
    need(data, 34, 4)?;

    let statistics = match statistics_offset(template) {
        Some(octet) => Some(parse_statistics(data, octet)?),
        None => None,
    };
    let probability = if template == 9 {
        Some(ProbabilityInfo {
            number: data[34],
            total: data[35],
            probability_type: data[36],
        })
    } else {
        None
    };

    Ok(ProductDefinition {
        template,
        parameter_category: data[9],
        parameter_number: data[10],
        generating_process: data[11],
        time_unit: data[17],
        forecast_time: read_u32(data, 18),
        first_surface: FixedSurface {
            surface_type: data[22],
            scale_factor: read_i8(data, 23),
            scaled_value: read_i32(data, 24) as i64,
        },
        second_surface: FixedSurface {
            surface_type: data[28],
            scale_factor: read_i8(data, 29),
            scaled_value: read_i32(data, 30) as i64,
        },
        statistics,
        probability,
    })
}

/// Parse Section 5 (Data Representation). The leading octets are shared by
/// every packing template the codec accepts.
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation> {
    need(data, 21, 5)?;
    Ok(DataRepresentation {
        num_data_points: read_u32(data, 5),
        template: read_u16(data, 9),
        reference_value: f32::from_be_bytes([data[11], data[12], data[13], data[14]]),
        binary_scale_factor: read_i16(data, 15),
        decimal_scale_factor: read_i16(data, 17),
        bits_per_value: data[19],
        original_data_type: data[20],
    })
}

/// Bitmap state after reading Section 6.
#[derive(Debug, Clone)]
pub enum BitmapIndicator {
    /// No bitmap; every grid point has a value.
    Absent,
    /// A bitmap follows in this section.
    Present(Bytes),
    /// Reuse the bitmap defined earlier in the message.
    Previous,
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(data: &[u8]) -> Result<BitmapIndicator> {
    need(data, 6, 6)?;
    match data[5] {
        0 => Ok(BitmapIndicator::Present(Bytes::copy_from_slice(&data[6..]))),
        254 => Ok(BitmapIndicator::Previous),
        255 => Ok(BitmapIndicator::Absent),
        other => Err(Grib2Error::invalid_section(
            6,
            format!("predefined bitmap {} is not supported", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(read_i32(&[0x80, 0, 0, 5], 0), -5);
        assert_eq!(read_i32(&[0x00, 0, 0, 5], 0), 5);
        assert_eq!(read_i16(&[0x80, 0x01], 0), -1);
        assert_eq!(read_i8(&[0x81], 0), -1);
    }

    #[test]
    fn test_indicator_rejects_edition_1() {
        let mut data = b"GRIB".to_vec();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(&100u64.to_be_bytes());
        assert!(parse_indicator(&data).is_err());
        data[7] = 2;
        let indicator = parse_indicator(&data).unwrap();
        assert_eq!(indicator.message_length, 100);
    }

    #[test]
    fn test_bitmap_indicator() {
        assert!(matches!(
            parse_bitmap(&[0, 0, 0, 6, 6, 255]).unwrap(),
            BitmapIndicator::Absent
        ));
        assert!(matches!(
            parse_bitmap(&[0, 0, 0, 6, 6, 254]).unwrap(),
            BitmapIndicator::Previous
        ));
        assert!(parse_bitmap(&[0, 0, 0, 6, 6, 3]).is_err());
    }

    #[test]
    fn test_earth_radius() {
        let shape6 = EarthShape {
            shape: 6,
            radius_scale: 0,
            radius_value: 0,
        };
        assert_eq!(shape6.radius(), 6_371_229.0);
        let custom = EarthShape {
            shape: 1,
            radius_scale: 1,
            radius_value: 63_712_000,
        };
        assert_eq!(custom.radius(), 6_371_200.0);
    }
}
