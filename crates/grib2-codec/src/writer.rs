//! GRIB2 message writer.
//!
//! Produces single-grid messages: sections 0, 1 and 3 once, then
//! sections 4-7 for each field. Values are simple packed (template 5.0).

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Grib2Error, Result};
use crate::sections::{EarthShape, GridTemplate, LambertGrid};
use crate::unpacking::pack_simple;

/// Identification and grid shared by every field in a message.
#[derive(Debug, Clone)]
pub struct MessageSpec {
    pub discipline: u8,
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
    pub grid: GridTemplate,
}

impl MessageSpec {
    /// NCEP/SPC operational forecast on the given grid.
    pub fn ncep(reference_time: DateTime<Utc>, table_version: u8, grid: GridTemplate) -> Self {
        Self {
            discipline: 0,
            center: 7,
            sub_center: 9,
            table_version,
            local_table_version: 1,
            significance_of_reference_time: 1,
            reference_time,
            production_status: 0,
            data_type: 1,
            grid,
        }
    }
}

impl LambertGrid {
    /// NCEP grid 212 (40 km CONUS), as template 3.30 values.
    pub fn ncep_212() -> Self {
        Self {
            earth: EarthShape {
                shape: 6,
                radius_scale: 0,
                radius_value: 0,
            },
            nx: 185,
            ny: 129,
            la1: 12_190_000,
            lo1: 226_541_000,
            resolution_flags: 8,
            lad: 25_000_000,
            lov: 265_000_000,
            dx: 40_635_000,
            dy: 40_635_000,
            projection_centre: 0,
            scanning_mode: 64,
            latin1: 25_000_000,
            latin2: 25_000_000,
            south_pole_lat: 0,
            south_pole_lon: 0,
        }
    }
}

/// Statistical processing to record in the product definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSpec {
    pub end_time: DateTime<Utc>,
    /// Code table 4.10 (0 average, 1 accumulation, 2 maximum, ...).
    pub process: u8,
    /// Length in hours.
    pub length: u32,
}

/// Probability above a threshold (template 4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbabilitySpec {
    pub number: u8,
    pub total: u8,
    pub probability_type: u8,
}

/// Product definition for one field. The template follows from which
/// optional parts are set: 4.0, 4.8 (interval) or 4.9 (interval + probability).
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSpec {
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub generating_process: u8,
    /// Forecast time in hours.
    pub forecast_time: u32,
    pub first_surface_type: u8,
    pub first_surface_value: i32,
    pub interval: Option<IntervalSpec>,
    pub probability: Option<ProbabilitySpec>,
    pub decimal_scale: i16,
}

impl ProductSpec {
    /// Probability of a hazard over `length` hours ending at `end_time`.
    pub fn probability(
        category: u8,
        number: u8,
        forecast_time: u32,
        end_time: DateTime<Utc>,
        length: u32,
    ) -> Self {
        Self {
            parameter_category: category,
            parameter_number: number,
            generating_process: 5,
            forecast_time,
            first_surface_type: 1,
            first_surface_value: 0,
            interval: Some(IntervalSpec {
                end_time,
                process: 1,
                length,
            }),
            probability: Some(ProbabilitySpec {
                number: 0,
                total: 21,
                probability_type: 1,
            }),
            decimal_scale: 1,
        }
    }

    fn template(&self) -> Result<u16> {
        match (&self.interval, &self.probability) {
            (None, None) => Ok(0),
            (Some(_), None) => Ok(8),
            (Some(_), Some(_)) => Ok(9),
            (None, Some(_)) => Err(Grib2Error::PackingError(
                "probability product needs a time interval".to_string(),
            )),
        }
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(buf: &mut Vec<u8>, v: i16) {
    let magnitude = v.unsigned_abs() & 0x7FFF;
    put_u16(buf, if v < 0 { magnitude | 0x8000 } else { magnitude });
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    let magnitude = v.unsigned_abs() & 0x7FFF_FFFF;
    put_u32(buf, if v < 0 { magnitude | 0x8000_0000 } else { magnitude });
}

fn put_time(buf: &mut Vec<u8>, t: &DateTime<Utc>) {
    put_u16(buf, t.year() as u16);
    buf.push(t.month() as u8);
    buf.push(t.day() as u8);
    buf.push(t.hour() as u8);
    buf.push(t.minute() as u8);
    buf.push(t.second() as u8);
}

/// Prefix a section body with its length and number.
fn finish_section(number: u8, body: Vec<u8>) -> Vec<u8> {
    let mut section = Vec::with_capacity(body.len() + 5);
    put_u32(&mut section, (body.len() + 5) as u32);
    section.push(number);
    section.extend_from_slice(&body);
    section
}

fn build_section1(spec: &MessageSpec) -> Vec<u8> {
    let mut body = Vec::new();
    put_u16(&mut body, spec.center);
    put_u16(&mut body, spec.sub_center);
    body.push(spec.table_version);
    body.push(spec.local_table_version);
    body.push(spec.significance_of_reference_time);
    put_time(&mut body, &spec.reference_time);
    body.push(spec.production_status);
    body.push(spec.data_type);
    finish_section(1, body)
}

fn put_earth(body: &mut Vec<u8>, earth: &EarthShape) {
    body.push(earth.shape);
    body.push(earth.radius_scale);
    put_u32(body, earth.radius_value);
    // Major and minor axes unused for spherical shapes.
    body.extend_from_slice(&[0; 10]);
}

fn build_section3(grid: &GridTemplate) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(0); // Source of grid definition
    let (template, num_points) = match grid {
        GridTemplate::LatLon(g) => (0u16, g.ni * g.nj),
        GridTemplate::Lambert(g) => (30u16, g.nx * g.ny),
    };
    put_u32(&mut body, num_points);
    body.push(0); // Octets for optional list
    body.push(0); // Interpretation of optional list
    put_u16(&mut body, template);

    match grid {
        GridTemplate::LatLon(g) => {
            put_earth(&mut body, &g.earth);
            put_u32(&mut body, g.ni);
            put_u32(&mut body, g.nj);
            put_u32(&mut body, 0); // Basic angle
            put_u32(&mut body, 0xFFFF_FFFF); // Subdivisions
            put_i32(&mut body, g.la1);
            put_i32(&mut body, g.lo1);
            body.push(48);
            put_i32(&mut body, g.la2);
            put_i32(&mut body, g.lo2);
            put_u32(&mut body, g.di);
            put_u32(&mut body, g.dj);
            body.push(g.scanning_mode);
        }
        GridTemplate::Lambert(g) => {
            put_earth(&mut body, &g.earth);
            put_u32(&mut body, g.nx);
            put_u32(&mut body, g.ny);
            put_i32(&mut body, g.la1);
            put_u32(&mut body, g.lo1);
            body.push(g.resolution_flags);
            put_i32(&mut body, g.lad);
            put_u32(&mut body, g.lov);
            put_u32(&mut body, g.dx);
            put_u32(&mut body, g.dy);
            body.push(g.projection_centre);
            body.push(g.scanning_mode);
            put_i32(&mut body, g.latin1);
            put_i32(&mut body, g.latin2);
            put_i32(&mut body, g.south_pole_lat);
            put_u32(&mut body, g.south_pole_lon);
        }
    }
    finish_section(3, body)
}

fn build_section4(product: &ProductSpec) -> Result<Vec<u8>> {
    let template = product.template()?;
    let mut body = Vec::new();
    put_u16(&mut body, 0); // Coordinate values after template
    put_u16(&mut body, template);

    body.push(product.parameter_category);
    body.push(product.parameter_number);
    body.push(product.generating_process);
    body.push(0); // Background generating process
    body.push(0); // Analysis or forecast process
    put_u16(&mut body, 0); // Hours of cutoff
    body.push(0); // Minutes of cutoff
    body.push(1); // Time range unit (hours)
    put_u32(&mut body, product.forecast_time);
    body.push(product.first_surface_type);
    body.push(0);
    put_i32(&mut body, product.first_surface_value);
    body.push(255); // No second surface
    body.push(0);
    put_u32(&mut body, 0);

    if let Some(p) = &product.probability {
        body.push(p.number);
        body.push(p.total);
        body.push(p.probability_type);
        body.push(0); // Lower limit scale and value
        put_u32(&mut body, 0);
        body.push(0); // Upper limit scale and value
        put_u32(&mut body, 0);
    }

    if let Some(interval) = &product.interval {
        put_time(&mut body, &interval.end_time);
        body.push(1); // Number of time ranges
        put_u32(&mut body, 0); // Missing values in statistics
        body.push(interval.process);
        body.push(2); // Successive times, same reference
        body.push(1); // Hours
        put_u32(&mut body, interval.length);
        body.push(255); // Increment unit (missing)
        put_u32(&mut body, 0);
    }

    Ok(finish_section(4, body))
}

/// Encode one message holding `fields` on `spec.grid`.
pub fn encode_message(spec: &MessageSpec, fields: &[(ProductSpec, &[f32])]) -> Result<Vec<u8>> {
    let num_points = match &spec.grid {
        GridTemplate::LatLon(g) => (g.ni * g.nj) as usize,
        GridTemplate::Lambert(g) => (g.nx * g.ny) as usize,
    };
    if fields.is_empty() {
        return Err(Grib2Error::PackingError("message with no fields".to_string()));
    }

    let mut sections = build_section1(spec);
    sections.extend(build_section3(&spec.grid));

    for (product, values) in fields {
        if values.len() != num_points {
            return Err(Grib2Error::PackingError(format!(
                "{} values for a grid of {} points",
                values.len(),
                num_points
            )));
        }
        sections.extend(build_section4(product)?);

        let packed = pack_simple(values, product.decimal_scale)?;
        let mut s5 = Vec::new();
        put_u32(&mut s5, packed.num_packed as u32);
        put_u16(&mut s5, 0);
        s5.extend_from_slice(&packed.reference_value.to_be_bytes());
        put_i16(&mut s5, packed.binary_scale_factor);
        put_i16(&mut s5, packed.decimal_scale_factor);
        s5.push(packed.bits_per_value);
        s5.push(0); // Original values were floating point
        sections.extend(finish_section(5, s5));

        let s6 = match packed.bitmap {
            Some(bitmap) => {
                let mut body = vec![0];
                body.extend_from_slice(&bitmap);
                body
            }
            None => vec![255],
        };
        sections.extend(finish_section(6, s6));
        sections.extend(finish_section(7, packed.data));
    }

    let message_length = 16 + sections.len() + 4;
    let mut message = Vec::with_capacity(message_length);
    message.extend_from_slice(b"GRIB");
    message.extend_from_slice(&[0, 0]);
    message.push(spec.discipline);
    message.push(2);
    message.extend_from_slice(&(message_length as u64).to_be_bytes());
    message.extend_from_slice(&sections);
    message.extend_from_slice(b"7777");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{parse_grid_definition, parse_product_definition};
    use chrono::TimeZone;

    #[test]
    fn test_section3_length_for_lambert() {
        let s3 = build_section3(&GridTemplate::Lambert(LambertGrid::ncep_212()));
        assert_eq!(s3.len(), 81);
        let parsed = parse_grid_definition(&s3).unwrap();
        assert_eq!(parsed.num_points, 185 * 129);
        assert_eq!(parsed.template, GridTemplate::Lambert(LambertGrid::ncep_212()));
    }

    #[test]
    fn test_probability_product_is_template_4_9() {
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let product = ProductSpec::probability(19, 198, 20, end, 24);
        let s4 = build_section4(&product).unwrap();
        assert_eq!(s4.len(), 71);

        let parsed = parse_product_definition(&s4).unwrap();
        assert_eq!(parsed.template, 9);
        assert_eq!(parsed.parameter_number, 198);
        assert_eq!(parsed.forecast_time, 20);
        let stats = parsed.statistics.unwrap();
        assert_eq!(stats.end_time, end);
        assert_eq!(stats.length, 24);
        assert_eq!(parsed.probability.unwrap().total, 21);
    }

    #[test]
    fn test_negative_latitude_roundtrips() {
        let mut grid = LambertGrid::ncep_212();
        grid.la1 = -12_190_000;
        let s3 = build_section3(&GridTemplate::Lambert(grid.clone()));
        let parsed = parse_grid_definition(&s3).unwrap();
        assert_eq!(parsed.template, GridTemplate::Lambert(grid));
    }

    #[test]
    fn test_wrong_value_count_is_rejected() {
        let spec = MessageSpec::ncep(
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            1,
            GridTemplate::Lambert(LambertGrid::ncep_212()),
        );
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        let product = ProductSpec::probability(19, 197, 0, end, 4);
        let values = vec![0.0f32; 10];
        assert!(encode_message(&spec, &[(product, &values[..])]).is_err());
    }
}
