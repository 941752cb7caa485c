//! GRIB2 test message generator.
//!
//! Creates minimal synthetic GRIB2 messages shaped like HREF member output
//! (lat/lon grid, template 4.0 or 4.8, 16-bit simple packing). The builder
//! is independent of the codec crate so decoding is checked against bytes
//! written by other code.

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition (template 3.0), microdegrees
    ni: u32,
    nj: u32,
    la1: i32,
    lo1: i32,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    generating_process: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    /// (statistical process, length in hours); selects template 4.8
    statistics: Option<(u8, u32)>,
    data_values: Vec<f32>,
}

fn put_signed(section: &mut Vec<u8>, value: i32) {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    section.extend_from_slice(&raw.to_be_bytes());
}

fn put_signed16(section: &mut Vec<u8>, value: i16) {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    section.extend_from_slice(&raw.to_be_bytes());
}

impl Grib2Builder {
    /// A 4x3 half-degree grid at 30N 100W holding hourly max updraft helicity.
    pub fn new_uh_member() -> Self {
        let (ni, nj) = (4, 3);
        Self {
            discipline: 0,
            center: 7,
            year: 2024,
            month: 5,
            day: 1,
            hour: 0,
            ni,
            nj,
            la1: 30_000_000,
            lo1: -100_000_000,
            di: 500_000,
            dj: 500_000,
            scanning_mode: 0x40,
            param_category: 7,
            param_number: 199,
            generating_process: 2,
            level_type: 103,
            level_value: 5000,
            forecast_hour: 0,
            statistics: Some((2, 1)),
            data_values: vec![0.0; (ni * nj) as usize],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    /// Regular grid with first point (lat1, lon1) and spacing `step`, all in degrees.
    pub fn with_grid(mut self, ni: u32, nj: u32, lat1: f64, lon1: f64, step: f64) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.la1 = (lat1 * 1e6).round() as i32;
        self.lo1 = (lon1 * 1e6).round() as i32;
        self.di = (step * 1e6).round() as u32;
        self.dj = self.di;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_generating_process(mut self, process: u8) -> Self {
        self.generating_process = process;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    /// Statistically processed over `length` hours (template 4.8).
    pub fn with_statistics(mut self, process: u8, length: u32) -> Self {
        self.statistics = Some((process, length));
        self
    }

    /// Instantaneous product (template 4.0).
    pub fn instantaneous(mut self) -> Self {
        self.statistics = None;
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];
        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in &sections {
            message.extend_from_slice(section);
        }
        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Start of forecast
        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0);
        section.push(0);
        section.push(0); // Operational
        section.push(1); // Forecast
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);
        section.push(0);
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Spherical earth, radius 6371229 m
        section.extend_from_slice(&[0; 15]);
        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes()); // Subdivisions

        let step_lat = if self.scanning_mode & 0x40 != 0 { 1 } else { -1 };
        let la2 = self.la1 + step_lat * (self.nj as i32 - 1) * self.dj as i32;
        let lo2 = self.lo1 + (self.ni as i32 - 1) * self.di as i32;
        put_signed(&mut section, self.la1);
        put_signed(&mut section, self.lo1);
        section.push(48);
        put_signed(&mut section, la2);
        put_signed(&mut section, lo2);
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let template: u16 = if self.statistics.is_some() { 8 } else { 0 };
        let length: u32 = if self.statistics.is_some() { 58 } else { 34 };

        let mut section = Vec::new();
        section.extend_from_slice(&length.to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes());
        section.extend_from_slice(&template.to_be_bytes());

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(self.generating_process);
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(1); // Hours
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());
        section.push(self.level_type);
        section.push(0);
        section.extend_from_slice(&self.level_value.to_be_bytes());
        section.push(255);
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        if let Some((process, hours)) = self.statistics {
            // End of interval, assuming the interval ends within the same month.
            let end_hour = self.hour as u32 + self.forecast_hour + hours;
            section.extend_from_slice(&self.year.to_be_bytes());
            section.push(self.month);
            section.push(self.day + (end_hour / 24) as u8);
            section.push((end_hour % 24) as u8);
            section.push(0);
            section.push(0);
            section.push(1);
            section.extend_from_slice(&0u32.to_be_bytes());
            section.push(process);
            section.push(2);
            section.push(1);
            section.extend_from_slice(&hours.to_be_bytes());
            section.push(255);
            section.extend_from_slice(&0u32.to_be_bytes());
        }
        section
    }

    fn packing(&self) -> (f32, i16, u8) {
        let (min_val, max_val) = self.data_values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );
        let range = max_val - min_val;
        if range == 0.0 {
            return (min_val, 0, 0);
        }
        // E = ceil(log2(range / 65535)) so every value fits in 16 bits.
        let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
        (min_val, binary_scale_factor, 16)
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes());
        section.extend_from_slice(&reference_value.to_be_bytes());
        put_signed16(&mut section, binary_scale_factor);
        put_signed16(&mut section, 0);
        section.push(bits_per_value);
        section.push(0);
        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&6u32.to_be_bytes());
        section.push(6);
        section.push(255); // No bitmap
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();
        let mut packed = Vec::new();
        if bits_per_value > 0 {
            let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
            for &val in &self.data_values {
                let packed_value = ((val - reference_value) / binary_scale).round() as u16;
                packed.extend_from_slice(&packed_value.to_be_bytes());
            }
        }

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }
}

/// Concatenate messages into one file body.
pub fn concat_messages(messages: &[Vec<u8>]) -> Vec<u8> {
    messages.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_member_message() {
        let bytes = Grib2Builder::new_uh_member().build();
        assert_eq!(&bytes[0..4], b"GRIB");
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
        let declared = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(declared as usize, bytes.len());
    }

    #[test]
    fn test_instantaneous_is_shorter() {
        let stat = Grib2Builder::new_uh_member().build();
        let inst = Grib2Builder::new_uh_member().instantaneous().build();
        assert_eq!(stat.len() - inst.len(), 24);
    }

    #[test]
    fn test_negative_longitude_is_sign_magnitude() {
        let bytes = Grib2Builder::new_uh_member().build();
        // Section 3 starts after sections 0 (16) and 1 (21); Lo1 is octets 51-54.
        let lo1 = &bytes[16 + 21 + 50..16 + 21 + 54];
        assert_eq!(lo1[0] & 0x80, 0x80);
        assert_eq!(
            u32::from_be_bytes(lo1.try_into().unwrap()) & 0x7FFF_FFFF,
            100_000_000
        );
    }
}
