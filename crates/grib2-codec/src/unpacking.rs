//! GRIB2 simple packing (data representation template 5.0).
//!
//! value = (R + X * 2^E) * 10^-D
//!
//! Other packings (complex, PNG, JPEG2000) are decoded by the `grib` crate,
//! see [`crate::decode`].

use crate::error::{Grib2Error, Result};

/// Check bit `i` of a section 6 bitmap. 1 = value present.
fn bitmap_has(bitmap: &[u8], i: usize) -> bool {
    let byte_idx = i / 8;
    let bit_idx = 7 - (i % 8);
    byte_idx < bitmap.len() && (bitmap[byte_idx] >> bit_idx) & 1 == 1
}

/// Unpack simple packed data onto `num_points` grid points.
///
/// Only points marked present in the bitmap consume packed values; the rest
/// come back as NaN.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>> {
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));
    let reference = reference_value as f64;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let bits = bits_per_value as usize;

    for i in 0..num_points {
        if let Some(bm) = bitmap {
            if !bitmap_has(bm, i) {
                values.push(f32::NAN);
                continue;
            }
        }

        let packed_value = if bits == 0 {
            0
        } else {
            let v = extract_bits(packed_data, bit_position, bits)
                .map_err(|e| Grib2Error::UnpackingError(format!("point {}: {}", i, e)))?;
            bit_position += bits;
            v
        };

        let value = (reference + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

/// Extract bits from a byte array, MSB first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> std::result::Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;
    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

/// Output of [`pack_simple`].
#[derive(Debug, Clone)]
pub struct PackedValues {
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    /// Number of values actually packed (bitmap-present points).
    pub num_packed: usize,
    pub data: Vec<u8>,
    /// Section 6 bitmap, present only when the input had NaN.
    pub bitmap: Option<Vec<u8>>,
}

/// Pack values with binary scale 0 and the given decimal scale.
///
/// The bit width is the smallest that holds the scaled range. NaN points are
/// left out of the packed stream and flagged missing in a bitmap.
pub fn pack_simple(values: &[f32], decimal_scale_factor: i16) -> Result<PackedValues> {
    let decimal = 10.0_f64.powi(decimal_scale_factor as i32);
    let present: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| (v as f64 * decimal).round())
        .collect();

    let bitmap = if present.len() == values.len() {
        None
    } else {
        let mut bm = vec![0u8; values.len().div_ceil(8)];
        for (i, v) in values.iter().enumerate() {
            if !v.is_nan() {
                bm[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Some(bm)
    };

    let (min, max) = present
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if present.is_empty() {
        return Ok(PackedValues {
            reference_value: 0.0,
            binary_scale_factor: 0,
            decimal_scale_factor,
            bits_per_value: 0,
            num_packed: 0,
            data: Vec::new(),
            bitmap,
        });
    }

    let range = max - min;
    if !range.is_finite() || range > u32::MAX as f64 {
        return Err(Grib2Error::PackingError(format!(
            "scaled range {} does not fit in 32 bits",
            range
        )));
    }
    let bits_per_value = if range == 0.0 {
        0u8
    } else {
        (64 - (range as u64).leading_zeros()) as u8
    };

    let mut data = Vec::with_capacity((present.len() * bits_per_value as usize).div_ceil(8));
    let mut acc: u64 = 0;
    let mut acc_bits = 0u32;
    if bits_per_value > 0 {
        for v in &present {
            let packed = (v - min) as u64;
            acc = (acc << bits_per_value) | packed;
            acc_bits += bits_per_value as u32;
            while acc_bits >= 8 {
                acc_bits -= 8;
                data.push((acc >> acc_bits) as u8);
            }
            acc &= (1u64 << acc_bits) - 1;
        }
        if acc_bits > 0 {
            data.push((acc << (8 - acc_bits)) as u8);
        }
    }

    Ok(PackedValues {
        reference_value: min as f32,
        binary_scale_factor: 0,
        decimal_scale_factor,
        bits_per_value,
        num_packed: present.len(),
        data,
        bitmap,
    })
}
