//! Value decoding for scanned fields.

use std::io::Cursor;

use tracing::trace;

use crate::error::{Grib2Error, Result};
use crate::message::RawField;
use crate::unpacking::unpack_simple;

/// Unpack a field's values in storage order. Missing points are NaN.
///
/// Simple packing is handled here; every other template is handed to the
/// `grib` crate, which reads the enclosing message again.
pub fn decode_values(field: &RawField) -> Result<Vec<f32>> {
    let num_points = field.grid.num_points as usize;
    let rep = &field.representation;

    let values = match rep.template {
        0 => unpack_simple(
            &field.data,
            num_points,
            rep.bits_per_value,
            rep.reference_value,
            rep.binary_scale_factor,
            rep.decimal_scale_factor,
            field.bitmap.as_deref(),
        )?,
        template => {
            trace!(template, "Delegating unpacking to grib crate");
            decode_with_grib_crate(field)?
        }
    };

    if values.len() != num_points {
        return Err(Grib2Error::UnpackingError(format!(
            "decoded {} values for a grid of {} points",
            values.len(),
            num_points
        )));
    }
    Ok(values)
}

fn decode_with_grib_crate(field: &RawField) -> Result<Vec<f32>> {
    let grib_file = grib::from_reader(Cursor::new(field.message.as_ref()))
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate rejected message: {:?}", e)))?;

    let submsg = grib_file
        .iter()
        .find(|((_, sub), _)| *sub == field.submessage_index)
        .map(|(_, submsg)| submsg)
        .ok_or_else(|| {
            Grib2Error::UnpackingError(format!(
                "submessage {} not found in message {}",
                field.submessage_index, field.message_index
            ))
        })?;

    let decoder = grib::Grib2SubmessageDecoder::from(submsg)
        .map_err(|e| Grib2Error::UnpackingError(format!("{:?}", e)))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(format!("{}", e)))?;
    Ok(values.collect())
}
