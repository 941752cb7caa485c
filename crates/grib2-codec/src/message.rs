//! Message and section walker.
//!
//! A GRIB2 file is a sequence of messages. Inside a message, sections 2-7
//! may repeat; every section 7 closes one field, reusing whichever grid,
//! product and representation sections were seen last.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Grib2Error, Result};
use crate::sections::{
    parse_bitmap, parse_data_representation, parse_grid_definition, parse_identification,
    parse_indicator, parse_product_definition, section_header, BitmapIndicator,
    DataRepresentation, GridDefinition, Identification, ProductDefinition,
};

/// One field's worth of sections, still packed.
#[derive(Debug, Clone)]
pub struct RawField {
    /// Index of the message within the file.
    pub message_index: usize,
    /// Index of the field within its message.
    pub submessage_index: usize,
    pub discipline: u8,
    pub identification: Arc<Identification>,
    pub grid: Arc<GridDefinition>,
    pub product: ProductDefinition,
    pub representation: DataRepresentation,
    pub bitmap: Option<Bytes>,
    pub data: Bytes,
    /// The whole enclosing message, for packings decoded by the `grib` crate.
    pub message: Bytes,
}

fn find_magic(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|p| p + from)
}

/// Split a file into its fields without unpacking any values.
pub fn scan_fields(bytes: &Bytes) -> Result<Vec<RawField>> {
    let mut fields = Vec::new();
    let mut offset = 0;
    let mut message_index = 0;

    while let Some(start) = find_magic(bytes, offset) {
        let indicator = parse_indicator(&bytes[start..])?;
        let length = indicator.message_length as usize;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= bytes.len() && length >= 20)
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "message {} at offset {} claims {} bytes, {} available",
                    message_index,
                    start,
                    length,
                    bytes.len() - start
                ))
            })?;
        if &bytes[end - 4..end] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "message {} is missing its end section",
                message_index
            )));
        }

        let message = bytes.slice(start..end);
        let before = fields.len();
        walk_message(&message, message_index, indicator.discipline, &mut fields)?;
        trace!(
            message = message_index,
            fields = fields.len() - before,
            "Scanned GRIB2 message"
        );

        offset = end;
        message_index += 1;
    }

    if message_index == 0 {
        return Err(Grib2Error::InvalidFormat(
            "no GRIB2 messages found".to_string(),
        ));
    }
    debug!(
        messages = message_index,
        fields = fields.len(),
        "Scanned GRIB2 file"
    );
    Ok(fields)
}

fn walk_message(
    message: &Bytes,
    message_index: usize,
    discipline: u8,
    out: &mut Vec<RawField>,
) -> Result<()> {
    let mut pos = 16;
    let mut identification: Option<Arc<Identification>> = None;
    let mut grid: Option<Arc<GridDefinition>> = None;
    let mut product: Option<ProductDefinition> = None;
    let mut representation: Option<DataRepresentation> = None;
    let mut bitmap: Option<Bytes> = None;
    let mut previous_bitmap: Option<Bytes> = None;
    let mut submessage_index = 0;

    let end = message.len() - 4;
    while pos < end {
        let (length, number) = section_header(&message[pos..])?;
        if length < 5 || pos + length > end {
            return Err(Grib2Error::invalid_section(
                number,
                format!("length {} overruns message at offset {}", length, pos),
            ));
        }
        let section = &message[pos..pos + length];

        match number {
            1 => identification = Some(Arc::new(parse_identification(section)?)),
            2 => {}
            3 => grid = Some(Arc::new(parse_grid_definition(section)?)),
            4 => product = Some(parse_product_definition(section)?),
            5 => representation = Some(parse_data_representation(section)?),
            6 => {
                bitmap = match parse_bitmap(section)? {
                    BitmapIndicator::Absent => None,
                    BitmapIndicator::Present(bm) => {
                        previous_bitmap = Some(bm.clone());
                        Some(bm)
                    }
                    BitmapIndicator::Previous => Some(previous_bitmap.clone().ok_or_else(|| {
                        Grib2Error::invalid_section(6, "reuse requested before any bitmap")
                    })?),
                }
            }
            7 => {
                let missing = |what: &str| {
                    Grib2Error::invalid_section(7, format!("data section before {}", what))
                };
                out.push(RawField {
                    message_index,
                    submessage_index,
                    discipline,
                    identification: identification.clone().ok_or_else(|| missing("section 1"))?,
                    grid: grid.clone().ok_or_else(|| missing("section 3"))?,
                    product: product.clone().ok_or_else(|| missing("section 4"))?,
                    representation: representation.clone().ok_or_else(|| missing("section 5"))?,
                    bitmap: bitmap.clone(),
                    data: message.slice(pos + 5..pos + length),
                    message: message.clone(),
                });
                submessage_index += 1;
            }
            other => {
                return Err(Grib2Error::InvalidFormat(format!(
                    "unexpected section number {} at offset {}",
                    other, pos
                )))
            }
        }
        pos += length;
    }

    Ok(())
}
