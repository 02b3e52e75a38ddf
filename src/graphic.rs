//! `^GF` graphic fields.
//!
//! Header layout on the wire, after the `GF` mnemonic:
//!
//! ```text
//! <format>,<binary byte count>,<field byte count>,<bytes per row>,<payload>
//! ```

use std::fmt;

use log::debug;

use crate::{
    bitmap::Bitmap,
    error::Error,
    payload::{self, encode_hex},
};

/// Mnemonic that starts a graphic field section.
pub const GRAPHIC_FIELD: &str = "GF";

/// `^GF` format letter for ASCII hex data, the only one this crate reads or
/// writes.
pub const ASCII_HEX: char = 'A';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterField {
    pub format: char,
    pub binary_byte_count: usize,
    pub field_byte_count: usize,
    pub bytes_per_row: usize,
    pub payload: String,
}

impl RasterField {
    /// Parse a graphic section, with or without its leading `^`.
    pub fn parse(section: &str) -> Result<Self, Error> {
        let section = section.strip_prefix('^').unwrap_or(section);
        let body = section.strip_prefix(GRAPHIC_FIELD).ok_or_else(|| {
            Error::MalformedGraphicHeader(format!("not a ^GF section: {:.16}", section))
        })?;

        let fields: Vec<&str> = body.splitn(5, ',').collect();
        if fields.len() < 4 {
            return Err(Error::MalformedGraphicHeader(format!(
                "expected 4 header fields, found {}",
                fields.len()
            )));
        }

        let format = fields[0].trim().chars().next().unwrap_or(ASCII_HEX);
        let binary_byte_count = parse_count("binary byte count", fields[1])?;
        let field_byte_count = parse_count("field byte count", fields[2])?;
        let bytes_per_row = parse_count("bytes per row", fields[3])?;
        if bytes_per_row == 0 {
            return Err(Error::MalformedGraphicHeader(
                "bytes per row is zero".to_string(),
            ));
        }

        let field = RasterField {
            format,
            binary_byte_count,
            field_byte_count,
            bytes_per_row,
            payload: fields.get(4).map(|p| p.to_string()).unwrap_or_default(),
        };
        field.bit_counts()?;
        Ok(field)
    }

    /// Bits the bitmap covers and bits per row. Both must fit a `u32`, the
    /// range of bitmap coordinates.
    fn bit_counts(&self) -> Result<(usize, usize), Error> {
        let bits = |name: &str, bytes: usize| {
            bytes
                .checked_mul(8)
                .filter(|&bits| bits <= u32::MAX as usize)
                .ok_or_else(|| {
                    Error::MalformedGraphicHeader(format!("{} too large: {}", name, bytes))
                })
        };
        Ok((
            bits("byte count", self.total_bytes())?,
            bits("bytes per row", self.bytes_per_row)?,
        ))
    }

    /// Byte count the bitmap covers: the larger of the two declared counts.
    pub fn total_bytes(&self) -> usize {
        self.binary_byte_count.max(self.field_byte_count)
    }

    /// Decode the payload into a bitmap.
    pub fn to_bitmap(&self) -> Result<Bitmap, Error> {
        if !self.format.eq_ignore_ascii_case(&ASCII_HEX) {
            return Err(Error::UnsupportedCompression(format!(
                "^GF format {}",
                self.format
            )));
        }

        let (total_bits, row_bits) = self.bit_counts()?;
        let data =
            payload::decode(&self.payload, self.total_bytes())?.into_bytes(self.bytes_per_row);
        let bitmap = Bitmap::from_packed(&data, total_bits, row_bits);
        debug!(
            "graphic field {}x{} from {} payload bytes",
            bitmap.width(),
            bitmap.height(),
            data.len()
        );
        Ok(bitmap)
    }

    /// Build an uncompressed ASCII hex field for a bitmap.
    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        let packed = bitmap.packed();
        RasterField {
            format: ASCII_HEX,
            binary_byte_count: packed.len(),
            field_byte_count: packed.len(),
            bytes_per_row: bitmap.bytes_per_row(),
            payload: encode_hex(packed),
        }
    }

    /// Decode, resample by `factor` and re-encode uncompressed.
    pub fn rescale(&self, factor: f64) -> Result<Self, Error> {
        let bitmap = self.to_bitmap()?.resample(factor)?;
        Ok(RasterField::from_bitmap(&bitmap))
    }
}

/// The section text without the leading `^`.
impl fmt::Display for RasterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{},{},{},{}",
            GRAPHIC_FIELD,
            self.format,
            self.binary_byte_count,
            self.field_byte_count,
            self.bytes_per_row,
            self.payload
        )
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize, Error> {
    value.trim().parse::<usize>().map_err(|_| {
        Error::MalformedGraphicHeader(format!("{} is not a count: {:?}", name, value))
    })
}
