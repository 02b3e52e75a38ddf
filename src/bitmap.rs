//! 1-bit bitmaps stored as packed rows.
//!
//! Pixels are packed 8 to a byte, most significant bit first, each row padded
//! to a whole byte. A set bit is a printed (black) dot, the same convention
//! `^GF` uses on the wire, so packed rows go out to the printer as they are.

use log::debug;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create an all-white bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).div_ceil(8);
        Bitmap {
            width,
            height,
            stride,
            data: vec![0x00; stride * height as usize],
        }
    }

    /// Rebuild a bitmap from a bit-packed buffer.
    ///
    /// The buffer is read as one long run of `total_bits` bits, cut into rows
    /// of `row_bits`. A buffer shorter than `total_bits` reads as zeros and
    /// the final row is zero padded when `total_bits` does not fill it.
    /// Bytes past `total_bits` are ignored. `row_bits` and the resulting
    /// height are expected to fit a `u32`.
    pub fn from_packed(data: &[u8], total_bits: usize, row_bits: usize) -> Self {
        if row_bits == 0 {
            return Bitmap::new(0, 0);
        }
        let height = total_bits.div_ceil(row_bits);
        let mut bitmap = Bitmap::new(row_bits as u32, height as u32);

        if row_bits % 8 == 0 {
            // Rows are byte aligned in the source too, copy straight across.
            let len = (total_bits / 8).min(data.len()).min(bitmap.data.len());
            bitmap.data[..len].copy_from_slice(&data[..len]);
        } else {
            let available = total_bits.min(data.len() * 8);
            for i in 0..available {
                if data[i / 8] & (0x80 >> (i % 8)) != 0 {
                    bitmap.set((i % row_bits) as u32, (i / row_bits) as u32, true);
                }
            }
        }

        if data.len() * 8 < total_bits {
            debug!(
                "bit buffer holds {} of {} bits, padding with zeros",
                data.len() * 8,
                total_bits
            );
        }
        bitmap
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.stride
    }

    /// Packed rows, `bytes_per_row() * height()` bytes.
    pub fn packed(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.stride + x as usize / 8;
        self.data[index] & (0x80 >> (x % 8)) != 0
    }

    pub fn set(&mut self, x: u32, y: u32, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * self.stride + x as usize / 8;
        let mask = 0x80 >> (x % 8);
        if black {
            self.data[index] |= mask;
        } else {
            self.data[index] &= !mask;
        }
    }

    /// Resize by `factor` with nearest-neighbor sampling.
    ///
    /// The scaled width is cut down to a multiple of 8 so rows stay byte
    /// aligned, and the height is cut by the same amount. Cutting the height
    /// by the width's remainder distorts the aspect slightly; printed output
    /// depends on it, so it stays.
    pub fn resample(&self, factor: f64) -> Result<Bitmap, Error> {
        let degenerate = Error::DegenerateScale {
            width: self.width,
            height: self.height,
        };
        if !(factor.is_finite() && factor > 0.0) {
            return Err(degenerate);
        }

        let mut width = (self.width as f64 * factor).round_ties_even() as i64;
        let mut height = (self.height as f64 * factor).round_ties_even() as i64;
        if width <= 0 || height <= 0 {
            return Err(degenerate);
        }

        let remainder = width % 8;
        width -= remainder;
        height -= remainder;
        if width <= 0 || height <= 0 {
            return Err(degenerate);
        }

        let (width, height) = (width as u32, height as u32);
        debug!(
            "resample {}x{} -> {}x{} (factor {})",
            self.width, self.height, width, height, factor
        );

        let columns: Vec<u32> = (0..width)
            .map(|x| nearest(x, width, self.width))
            .collect();

        let mut scaled = Bitmap::new(width, height);
        for y in 0..height {
            let source_y = nearest(y, height, self.height);
            for (x, &source_x) in columns.iter().enumerate() {
                if self.get(source_x, source_y) {
                    scaled.set(x as u32, y, true);
                }
            }
        }
        Ok(scaled)
    }
}

/// Source coordinate whose pixel center is nearest to output coordinate `i`.
fn nearest(i: u32, scaled: u32, original: u32) -> u32 {
    let source = ((i as f64 + 0.5) * original as f64 / scaled as f64) as u32;
    source.min(original.saturating_sub(1))
}
