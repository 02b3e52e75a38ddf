//! ZPL label rescaling
//!
//! This crate rescales Zebra (ZPL) label streams authored for one print
//! resolution so they print at the same physical size on a printer with
//! another resolution. Dimension parameters of placement, font, barcode, box
//! and label geometry commands are multiplied by the scale factor; `^GF`
//! raster graphics are decoded (ASCII hex or Z64), resampled with nearest
//! neighbor and written back as uncompressed ASCII hex.
//!
//! Upscaling is lossy. Matching resolutions or downscaling gives the best
//! output.
//!
//! # Example
//!
//! ```rust
//! use zpl_rescale::rescale;
//!
//! let label = "^XA^FO100,200^A0N,30,30^FDHello^FS^XZ";
//! let scaled = rescale(label, 406, 203).unwrap();
//! assert_eq!(scaled, "^XA^FO200,400^A0N,60,60^FDHello^FS^XZ");
//! ```
//!
//! Sending to a printer over USB:
//!
//! ```rust,no_run
//! use zpl_rescale::{Config, Printer};
//!
//! let printer = Printer::new(Config::new().serial("D2J184800123".to_string())).unwrap();
//! printer.print("^XA^LL203^FO10,10^FDHello^FS^XZ").unwrap();
//! ```

mod bitmap;
mod command;
mod error;
mod graphic;
mod payload;
mod printer;
mod rescale;
mod resolution;

pub use crate::{
    bitmap::Bitmap,
    command::{is_scalable, is_scalable_mnemonic, scale_line, scale_section},
    error::Error,
    graphic::RasterField,
    payload::{crc16, Payload},
    printer::{
        list_printers, print_label, setup_commands, Config, DeviceInfo, LabelSink, Printer,
        AUTOSENSE, RESET, RESET_DEFAULT, ZEBRA_VENDOR_ID,
    },
    rescale::{rescale, ScaleFactor},
    resolution::{label_dpi, printer_dpi},
};

/// Decoding and encoding of `^GF` payloads.
pub mod codec {
    pub use crate::payload::{clean, compression_sentinel, decode, encode_hex, expand_hex};
}

/// Resolution of the common 8 dots/mm print heads.
pub const DPI_203: u32 = 203;

/// Resolution of 12 dots/mm print heads.
pub const DPI_300: u32 = 300;

/// Resolution of 24 dots/mm print heads.
pub const DPI_600: u32 = 600;
