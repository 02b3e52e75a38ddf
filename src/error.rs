//! Error types for label rescaling and printing.
//!
//! The first group of variants comes from the graphic pipeline and aborts a
//! whole rescale. The second group comes from the USB output sink.

use rusb;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A `^GF` section whose header does not carry format, binary byte count,
    /// field byte count and bytes per row, or carries them in a form that
    /// cannot describe a bitmap.
    #[error("Malformed graphic header: {0}")]
    MalformedGraphicHeader(String),

    /// The payload names a compression envelope other than Z64, or the `^GF`
    /// format is not ASCII hex.
    ///
    /// A graphic that cannot be decoded cannot be resized, so the whole
    /// stream is rejected rather than sent half scaled.
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// The scale factor collapses the bitmap to nothing on one axis.
    #[error("Scale collapses {width}x{height} bitmap to zero")]
    DegenerateScale { width: u32, height: u32 },

    /// A Z64 body that is not base64 or does not inflate.
    #[error("Corrupt graphic payload: {0}")]
    CorruptPayload(String),

    #[error("Resolution is unknown, refusing to rescale")]
    UnknownResolution,

    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues,
    /// timeouts, or permission problems.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    /// Printer device is not connected or not responding.
    #[error("Device is offline")]
    DeviceOffline,

    #[error("Can't read device list, permission issue ?")]
    DeviceListNotReadable,

    #[error("Device is missing endpoint")]
    MissingEndpoint,

    #[error("Printer accepted {0} bytes, expected more")]
    InvalidResponse(usize),

    #[error("Write timeout after retries")]
    WriteTimeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Transient USB conditions worth another write attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UsbError(rusb::Error::Timeout)
                | Self::UsbError(rusb::Error::Busy)
                | Self::UsbError(rusb::Error::Interrupted)
        )
    }
}
