//! Whole-stream rescaling.

use log::{debug, info};

use crate::{
    command::{closes_graphic_block, continues_graphic_block, opens_graphic_block, scale_line},
    error::Error,
};

/// Ratio between the printer's resolution and the one the label was
/// authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFactor {
    desired_dpi: u32,
    current_dpi: u32,
}

impl ScaleFactor {
    /// A zero on either side means the resolution is unknown.
    pub fn new(desired_dpi: u32, current_dpi: u32) -> Result<Self, Error> {
        if desired_dpi == 0 || current_dpi == 0 {
            return Err(Error::UnknownResolution);
        }
        Ok(ScaleFactor {
            desired_dpi,
            current_dpi,
        })
    }

    pub fn value(&self) -> f64 {
        self.desired_dpi as f64 / self.current_dpi as f64
    }

    pub fn is_identity(&self) -> bool {
        self.desired_dpi == self.current_dpi
    }
}

/// Rescale a label authored at `current_dpi` for a printer at `desired_dpi`.
///
/// Equal resolutions return the stream as it is, without decoding any
/// graphic. Line structure is kept, except that a graphic field whose
/// payload was wrapped over several lines comes back on one line.
///
/// Either every section is scaled or the call fails: a graphic field that
/// cannot be decoded fails the whole stream, and callers should print the
/// original instead.
pub fn rescale(stream: &str, desired_dpi: u32, current_dpi: u32) -> Result<String, Error> {
    let factor = ScaleFactor::new(desired_dpi, current_dpi)?;
    if factor.is_identity() {
        return Ok(stream.to_string());
    }

    info!(
        "rescaling label from {}dpi to {}dpi (factor {:.4})",
        current_dpi,
        desired_dpi,
        factor.value()
    );

    let mut scaled: Vec<String> = Vec::new();
    let mut lines = stream.split('\n').peekable();

    while let Some(line) = lines.next() {
        if !opens_graphic_block(line) {
            scaled.push(scale_line(line, factor.value())?);
            continue;
        }

        // The joined line keeps the first line's ending.
        let ending = if line.ends_with('\r') { "\r" } else { "" };
        let mut block = line.trim_end_matches('\r').to_string();
        while let Some(next) = lines.next_if(|next| continues_graphic_block(next)) {
            block.push_str(next.trim_end_matches('\r'));
            if closes_graphic_block(next) {
                break;
            }
        }
        block.push_str(ending);
        debug!("graphic field wrapped over lines, {} bytes", block.len());
        scaled.push(scale_line(&block, factor.value())?);
    }

    Ok(scaled.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor() {
        let factor = ScaleFactor::new(300, 203).unwrap();
        assert!((factor.value() - 1.477_832).abs() < 1e-6);
        assert!(!factor.is_identity());
        assert!(ScaleFactor::new(203, 203).unwrap().is_identity());
    }

    #[test]
    fn unknown_resolution() {
        assert!(matches!(
            rescale("^XA^XZ", 0, 203),
            Err(Error::UnknownResolution)
        ));
        assert!(matches!(
            rescale("^XA^XZ", 300, 0),
            Err(Error::UnknownResolution)
        ));
    }

    #[test]
    fn identity_short_circuits() {
        // would fail to decode if it were touched
        let stream = "^XA\n^FO1,1^GFA,8,8^FS\n^XZ\n";
        assert_eq!(rescale(stream, 203, 203).unwrap(), stream);
    }

    #[test]
    fn keeps_line_structure() {
        let stream = "^XA\r\n^FO100,200^FDHi^FS\r\n\r\n^XZ\n";
        assert_eq!(
            rescale(stream, 400, 200).unwrap(),
            "^XA\r\n^FO200,400^FDHi^FS\r\n\r\n^XZ\n"
        );
    }

    #[test]
    fn wrapped_graphic_payload() {
        let stream = "^XA\n^FO10,10^GFA,8,8,2,\nFFFFFFFF\nFFFFFFFF^FS\n^XZ";
        assert_eq!(
            rescale(stream, 100, 200).unwrap(),
            "^XA\n^FO5,5^GFA,2,2,1,FFFF^FS\n^XZ"
        );
    }

    #[test]
    fn wrapped_graphic_keeps_crlf() {
        let stream = "^XA\r\n^FO10,10^GFA,8,8,2,\r\nFFFFFFFF\r\nFFFFFFFF^FS\r\n^XZ\r\n";
        assert_eq!(
            rescale(stream, 100, 200).unwrap(),
            "^XA\r\n^FO5,5^GFA,2,2,1,FFFF^FS\r\n^XZ\r\n"
        );
    }

    #[test]
    fn wrapped_payload_ends_at_next_command() {
        let stream = "^FO0,0^GFA,8,8,2,\nFFFFFFFF\nFFFFFFFF\n^FS";
        assert_eq!(
            rescale(stream, 100, 200).unwrap(),
            "^FO0,0^GFA,2,2,1,FFFF\n^FS"
        );
    }

    #[test]
    fn failure_is_total() {
        let stream = "^FO100,100^FDok^FS\n^GFA,8,8,2,:Z99:AAAA:0000^FS";
        assert!(matches!(
            rescale(stream, 300, 203),
            Err(Error::UnsupportedCompression(_))
        ));
    }
}
