//! Graphic payload decoding.
//!
//! A `^GFA` payload arrives either as ASCII hex, optionally shortened with
//! ZPL's repeat-count characters, or wrapped in a Z64 envelope:
//!
//! ```text
//! :Z64:<base64 of a zlib stream>:<CRC-16 of the base64 text, 4 hex digits>
//! ```
//!
//! Payloads are always written back as plain ASCII hex.

use std::io::Read;

use base64::{engine::general_purpose, Engine};
use flate2::read::ZlibDecoder;
use log::{debug, warn};

use crate::error::Error;

const Z64: &str = "Z64";

/// A cleaned payload, before it is turned into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// ASCII hex, possibly using repeat counts. Expanding it needs the row
    /// width, so it is kept as text.
    Hex(String),
    /// Bytes inflated from a Z64 envelope.
    Inflated(Vec<u8>),
}

impl Payload {
    /// Turn the payload into the raw bit-packed buffer.
    pub fn into_bytes(self, bytes_per_row: usize) -> Vec<u8> {
        match self {
            Payload::Hex(text) => expand_hex(&text, bytes_per_row),
            Payload::Inflated(bytes) => bytes,
        }
    }
}

/// Drop the line-wrap whitespace and control characters a payload picks up
/// when it is split for display.
pub fn clean(data: &str) -> String {
    data.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect()
}

/// Name of the compression envelope a cleaned payload starts with, if any.
///
/// Envelopes look like `:Z64:` - a colon, three alphanumerics, a colon.
/// Plain ASCII hex can start the same way (`:` repeats a row), so a name made
/// only of hex digits and repeat counts is an envelope only when the payload
/// ends in a `:XXXX` CRC.
pub fn compression_sentinel(data: &str) -> Option<&str> {
    let bytes = data.as_bytes();
    if bytes.len() < 5
        || bytes[0] != b':'
        || bytes[4] != b':'
        || !bytes[1..4].iter().all(u8::is_ascii_alphanumeric)
    {
        return None;
    }
    if bytes[1..4].iter().all(|&c| is_hex_text(c)) && !has_crc_suffix(&data[5..]) {
        return None;
    }
    Some(&data[1..4])
}

/// Hex digits and the repeat-count letters `G`..`Y`, `g`..`z`.
fn is_hex_text(c: u8) -> bool {
    matches!(c, b'0'..=b'9' | b'A'..=b'Y' | b'a'..=b'z')
}

fn has_crc_suffix(body: &str) -> bool {
    body.rfind(':').map_or(false, |index| {
        let crc = &body[index + 1..];
        crc.len() == 4 && crc.bytes().all(|c| c.is_ascii_hexdigit())
    })
}

/// Clean a payload and open its envelope.
///
/// Payloads without an envelope come back untouched as [`Payload::Hex`].
/// `expected_len` is the byte count the header declares; an inflated buffer
/// of a different size is logged and kept.
pub fn decode(data: &str, expected_len: usize) -> Result<Payload, Error> {
    let data = clean(data);

    match compression_sentinel(&data) {
        None => Ok(Payload::Hex(data)),
        Some(Z64) => {
            let bytes = decompress_z64(&data[5..])?;
            if bytes.len() != expected_len {
                warn!(
                    "Z64 payload inflated to {} bytes, header declares {}",
                    bytes.len(),
                    expected_len
                );
            }
            Ok(Payload::Inflated(bytes))
        }
        Some(other) => Err(Error::UnsupportedCompression(format!(":{}:", other))),
    }
}

/// Decode a Z64 body, the part after `:Z64:`.
fn decompress_z64(body: &str) -> Result<Vec<u8>, Error> {
    let (encoded, crc) = match body.rfind(':') {
        Some(index) => (&body[..index], Some(&body[index + 1..])),
        None => (body, None),
    };

    match crc {
        Some(crc) => {
            let computed = format!("{:04X}", crc16(encoded.as_bytes()));
            if !crc.eq_ignore_ascii_case(&computed) {
                warn!("Z64 CRC mismatch: payload says {}, computed {}", crc, computed);
            }
        }
        None => warn!("Z64 payload has no CRC"),
    }

    let compressed = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::CorruptPayload(format!("invalid base64: {}", e)))?;

    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::CorruptPayload(format!("zlib decompress error: {}", e)))?;

    debug!("Z64 {} -> {} bytes", compressed.len(), out.len());
    Ok(out)
}

/// CRC-16/XMODEM, the checksum Z64 envelopes carry.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Expand ZPL ASCII hex into bytes.
///
/// Besides hex digits the text may carry:
///
/// * `G`..`Y` - repeat the next digit 1 to 19 times
/// * `g`..`z` - repeat the next digit 20 to 400 times, in steps of 20
/// * `,` - fill the rest of the row with `0`
/// * `!` - fill the rest of the row with `F`
/// * `:` - repeat the previous row
///
/// Counts written back to back add up, so `hK` repeats 45 times.
pub fn expand_hex(text: &str, bytes_per_row: usize) -> Vec<u8> {
    let row_digits = bytes_per_row.saturating_mul(2);
    let mut digits: Vec<u8> = Vec::with_capacity(text.len());
    let mut count = 0;
    let mut skipped = 0;

    for c in text.bytes() {
        match c {
            b'0'..=b'9' | b'A'..=b'F' | b'a'..=b'f' => {
                let repeat = count.max(1);
                digits.extend(std::iter::repeat(hex_value(c)).take(repeat));
                count = 0;
            }
            b'G'..=b'Y' => count += (c - b'G' + 1) as usize,
            b'g'..=b'z' => count += (c - b'g' + 1) as usize * 20,
            b',' | b'!' if row_digits > 0 => {
                let fill = if c == b'!' { 0x0F } else { 0x00 };
                let used = digits.len() % row_digits;
                digits.extend(std::iter::repeat(fill).take(row_digits - used));
                count = 0;
            }
            b':' if row_digits > 0 => {
                let used = digits.len() % row_digits;
                if used != 0 {
                    digits.extend(std::iter::repeat(0).take(row_digits - used));
                }
                let end = digits.len();
                if end >= row_digits {
                    digits.extend_from_within(end - row_digits..end);
                } else {
                    digits.extend(std::iter::repeat(0).take(row_digits));
                }
                count = 0;
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("skipped {} characters that are not ASCII hex", skipped);
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }

    digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect()
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => 0,
    }
}

/// Encode bytes as uppercase ASCII hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0F) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    fn z64(bytes: &[u8]) -> String {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        let encoded = general_purpose::STANDARD.encode(encoder.finish().unwrap());
        format!(":Z64:{}:{:04X}", encoded, crc16(encoded.as_bytes()))
    }

    #[test]
    fn clean_strips_wrapping() {
        assert_eq!(clean("FF00\r\n  FF\t00\n"), "FF00FF00");
    }

    #[test]
    fn crc16_xmodem_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
        assert_eq!(crc16(b""), 0x0000);
    }

    #[test]
    fn plain_hex_passes_through() {
        let payload = decode("FF00FF00", 4).unwrap();
        assert_eq!(payload, Payload::Hex("FF00FF00".to_string()));
        assert_eq!(payload.into_bytes(2), vec![0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn z64_inflates() {
        let raw: Vec<u8> = (0..=255).collect();
        let payload = decode(&z64(&raw), raw.len()).unwrap();
        assert_eq!(payload, Payload::Inflated(raw));
    }

    #[test]
    fn z64_wrapped_over_lines() {
        let raw = vec![0xAA; 300];
        let text = z64(&raw);
        let (head, tail) = text.split_at(20);
        let wrapped = format!("{}\r\n{}", head, tail);
        assert_eq!(decode(&wrapped, 300).unwrap().into_bytes(10), raw);
    }

    #[test]
    fn z64_tolerates_bad_crc_and_length() {
        let raw = vec![0x0F; 64];
        let text = z64(&raw);
        let tampered = format!("{}0000", &text[..text.len() - 4]);
        assert_eq!(decode(&tampered, 10).unwrap(), Payload::Inflated(raw.clone()));

        let no_crc = &text[..text.rfind(':').unwrap()];
        assert_eq!(decode(no_crc, 64).unwrap(), Payload::Inflated(raw));
    }

    #[test]
    fn z64_corrupt_body() {
        assert!(matches!(
            decode(":Z64:not*base64:0000", 4),
            Err(Error::CorruptPayload(_))
        ));
        // valid base64, but not a zlib stream
        assert!(matches!(
            decode(":Z64:AAAAAAAA:0000", 4),
            Err(Error::CorruptPayload(_))
        ));
    }

    #[test]
    fn unknown_envelope_is_unsupported() {
        match decode(":Z99:eJwDAAAAAAE=:1234", 4) {
            Err(Error::UnsupportedCompression(name)) => assert_eq!(name, ":Z99:"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            decode(":B64:AAAA:1234", 4),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn hex_that_looks_like_an_envelope() {
        assert_eq!(compression_sentinel(":FFF:"), None);
        assert_eq!(compression_sentinel(":GFF:FF"), None);
        assert_eq!(compression_sentinel(":Z64:AAAA"), Some("Z64"));
        assert_eq!(compression_sentinel(":B64:AAAA:1F2E"), Some("B64"));

        // blank row, 0xFFF0 row, that row again
        let payload = decode(":FFF:", 4).unwrap();
        assert_eq!(payload, Payload::Hex(":FFF:".to_string()));
        assert_eq!(payload.into_bytes(2), vec![0, 0, 0xFF, 0xF0, 0xFF, 0xF0]);
    }

    #[test]
    fn expand_repeat_counts() {
        // G = 1, I = 3, Y = 19, g = 20, h = 40
        assert_eq!(expand_hex("IF0", 2), vec![0xFF, 0xF0]);
        assert_eq!(expand_hex("gF", 10), vec![0xFF; 10]);
        assert_eq!(expand_hex("hKF", 0).len(), 23);
        assert_eq!(expand_hex("YFF", 10), vec![0xFF; 10]);
    }

    #[test]
    fn expand_row_fills() {
        // 3 bytes per row
        assert_eq!(
            expand_hex("FF,!", 3),
            vec![0xFF, 0x00, 0x00, 0xFF, 0xFF, 0xFF]
        );
        // a comma at the start of a row is a whole blank row
        assert_eq!(expand_hex(",A0A0A0", 3), vec![0, 0, 0, 0xA0, 0xA0, 0xA0]);
    }

    #[test]
    fn expand_repeat_row() {
        assert_eq!(
            expand_hex("0102::", 2),
            vec![0x01, 0x02, 0x01, 0x02, 0x01, 0x02]
        );
        // partial row is padded before it is repeated
        assert_eq!(expand_hex("F:", 2), vec![0xF0, 0x00, 0xF0, 0x00]);
        // nothing to repeat gives a blank row
        assert_eq!(expand_hex(":", 2), vec![0x00, 0x00]);
    }

    #[test]
    fn expand_skips_junk_and_pads_odd_nibble() {
        assert_eq!(expand_hex("F#F-F", 4), vec![0xFF, 0xF0]);
    }

    #[test]
    fn encode_uppercase() {
        assert_eq!(encode_hex(&[0x00, 0xAB, 0xFF]), "00ABFF");
        assert_eq!(expand_hex(&encode_hex(&[0x12, 0xEF]), 2), vec![0x12, 0xEF]);
    }
}
