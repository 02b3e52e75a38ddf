//! Line and section level handling of a command stream.
//!
//! A line is split on `^` into sections. Sections whose two character
//! mnemonic carries physical dimensions get their numeric parameters
//! multiplied by the scale factor; every other section is copied byte for
//! byte. `^GF` graphic fields are not split that way, each one on a line goes
//! through [`RasterField`] instead.

use crate::{error::Error, graphic::RasterField};

/// Command prefix character.
pub const CARET: char = '^';

/// Marker of a line that holds a graphic field.
pub const GRAPHIC_MARKER: &str = "^GF";

/// Ends a field; the first one after a graphic header closes its payload.
const FIELD_SEPARATOR: &str = "^FS";

/// Mnemonics whose numeric parameters are dots on the label: fonts,
/// barcodes, field placement and blocks, boxes and label geometry.
pub fn is_scalable_mnemonic(mnemonic: &str) -> bool {
    matches!(
        mnemonic,
        "A0" | "A1"
            | "A2"
            | "A3"
            | "A4"
            | "A5"
            | "A6"
            | "A7"
            | "A8"
            | "A9"
            | "B3"
            | "B7"
            | "BC"
            | "BQ"
            | "BY"
            | "FB"
            | "FO"
            | "FT"
            | "GB"
            | "LH"
            | "LL"
            | "LS"
            | "LT"
            | "PW"
    )
}

pub fn is_scalable(section: &str) -> bool {
    section.get(..2).map_or(false, is_scalable_mnemonic)
}

/// Scale one section, given without its leading `^`.
///
/// Every comma separated parameter that reads as a number is multiplied and
/// rounded half to even. Anything else, including numbers inside a quoted
/// string, is left as it was.
pub fn scale_section(section: &str, factor: f64) -> String {
    if !is_scalable(section) {
        return section.to_string();
    }

    let (mnemonic, params) = section.split_at(2);
    let mut quoted = false;
    let params: Vec<String> = params
        .split(',')
        .map(|param| {
            let scaled = if quoted { None } else { scale_number(param, factor) };
            if param.matches('"').count() % 2 == 1 {
                quoted = !quoted;
            }
            scaled.unwrap_or_else(|| param.to_string())
        })
        .collect();

    format!("{}{}", mnemonic, params.join(","))
}

fn scale_number(param: &str, factor: f64) -> Option<String> {
    let value = param.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(format!("{}", (value * factor).round_ties_even() as i64))
}

/// Scale every `^` separated section of a text run.
pub fn scale_sections(text: &str, factor: f64) -> String {
    text.split(CARET)
        .map(|section| scale_section(section, factor))
        .collect::<Vec<String>>()
        .join("^")
}

/// Scale one line of a command stream.
///
/// Lines without a graphic field never fail. On a graphic line every `^GF`
/// field, up to its first `^FS`, is resampled and the commands between the
/// fields (usually field origins) are scaled as plain sections. A field with
/// no `^FS` runs to the end of the line.
pub fn scale_line(line: &str, factor: f64) -> Result<String, Error> {
    let (line, ending) = match line.strip_suffix('\r') {
        Some(stripped) => (stripped, "\r"),
        None => (line, ""),
    };

    let mut scaled = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find(GRAPHIC_MARKER) {
        let body = start + GRAPHIC_MARKER.len();
        let end = rest[body..]
            .find(FIELD_SEPARATOR)
            .map_or(rest.len(), |i| body + i);

        let field = RasterField::parse(&rest[start + 1..end])?.rescale(factor)?;
        scaled.push_str(&scale_sections(&rest[..start], factor));
        scaled.push(CARET);
        scaled.push_str(&field.to_string());
        rest = &rest[end..];
    }
    scaled.push_str(&scale_sections(rest, factor));
    scaled.push_str(ending);

    Ok(scaled)
}

/// Whether a line ends inside a graphic field whose payload runs on past the
/// end of the line.
pub fn opens_graphic_block(line: &str) -> bool {
    match line.rfind(GRAPHIC_MARKER) {
        Some(start) => !line[start..].contains(FIELD_SEPARATOR),
        None => false,
    }
}

/// Whether a continuation line closes the graphic field.
pub fn closes_graphic_block(line: &str) -> bool {
    line.contains(FIELD_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalable_by_prefix_only() {
        assert!(is_scalable("FO100,200"));
        assert!(is_scalable("A0N,30,30"));
        assert!(!is_scalable("FDBox FO100"));
        assert!(!is_scalable("XA"));
        assert!(!is_scalable(""));
        assert!(!is_scalable("F"));
    }

    #[test]
    fn numeric_scaling() {
        assert_eq!(scale_section("FO100,200", 2.0), "FO200,400");
        assert_eq!(scale_section("GB400,2,2", 0.5), "GB200,1,1");
        assert_eq!(scale_section("BY2,3.0,100", 1.5), "BY3,4,150");
    }

    #[test]
    fn rounds_half_to_even() {
        // 5 * 0.5 = 2.5 -> 2, 7 * 0.5 = 3.5 -> 4
        assert_eq!(scale_section("FO5,7", 0.5), "FO2,4");
    }

    #[test]
    fn non_numeric_parameters_untouched() {
        assert_eq!(scale_section("A0N,30,30", 2.0), "A0N,60,60");
        assert_eq!(scale_section("A0,N,\"Label Text\"", 2.0), "A0,N,\"Label Text\"");
        assert_eq!(scale_section("BCN,100,Y,N,N", 2.0), "BCN,200,Y,N,N");
        assert_eq!(scale_section("FO,,", 2.0), "FO,,");
        assert_eq!(scale_section("FOinf,NaN", 2.0), "FOinf,NaN");
    }

    #[test]
    fn numbers_inside_quotes_untouched() {
        assert_eq!(
            scale_section("A010,\"Lot,12,x\",20", 2.0),
            "A020,\"Lot,12,x\",40"
        );
    }

    #[test]
    fn unscalable_verbatim() {
        assert_eq!(scale_section("FD100 Main St", 3.0), "FD100 Main St");
        assert_eq!(scale_section("", 3.0), "");
    }

    #[test]
    fn plain_line() {
        assert_eq!(
            scale_line("^XA^FO100,200^A0N,30,30^FDHello^FS", 2.0).unwrap(),
            "^XA^FO200,400^A0N,60,60^FDHello^FS"
        );
        assert_eq!(scale_line("", 2.0).unwrap(), "");
        assert_eq!(scale_line("^FO10,10\r", 2.0).unwrap(), "^FO20,20\r");
    }

    #[test]
    fn graphic_line() {
        let line = format!("^FO100,50^GFA,8,8,2,{}^FS", "FFFF".repeat(4));
        assert_eq!(
            scale_line(&line, 0.5).unwrap(),
            "^FO50,25^GFA,2,2,1,FFFF^FS"
        );
    }

    #[test]
    fn graphic_line_without_separator() {
        let line = format!("^FO8,8^GFA,8,8,2,{}", "FFFF".repeat(4));
        assert_eq!(scale_line(&line, 0.5).unwrap(), "^FO4,4^GFA,2,2,1,FFFF");
    }

    #[test]
    fn every_graphic_on_a_line() {
        let graphic = format!("GFA,8,8,2,{}", "FFFF".repeat(4));
        let line = format!("^XA^FO10,10^{0}^FS^FO100,10^{0}^FS^XZ", graphic);
        assert_eq!(
            scale_line(&line, 0.5).unwrap(),
            "^XA^FO5,5^GFA,2,2,1,FFFF^FS^FO50,5^GFA,2,2,1,FFFF^FS^XZ"
        );
    }

    #[test]
    fn later_graphic_failure_fails_the_line() {
        let line = format!(
            "^FO0,0^GFA,8,8,2,{}^FS^FO8,0^GFA,8,8,2,:Z99:AAAA:0000^FS",
            "FFFF".repeat(4)
        );
        assert!(matches!(
            scale_line(&line, 0.5),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn graphic_line_errors_propagate() {
        assert!(matches!(
            scale_line("^FO0,0^GFA,8,8^FS", 0.5),
            Err(Error::MalformedGraphicHeader(_))
        ));
        assert!(matches!(
            scale_line("^GFA,8,8,2,:Z99:AAAA:0000^FS", 0.5),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn graphic_blocks() {
        assert!(opens_graphic_block("^FO0,0^GFA,8,8,2,"));
        assert!(!opens_graphic_block("^FO0,0^GFA,8,8,2,FFFF^FS"));
        assert!(!opens_graphic_block("^FO0,0"));
        assert!(opens_graphic_block("^FO0,0^GFA,2,2,1,FF^FS^FO9,0^GFA,8,8,2,"));
        assert!(!opens_graphic_block("^FO0,0^GFA,2,2,1,FF^FS^FO9,0^GFA,2,2,1,FF^FS"));
        assert!(continues_graphic_block("FFFF0000"));
        assert!(!continues_graphic_block("^XZ"));
        assert!(!continues_graphic_block("   "));
        assert!(closes_graphic_block("FFFF^FS"));
    }
}
