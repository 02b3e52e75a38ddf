//! Where the two resolutions of a rescale come from.
//!
//! The printer's resolution is read from its driver or product description,
//! which by convention names it as `203dpi`, `300dpi` or `600dpi`. The label's
//! authored resolution is taken from its `^LL` label length directive.
//! Either one is 0 when it cannot be found, and 0 means "do not rescale".

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

fn printer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r"(\d{3})\s*dpi")
            .case_insensitive(true)
            .build()
            .expect("static dpi pattern")
    })
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\^LL(\d{3})").expect("static ^LL pattern"))
}

/// Rated resolution named in a printer description, 0 if none.
///
/// ```
/// use zpl_rescale::printer_dpi;
///
/// assert_eq!(printer_dpi("ZDesigner ZD420-300dpi ZPL"), 300);
/// assert_eq!(printer_dpi("Generic / Text Only"), 0);
/// ```
pub fn printer_dpi(description: &str) -> u32 {
    first_number(printer_pattern(), description)
}

/// Resolution a label was authored for, read from its first `^LL`, 0 if none.
pub fn label_dpi(stream: &str) -> u32 {
    first_number(label_pattern(), stream)
}

fn first_number(pattern: &Regex, text: &str) -> u32 {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}
