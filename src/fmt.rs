//! Closed primitive-keyword → printf-conversion table.
//!
//! Lookup failure is always surfaced to the caller; the generator never
//! guesses a format for a keyword outside this table.

use once_cell::sync::Lazy;
use regex::Regex;

static STDINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(u?)int([0-9]+)_t$").unwrap());

/// printf conversion and string/numeric classification for one keyword.
/// `is_string` means the JSON member value must be quoted.
pub fn primitive_format(keyword: &str) -> Option<(&'static str, bool)> {
    match keyword {
        "int" => Some(("%d", false)),
        "char" => Some(("%c", true)),
        "signed" => Some(("%d", false)),
        "unsigned" => Some(("%u", false)),
        "unsigned long" => Some(("%lu", false)),
        "unsigned long long" => Some(("%llu", false)),
        "long long" => Some(("%lld", false)),
        "long" => Some(("%ld", false)),
        "_Bool" => Some(("%d", false)),
        _ => None,
    }
}

/// `uint32_t` → `(signed: false, bits: 32)`. Keywords that are not
/// `u?int<N>_t`-shaped return None and go through the closed table.
pub fn fixed_width_parts(keyword: &str) -> Option<(bool, u16)> {
    let caps = STDINT_RE.captures(keyword)?;
    let signed = caps[1].is_empty();
    let bits = caps[2].parse().ok()?;
    Some((signed, bits))
}

/// Conversion for a fixed-width integer, written as a string-literal
/// break (`%" PRIu32 "`) so the macro from `<inttypes.h>` resolves when
/// the generated translation unit is compiled.
pub fn fixed_width_format(signed: bool, bits: u16) -> String {
    let sgn = if signed { "i" } else { "u" };
    format!("%\" PRI{sgn}{bits} \"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_the_known_keywords() {
        assert_eq!(primitive_format("int"), Some(("%d", false)));
        assert_eq!(primitive_format("unsigned long long"), Some(("%llu", false)));
        assert_eq!(primitive_format("_Bool"), Some(("%d", false)));
    }

    #[test]
    fn char_is_the_only_string_keyword() {
        assert_eq!(primitive_format("char"), Some(("%c", true)));
        for kw in ["int", "signed", "unsigned", "long", "long long"] {
            assert_eq!(primitive_format(kw).unwrap().1, false, "{kw}");
        }
    }

    #[test]
    fn unknown_keyword_is_a_miss_not_a_guess() {
        assert_eq!(primitive_format("float"), None);
        assert_eq!(primitive_format("size_t"), None);
    }

    #[test]
    fn stdint_shapes_are_classified() {
        assert_eq!(fixed_width_parts("uint8_t"), Some((false, 8)));
        assert_eq!(fixed_width_parts("int64_t"), Some((true, 64)));
        assert_eq!(fixed_width_parts("uint_t"), None);
        assert_eq!(fixed_width_parts("print32_t"), None);
    }

    #[test]
    fn fixed_width_formats_splice_inttypes_macros() {
        assert_eq!(fixed_width_format(false, 32), "%\" PRIu32 \"");
        assert_eq!(fixed_width_format(true, 8), "%\" PRIi8 \"");
    }
}
