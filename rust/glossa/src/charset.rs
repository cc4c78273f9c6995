//! Conversion of the legacy charsets used by dictionary files to UTF-8.

use encoding_rs::Encoding;
use log::{debug, warn};

/// The charset table BGL files index into, in table order.
///
/// Indices 0 and 1 both name the Latin charset; several other slots alias
/// as well. The on-disk contract is the index, not the name.
pub const BGL_CHARSETS: [&str; 14] = [
    "ISO-8859-1",
    "ISO-8859-1",
    "ISO-8859-2",
    "ISO-8859-5",
    "ISO-8859-14",
    "ISO-8859-14",
    "ISO-8859-15",
    "CP1257",
    "CP1253",
    "ISO-8859-15",
    "ISO-8859-9",
    "ISO-8859-9",
    "CP1256",
    "CP874",
];

/// Resolves a BGL charset table byte to a charset name.
///
/// Some files bias the index by 65; values above 64 have 65 subtracted
/// before the lookup. Returns `None` for indices outside the table.
pub fn charset_from_index(index: u8) -> Option<&'static str> {
    let index = if index > 64 { index - 65 } else { index };
    BGL_CHARSETS.get(usize::from(index)).copied()
}

/// Converts `bytes` from the charset named `charset` to a UTF-8 string.
///
/// Conversion never fails: an empty charset name passes the bytes through
/// as (lossy) UTF-8, an unknown name does the same with a warning, and
/// invalid sequences decode with replacement characters rather than
/// aborting.
pub fn to_utf8(bytes: &[u8], charset: &str) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if charset.is_empty() {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let Some(encoding) = encoding_for(charset) else {
        warn!("unknown charset '{charset}', passing bytes through");
        return String::from_utf8_lossy(bytes).into_owned();
    };
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("lossy conversion of {} bytes from {}", bytes.len(), encoding.name());
    }
    text.into_owned()
}

/// Maps the charset names dictionaries use to `encoding_rs` encodings.
///
/// `CP874` is not a WHATWG label, and the WHATWG mapping folds the
/// ISO-8859-1/-9 family into its windows-125x supersets, so the names the
/// formats actually use are matched explicitly; anything else goes through
/// [`Encoding::for_label`].
fn encoding_for(charset: &str) -> Option<&'static Encoding> {
    Some(match charset.to_ascii_uppercase().as_str() {
        "ISO-8859-1" => encoding_rs::WINDOWS_1252,
        "ISO-8859-2" => encoding_rs::ISO_8859_2,
        "ISO-8859-5" => encoding_rs::ISO_8859_5,
        "ISO-8859-9" => encoding_rs::WINDOWS_1254,
        "ISO-8859-14" => encoding_rs::ISO_8859_14,
        "ISO-8859-15" => encoding_rs::ISO_8859_15,
        "CP1253" => encoding_rs::WINDOWS_1253,
        "CP1256" => encoding_rs::WINDOWS_1256,
        "CP1257" => encoding_rs::WINDOWS_1257,
        "CP874" => encoding_rs::WINDOWS_874,
        "UTF-8" => encoding_rs::UTF_8,
        _ => return Encoding::for_label(charset.as_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::default(0, "ISO-8859-1")]
    #[case::latin(1, "ISO-8859-1")]
    #[case::eastern_european(2, "ISO-8859-2")]
    #[case::cyrillic(3, "ISO-8859-5")]
    #[case::japanese(4, "ISO-8859-14")]
    #[case::traditional_chinese(5, "ISO-8859-14")]
    #[case::simplified_chinese(6, "ISO-8859-15")]
    #[case::baltic(7, "CP1257")]
    #[case::greek(8, "CP1253")]
    #[case::korean(9, "ISO-8859-15")]
    #[case::turkish(10, "ISO-8859-9")]
    #[case::hebrew(11, "ISO-8859-9")]
    #[case::arabic(12, "CP1256")]
    #[case::thai(13, "CP874")]
    fn test_charset_table(#[case] index: u8, #[case] exp: &str) {
        assert_eq!(charset_from_index(index), Some(exp));
    }

    #[rstest]
    #[case::biased_greek(65 + 8, Some("CP1253"))]
    #[case::biased_default(65, Some("ISO-8859-1"))]
    #[case::out_of_table(14, None)]
    #[case::biased_out_of_table(65 + 14, None)]
    fn test_charset_index_bias(#[case] index: u8, #[case] exp: Option<&str>) {
        assert_eq!(charset_from_index(index), exp);
    }

    #[rstest]
    #[case::greek_alpha(&[0xE1], "CP1253", "\u{03B1}")]
    #[case::euro_sign(&[0xA4], "ISO-8859-15", "\u{20AC}")]
    #[case::e_acute(&[0xE9], "ISO-8859-1", "\u{00E9}")]
    #[case::thai_ko_kai(&[0xA1], "CP874", "\u{0E01}")]
    #[case::utf8_passthrough("καλημέρα".as_bytes(), "UTF-8", "καλημέρα")]
    fn test_to_utf8(#[case] bytes: &[u8], #[case] charset: &str, #[case] exp: &str) {
        assert_eq!(to_utf8(bytes, charset), exp);
    }

    #[test]
    fn test_empty_charset_passes_through() {
        assert_eq!(to_utf8(b"plain", ""), "plain");
    }

    #[test]
    fn test_unknown_charset_degrades_to_lossy() {
        assert_eq!(to_utf8(b"abc", "EBCDIC-FISHER-PRICE"), "abc");
    }

    #[test]
    fn test_invalid_input_never_aborts() {
        // lone continuation byte declared as UTF-8
        let out = to_utf8(&[b'a', 0x80, b'b'], "UTF-8");
        assert_eq!(out, "a\u{FFFD}b");
    }
}
