//! Candidate text encodings for delimited files.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Text encodings tried when decoding a CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8, with a leading byte-order mark stripped if present.
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    /// Plain UTF-8 (a byte-order mark is kept as U+FEFF).
    #[serde(rename = "utf-8")]
    Utf8,
    /// GBK (Simplified Chinese).
    #[serde(rename = "gbk")]
    Gbk,
    /// GB2312. WHATWG maps this label onto GBK, a superset.
    #[serde(rename = "gb2312")]
    Gb2312,
    /// ISO-8859-1. Every byte maps to one code point, so this never fails.
    #[serde(rename = "latin1")]
    Latin1,
}

/// Default candidate list, in priority order.
pub const CSV_ENCODINGS: [TextEncoding; 5] = [
    TextEncoding::Utf8Sig,
    TextEncoding::Utf8,
    TextEncoding::Gbk,
    TextEncoding::Gb2312,
    TextEncoding::Latin1,
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl TextEncoding {
    /// Label as written in configuration files.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8Sig => "utf-8-sig",
            Self::Utf8 => "utf-8",
            Self::Gbk => "gbk",
            Self::Gb2312 => "gb2312",
            Self::Latin1 => "latin1",
        }
    }

    /// Strictly decode `bytes`. Returns `None` on any malformed sequence.
    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            Self::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            Self::Utf8 => encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes),
            Self::Gbk | Self::Gb2312 => {
                encoding_rs::GBK.decode_without_bom_handling_and_without_replacement(bytes)
            }
            Self::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decode `bytes` with the first candidate that succeeds.
pub fn decode_with_fallback<'a>(
    bytes: &'a [u8],
    candidates: &[TextEncoding],
) -> Option<(TextEncoding, Cow<'a, str>)> {
    candidates
        .iter()
        .find_map(|&enc| enc.decode(bytes).map(|text| (enc, text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_is_stripped_by_utf8_sig_only() {
        let bytes = b"\xEF\xBB\xBFName";
        assert_eq!(TextEncoding::Utf8Sig.decode(bytes).unwrap(), "Name");
        assert_eq!(TextEncoding::Utf8.decode(bytes).unwrap(), "\u{feff}Name");
    }

    #[test]
    fn gbk_bytes_fall_through_utf8() {
        let (bytes, _, _) = encoding_rs::GBK.encode("姓名,年龄\n张三,30\n");
        let (enc, text) = decode_with_fallback(&bytes, &CSV_ENCODINGS).unwrap();
        assert_eq!(enc, TextEncoding::Gbk);
        assert!(text.starts_with("姓名"));
    }

    #[test]
    fn latin1_never_fails() {
        let bytes = [0xFFu8, 0xFE, 0x81];
        let (enc, text) = decode_with_fallback(&bytes, &[TextEncoding::Utf8, TextEncoding::Latin1]).unwrap();
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(text.chars().count(), 3);
    }

    #[test]
    fn exhausted_candidates_return_none() {
        let bytes = [0xFFu8, 0xFE];
        assert!(decode_with_fallback(&bytes, &[TextEncoding::Utf8Sig, TextEncoding::Utf8]).is_none());
    }

    #[test]
    fn serde_uses_labels() {
        let parsed: Vec<TextEncoding> = serde_json::from_str(r#"["gbk","utf-8-sig"]"#).unwrap();
        assert_eq!(parsed, vec![TextEncoding::Gbk, TextEncoding::Utf8Sig]);
    }
}
