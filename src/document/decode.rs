use crate::error::PipelineError;
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::fmt;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Candidate text encodings, tried in ranked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    #[serde(rename = "latin-1")]
    Latin1,
    #[serde(rename = "windows-1252")]
    Windows1252,
    #[serde(rename = "iso-8859-1")]
    Iso88591,
}

/// Default ranking. Latin-1 and Windows-1252 map every byte, so the order decides
/// which reading wins rather than whether one does.
pub const DEFAULT_ENCODINGS: [TextEncoding; 5] = [
    TextEncoding::Utf8,
    TextEncoding::Utf8Sig,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
    TextEncoding::Iso88591,
];

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Iso88591 => "iso-8859-1",
        }
    }

    /// Decode strictly; `None` means the bytes are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => UTF_8
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(body)
                    .map(|text| text.into_owned())
            }
            // encoding_rs treats the latin1 label as windows-1252; true ISO-8859-1
            // maps each byte to the code point of the same value.
            TextEncoding::Latin1 | TextEncoding::Iso88591 => {
                Some(bytes.iter().map(|&byte| char::from(byte)).collect())
            }
            TextEncoding::Windows1252 => {
                let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
                Some(text.into_owned())
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded text together with the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Try each candidate in order and keep the first that decodes without error.
pub fn decode(bytes: &[u8], candidates: &[TextEncoding]) -> Result<DecodedText, PipelineError> {
    for &encoding in candidates {
        if let Some(text) = encoding.decode(bytes) {
            tracing::debug!(encoding = encoding.label(), bytes = bytes.len(), "decoded text");
            return Ok(DecodedText { text, encoding });
        }
    }

    Err(PipelineError::UnreadableText {
        tried: candidates.to_vec(),
    })
}

/// Decode with the default ranking, which always succeeds.
pub fn decode_permissive(bytes: &[u8]) -> DecodedText {
    match decode(bytes, &DEFAULT_ENCODINGS) {
        Ok(decoded) => decoded,
        Err(_) => DecodedText {
            text: bytes.iter().map(|&byte| char::from(byte)).collect(),
            encoding: TextEncoding::Latin1,
        },
    }
}
