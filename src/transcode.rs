//! GBK to UTF-8 conversion
//!
//! QQWry strings are GBK encoded. Decoding is strict: a malformed sequence is
//! reported as an [`EncodingError`] rather than replaced with U+FFFD, so a bad
//! conversion can be told apart from a corrupt database.

use encoding_rs::GBK;
use std::fmt;

/// A byte string that is not valid GBK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    /// The bytes that failed to decode
    pub bytes: Vec<u8>,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid GBK sequence in {} byte string: ", self.bytes.len())?;
        for b in self.bytes.iter().take(32) {
            write!(f, "{:02x}", b)?;
        }
        if self.bytes.len() > 32 {
            write!(f, "...")?;
        }
        Ok(())
    }
}

impl std::error::Error for EncodingError {}

/// Convert GBK encoded bytes to a trimmed UTF-8 string
pub fn decode_gbk(bytes: &[u8]) -> Result<String, EncodingError> {
    match GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(EncodingError {
            bytes: bytes.to_vec(),
        }),
    }
}

/// Convert UTF-8 text to GBK bytes
///
/// Returns `None` when the text contains characters GBK cannot represent.
pub fn encode_gbk(text: &str) -> Option<Vec<u8>> {
    let (bytes, _, had_unmappable) = GBK.encode(text);
    if had_unmappable {
        None
    } else {
        Some(bytes.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbk_to_utf8() {
        // GBK encoding of "中国" (China)
        let gbk_bytes = [0xD6, 0xD0, 0xB9, 0xFA];
        assert_eq!(decode_gbk(&gbk_bytes).unwrap(), "中国");
    }

    #[test]
    fn test_ascii_passthrough_and_trim() {
        assert_eq!(decode_gbk(b" CZ88.NET").unwrap(), "CZ88.NET");
        assert_eq!(decode_gbk(b"").unwrap(), "");
    }

    #[test]
    fn test_mixed_text() {
        let bytes = encode_gbk("广东省深圳市 电信ADSL").unwrap();
        assert_eq!(decode_gbk(&bytes).unwrap(), "广东省深圳市 电信ADSL");
    }

    #[test]
    fn test_invalid_sequence() {
        // 0x81 lead byte followed by an invalid trail byte
        let bytes = [0x81, 0x20, 0xFF];
        let err = decode_gbk(&bytes).unwrap_err();
        assert_eq!(err.bytes, bytes.to_vec());
        assert!(err.to_string().contains("8120ff"));
    }

    #[test]
    fn test_truncated_double_byte() {
        assert!(decode_gbk(&[0xD6, 0xD0, 0xB9]).is_err());
    }

    #[test]
    fn test_unmappable_encode() {
        assert!(encode_gbk("emoji 😀").is_none());
    }
}
