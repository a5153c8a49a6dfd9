//! KS X 1001 (ISO-IR 149) in its EUC-KR form.
//!
//! Decoding is delegated to Windows code page 949,
//! a superset of EUC-KR.
//! Encoding is restricted to what EUC-KR proper can express:
//! ASCII as single bytes, and KS X 1001 characters
//! as two bytes in `0xA1..=0xFE`.
//! Characters which code page 949 would only represent
//! through its Unified Hangul Code extension are rejected,
//! so that every encoded byte can be told apart by its high bit.

use super::UNREPRESENTABLE;
use encoding::all::WINDOWS_949;
use encoding::{ByteWriter, CodecError, Encoding, RawDecoder, RawEncoder};

/// KS X 1001 (ISO-IR 149).
pub static KS_X_1001: &KsX1001Encoding = &KsX1001Encoding;

/// Data type for the KS X 1001 encoding.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct KsX1001Encoding;

impl Encoding for KsX1001Encoding {
    fn name(&self) -> &'static str {
        "ks_x_1001"
    }

    fn whatwg_name(&self) -> Option<&'static str> {
        Some("euc-kr")
    }

    fn raw_encoder(&self) -> Box<dyn RawEncoder> {
        Box::new(KsX1001Encoder {
            uhc: WINDOWS_949.raw_encoder(),
            pair: Vec::with_capacity(2),
        })
    }

    fn raw_decoder(&self) -> Box<dyn RawDecoder> {
        WINDOWS_949.raw_decoder()
    }
}

struct KsX1001Encoder {
    uhc: Box<dyn RawEncoder>,
    pair: Vec<u8>,
}

impl KsX1001Encoder {
    fn encode_char(&mut self, c: &str) -> bool {
        self.pair.clear();
        let (_, err) = self.uhc.raw_feed(c, &mut self.pair);
        err.is_none() && self.pair.len() == 2 && self.pair.iter().all(|&b| b >= 0xA1)
    }
}

impl RawEncoder for KsX1001Encoder {
    fn from_self(&self) -> Box<dyn RawEncoder> {
        Box::new(KsX1001Encoder {
            uhc: self.uhc.from_self(),
            pair: Vec::with_capacity(2),
        })
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn raw_feed(
        &mut self,
        input: &str,
        output: &mut dyn ByteWriter,
    ) -> (usize, Option<CodecError>) {
        output.writer_hint(input.len());
        for (i, c) in input.char_indices() {
            if c.is_ascii() {
                output.write_byte(c as u8);
                continue;
            }
            let j = i + c.len_utf8();
            if self.encode_char(&input[i..j]) {
                output.write_bytes(&self.pair);
            } else {
                return (
                    i,
                    Some(CodecError {
                        upto: j as isize,
                        cause: UNREPRESENTABLE,
                    }),
                );
            }
        }
        (input.len(), None)
    }

    fn raw_finish(&mut self, _output: &mut dyn ByteWriter) -> Option<CodecError> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding::{DecoderTrap, EncoderTrap};
    use pretty_assertions::assert_eq;

    #[test]
    fn hangul_and_hanja() {
        assert_eq!(
            KS_X_1001.encode("Hong^홍", EncoderTrap::Strict).unwrap(),
            b"Hong^\xC8\xAB"
        );
        assert_eq!(
            KS_X_1001.encode("길동", EncoderTrap::Strict).unwrap(),
            b"\xB1\xE6\xB5\xBF"
        );
        assert_eq!(
            KS_X_1001.encode("洪", EncoderTrap::Strict).unwrap(),
            b"\xFB\xF3"
        );
        assert_eq!(
            KS_X_1001
                .decode(b"\xB1\xE6\xB5\xBF", DecoderTrap::Strict)
                .unwrap(),
            "길동"
        );
    }

    #[test]
    fn unified_hangul_extension_is_rejected() {
        // U+AC02 is only available through the UHC extension of code page 949
        assert!(WINDOWS_949.encode("\u{AC02}", EncoderTrap::Strict).is_ok());
        assert!(KS_X_1001.encode("\u{AC02}", EncoderTrap::Strict).is_err());
    }

    #[test]
    fn unrepresentable_characters() {
        assert!(KS_X_1001.encode("\u{0E01}", EncoderTrap::Strict).is_err());
        assert_eq!(
            KS_X_1001.encode("a\u{0E01}b", EncoderTrap::Replace).unwrap(),
            b"a?b"
        );
    }
}
