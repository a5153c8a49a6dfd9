//! Japanese repertoires as they appear in ISO 2022 code extensions.
//!
//! - JIS X 0201: romaji in the lower half, half-width katakana
//!   in `0xA1..=0xDF`.
//! - JIS X 0208 and JIS X 0212: two bytes per character,
//!   each byte in `0x21..=0x7E` (the 7-bit form, without EUC offsets).
//!
//! The double-byte tables are taken from the WHATWG indices
//! shipped with `encoding-index-japanese`.

use super::{INVALID_SEQUENCE, UNREPRESENTABLE};
use encoding::{ByteWriter, CodecError, Encoding, RawDecoder, RawEncoder, StringWriter};
use encoding_index_japanese::{jis0208, jis0212};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Number of rows (and cells per row) in a 94x94 character table.
const ROWS: u16 = 94;
/// Value returned by the index lookups for unmapped pointers.
const UNMAPPED: u32 = 0xFFFF;

/// JIS X 0201 (ISO-IR 13).
pub static JIS_X_0201: &JisX0201Encoding = &JisX0201Encoding;
/// JIS X 0208 (ISO-IR 87).
pub static JIS_X_0208: &JisDoubleByteEncoding = &JisDoubleByteEncoding {
    table: Table::X0208,
};
/// JIS X 0212 (ISO-IR 159).
pub static JIS_X_0212: &JisDoubleByteEncoding = &JisDoubleByteEncoding {
    table: Table::X0212,
};

/// Data type for the JIS X 0201 encoding.
///
/// Byte 0x5C is the value delimiter of multi-valued DICOM strings,
/// so it decodes to a backslash. Both `\` and `¥` encode to it.
/// Byte 0x7E is the overline.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct JisX0201Encoding;

impl Encoding for JisX0201Encoding {
    fn name(&self) -> &'static str {
        "jis_x0201"
    }

    fn raw_encoder(&self) -> Box<dyn RawEncoder> {
        Box::new(JisX0201Encoder)
    }

    fn raw_decoder(&self) -> Box<dyn RawDecoder> {
        Box::new(JisX0201Decoder)
    }
}

fn jis_x0201_byte(c: char) -> Option<u8> {
    match c {
        '\u{A5}' => Some(0x5C),
        '\u{203E}' => Some(0x7E),
        '~' => None,
        '\u{0}'..='\u{7F}' => Some(c as u8),
        '\u{FF61}'..='\u{FF9F}' => Some((c as u32 - 0xFF61 + 0xA1) as u8),
        _ => None,
    }
}

fn jis_x0201_char(byte: u8) -> Option<char> {
    match byte {
        0x7E => Some('\u{203E}'),
        0x00..=0x7F => Some(byte as char),
        0xA1..=0xDF => std::char::from_u32(u32::from(byte) - 0xA1 + 0xFF61),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct JisX0201Encoder;

impl RawEncoder for JisX0201Encoder {
    fn from_self(&self) -> Box<dyn RawEncoder> {
        Box::new(JisX0201Encoder)
    }

    fn raw_feed(
        &mut self,
        input: &str,
        output: &mut dyn ByteWriter,
    ) -> (usize, Option<CodecError>) {
        output.writer_hint(input.len());
        for (i, c) in input.char_indices() {
            match jis_x0201_byte(c) {
                Some(b) => output.write_byte(b),
                None => {
                    return (
                        i,
                        Some(CodecError {
                            upto: (i + c.len_utf8()) as isize,
                            cause: UNREPRESENTABLE,
                        }),
                    )
                }
            }
        }
        (input.len(), None)
    }

    fn raw_finish(&mut self, _output: &mut dyn ByteWriter) -> Option<CodecError> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct JisX0201Decoder;

impl RawDecoder for JisX0201Decoder {
    fn from_self(&self) -> Box<dyn RawDecoder> {
        Box::new(JisX0201Decoder)
    }

    fn raw_feed(
        &mut self,
        input: &[u8],
        output: &mut dyn StringWriter,
    ) -> (usize, Option<CodecError>) {
        output.writer_hint(input.len());
        for (i, &b) in input.iter().enumerate() {
            match jis_x0201_char(b) {
                Some(c) => output.write_char(c),
                None => {
                    return (
                        i,
                        Some(CodecError {
                            upto: i as isize + 1,
                            cause: INVALID_SEQUENCE,
                        }),
                    )
                }
            }
        }
        (input.len(), None)
    }

    fn raw_finish(&mut self, _output: &mut dyn StringWriter) -> Option<CodecError> {
        None
    }
}

/// One of the two 94x94 Japanese kanji tables.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum Table {
    /// JIS X 0208
    X0208,
    /// JIS X 0212
    X0212,
}

static X0208_REVERSE: Lazy<HashMap<char, u16>> =
    Lazy::new(|| reverse_index(jis0208::forward, Table::X0208));
static X0212_REVERSE: Lazy<HashMap<char, u16>> =
    Lazy::new(|| reverse_index(jis0212::forward, Table::X0212));

/// Build the character to pointer mapping of a 94x94 table.
/// The lowest pointer wins for characters mapped more than once.
/// Vendor extensions are left out.
fn reverse_index(forward: fn(u16) -> u32, table: Table) -> HashMap<char, u16> {
    let mut index = HashMap::with_capacity(usize::from(ROWS * ROWS));
    for pointer in (0..ROWS * ROWS).filter(|&pointer| table.is_standard(pointer)) {
        let code = forward(pointer);
        if code == UNMAPPED {
            continue;
        }
        if let Some(c) = std::char::from_u32(code) {
            index.entry(c).or_insert(pointer);
        }
    }
    index
}

impl Table {
    /// Whether a pointer belongs to the character set proper.
    ///
    /// The WHATWG JIS X 0208 index also carries the NEC special characters
    /// in row 13 and the IBM extensions from row 89 onwards.
    /// Those are decoded but never encoded.
    fn is_standard(self, pointer: u16) -> bool {
        match self {
            Table::X0208 => {
                let row = pointer / ROWS;
                row != 12 && row < 84
            }
            Table::X0212 => true,
        }
    }

    fn reverse(self) -> &'static HashMap<char, u16> {
        match self {
            Table::X0208 => &X0208_REVERSE,
            Table::X0212 => &X0212_REVERSE,
        }
    }

    fn encode_char(self, c: char) -> Option<[u8; 2]> {
        let pointer = *self.reverse().get(&c)?;
        Some([(pointer / ROWS) as u8 + 0x21, (pointer % ROWS) as u8 + 0x21])
    }

    fn decode_pair(self, lead: u8, trail: u8) -> Option<char> {
        if !is_graphic(lead) || !is_graphic(trail) {
            return None;
        }
        let pointer = u16::from(lead - 0x21) * ROWS + u16::from(trail - 0x21);
        let code = match self {
            Table::X0208 => jis0208::forward(pointer),
            Table::X0212 => jis0212::forward(pointer),
        };
        if code == UNMAPPED {
            return None;
        }
        std::char::from_u32(code)
    }
}

fn is_graphic(byte: u8) -> bool {
    (0x21..=0x7E).contains(&byte)
}

/// Data type for the 7-bit double-byte JIS encodings.
///
/// Space and control characters (bytes up to 0x20) decode as themselves,
/// but are never produced by the encoder.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct JisDoubleByteEncoding {
    table: Table,
}

impl Encoding for JisDoubleByteEncoding {
    fn name(&self) -> &'static str {
        match self.table {
            Table::X0208 => "jis_x0208",
            Table::X0212 => "jis_x0212-1990",
        }
    }

    fn raw_encoder(&self) -> Box<dyn RawEncoder> {
        Box::new(JisDoubleByteEncoder { table: self.table })
    }

    fn raw_decoder(&self) -> Box<dyn RawDecoder> {
        Box::new(JisDoubleByteDecoder {
            table: self.table,
            lead: None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct JisDoubleByteEncoder {
    table: Table,
}

impl RawEncoder for JisDoubleByteEncoder {
    fn from_self(&self) -> Box<dyn RawEncoder> {
        Box::new(JisDoubleByteEncoder { table: self.table })
    }

    fn raw_feed(
        &mut self,
        input: &str,
        output: &mut dyn ByteWriter,
    ) -> (usize, Option<CodecError>) {
        output.writer_hint(input.len());
        for (i, c) in input.char_indices() {
            match self.table.encode_char(c) {
                Some(pair) => output.write_bytes(&pair),
                None => {
                    return (
                        i,
                        Some(CodecError {
                            upto: (i + c.len_utf8()) as isize,
                            cause: UNREPRESENTABLE,
                        }),
                    )
                }
            }
        }
        (input.len(), None)
    }

    fn raw_finish(&mut self, _output: &mut dyn ByteWriter) -> Option<CodecError> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct JisDoubleByteDecoder {
    table: Table,
    /// a lead byte left over at the end of the previous feed
    lead: Option<u8>,
}

impl RawDecoder for JisDoubleByteDecoder {
    fn from_self(&self) -> Box<dyn RawDecoder> {
        Box::new(JisDoubleByteDecoder {
            table: self.table,
            lead: None,
        })
    }

    fn raw_feed(
        &mut self,
        input: &[u8],
        output: &mut dyn StringWriter,
    ) -> (usize, Option<CodecError>) {
        output.writer_hint(input.len() / 2);
        let mut i = 0;

        if let Some(lead) = self.lead.take() {
            match input.first() {
                None => {
                    self.lead = Some(lead);
                    return (0, None);
                }
                Some(&trail) => match self.table.decode_pair(lead, trail) {
                    Some(c) => {
                        output.write_char(c);
                        i = 1;
                    }
                    None => {
                        return (
                            0,
                            Some(CodecError {
                                upto: 0,
                                cause: INVALID_SEQUENCE,
                            }),
                        )
                    }
                },
            }
        }

        while i < input.len() {
            let lead = input[i];
            if lead <= 0x20 {
                output.write_char(lead as char);
                i += 1;
                continue;
            }
            if !is_graphic(lead) {
                return (
                    i,
                    Some(CodecError {
                        upto: i as isize + 1,
                        cause: INVALID_SEQUENCE,
                    }),
                );
            }
            match input.get(i + 1) {
                None => {
                    self.lead = Some(lead);
                    return (i, None);
                }
                Some(&trail) => match self.table.decode_pair(lead, trail) {
                    Some(c) => {
                        output.write_char(c);
                        i += 2;
                    }
                    None => {
                        // the trail byte may start the next character
                        return (
                            i,
                            Some(CodecError {
                                upto: i as isize + if is_graphic(trail) { 2 } else { 1 },
                                cause: INVALID_SEQUENCE,
                            }),
                        );
                    }
                },
            }
        }
        (i, None)
    }

    fn raw_finish(&mut self, _output: &mut dyn StringWriter) -> Option<CodecError> {
        self.lead.take().map(|_| CodecError {
            upto: 0,
            cause: INVALID_SEQUENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding::{DecoderTrap, EncoderTrap};
    use pretty_assertions::assert_eq;

    #[test]
    fn jis_x0208_kanji_and_kana() {
        // sample values from DICOM PS3.5 Annex H
        assert_eq!(
            JIS_X_0208.encode("山田", EncoderTrap::Strict).unwrap(),
            b";3ED"
        );
        assert_eq!(
            JIS_X_0208.encode("太郎", EncoderTrap::Strict).unwrap(),
            b"B@O:"
        );
        assert_eq!(
            JIS_X_0208.encode("やまだ", EncoderTrap::Strict).unwrap(),
            b"$d$^$@"
        );
        assert_eq!(
            JIS_X_0208.encode("\u{3042}\u{3044}", EncoderTrap::Strict).unwrap(),
            [0x24, 0x22, 0x24, 0x24]
        );

        assert_eq!(
            JIS_X_0208.decode(b";3ED", DecoderTrap::Strict).unwrap(),
            "山田"
        );
        assert_eq!(
            JIS_X_0208.decode(b"$?$m$&", DecoderTrap::Strict).unwrap(),
            "たろう"
        );
    }

    #[test]
    fn jis_x0208_rejects_ascii() {
        assert!(JIS_X_0208.encode("A", EncoderTrap::Strict).is_err());
        assert!(JIS_X_0208.encode("山 田", EncoderTrap::Strict).is_err());
    }

    #[test]
    fn jis_x0208_decodes_leniently() {
        // space passes through
        assert_eq!(
            JIS_X_0208.decode(b";3 ED", DecoderTrap::Replace).unwrap(),
            "山 田"
        );
        // dangling lead byte
        assert_eq!(
            JIS_X_0208.decode(b";3E", DecoderTrap::Replace).unwrap(),
            "山\u{FFFD}"
        );
        // bytes outside of the 7-bit graphic range
        assert_eq!(
            JIS_X_0208.decode(&[0xA4, 0xA2], DecoderTrap::Replace).unwrap(),
            "\u{FFFD}\u{FFFD}"
        );
        assert!(JIS_X_0208.decode(b";3E", DecoderTrap::Strict).is_err());
    }

    #[test]
    fn jis_x0208_vendor_extensions_are_not_encoded() {
        // NEC row 13: circled digit one, roman numeral one
        assert!(JIS_X_0208.encode("\u{2460}", EncoderTrap::Strict).is_err());
        assert!(JIS_X_0208.encode("\u{2160}", EncoderTrap::Strict).is_err());
        // IBM extensions: small roman numeral one, CJK U+7E8A
        assert!(JIS_X_0208.encode("\u{2170}", EncoderTrap::Strict).is_err());
        assert!(JIS_X_0208.encode("\u{7E8A}", EncoderTrap::Strict).is_err());

        // still decoded as found in the wild
        assert_eq!(
            JIS_X_0208.decode(&[0x2D, 0x21], DecoderTrap::Strict).unwrap(),
            "\u{2460}"
        );
    }

    #[test]
    fn jis_x0212_round_trip() {
        // U+4E02 is only found in the supplementary set
        let bytes = JIS_X_0212.encode("\u{4E02}", EncoderTrap::Strict).unwrap();
        assert_eq!(bytes.len(), 2);
        assert!(bytes.iter().all(|&b| is_graphic(b)));
        assert_eq!(
            JIS_X_0212.decode(&bytes, DecoderTrap::Strict).unwrap(),
            "\u{4E02}"
        );
    }

    #[test]
    fn jis_x0201_katakana() {
        assert_eq!(
            JIS_X_0201.encode("ﾔﾏﾀﾞ^ﾀﾛｳ", EncoderTrap::Strict).unwrap(),
            [0xD4, 0xCF, 0xC0, 0xDE, b'^', 0xC0, 0xDB, 0xB3]
        );
        assert_eq!(
            JIS_X_0201
                .decode(&[0xD4, 0xCF, 0xC0, 0xDE, b'^', 0xC0, 0xDB, 0xB3], DecoderTrap::Strict)
                .unwrap(),
            "ﾔﾏﾀﾞ^ﾀﾛｳ"
        );
    }

    #[test]
    fn jis_x0201_romaji_differences() {
        assert_eq!(JIS_X_0201.encode("\u{A5}", EncoderTrap::Strict).unwrap(), b"\\");
        assert_eq!(JIS_X_0201.encode("a\\b", EncoderTrap::Strict).unwrap(), b"a\\b");
        assert_eq!(
            JIS_X_0201.encode("\u{203E}", EncoderTrap::Strict).unwrap(),
            [0x7E]
        );
        assert!(JIS_X_0201.encode("~", EncoderTrap::Strict).is_err());
        assert_eq!(
            JIS_X_0201.decode(&[0x7E, 0x5C], DecoderTrap::Strict).unwrap(),
            "\u{203E}\\"
        );
        assert_eq!(
            JIS_X_0201.decode(&[0x80, 0xE0], DecoderTrap::Replace).unwrap(),
            "\u{FFFD}\u{FFFD}"
        );
    }
}
