//! The table of character repertoires which may be named by the
//! Specific Character Set (0008,0005) attribute.
//!
//! Each [`Charset`] describes one repertoire: the byte encoding behind it
//! and the ISO 2022 escape sequences which designate it.
//! The table is fixed and immutable, so values can be freely copied
//! and shared between threads.

use crate::codec::jis::{JIS_X_0201, JIS_X_0208, JIS_X_0212};
use crate::codec::korean::KS_X_1001;
use encoding::all::{
    ASCII, GB18030, ISO_8859_1, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6,
    ISO_8859_7, ISO_8859_8, UTF_8, WINDOWS_1254, WINDOWS_874,
};
use encoding::types::EncodingRef;

/// The escape character (ESC) which starts every ISO 2022 escape sequence.
pub const ESC: u8 = 0x1B;

/// The number of bytes making up a single character
/// while a repertoire is active in an ISO 2022 byte stream.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum UnitStep {
    /// One byte per character.
    Single,
    /// Two bytes per character.
    Double,
    /// Two bytes if the leading byte has its high bit set, one otherwise.
    Variable,
}

impl UnitStep {
    /// The number of bytes to skip over,
    /// given the first byte of the next character.
    pub fn advance(self, byte: u8) -> usize {
        match self {
            UnitStep::Single => 1,
            UnitStep::Double => 2,
            UnitStep::Variable if byte & 0x80 != 0 => 2,
            UnitStep::Variable => 1,
        }
    }
}

/// A character repertoire supported in DICOM text values.
///
/// Both the single-byte defined terms (e.g. `ISO_IR 100`)
/// and their ISO 2022 counterparts (e.g. `ISO 2022 IR 100`)
/// resolve to the same repertoire.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Charset {
    /// **ISO-IR 6**: the default character repertoire (US-ASCII).
    #[default]
    IsoIr6,
    /// **ISO-IR 100** (ISO-8859-1): Latin alphabet no. 1.
    IsoIr100,
    /// **ISO-IR 101** (ISO-8859-2): Latin alphabet no. 2.
    IsoIr101,
    /// **ISO-IR 109** (ISO-8859-3): Latin alphabet no. 3.
    IsoIr109,
    /// **ISO-IR 110** (ISO-8859-4): Latin alphabet no. 4.
    IsoIr110,
    /// **ISO-IR 144** (ISO-8859-5): Latin/Cyrillic.
    IsoIr144,
    /// **ISO-IR 127** (ISO-8859-6): Latin/Arabic.
    IsoIr127,
    /// **ISO-IR 126** (ISO-8859-7): Latin/Greek.
    IsoIr126,
    /// **ISO-IR 138** (ISO-8859-8): Latin/Hebrew.
    IsoIr138,
    /// **ISO-IR 148** (ISO-8859-9): Latin alphabet no. 5.
    IsoIr148,
    /// **ISO-IR 13** (JIS X 0201): Japanese romaji and half-width katakana.
    IsoIr13,
    /// **ISO-IR 166** (TIS 620-2533): Thai.
    IsoIr166,
    /// **ISO-IR 87** (JIS X 0208): Japanese kanji, hiragana and katakana.
    IsoIr87,
    /// **ISO-IR 159** (JIS X 0212): supplementary Japanese kanji.
    IsoIr159,
    /// **ISO-IR 149** (KS X 1001): Korean.
    IsoIr149,
    /// **ISO-IR 192**: Unicode in UTF-8.
    IsoIr192,
    /// **GB18030**: Simplified Chinese.
    Gb18030,
}

impl Charset {
    /// Obtain the character repertoire identified by the given defined term.
    ///
    /// Matching is exact and case sensitive.
    /// Returns `None` if the term is not recognized.
    ///
    /// # Example
    ///
    /// ```
    /// # use dicom_charset::Charset;
    /// assert_eq!(Charset::from_code("ISO 2022 IR 87"), Some(Charset::IsoIr87));
    /// assert_eq!(Charset::from_code("iso_ir 100"), None);
    /// ```
    pub fn from_code(code: &str) -> Option<Self> {
        use self::Charset::*;
        match code {
            "ISO_IR 6" | "ISO 2022 IR 6" => Some(IsoIr6),
            "ISO_IR 100" | "ISO 2022 IR 100" => Some(IsoIr100),
            "ISO_IR 101" | "ISO 2022 IR 101" => Some(IsoIr101),
            "ISO_IR 109" | "ISO 2022 IR 109" => Some(IsoIr109),
            "ISO_IR 110" | "ISO 2022 IR 110" => Some(IsoIr110),
            "ISO_IR 144" | "ISO 2022 IR 144" => Some(IsoIr144),
            "ISO_IR 127" | "ISO 2022 IR 127" => Some(IsoIr127),
            "ISO_IR 126" | "ISO 2022 IR 126" => Some(IsoIr126),
            "ISO_IR 138" | "ISO 2022 IR 138" => Some(IsoIr138),
            "ISO_IR 148" | "ISO 2022 IR 148" => Some(IsoIr148),
            "ISO_IR 13" | "ISO 2022 IR 13" => Some(IsoIr13),
            "ISO_IR 166" | "ISO 2022 IR 166" => Some(IsoIr166),
            "ISO 2022 IR 87" => Some(IsoIr87),
            "ISO 2022 IR 159" => Some(IsoIr159),
            "ISO 2022 IR 149" => Some(IsoIr149),
            "ISO_IR 192" => Some(IsoIr192),
            "GB18030" => Some(Gb18030),
            _ => None,
        }
    }

    /// Resolve a possibly absent defined term,
    /// falling back to the default repertoire (ISO-IR 6)
    /// when the term is absent or unknown.
    pub fn resolve(code: Option<&str>) -> Self {
        match code {
            None => Charset::IsoIr6,
            Some(code) => Charset::from_code(code).unwrap_or_else(|| {
                tracing::debug!(
                    "Unrecognized specific character set `{}`, using ISO_IR 6",
                    code
                );
                Charset::IsoIr6
            }),
        }
    }

    /// The defined term of this repertoire.
    ///
    /// This is the single-byte form where one exists,
    /// otherwise the ISO 2022 form.
    pub fn defined_term(self) -> &'static str {
        use self::Charset::*;
        match self {
            IsoIr6 => "ISO_IR 6",
            IsoIr100 => "ISO_IR 100",
            IsoIr101 => "ISO_IR 101",
            IsoIr109 => "ISO_IR 109",
            IsoIr110 => "ISO_IR 110",
            IsoIr144 => "ISO_IR 144",
            IsoIr127 => "ISO_IR 127",
            IsoIr126 => "ISO_IR 126",
            IsoIr138 => "ISO_IR 138",
            IsoIr148 => "ISO_IR 148",
            IsoIr13 => "ISO_IR 13",
            IsoIr166 => "ISO_IR 166",
            IsoIr87 => "ISO 2022 IR 87",
            IsoIr159 => "ISO 2022 IR 159",
            IsoIr149 => "ISO 2022 IR 149",
            IsoIr192 => "ISO_IR 192",
            Gb18030 => "GB18030",
        }
    }

    /// The canonical name of the byte encoding behind this repertoire.
    pub fn encoding_name(self) -> &'static str {
        use self::Charset::*;
        match self {
            IsoIr6 => "US-ASCII",
            IsoIr100 => "ISO-8859-1",
            IsoIr101 => "ISO-8859-2",
            IsoIr109 => "ISO-8859-3",
            IsoIr110 => "ISO-8859-4",
            IsoIr144 => "ISO-8859-5",
            IsoIr127 => "ISO-8859-6",
            IsoIr126 => "ISO-8859-7",
            IsoIr138 => "ISO-8859-8",
            IsoIr148 => "ISO-8859-9",
            IsoIr13 => "JIS_X0201",
            IsoIr166 => "TIS-620",
            IsoIr87 => "JIS_X0208",
            IsoIr159 => "JIS_X0212-1990",
            IsoIr149 => "EUC-KR",
            IsoIr192 => "UTF-8",
            Gb18030 => "GB18030",
        }
    }

    /// The byte encoding adapter for this repertoire.
    ///
    /// ISO-8859-9 and TIS-620 are served by their Windows code page
    /// supersets (1254 and 874), which only differ in the C1 range.
    pub fn encoding(self) -> EncodingRef {
        use self::Charset::*;
        match self {
            IsoIr6 => ASCII,
            IsoIr100 => ISO_8859_1,
            IsoIr101 => ISO_8859_2,
            IsoIr109 => ISO_8859_3,
            IsoIr110 => ISO_8859_4,
            IsoIr144 => ISO_8859_5,
            IsoIr127 => ISO_8859_6,
            IsoIr126 => ISO_8859_7,
            IsoIr138 => ISO_8859_8,
            IsoIr148 => WINDOWS_1254,
            IsoIr13 => JIS_X_0201,
            IsoIr166 => WINDOWS_874,
            IsoIr87 => JIS_X_0208,
            IsoIr159 => JIS_X_0212,
            IsoIr149 => KS_X_1001,
            IsoIr192 => UTF_8,
            Gb18030 => GB18030,
        }
    }

    /// The escape sequence which designates this repertoire
    /// into the ASCII-compatible slot (G0).
    ///
    /// `None` means the repertoire can never occupy that slot.
    /// `Some(0)` means no sequence is needed,
    /// because the repertoire already contains ASCII
    /// or does not take part in code extensions.
    pub fn esc_seq0(self) -> Option<u32> {
        use self::Charset::*;
        match self {
            IsoIr87 | IsoIr159 => None,
            IsoIr13 => Some(0x284a),
            IsoIr149 | IsoIr192 | Gb18030 => Some(0),
            _ => Some(0x2842),
        }
    }

    /// The escape sequence which makes this repertoire the active one,
    /// or 0 if it is never switched to explicitly.
    pub fn esc_seq1(self) -> u32 {
        use self::Charset::*;
        match self {
            IsoIr6 | IsoIr192 | Gb18030 => 0,
            IsoIr100 => 0x2d41,
            IsoIr101 => 0x2d42,
            IsoIr109 => 0x2d43,
            IsoIr110 => 0x2d44,
            IsoIr144 => 0x2d4c,
            IsoIr127 => 0x2d47,
            IsoIr126 => 0x2d46,
            IsoIr138 => 0x2d48,
            IsoIr148 => 0x2d4d,
            IsoIr13 => 0x2949,
            IsoIr166 => 0x2d54,
            IsoIr87 => 0x2442,
            IsoIr159 => 0x242844,
            IsoIr149 => 0x242943,
        }
    }

    /// Whether single-byte ASCII text can be written
    /// while this repertoire is active.
    pub fn contains_ascii(self) -> bool {
        self.esc_seq0().is_some()
    }

    /// The sequence to emit when switching to this repertoire
    /// in the middle of a value.
    ///
    /// The default repertoire has no G1 designation,
    /// so its G0 designation (`ESC ( B`) is used instead.
    /// Repertoires outside of code extensions have no designation at all.
    pub fn designation(self) -> Option<u32> {
        match self.esc_seq1() {
            0 => self.esc_seq0().filter(|&seq| seq != 0),
            seq => Some(seq),
        }
    }

    /// The sequence which returns the ASCII-compatible slot to this
    /// repertoire, if one must be written.
    pub fn ascii_revert(self) -> Option<u32> {
        self.esc_seq0().filter(|&seq| seq != 0)
    }

    /// How many bytes each character takes while this repertoire is active.
    pub fn unit_step(self) -> UnitStep {
        match self {
            Charset::IsoIr87 | Charset::IsoIr159 => UnitStep::Double,
            Charset::IsoIr149 => UnitStep::Variable,
            _ => UnitStep::Single,
        }
    }

    /// Identify the repertoire designated by a two-byte escape sequence
    /// payload (the bytes following ESC).
    ///
    /// The three-byte designations of JIS X 0212 and KS X 1001
    /// are recognized as well, in their full form.
    pub fn from_escape_sequence(seq: u32) -> Option<Self> {
        use self::Charset::*;
        match seq {
            0x2842 => Some(IsoIr6),
            0x284a | 0x2949 => Some(IsoIr13),
            0x2442 => Some(IsoIr87),
            0x242844 => Some(IsoIr159),
            0x242943 => Some(IsoIr149),
            0x2d41 => Some(IsoIr100),
            0x2d42 => Some(IsoIr101),
            0x2d43 => Some(IsoIr109),
            0x2d44 => Some(IsoIr110),
            0x2d46 => Some(IsoIr126),
            0x2d47 => Some(IsoIr127),
            0x2d48 => Some(IsoIr138),
            0x2d4c => Some(IsoIr144),
            0x2d4d => Some(IsoIr148),
            0x2d54 => Some(IsoIr166),
            _ => None,
        }
    }
}

/// Write an escape sequence: ESC, then the high byte of `seq`
/// if it is a three-byte sequence, then the two low bytes.
pub fn write_escape_sequence(out: &mut Vec<u8>, seq: u32) {
    out.push(ESC);
    let b1 = (seq >> 16) as u8;
    if b1 != 0 {
        out.push(b1);
    }
    out.push((seq >> 8) as u8);
    out.push(seq as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ISO_IR 100", Charset::IsoIr100)]
    #[case("ISO 2022 IR 100", Charset::IsoIr100)]
    #[case("ISO_IR 148", Charset::IsoIr148)]
    #[case("ISO 2022 IR 13", Charset::IsoIr13)]
    #[case("ISO 2022 IR 87", Charset::IsoIr87)]
    #[case("ISO 2022 IR 159", Charset::IsoIr159)]
    #[case("ISO 2022 IR 149", Charset::IsoIr149)]
    #[case("ISO_IR 192", Charset::IsoIr192)]
    #[case("GB18030", Charset::Gb18030)]
    fn known_terms(#[case] term: &str, #[case] charset: Charset) {
        assert_eq!(Charset::from_code(term), Some(charset));
        assert_eq!(Charset::resolve(Some(term)), charset);
    }

    #[test]
    fn unknown_terms_degrade_to_ascii() {
        assert_eq!(Charset::from_code("ISO_IR 90210"), None);
        assert_eq!(Charset::resolve(Some("ISO_IR 90210")), Charset::IsoIr6);
        assert_eq!(Charset::resolve(Some("iso_ir 100")), Charset::IsoIr6);
        assert_eq!(Charset::resolve(Some("")), Charset::IsoIr6);
        assert_eq!(Charset::resolve(None), Charset::IsoIr6);
        assert_eq!(Charset::default(), Charset::IsoIr6);
        // no single-byte forms for the multi-byte sets
        assert_eq!(Charset::from_code("ISO_IR 87"), None);
    }

    #[test]
    fn defined_terms_resolve_back() {
        use self::Charset::*;
        for &charset in &[
            IsoIr6, IsoIr100, IsoIr101, IsoIr109, IsoIr110, IsoIr144, IsoIr127, IsoIr126,
            IsoIr138, IsoIr148, IsoIr13, IsoIr166, IsoIr87, IsoIr159, IsoIr149, IsoIr192,
            Gb18030,
        ] {
            assert_eq!(Charset::from_code(charset.defined_term()), Some(charset));
        }
    }

    #[test]
    fn ascii_compatibility() {
        assert!(Charset::IsoIr6.contains_ascii());
        assert!(Charset::IsoIr13.contains_ascii());
        assert!(Charset::IsoIr149.contains_ascii());
        assert!(Charset::IsoIr192.contains_ascii());
        assert!(!Charset::IsoIr87.contains_ascii());
        assert!(!Charset::IsoIr159.contains_ascii());
    }

    #[test]
    fn designations() {
        assert_eq!(Charset::IsoIr6.designation(), Some(0x2842));
        assert_eq!(Charset::IsoIr100.designation(), Some(0x2d41));
        assert_eq!(Charset::IsoIr159.designation(), Some(0x242844));
        assert_eq!(Charset::IsoIr192.designation(), None);
        assert_eq!(Charset::Gb18030.designation(), None);

        assert_eq!(Charset::IsoIr6.ascii_revert(), Some(0x2842));
        assert_eq!(Charset::IsoIr13.ascii_revert(), Some(0x284a));
        assert_eq!(Charset::IsoIr149.ascii_revert(), None);
        assert_eq!(Charset::IsoIr87.ascii_revert(), None);
    }

    #[test]
    fn escape_sequences_are_bit_exact() {
        let mut out = Vec::new();
        write_escape_sequence(&mut out, Charset::IsoIr6.esc_seq0().unwrap());
        assert_eq!(out, [0x1B, 0x28, 0x42]);

        out.clear();
        write_escape_sequence(&mut out, Charset::IsoIr87.esc_seq1());
        assert_eq!(out, [0x1B, 0x24, 0x42]);

        out.clear();
        write_escape_sequence(&mut out, Charset::IsoIr159.esc_seq1());
        assert_eq!(out, [0x1B, 0x24, 0x28, 0x44]);

        out.clear();
        write_escape_sequence(&mut out, Charset::IsoIr149.esc_seq1());
        assert_eq!(out, [0x1B, 0x24, 0x29, 0x43]);
    }

    #[test]
    fn escape_sequences_identify_charsets() {
        use self::Charset::*;
        for &charset in &[
            IsoIr100, IsoIr101, IsoIr109, IsoIr110, IsoIr144, IsoIr127, IsoIr126, IsoIr138,
            IsoIr148, IsoIr13, IsoIr166, IsoIr87, IsoIr159, IsoIr149,
        ] {
            assert_eq!(
                Charset::from_escape_sequence(charset.esc_seq1()),
                Some(charset)
            );
        }
        assert_eq!(Charset::from_escape_sequence(0x2842), Some(IsoIr6));
        assert_eq!(Charset::from_escape_sequence(0x284a), Some(IsoIr13));
        assert_eq!(Charset::from_escape_sequence(0xffff), None);
        assert_eq!(Charset::from_escape_sequence(0x2428), None);
    }

    #[test]
    fn unit_steps() {
        assert_eq!(UnitStep::Single.advance(0xA1), 1);
        assert_eq!(UnitStep::Double.advance(0x21), 2);
        assert_eq!(UnitStep::Variable.advance(0xC8), 2);
        assert_eq!(UnitStep::Variable.advance(b'A'), 1);
        assert_eq!(Charset::IsoIr149.unit_step(), UnitStep::Variable);
        assert_eq!(Charset::IsoIr87.unit_step(), UnitStep::Double);
        assert_eq!(Charset::IsoIr100.unit_step(), UnitStep::Single);
    }
}
