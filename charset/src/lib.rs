//! DICOM text encoding and decoding under a Specific Character Set.
//!
//! Text values in DICOM are encoded according to the character repertoires
//! declared in the Specific Character Set (0008,0005) attribute
//! of the data set holding them.
//! When more than one repertoire is declared,
//! values switch between them through ISO 2022 escape sequences.
//!
//! The character repertoires supported are:
//! - ISO 646 (US-ASCII), the default repertoire
//! - ISO 8859 parts 1 to 9
//! - JIS X 0201, JIS X 0208 and JIS X 0212
//! - KS X 1001
//! - TIS 620-2533
//! - ISO 10646 in UTF-8
//! - GB 18030
//!
//! Please see [`Charset`] for the complete list of defined terms.
//!
//! Conversion is lenient: unknown defined terms fall back to the default
//! repertoire, characters which cannot be encoded are replaced,
//! and undecodable bytes are decoded to U+FFFD.
//! Neither [`SpecificCharacterSet::encode`]
//! nor [`SpecificCharacterSet::decode`] can fail.
//!
//! # Example
//!
//! ```
//! # use dicom_charset::SpecificCharacterSet;
//! let charset = SpecificCharacterSet::from_element_value("\\ISO 2022 IR 87");
//! let bytes = charset.encode("Yamada^Tarou=山田^太郎", "^=\\");
//! assert_eq!(
//!     &bytes[..],
//!     &b"Yamada^Tarou=\x1b$B;3ED\x1b(B^\x1b$BB@O:\x1b(B"[..]
//! );
//! assert_eq!(charset.decode(&bytes), "Yamada^Tarou=山田^太郎");
//! ```

pub mod charset;
pub mod codec;
pub mod engine;
pub mod error;
mod iso2022;

pub use charset::Charset;
pub use engine::evict_thread_cache;
pub use error::EncodeTextError;

use engine::{CachedEngine, Slot};

/// The character repertoires in effect for the text values of a data set.
///
/// Built once from the defined terms of the Specific Character Set
/// attribute, and then shared read-only.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct SpecificCharacterSet(Repr);

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
enum Repr {
    /// A single repertoire, without code extensions.
    Simple(Charset),
    /// Two or more repertoires switched through ISO 2022 escape sequences.
    /// The first one is the primary repertoire.
    Extended(Box<[Charset]>),
}

impl Default for SpecificCharacterSet {
    fn default() -> Self {
        SpecificCharacterSet(Repr::Simple(Charset::IsoIr6))
    }
}

impl From<Charset> for SpecificCharacterSet {
    fn from(charset: Charset) -> Self {
        SpecificCharacterSet(Repr::Simple(charset))
    }
}

impl SpecificCharacterSet {
    /// Build a specific character set from an ordered list of defined terms.
    ///
    /// An empty list stands for the default repertoire.
    /// Unknown terms are replaced by the default repertoire.
    ///
    /// # Example
    ///
    /// ```
    /// # use dicom_charset::{Charset, SpecificCharacterSet};
    /// let charset = SpecificCharacterSet::from_codes(&["ISO 2022 IR 6", "ISO 2022 IR 149"]);
    /// assert!(charset.is_extended());
    /// assert_eq!(charset.codecs(), &[Charset::IsoIr6, Charset::IsoIr149]);
    /// ```
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codecs: Vec<Charset> = codes
            .into_iter()
            .map(|code| Charset::resolve(Some(code.as_ref())))
            .collect();
        match codecs.as_slice() {
            [] => SpecificCharacterSet::default(),
            [charset] => SpecificCharacterSet(Repr::Simple(*charset)),
            _ => SpecificCharacterSet(Repr::Extended(codecs.into_boxed_slice())),
        }
    }

    /// Build a specific character set from a single defined term.
    pub fn from_code(code: &str) -> Self {
        SpecificCharacterSet(Repr::Simple(Charset::resolve(Some(code))))
    }

    /// Build a specific character set from the raw value
    /// of the Specific Character Set attribute.
    ///
    /// Values are separated by backslashes,
    /// and padding around each value is ignored.
    /// An empty first value stands for the default repertoire.
    pub fn from_element_value(value: &str) -> Self {
        let value = value.trim_end_matches(|c| c == ' ' || c == '\0');
        if value.is_empty() {
            return SpecificCharacterSet::default();
        }
        let mut codes: Vec<&str> = value
            .split('\\')
            .map(|code| code.trim_matches(|c| c == ' ' || c == '\0'))
            .collect();
        if let Some(first) = codes.first_mut() {
            if first.is_empty() {
                *first = "ISO 2022 IR 6";
            }
        }
        SpecificCharacterSet::from_codes(codes)
    }

    /// The repertoires in use, primary repertoire first.
    pub fn codecs(&self) -> &[Charset] {
        match &self.0 {
            Repr::Simple(charset) => std::slice::from_ref(charset),
            Repr::Extended(codecs) => codecs,
        }
    }

    /// Whether ISO 2022 code extensions are in use.
    pub fn is_extended(&self) -> bool {
        matches!(self.0, Repr::Extended(_))
    }

    /// Encode a text value.
    ///
    /// `delimiters` are the characters separating the components of the
    /// value (such as `^=\` for person names).
    /// They are always written as plain ASCII,
    /// and the ASCII repertoire is restored before each of them.
    /// Without code extensions, `delimiters` has no effect.
    ///
    /// Characters which none of the repertoires can represent are replaced.
    pub fn encode(&self, text: &str, delimiters: &str) -> Vec<u8> {
        match &self.0 {
            Repr::Simple(charset) => {
                let mut engine = CachedEngine::acquire(Slot::Primary, *charset);
                let mut out = Vec::with_capacity(text.len());
                engine.encode_lossy(text, &mut out, false);
                out
            }
            Repr::Extended(codecs) => iso2022::encode(codecs, text, delimiters),
        }
    }

    /// Decode a text value.
    ///
    /// Invalid bytes and unrecognized escape sequences
    /// are decoded as best as possible.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match &self.0 {
            Repr::Simple(charset) => {
                let mut engine = CachedEngine::acquire(Slot::Primary, *charset);
                let mut out = String::with_capacity(bytes.len());
                engine.decode(bytes, &mut out);
                out
            }
            Repr::Extended(codecs) => iso2022::decode(codecs, bytes),
        }
    }
}
