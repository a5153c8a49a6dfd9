//! Crate-level error types.
use crate::charset::Charset;
use snafu::Snafu;
use std::borrow::Cow;

/// An error type for text encoding issues.
///
/// Only raised by [`Engine::encode`](crate::engine::Engine::encode)
/// in strict mode.
/// The character set level API recovers from it by switching
/// to another repertoire or by replacing characters.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum EncodeTextError {
    /// The text contains a character
    /// which the repertoire cannot represent.
    #[snafu(display("Cannot encode text in {}: {}", charset.defined_term(), cause))]
    Unrepresentable {
        /// the repertoire which failed to encode the text
        charset: Charset,
        /// the cause, as reported by the byte encoding
        cause: Cow<'static, str>,
    },
}

/// Type alias for a result from this crate.
pub type Result<T, E = EncodeTextError> = std::result::Result<T, E>;
