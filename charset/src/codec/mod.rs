//! Byte encodings which the `encoding` crate does not provide out of the box.
//!
//! These follow the same [`Encoding`] interface as the encodings in
//! [`encoding::all`], so that every repertoire can be driven alike.
//!
//! [`Encoding`]: encoding::types::Encoding

pub mod jis;
pub mod korean;

use std::borrow::Cow;

const UNREPRESENTABLE: Cow<'static, str> = Cow::Borrowed("unrepresentable character");
const INVALID_SEQUENCE: Cow<'static, str> = Cow::Borrowed("invalid sequence");
