//! Text encoders and decoders bound to a single character repertoire,
//! and a small per-thread cache to reuse them.
//!
//! An [`Engine`] keeps the raw encoder and decoder of its repertoire
//! once they are first needed.
//! Every conversion runs them to completion, which returns them to
//! their initial state, so nothing leaks from one call to the next,
//! whether the engine was cached or freshly built.

use crate::charset::{write_escape_sequence, Charset};
use crate::error::{Result, UnrepresentableSnafu};
use encoding::{RawDecoder, RawEncoder};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Scratch buffers grown beyond this capacity are released
/// when an engine returns to the cache.
pub const SCRATCH_RETAIN_LIMIT: usize = 16 * 1024;

/// A text encoder and decoder for one character repertoire.
pub struct Engine {
    charset: Charset,
    encoder: Option<Box<dyn RawEncoder>>,
    decoder: Option<Box<dyn RawDecoder>>,
    scratch: Vec<u8>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("charset", &self.charset)
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

impl Engine {
    /// Create a new engine for the given repertoire.
    pub fn new(charset: Charset) -> Self {
        Engine {
            charset,
            encoder: None,
            decoder: None,
            scratch: Vec::new(),
        }
    }

    /// The repertoire this engine is bound to.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Encode `text`, appending the bytes to `out`.
    ///
    /// If `designate` is true, the escape sequence which switches
    /// to this repertoire is written first.
    ///
    /// A character which cannot be represented
    /// fails the call and nothing is written to `out`.
    pub fn encode(&mut self, text: &str, out: &mut Vec<u8>, designate: bool) -> Result<()> {
        let charset = self.charset;
        let encoder = self
            .encoder
            .get_or_insert_with(|| charset.encoding().raw_encoder());
        self.scratch.clear();
        encode_strict(&mut **encoder, text, &mut self.scratch)
            .map_err(|cause| UnrepresentableSnafu { charset, cause }.build())?;

        if designate {
            write_designation(charset, out);
        }
        out.extend_from_slice(&self.scratch);
        Ok(())
    }

    /// Encode `text`, appending the bytes to `out`
    /// and substituting each character which cannot be represented.
    ///
    /// The substitute is a question mark,
    /// or a full-width question mark in repertoires without ASCII.
    /// Characters are dropped if neither is available.
    pub fn encode_lossy(&mut self, text: &str, out: &mut Vec<u8>, designate: bool) {
        let charset = self.charset;
        if designate {
            write_designation(charset, out);
        }
        let encoder = self
            .encoder
            .get_or_insert_with(|| charset.encoding().raw_encoder());
        encode_replacing(&mut **encoder, text, out);
    }

    /// Check whether `text` can be fully represented in this repertoire.
    pub fn can_encode(&mut self, text: &str) -> bool {
        let charset = self.charset;
        let encoder = self
            .encoder
            .get_or_insert_with(|| charset.encoding().raw_encoder());
        self.scratch.clear();
        encode_strict(&mut **encoder, text, &mut self.scratch).is_ok()
    }

    /// Decode `bytes`, appending the text to `out`.
    ///
    /// Byte sequences which are not valid in this repertoire
    /// are decoded as U+FFFD.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        let charset = self.charset;
        let decoder = self
            .decoder
            .get_or_insert_with(|| charset.encoding().raw_decoder());
        decode_replacing(&mut **decoder, bytes, out);
    }

    /// Prepare a cached engine for another round of conversions.
    fn reset(&mut self) {
        self.scratch.clear();
        if self.scratch.capacity() > SCRATCH_RETAIN_LIMIT {
            self.scratch = Vec::new();
        }
    }
}

fn write_designation(charset: Charset, out: &mut Vec<u8>) {
    if let Some(seq) = charset.designation() {
        write_escape_sequence(out, seq);
    }
}

/// Encode all of `text`, failing on the first character
/// which `encoder` cannot represent.
/// The encoder is finished in both cases.
fn encode_strict(
    encoder: &mut dyn RawEncoder,
    text: &str,
    out: &mut Vec<u8>,
) -> std::result::Result<(), Cow<'static, str>> {
    let (_, err) = encoder.raw_feed(text, out);
    let finished = encoder.raw_finish(out);
    match err.or(finished) {
        Some(err) => Err(err.cause),
        None => Ok(()),
    }
}

/// Encode all of `text`, writing a replacement for every character
/// which `encoder` cannot represent.
fn encode_replacing(encoder: &mut dyn RawEncoder, text: &str, out: &mut Vec<u8>) {
    let mut remaining = 0;
    while remaining < text.len() {
        let (offset, err) = encoder.raw_feed(&text[remaining..], out);
        let err = match err {
            Some(err) => err,
            None => break,
        };
        let unprocessed = remaining + offset;
        let upto = (remaining as isize + err.upto) as usize;
        // always skip at least one character
        let end = if upto > unprocessed && text.is_char_boundary(upto) {
            upto
        } else {
            unprocessed + text[unprocessed..].chars().next().map_or(0, char::len_utf8)
        };
        for _ in text[unprocessed..end].chars() {
            write_replacement(encoder, out);
        }
        remaining = end;
    }
    if encoder.raw_finish(out).is_some() {
        write_replacement(encoder, out);
    }
}

fn write_replacement(encoder: &mut dyn RawEncoder, out: &mut Vec<u8>) {
    for marker in &["?", "\u{FF1F}"] {
        let mark = out.len();
        match encoder.raw_feed(marker, out) {
            (n, None) if n == marker.len() => return,
            _ => out.truncate(mark),
        }
    }
}

/// Decode all of `bytes`, writing U+FFFD for every invalid sequence.
fn decode_replacing(decoder: &mut dyn RawDecoder, bytes: &[u8], out: &mut String) {
    let mut remaining = 0;
    while remaining < bytes.len() {
        let (offset, err) = decoder.raw_feed(&bytes[remaining..], out);
        let err = match err {
            Some(err) => err,
            None => break,
        };
        out.push(char::REPLACEMENT_CHARACTER);
        // an empty error span leaves the decoder in a new state,
        // so feeding from the same position still makes progress
        let upto = (remaining as isize + err.upto).max((remaining + offset) as isize);
        remaining = (upto as usize).min(bytes.len());
    }
    if decoder.raw_finish(out).is_some() {
        out.push(char::REPLACEMENT_CHARACTER);
    }
}

/// One of the two engine slots kept for each thread.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum Slot {
    /// The engine of the primary repertoire.
    Primary,
    /// The engine of whichever other repertoire was used last.
    Secondary,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::Primary => 0,
            Slot::Secondary => 1,
        }
    }
}

/// A two-slot cache of engines.
///
/// Each slot holds at most one engine.
/// Taking an engine for a different repertoire than the cached one
/// discards the cached engine.
#[derive(Debug, Default)]
pub struct EngineCache {
    slots: [Option<Engine>; 2],
}

impl EngineCache {
    /// Take the engine in the given slot if it is bound to `charset`,
    /// or create a new one.
    pub fn take(&mut self, slot: Slot, charset: Charset) -> Engine {
        match self.slots[slot.index()].take() {
            Some(engine) if engine.charset == charset => engine,
            _ => Engine::new(charset),
        }
    }

    /// Return an engine to the given slot, replacing its current content.
    pub fn put(&mut self, slot: Slot, mut engine: Engine) {
        engine.reset();
        self.slots[slot.index()] = Some(engine);
    }

    /// The repertoire of the engine currently held in a slot.
    pub fn cached(&self, slot: Slot) -> Option<Charset> {
        self.slots[slot.index()].as_ref().map(Engine::charset)
    }

    /// Drop all cached engines.
    pub fn evict(&mut self) {
        self.slots = [None, None];
    }
}

thread_local! {
    static CACHE: RefCell<EngineCache> = RefCell::new(EngineCache::default());
}

/// Drop the engines cached for the calling thread.
///
/// Engines are recreated on demand, so this can be called at any time.
pub fn evict_thread_cache() {
    let _ = CACHE.try_with(|cache| cache.borrow_mut().evict());
}

/// An engine on loan from the calling thread's cache.
///
/// The engine goes back to its slot when dropped.
/// Engines not drawn from a slot are simply discarded.
#[derive(Debug)]
pub(crate) struct CachedEngine {
    slot: Option<Slot>,
    engine: Engine,
}

impl CachedEngine {
    /// Borrow the engine in `slot`, creating one for `charset` if needed.
    pub(crate) fn acquire(slot: Slot, charset: Charset) -> Self {
        let engine = CACHE
            .try_with(|cache| cache.borrow_mut().take(slot, charset))
            .unwrap_or_else(|_| Engine::new(charset));
        CachedEngine {
            slot: Some(slot),
            engine,
        }
    }

    /// Create an engine which does not return to the cache.
    pub(crate) fn detached(charset: Charset) -> Self {
        CachedEngine {
            slot: None,
            engine: Engine::new(charset),
        }
    }

    /// Bind this loan to another repertoire, replacing the engine if needed.
    pub(crate) fn retarget(&mut self, charset: Charset) {
        if self.engine.charset != charset {
            self.engine = Engine::new(charset);
        }
    }
}

impl Deref for CachedEngine {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        &self.engine
    }
}

impl DerefMut for CachedEngine {
    fn deref_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

impl Drop for CachedEngine {
    fn drop(&mut self) {
        if let Some(slot) = self.slot {
            let charset = self.engine.charset;
            let engine = std::mem::replace(&mut self.engine, Engine::new(charset));
            // the cache may already be gone during thread teardown
            let _ = CACHE.try_with(|cache| {
                if let Ok(mut cache) = cache.try_borrow_mut() {
                    cache.put(slot, engine);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strict_failure_leaves_output_untouched() {
        let mut engine = Engine::new(Charset::IsoIr100);
        let mut out = b"prefix".to_vec();
        assert!(engine
            .encode("Müller\u{3042}", &mut out, true)
            .is_err());
        assert_eq!(out, b"prefix");

        engine
            .encode("Müller", &mut out, false)
            .unwrap();
        assert_eq!(out, b"prefixM\xFCller");
    }

    #[test]
    fn designation_is_written_before_the_text() {
        let mut engine = Engine::new(Charset::IsoIr87);
        let mut out = Vec::new();
        engine
            .encode("\u{3042}", &mut out, true)
            .unwrap();
        assert_eq!(out, [0x1B, 0x24, 0x42, 0x24, 0x22]);

        let mut engine = Engine::new(Charset::IsoIr192);
        let mut out = Vec::new();
        engine.encode("é", &mut out, true).unwrap();
        assert_eq!(out, "é".as_bytes());
    }

    #[test]
    fn lossy_encoding_substitutes_characters() {
        let mut engine = Engine::new(Charset::IsoIr6);
        let mut out = Vec::new();
        engine.encode_lossy("a\u{3042}b\u{1F600}", &mut out, false);
        assert_eq!(out, b"a?b?");

        // full-width question mark in a repertoire without ASCII
        let mut engine = Engine::new(Charset::IsoIr87);
        let mut out = Vec::new();
        engine.encode_lossy("\u{3042}x", &mut out, true);
        assert_eq!(out, [0x1B, 0x24, 0x42, 0x24, 0x22, 0x21, 0x29]);
    }

    #[test]
    fn can_encode() {
        let mut engine = Engine::new(Charset::IsoIr144);
        assert!(engine.can_encode("Иванков"));
        assert!(!engine.can_encode("Müller"));
    }

    #[test]
    fn decode_replaces_invalid_bytes() {
        let mut engine = Engine::new(Charset::IsoIr6);
        let mut out = String::from(">");
        engine.decode(b"ab\xFFc", &mut out);
        assert_eq!(out, ">ab\u{FFFD}c");
    }

    #[test]
    fn raw_coders_are_kept_and_reset_between_calls() {
        let mut engine = Engine::new(Charset::IsoIr87);
        assert!(engine.decoder.is_none());

        // a dangling lead byte must not carry over to the next call
        let mut out = String::new();
        engine.decode(b";3E", &mut out);
        assert_eq!(out, "\u{5C71}\u{FFFD}");
        assert!(engine.decoder.is_some());
        out.clear();
        engine.decode(b"ED", &mut out);
        assert_eq!(out, "\u{7530}");

        // nor a failed strict encoding
        let mut bytes = Vec::new();
        assert!(engine.encode("\u{5C71}A", &mut bytes, false).is_err());
        assert!(engine.encoder.is_some());
        engine.encode("\u{5C71}", &mut bytes, false).unwrap();
        assert_eq!(bytes, b";3");
    }

    #[test]
    fn cached_engines_keep_their_raw_coders() {
        let mut cache = EngineCache::default();
        let mut engine = cache.take(Slot::Primary, Charset::IsoIr149);
        let mut out = String::new();
        engine.decode(b"\xC8\xAB", &mut out);
        cache.put(Slot::Primary, engine);

        let engine = cache.take(Slot::Primary, Charset::IsoIr149);
        assert!(engine.decoder.is_some());
    }

    #[test]
    fn cache_slots_evict_on_mismatch() {
        let mut cache = EngineCache::default();
        assert_eq!(cache.cached(Slot::Primary), None);

        let engine = cache.take(Slot::Primary, Charset::IsoIr100);
        cache.put(Slot::Primary, engine);
        assert_eq!(cache.cached(Slot::Primary), Some(Charset::IsoIr100));
        assert_eq!(cache.cached(Slot::Secondary), None);

        let engine = cache.take(Slot::Primary, Charset::IsoIr87);
        assert_eq!(engine.charset(), Charset::IsoIr87);
        assert_eq!(cache.cached(Slot::Primary), None);
        cache.put(Slot::Secondary, engine);
        assert_eq!(cache.cached(Slot::Secondary), Some(Charset::IsoIr87));

        cache.evict();
        assert_eq!(cache.cached(Slot::Secondary), None);
    }

    #[test]
    fn reset_releases_large_buffers() {
        let mut engine = Engine::new(Charset::IsoIr192);
        let text = "x".repeat(SCRATCH_RETAIN_LIMIT * 2);
        assert!(engine.can_encode(&text));
        assert!(engine.scratch.capacity() > SCRATCH_RETAIN_LIMIT);
        engine.reset();
        assert_eq!(engine.scratch.capacity(), 0);
    }

    #[test]
    fn loans_return_to_the_thread_cache() {
        evict_thread_cache();
        {
            let mut engine = CachedEngine::acquire(Slot::Secondary, Charset::IsoIr149);
            let mut out = Vec::new();
            engine.encode("홍", &mut out, false).unwrap();
        }
        let cached = CACHE.with(|cache| cache.borrow().cached(Slot::Secondary));
        assert_eq!(cached, Some(Charset::IsoIr149));

        {
            let _engine = CachedEngine::detached(Charset::IsoIr100);
        }
        let cached = CACHE.with(|cache| cache.borrow().cached(Slot::Secondary));
        assert_eq!(cached, Some(Charset::IsoIr149));

        evict_thread_cache();
        let cached = CACHE.with(|cache| cache.borrow().cached(Slot::Secondary));
        assert_eq!(cached, None);
    }
}
