//! Text conversion under ISO 2022 code extensions,
//! used when a data set declares more than one character repertoire.
//!
//! Encoding keeps the whole value in the primary repertoire if it can.
//! Otherwise the value is split into components at the given delimiters,
//! and each component is written in the first repertoire able to represent
//! it, preceded by the escape sequence designating that repertoire.
//! Delimiters are always written as plain ASCII bytes.
//!
//! Decoding scans for escape sequences and decodes each run of bytes
//! between them with the repertoire designated last.

use crate::charset::{write_escape_sequence, Charset, ESC};
use crate::engine::{CachedEngine, Slot};
use smallvec::SmallVec;

/// A piece of a text value, as seen by the encoder.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Component<'a> {
    /// A single delimiter character.
    Delimiter(char),
    /// The text between two delimiters.
    Text(&'a str),
}

/// Split `text` into components, keeping each delimiter as its own component.
/// Empty text between consecutive delimiters yields no component.
fn components<'a>(text: &'a str, delimiters: &str) -> Vec<Component<'a>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, d) in text.char_indices().filter(|(_, c)| delimiters.contains(*c)) {
        if i > start {
            out.push(Component::Text(&text[start..i]));
        }
        out.push(Component::Delimiter(d));
        start = i + d.len_utf8();
    }
    if start < text.len() {
        out.push(Component::Text(&text[start..]));
    }
    out
}

/// The engines used while encoding one value, created on first use.
///
/// The first two repertoires borrow the calling thread's cached engines,
/// the others get their own.
struct Encoders<'c> {
    codecs: &'c [Charset],
    engines: SmallVec<[Option<CachedEngine>; 4]>,
}

impl<'c> Encoders<'c> {
    fn new(codecs: &'c [Charset]) -> Self {
        Encoders {
            codecs,
            engines: codecs.iter().map(|_| None).collect(),
        }
    }

    fn get(&mut self, index: usize) -> &mut CachedEngine {
        let charset = self.codecs[index];
        self.engines[index].get_or_insert_with(|| match index {
            0 => CachedEngine::acquire(Slot::Primary, charset),
            1 => CachedEngine::acquire(Slot::Secondary, charset),
            _ => CachedEngine::detached(charset),
        })
    }
}

/// Encode a text value with the given repertoires.
///
/// `codecs` must hold at least one repertoire; the first is the primary one.
pub(crate) fn encode(codecs: &[Charset], text: &str, delimiters: &str) -> Vec<u8> {
    let mut encoders = Encoders::new(codecs);
    let mut out = Vec::with_capacity(text.len());

    // the common case: the whole value fits in the primary repertoire
    if encoders.get(0).encode(text, &mut out, false).is_ok() {
        return out;
    }

    let components = components(text, delimiters);
    out.reserve(text.len() + 4 * (components.len() + 1));

    let mut active = 0;
    for component in components {
        match component {
            Component::Delimiter(d) => {
                revert_to_ascii(codecs, active, &mut out);
                if d.is_ascii() {
                    out.push(d as u8);
                } else {
                    let mut buf = [0; 4];
                    encoders
                        .get(0)
                        .encode_lossy(d.encode_utf8(&mut buf), &mut out, false);
                }
                active = 0;
            }
            Component::Text(part) => {
                active = encode_component(&mut encoders, active, part, &mut out);
            }
        }
    }

    // leave the byte stream in an ASCII compatible state
    revert_to_ascii(codecs, active, &mut out);
    out
}

/// Write the escape sequence restoring ASCII
/// if the active repertoire does not contain it.
fn revert_to_ascii(codecs: &[Charset], active: usize, out: &mut Vec<u8>) {
    if !codecs[active].contains_ascii() {
        if let Some(seq) = codecs[0].ascii_revert() {
            write_escape_sequence(out, seq);
        }
    }
}

/// The repertoires to try after `active`, in cyclic order.
/// Repertoires which cannot be designated in the middle of a value
/// are skipped.
fn candidates(codecs: &[Charset], active: usize) -> impl Iterator<Item = usize> + '_ {
    let n = codecs.len();
    (1..n)
        .map(move |offset| (active + offset) % n)
        .filter(move |&i| codecs[i].designation().is_some())
}

/// Encode one component, returning the index of the repertoire
/// active after it.
fn encode_component(
    encoders: &mut Encoders<'_>,
    active: usize,
    part: &str,
    out: &mut Vec<u8>,
) -> usize {
    let codecs = encoders.codecs;
    if encoders.get(active).encode(part, out, false).is_ok() {
        return active;
    }

    for next in candidates(codecs, active) {
        if encoders.get(next).encode(part, out, true).is_ok() {
            tracing::trace!(
                "Switching from {} to {} to encode {:?}",
                codecs[active].defined_term(),
                codecs[next].defined_term(),
                part
            );
            return next;
        }
    }

    // no single repertoire can hold the whole component
    if part.chars().nth(1).is_some() {
        return encode_runs(encoders, active, part, out);
    }

    replace(encoders, active, part, out)
}

/// Force the text into the primary repertoire,
/// substituting what it cannot represent.
fn replace(encoders: &mut Encoders<'_>, active: usize, part: &str, out: &mut Vec<u8>) -> usize {
    tracing::debug!(
        "No specific character set can encode {:?}, replacing characters",
        part
    );
    revert_to_ascii(encoders.codecs, active, out);
    encoders.get(0).encode_lossy(part, out, false);
    0
}

/// Encode a component character by character,
/// staying in the active repertoire for as long as possible
/// and switching to the first other repertoire able to continue.
fn encode_runs(
    encoders: &mut Encoders<'_>,
    mut active: usize,
    part: &str,
    out: &mut Vec<u8>,
) -> usize {
    let codecs = encoders.codecs;
    let mut runs: Vec<(usize, Option<usize>)> = Vec::new();
    let mut current = active;
    for (i, c) in part.char_indices() {
        let piece = &part[i..i + c.len_utf8()];
        let choice = if encoders.get(current).can_encode(piece) {
            Some(current)
        } else {
            let next = candidates(codecs, current).find(|&next| encoders.get(next).can_encode(piece));
            if let Some(next) = next {
                current = next;
            }
            next
        };
        match runs.last() {
            Some(&(_, last)) if last == choice => {}
            _ => runs.push((i, choice)),
        }
    }

    for (k, &(start, choice)) in runs.iter().enumerate() {
        let end = runs.get(k + 1).map_or(part.len(), |&(end, _)| end);
        let run = &part[start..end];
        match choice {
            Some(index) => {
                let designate = index != active;
                if encoders.get(index).encode(run, out, designate).is_ok() {
                    active = index;
                } else {
                    active = replace(encoders, active, run, out);
                }
            }
            None => active = replace(encoders, active, run, out),
        }
    }
    active
}

/// The engines used while decoding one value:
/// one for the primary repertoire and one for whichever other
/// repertoire is designated.
struct Decoders {
    primary: CachedEngine,
    other: Option<CachedEngine>,
}

impl Decoders {
    fn decode(&mut self, charset: Charset, bytes: &[u8], out: &mut String) {
        if bytes.is_empty() {
            return;
        }
        if charset == self.primary.charset() {
            self.primary.decode(bytes, out);
            return;
        }
        let engine = self
            .other
            .get_or_insert_with(|| CachedEngine::acquire(Slot::Secondary, charset));
        engine.retarget(charset);
        engine.decode(bytes, out);
    }
}

/// The outcome of reading an escape sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Escape {
    /// number of bytes taken by the sequence, ESC included
    len: usize,
    /// the designated repertoire, if the sequence was recognized
    charset: Option<Charset>,
}

/// Read the escape sequence at the start of `bytes` (which begins with ESC).
///
/// Unrecognized and truncated sequences take as many bytes as a
/// recognized sequence of the same shape would,
/// or whatever is left of the input.
fn read_escape(bytes: &[u8], primary: Charset) -> Escape {
    let unknown = |len: usize| Escape {
        len: len.min(bytes.len()),
        charset: None,
    };
    if bytes.len() < 3 {
        return unknown(3);
    }
    let seq = u32::from(bytes[1]) << 8 | u32::from(bytes[2]);
    match seq {
        0x2428 | 0x2429 => match bytes.get(3) {
            Some(&terminator) => Escape {
                len: 4,
                charset: Charset::from_escape_sequence(seq << 8 | u32::from(terminator)),
            },
            None => unknown(4),
        },
        // returning to ASCII restores the primary repertoire
        _ if primary.ascii_revert() == Some(seq) => Escape {
            len: 3,
            charset: Some(primary),
        },
        _ => Escape {
            len: 3,
            charset: Charset::from_escape_sequence(seq),
        },
    }
}

/// Decode a text value with the given repertoires.
///
/// `codecs` must hold at least one repertoire; the first is the primary one.
pub(crate) fn decode(codecs: &[Charset], bytes: &[u8]) -> String {
    let primary = codecs[0];
    let mut decoders = Decoders {
        primary: CachedEngine::acquire(Slot::Primary, primary),
        other: None,
    };
    let mut out = String::with_capacity(bytes.len());

    let mut active = primary;
    let mut step = active.unit_step();
    let mut segment_start = 0;
    let mut cur = 0;
    while cur < bytes.len() {
        if bytes[cur] != ESC {
            cur += step.advance(bytes[cur]);
            continue;
        }

        decoders.decode(active, &bytes[segment_start..cur], &mut out);
        let escape = read_escape(&bytes[cur..], primary);
        let escape_end = cur + escape.len;
        match escape.charset {
            Some(charset) => {
                active = charset;
                step = charset.unit_step();
            }
            None => {
                tracing::debug!(
                    "Unrecognized escape sequence {:02X?}, decoding it as text",
                    &bytes[cur..escape_end]
                );
                decoders.decode(active, &bytes[cur..escape_end], &mut out);
            }
        }
        cur = escape_end;
        segment_start = cur;
    }
    decoders.decode(active, &bytes[segment_start..], &mut out);
    out
}
