//! Bencode codec for torrent metadata and tracker responses.
//!
//! Decoding is a single left-to-right pass with exact byte offsets in errors.
//! Encoding is deterministic: dictionary keys are always emitted sorted, so
//! `decode(encode(v)) == v` for every value.

pub mod decoder;
pub mod encoder;
pub mod value;

use std::collections::BTreeMap;
use std::ops::Range;

pub use decoder::{Decoder, MAX_DEPTH};
pub use encoder::{encode, encode_into};
pub use value::{BencodeDictionary, BencodeValue};

/// Errors produced while decoding bencode input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BencodeError {
    #[error("Bencode syntax error at offset {offset}: expected {expected}")]
    Syntax {
        offset: usize,
        expected: &'static str,
    },
}

impl BencodeError {
    pub(crate) fn syntax(offset: usize, expected: &'static str) -> Self {
        BencodeError::Syntax { offset, expected }
    }

    /// Byte offset at which decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            BencodeError::Syntax { offset, .. } => *offset,
        }
    }
}

/// Decodes exactly one bencode value spanning the whole input.
///
/// # Errors
/// - `BencodeError::Syntax` - Malformed input or trailing bytes after the value
pub fn decode(input: &[u8]) -> Result<BencodeValue, BencodeError> {
    let mut decoder = Decoder::new(input);
    let value = decoder.decode_value()?;
    decoder.finish()?;
    Ok(value)
}

/// Decodes a root dictionary and keeps the raw byte span of each value.
///
/// The spans are the exact slices consumed by the decoder, which is what
/// info hash computation needs: re-encoding could reorder keys or normalise
/// integers and produce a different digest.
///
/// # Errors
/// - `BencodeError::Syntax` - Root is not a dictionary, or malformed input
pub fn decode_dictionary(input: &[u8]) -> Result<RawDictionary<'_>, BencodeError> {
    let mut decoder = Decoder::new(input);
    let mut spans = BTreeMap::new();
    let entries = decoder.decode_dictionary_with(|key, span| {
        spans.insert(key.to_vec(), span);
    })?;
    decoder.finish()?;

    Ok(RawDictionary {
        input,
        entries,
        spans,
    })
}

/// Root dictionary decoded together with the byte spans of its values.
#[derive(Debug, Clone)]
pub struct RawDictionary<'a> {
    input: &'a [u8],
    entries: BencodeDictionary,
    spans: BTreeMap<Vec<u8>, Range<usize>>,
}

impl<'a> RawDictionary<'a> {
    pub fn entries(&self) -> &BencodeDictionary {
        &self.entries
    }

    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.entries.get(key)
    }

    /// Exact input bytes of the value stored under `key`.
    pub fn raw(&self, key: &[u8]) -> Option<&'a [u8]> {
        let input = self.input;
        self.spans.get(key).map(|span| &input[span.clone()])
    }

    pub fn span(&self, key: &[u8]) -> Option<Range<usize>> {
        self.spans.get(key).cloned()
    }

    pub fn into_value(self) -> BencodeValue {
        BencodeValue::Dictionary(self.entries)
    }
}
