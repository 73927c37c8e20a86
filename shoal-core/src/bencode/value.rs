//! Structured bencode values

use std::collections::BTreeMap;
use std::fmt;

/// Dictionary representation used by [`BencodeValue::Dictionary`].
///
/// `BTreeMap` keeps keys unique and iterates them in ascending byte order,
/// which is exactly the order the encoder must emit.
pub type BencodeDictionary = BTreeMap<Vec<u8>, BencodeValue>;

/// A decoded bencode value.
///
/// Byte strings are kept as raw bytes since bencode strings are not
/// required to be UTF-8 (piece hashes, compact peer lists).
#[derive(Clone, PartialEq, Eq)]
pub enum BencodeValue {
    /// Signed 64-bit integer (`i<digits>e`)
    Integer(i64),
    /// Raw byte string (`<length>:<bytes>`)
    ByteString(Vec<u8>),
    /// Ordered list of values (`l...e`)
    List(Vec<BencodeValue>),
    /// Dictionary with unique byte string keys (`d...e`)
    Dictionary(BencodeDictionary),
}

impl BencodeValue {
    /// Returns the integer if this value is an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the raw bytes if this value is a `ByteString`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the byte string as UTF-8 text, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BencodeDictionary> {
        match self {
            BencodeValue::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a dictionary.
    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict().and_then(|dict| dict.get(key))
    }

    /// Short type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            BencodeValue::Integer(_) => "integer",
            BencodeValue::ByteString(_) => "string",
            BencodeValue::List(_) => "list",
            BencodeValue::Dictionary(_) => "dictionary",
        }
    }
}

impl fmt::Debug for BencodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BencodeValue::Integer(value) => write!(f, "{value}"),
            BencodeValue::ByteString(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "{text:?}"),
                Err(_) => write!(f, "<{} bytes: {}>", bytes.len(), hex::encode(bytes)),
            },
            BencodeValue::List(items) => f.debug_list().entries(items).finish(),
            BencodeValue::Dictionary(dict) => f
                .debug_map()
                .entries(dict.iter().map(|(key, value)| (String::from_utf8_lossy(key), value)))
                .finish(),
        }
    }
}

impl From<i64> for BencodeValue {
    fn from(value: i64) -> Self {
        BencodeValue::Integer(value)
    }
}

impl From<&str> for BencodeValue {
    fn from(value: &str) -> Self {
        BencodeValue::ByteString(value.as_bytes().to_vec())
    }
}

impl From<String> for BencodeValue {
    fn from(value: String) -> Self {
        BencodeValue::ByteString(value.into_bytes())
    }
}

impl From<&[u8]> for BencodeValue {
    fn from(value: &[u8]) -> Self {
        BencodeValue::ByteString(value.to_vec())
    }
}

impl From<Vec<u8>> for BencodeValue {
    fn from(value: Vec<u8>) -> Self {
        BencodeValue::ByteString(value)
    }
}

impl From<Vec<BencodeValue>> for BencodeValue {
    fn from(items: Vec<BencodeValue>) -> Self {
        BencodeValue::List(items)
    }
}

impl From<BencodeDictionary> for BencodeValue {
    fn from(dict: BencodeDictionary) -> Self {
        BencodeValue::Dictionary(dict)
    }
}

impl<K: Into<Vec<u8>>, V: Into<BencodeValue>> FromIterator<(K, V)> for BencodeValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        BencodeValue::Dictionary(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
