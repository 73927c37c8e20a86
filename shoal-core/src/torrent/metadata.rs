//! Typed torrent descriptor extracted from a decoded metainfo dictionary

use std::fmt;

use bytes::Bytes;

use super::{InfoHash, TorrentError};
use crate::bencode::{self, BencodeDictionary, BencodeValue, RawDictionary};

/// Length of one SHA-1 piece digest inside `info.pieces`.
pub const PIECE_HASH_LEN: usize = 20;

const ROOT_KEYS: &[&str] = &[
    "announce",
    "announce-list",
    "created by",
    "creation date",
    "encoding",
    "info",
];

const INFO_KEYS: &[&str] = &["length", "name", "piece length", "pieces"];

/// Metadata of a single-file torrent.
///
/// Immutable after construction. Keeps the exact bytes the decoder consumed
/// for the `info` dictionary, which is the only valid info hash input.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentMetadata {
    /// Primary tracker URL
    pub announce: String,
    /// Fallback tracker tiers, in file order
    pub announce_list: Vec<Vec<String>>,
    pub created_by: Option<String>,
    /// Seconds since the Unix epoch
    pub creation_date: Option<i64>,
    pub encoding: Option<String>,
    pub info: TorrentInfo,
    raw_info: Bytes,
}

/// The `info` dictionary of a single-file torrent.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentInfo {
    /// Total file length in bytes
    pub length: u64,
    pub name: String,
    /// Bytes per piece
    pub piece_length: u64,
    /// Concatenated 20-byte SHA-1 digests, one per piece
    pub pieces: Vec<u8>,
}

impl TorrentMetadata {
    /// Decodes and validates a complete `.torrent` file.
    ///
    /// # Errors
    /// - `TorrentError::Bencode` - Input is not well-formed bencode
    /// - `TorrentError::Validation` - Root is not a dictionary, or a required
    ///   field is missing or mistyped
    pub fn from_bytes(data: &[u8]) -> Result<Self, TorrentError> {
        if data.first() != Some(&b'd') {
            let root = bencode::decode(data)?;
            return Err(mistyped("", "dictionary", &root));
        }
        let root = bencode::decode_dictionary(data)?;
        Self::from_dictionary(&root)
    }

    /// Builds metadata from an already decoded root dictionary.
    ///
    /// # Errors
    /// - `TorrentError::Validation` - A required field is missing or mistyped
    pub fn from_dictionary(root: &RawDictionary<'_>) -> Result<Self, TorrentError> {
        let dict = root.entries();
        warn_unknown_keys("", dict, ROOT_KEYS);

        let announce = required_string(dict, "", "announce")?;

        let info_dict = match dict.get(b"info".as_slice()) {
            Some(BencodeValue::Dictionary(info)) => info,
            Some(other) => return Err(mistyped("info", "dictionary", other)),
            None => return Err(TorrentError::validation("info", "missing")),
        };
        let info = TorrentInfo::from_dictionary(info_dict)?;

        let raw_info = root
            .raw(b"info")
            .ok_or_else(|| TorrentError::validation("info", "raw span unavailable"))?;

        Ok(Self {
            announce,
            announce_list: announce_list(dict),
            created_by: optional_string(dict, "", "created by"),
            creation_date: optional_integer(dict, "", "creation date"),
            encoding: optional_string(dict, "", "encoding"),
            info,
            raw_info: Bytes::copy_from_slice(raw_info),
        })
    }

    /// Exact bencoded bytes of the `info` dictionary as found in the file.
    pub fn raw_info(&self) -> &[u8] {
        &self.raw_info
    }

    /// SHA-1 of the raw `info` span.
    pub fn info_hash(&self) -> InfoHash {
        InfoHash::from_info_bytes(&self.raw_info)
    }

    /// Ordered tracker candidates: `announce` then every tier flattened.
    pub fn tracker_urls(&self) -> Vec<String> {
        std::iter::once(self.announce.clone())
            .chain(self.announce_list.iter().flatten().cloned())
            .collect()
    }

    pub fn piece_hashes(&self) -> impl Iterator<Item = &[u8]> {
        self.info.pieces.chunks_exact(PIECE_HASH_LEN)
    }

    pub fn piece_count(&self) -> usize {
        self.info.pieces.len() / PIECE_HASH_LEN
    }
}

impl TorrentInfo {
    fn from_dictionary(dict: &BencodeDictionary) -> Result<Self, TorrentError> {
        warn_unknown_keys("info", dict, INFO_KEYS);

        let length = match dict.get(b"length".as_slice()) {
            None if dict.contains_key(b"files".as_slice()) => {
                return Err(TorrentError::validation(
                    "info.length",
                    "missing (multi-file torrents are not supported)",
                ));
            }
            _ => required_integer(dict, "info", "length")?,
        };
        let length = u64::try_from(length)
            .map_err(|_| TorrentError::validation("info.length", "must not be negative"))?;

        let name = required_string(dict, "info", "name")?;

        let piece_length = required_integer(dict, "info", "piece length")?;
        let piece_length = u64::try_from(piece_length)
            .ok()
            .filter(|&value| value > 0)
            .ok_or_else(|| TorrentError::validation("info.piece length", "must be positive"))?;

        let pieces = match dict.get(b"pieces".as_slice()) {
            Some(BencodeValue::ByteString(pieces)) => pieces.clone(),
            Some(other) => return Err(mistyped("info.pieces", "string", other)),
            None => return Err(TorrentError::validation("info.pieces", "missing")),
        };
        if pieces.len() % PIECE_HASH_LEN != 0 {
            return Err(TorrentError::validation(
                "info.pieces",
                format!(
                    "length {} is not a multiple of {PIECE_HASH_LEN}",
                    pieces.len()
                ),
            ));
        }

        Ok(Self {
            length,
            name,
            piece_length,
            pieces,
        })
    }
}

impl fmt::Display for TorrentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[announce]: {}", self.announce)?;
        writeln!(f, "[announce list]: {:?}", self.announce_list)?;
        writeln!(
            f,
            "[created by]: {}",
            self.created_by.as_deref().unwrap_or("-")
        )?;
        match self.creation_date {
            Some(date) => writeln!(f, "[creation date]: {date}")?,
            None => writeln!(f, "[creation date]: -")?,
        }
        writeln!(f, "[encoding]: {}", self.encoding.as_deref().unwrap_or("-"))?;
        writeln!(f, "[info hash]: {}", self.info_hash())?;
        writeln!(f, "[info]:")?;
        writeln!(f, "  [length]: {}", self.info.length)?;
        writeln!(f, "  [name]: {}", self.info.name)?;
        writeln!(f, "  [piece length]: {}", self.info.piece_length)?;
        write!(f, "  [pieces]: {} hashes", self.piece_count())
    }
}

fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn mistyped(path: &str, expected: &str, found: &BencodeValue) -> TorrentError {
    TorrentError::validation(
        path,
        format!("expected {expected}, found {}", found.type_name()),
    )
}

fn required_string(
    dict: &BencodeDictionary,
    parent: &str,
    key: &str,
) -> Result<String, TorrentError> {
    let path = field_path(parent, key);
    match dict.get(key.as_bytes()) {
        Some(BencodeValue::ByteString(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|_| TorrentError::validation(&path, "expected UTF-8 string")),
        Some(other) => Err(mistyped(&path, "string", other)),
        None => Err(TorrentError::validation(path, "missing")),
    }
}

fn required_integer(
    dict: &BencodeDictionary,
    parent: &str,
    key: &str,
) -> Result<i64, TorrentError> {
    let path = field_path(parent, key);
    match dict.get(key.as_bytes()) {
        Some(BencodeValue::Integer(value)) => Ok(*value),
        Some(other) => Err(mistyped(&path, "integer", other)),
        None => Err(TorrentError::validation(path, "missing")),
    }
}

fn optional_string(dict: &BencodeDictionary, parent: &str, key: &str) -> Option<String> {
    let value = dict.get(key.as_bytes())?;
    let text = value.as_str().map(str::to_string);
    if text.is_none() {
        tracing::warn!(
            "Ignoring `{}`: expected UTF-8 string, found {}",
            field_path(parent, key),
            value.type_name()
        );
    }
    text
}

fn optional_integer(dict: &BencodeDictionary, parent: &str, key: &str) -> Option<i64> {
    let value = dict.get(key.as_bytes())?;
    let number = value.as_integer();
    if number.is_none() {
        tracing::warn!(
            "Ignoring `{}`: expected integer, found {}",
            field_path(parent, key),
            value.type_name()
        );
    }
    number
}

fn announce_list(dict: &BencodeDictionary) -> Vec<Vec<String>> {
    let Some(value) = dict.get(b"announce-list".as_slice()) else {
        return Vec::new();
    };

    let tiers = value.as_list().and_then(|tiers| {
        tiers
            .iter()
            .map(|tier| {
                tier.as_list()?
                    .iter()
                    .map(|url| url.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .collect::<Option<Vec<_>>>()
    });

    tiers.unwrap_or_else(|| {
        tracing::warn!("Ignoring `announce-list`: expected list of lists of strings");
        Vec::new()
    })
}

fn warn_unknown_keys(parent: &str, dict: &BencodeDictionary, known: &[&str]) {
    for key in dict.keys() {
        if !known.iter().any(|known| known.as_bytes() == key.as_slice()) {
            tracing::warn!(
                "Ignoring unknown field `{}`",
                field_path(parent, &String::from_utf8_lossy(key))
            );
        }
    }
}
