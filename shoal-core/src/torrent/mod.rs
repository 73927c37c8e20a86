//! Torrent identity types, metadata and the shared error type

pub mod metadata;
#[cfg(test)]
pub(crate) mod test_data;

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use sha1::{Digest, Sha1};

pub use metadata::{PIECE_HASH_LEN, TorrentInfo, TorrentMetadata};

use crate::bencode::BencodeError;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the raw info dictionary bytes from a torrent file.
/// Used to uniquely identify torrents to trackers and peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Hashes the raw bencoded info dictionary.
    pub fn from_info_bytes(info: &[u8]) -> Self {
        let digest = Sha1::digest(info);
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest);
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// BitTorrent peer identifier.
///
/// 20-byte identifier sent to trackers. Generated once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    pub fn new(id: [u8; 20]) -> Self {
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Generates a random peer ID behind an Azureus-style client prefix.
    pub fn generate(prefix: &[u8; 8]) -> Self {
        let mut id = [0u8; 20];
        id[..8].copy_from_slice(prefix);
        rand::rng().fill(&mut id[8..]);
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0[..8]))?;
        f.write_str(&hex::encode(&self.0[8..]))
    }
}

/// Errors that can occur while reading metadata or talking to trackers.
///
/// Metadata errors (`Bencode`, `Validation`) are never retried. Tracker
/// errors are recovered per candidate URL until all candidates fail.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error(transparent)]
    Bencode(#[from] BencodeError),

    #[error("Invalid torrent field `{field_path}`: {reason}")]
    Validation { field_path: String, reason: String },

    #[error("Unsupported tracker scheme `{scheme}` in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Transaction id mismatch: sent {expected}, received {received}")]
    ProtocolMismatch { expected: u32, received: u32 },

    #[error("Tracker {url} reported an error: {reason}")]
    TrackerFailure { url: String, reason: String },

    #[error("Tracker {url} rejected the announce: {reason}")]
    TrackerRejected { url: String, reason: String },

    #[error("Malformed peer list: {reason}")]
    MalformedPeerList { reason: String },

    #[error("All {} tracker candidates failed", .failures.len())]
    AllTrackersFailed {
        failures: BTreeMap<String, TorrentError>,
    },

    #[error("Tracker {url} timed out")]
    TrackerTimeout { url: String },

    #[error("Tracker connection failed: {url}")]
    TrackerConnectionFailed { url: String },

    #[error("Tracker {url} returned HTTP status {status}")]
    TrackerServerError { url: String, status: u16 },

    #[error("Invalid tracker response: {reason}")]
    InvalidTrackerResponse { reason: String },

    #[error("Tracker session is no longer running")]
    SessionClosed,

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error")]
    UrlParsing(#[from] url::ParseError),

    #[error("HTTP error")]
    Http(#[from] reqwest::Error),
}

impl TorrentError {
    pub(crate) fn validation(field_path: impl Into<String>, reason: impl Into<String>) -> Self {
        TorrentError::Validation {
            field_path: field_path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_peers(reason: impl Into<String>) -> Self {
        TorrentError::MalformedPeerList {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_response(reason: impl Into<String>) -> Self {
        TorrentError::InvalidTrackerResponse {
            reason: reason.into(),
        }
    }
}
