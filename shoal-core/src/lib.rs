//! Shoal Core - BitTorrent metadata and tracker protocol
//!
//! This crate provides the protocol core of a BitTorrent client: a bencode
//! codec, single-file torrent metadata with a reproducible info hash, and a
//! tracker session that announces over HTTP and UDP with URL fallback.

pub mod bencode;
pub mod config;
pub mod torrent;
pub mod tracing_setup;
pub mod tracker;

// Re-export main types for convenient access
pub use bencode::{BencodeError, BencodeValue};
pub use config::ShoalConfig;
pub use torrent::{InfoHash, PeerId, TorrentError, TorrentMetadata};
pub use tracker::{PeerAddress, TrackerHandle, TrackerSession};

/// Errors that can bubble up from any Shoal subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracing setup failed: {reason}")]
    TracingInit { reason: String },
}

impl From<BencodeError> for ShoalError {
    fn from(error: BencodeError) -> Self {
        ShoalError::Torrent(TorrentError::Bencode(error))
    }
}

impl ShoalError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ShoalError::Torrent(e) => match e {
                TorrentError::Bencode(e) => {
                    format!("Torrent file is corrupt (byte {})", e.offset())
                }
                TorrentError::Validation { field_path, reason } => {
                    format!("Invalid torrent file: `{field_path}` {reason}")
                }
                TorrentError::UnsupportedScheme { scheme, .. } => {
                    format!("Tracker protocol `{scheme}` is not supported")
                }
                TorrentError::TrackerRejected { reason, .. } => {
                    format!("Tracker refused the torrent: {reason}")
                }
                TorrentError::AllTrackersFailed { failures } => {
                    format!("None of the {} trackers could be reached", failures.len())
                }
                TorrentError::TrackerConnectionFailed { url } => {
                    format!("Could not connect to tracker: {url}")
                }
                _ => "Tracker communication error occurred".to_string(),
            },
            ShoalError::Configuration { .. } => "Configuration error occurred".to_string(),
            ShoalError::Io(_) => "File system error occurred".to_string(),
            ShoalError::TracingInit { .. } => "Logging could not be initialised".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ShoalError::Configuration { .. }
                | ShoalError::Torrent(
                    TorrentError::Bencode(_)
                        | TorrentError::Validation { .. }
                        | TorrentError::UnsupportedScheme { .. }
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, ShoalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_metadata_problems() {
        let err: ShoalError = TorrentMetadata::from_bytes(b"d4:infodee").unwrap_err().into();
        assert!(err.is_user_error());
        assert_eq!(
            err.user_message(),
            "Invalid torrent file: `announce` missing"
        );

        let err = ShoalError::from(TorrentError::TrackerTimeout {
            url: "udp://t.example:1".to_string(),
        });
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_bencode_error_converts() {
        let err: ShoalError = bencode::decode(b"i1").unwrap_err().into();
        assert_eq!(err.user_message(), "Torrent file is corrupt (byte 2)");
    }
}
