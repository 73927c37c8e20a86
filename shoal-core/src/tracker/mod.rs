//! BitTorrent tracker communication.
//!
//! HTTP and UDP announce clients behind one `TrackerClient` trait, the peer
//! list decoders they share, and the per-torrent announce session.

pub mod http;
pub mod peers;
pub mod protocol;
pub mod session;
pub mod types;
pub mod udp;

// Re-export public API
pub use http::HttpTrackerClient;
pub use session::{TrackerHandle, TrackerSession};
pub use types::{
    AnnounceEvent, AnnounceRequest, AnnounceResponse, AnnounceStatus, PeerAddress, TrackerClient,
    TransferProgress,
};
pub use udp::{ConnectionId, UdpTrackerClient};
