//! Core types and enumerations for BitTorrent tracker communication

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use url::Url;

use super::protocol::udp;
use crate::torrent::{InfoHash, PeerId, TorrentError};

/// IPv4 address and port of a swarm member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<PeerAddress> for SocketAddr {
    fn from(peer: PeerAddress) -> Self {
        SocketAddr::V4(SocketAddrV4::new(peer.ip, peer.port))
    }
}

/// Lifecycle of a torrent as reported to trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnounceStatus {
    /// Nothing announced yet
    #[default]
    None,
    Started,
    Completed,
    Stopped,
}

/// BitTorrent announce events.
///
/// Only lifecycle transitions carry an event; keep-alive announces send
/// `None`, which HTTP omits from the query and UDP encodes as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    None,
    Started,
    Completed,
    Stopped,
}

impl AnnounceEvent {
    /// HTTP `event` query value, absent for keep-alive announces.
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            AnnounceEvent::None => None,
            AnnounceEvent::Started => Some("started"),
            AnnounceEvent::Completed => Some("completed"),
            AnnounceEvent::Stopped => Some("stopped"),
        }
    }

    pub fn udp_code(self) -> u32 {
        match self {
            AnnounceEvent::None => udp::EVENT_NONE,
            AnnounceEvent::Completed => udp::EVENT_COMPLETED,
            AnnounceEvent::Started => udp::EVENT_STARTED,
            AnnounceEvent::Stopped => udp::EVENT_STOPPED,
        }
    }
}

impl From<AnnounceStatus> for AnnounceEvent {
    fn from(status: AnnounceStatus) -> Self {
        match status {
            AnnounceStatus::None => AnnounceEvent::None,
            AnnounceStatus::Started => AnnounceEvent::Started,
            AnnounceStatus::Completed => AnnounceEvent::Completed,
            AnnounceStatus::Stopped => AnnounceEvent::Stopped,
        }
    }
}

/// Transfer counters reported with every announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    pub uploaded: u64,
    pub downloaded: u64,
    /// Bytes still missing, 0 once the download is complete
    pub left: u64,
}

/// Tracker announce request.
///
/// Contains client statistics and torrent information sent to tracker
/// during announce operations to report progress and request peer list.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    /// Unique identifier for the torrent being announced
    pub info_hash: InfoHash,
    /// Client's unique 20-byte identifier
    pub peer_id: PeerId,
    /// TCP port client is listening on for peer connections
    pub port: u16,
    pub progress: TransferProgress,
    pub event: AnnounceEvent,
    /// Peers wanted, negative for the tracker default
    pub num_want: i32,
}

/// Tracker announce response.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnounceResponse {
    /// Seconds until next announce request should be sent
    pub interval: u32,
    /// Peers still downloading, when reported
    pub leechers: Option<u32>,
    /// Peers with the complete file, when reported
    pub seeders: Option<u32>,
    pub peers: Vec<PeerAddress>,
}

/// Transport used to reach one tracker URL.
///
/// Implementations own their transport state (HTTP connection pool, UDP
/// connection ids) and map every failure to a typed `TorrentError`.
#[async_trait]
pub trait TrackerClient: Send {
    /// Announces to `url` and returns the tracker's peer list.
    ///
    /// # Errors
    ///
    /// - `TorrentError::TrackerTimeout` - No reply within the configured timeout
    /// - `TorrentError::TrackerConnectionFailed` - Network error reaching the tracker
    /// - `TorrentError::TrackerRejected` - HTTP tracker returned `failure reason`
    /// - `TorrentError::TrackerFailure` - UDP tracker replied with an error action
    /// - `TorrentError::ProtocolMismatch` - UDP transaction id not echoed
    /// - `TorrentError::MalformedPeerList` - Peer list could not be decoded
    async fn announce(
        &mut self,
        url: &Url,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TorrentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_query_values() {
        assert_eq!(AnnounceEvent::None.as_query_value(), None);
        assert_eq!(AnnounceEvent::Started.as_query_value(), Some("started"));
        assert_eq!(AnnounceEvent::Completed.as_query_value(), Some("completed"));
        assert_eq!(AnnounceEvent::Stopped.as_query_value(), Some("stopped"));
    }

    #[test]
    fn test_event_udp_codes() {
        assert_eq!(AnnounceEvent::None.udp_code(), 0);
        assert_eq!(AnnounceEvent::Completed.udp_code(), 1);
        assert_eq!(AnnounceEvent::Started.udp_code(), 2);
        assert_eq!(AnnounceEvent::Stopped.udp_code(), 3);
    }

    #[test]
    fn test_peer_address_display_and_socket_addr() {
        let peer = PeerAddress::new(Ipv4Addr::new(192, 168, 1, 1), 6881);
        assert_eq!(peer.to_string(), "192.168.1.1:6881");
        assert_eq!(
            SocketAddr::from(peer),
            "192.168.1.1:6881".parse::<SocketAddr>().unwrap()
        );
    }
}
