//! UDP tracker client (BEP 15) with a per-tracker connection id cache
//!
//! Every announce opens a fresh socket. A connection id is reused for all
//! announces to the same tracker until it expires, then a new Connect
//! handshake is performed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut};
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use url::Url;

use super::peers::parse_udp_peers;
use super::protocol::constants::CONNECTION_ID_TTL;
use super::protocol::udp::{
    ACTION_ANNOUNCE, ACTION_CONNECT, ACTION_ERROR, ANNOUNCE_REQUEST_SIZE,
    ANNOUNCE_RESPONSE_HEADER_SIZE, CONNECT_REQUEST_SIZE, CONNECT_RESPONSE_SIZE, ERROR_HEADER_SIZE,
    PROTOCOL_MAGIC,
};
use super::types::{AnnounceRequest, AnnounceResponse, TrackerClient};
use crate::config::TrackerConfig;
use crate::torrent::TorrentError;

/// Connection id issued by a tracker's Connect reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId {
    pub id: u64,
    pub issued_at: Instant,
}

impl ConnectionId {
    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() >= CONNECTION_ID_TTL
    }
}

/// UDP tracker client.
pub struct UdpTrackerClient {
    timeout: Duration,
    buffer_size: usize,
    connections: HashMap<String, ConnectionId>,
}

impl UdpTrackerClient {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            buffer_size: config.udp_response_buffer,
            connections: HashMap::new(),
        }
    }

    /// Unexpired connection id for `tracker`, dropping it once expired.
    pub fn connection_id(&mut self, tracker: &str) -> Option<u64> {
        let connection = self.connections.get(tracker).copied()?;
        if connection.is_expired() {
            tracing::debug!("Connection id for {} expired", tracker);
            self.connections.remove(tracker);
            return None;
        }
        Some(connection.id)
    }

    /// Number of trackers with a cached connection id, expired or not.
    pub fn cached_connections(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn connect_packet(transaction_id: u32) -> Vec<u8> {
        let mut packet = Vec::with_capacity(CONNECT_REQUEST_SIZE);
        packet.put_u64(PROTOCOL_MAGIC);
        packet.put_u32(ACTION_CONNECT);
        packet.put_u32(transaction_id);
        packet
    }

    /// Parse a Connect reply and return the issued connection id.
    ///
    /// # Errors
    /// - `TorrentError::ProtocolMismatch` - Transaction id not echoed
    /// - `TorrentError::TrackerFailure` - Tracker replied with an error action
    /// - `TorrentError::InvalidTrackerResponse` - Short reply or unexpected action
    pub(crate) fn parse_connect_response(
        url: &Url,
        reply: &[u8],
        transaction_id: u32,
    ) -> Result<u64, TorrentError> {
        let action = check_header(url, reply, transaction_id)?;
        if action != ACTION_CONNECT {
            return Err(TorrentError::invalid_response(format!(
                "UDP connect unexpected action: {action}"
            )));
        }
        if reply.len() < CONNECT_RESPONSE_SIZE {
            return Err(TorrentError::invalid_response(format!(
                "UDP connect response too short ({} bytes)",
                reply.len()
            )));
        }
        let mut id = &reply[8..CONNECT_RESPONSE_SIZE];
        Ok(id.get_u64())
    }

    pub(crate) fn announce_packet(
        connection_id: u64,
        transaction_id: u32,
        key: u32,
        request: &AnnounceRequest,
    ) -> Vec<u8> {
        let mut packet = Vec::with_capacity(ANNOUNCE_REQUEST_SIZE);
        packet.put_u64(connection_id);
        packet.put_u32(ACTION_ANNOUNCE);
        packet.put_u32(transaction_id);
        packet.put_slice(request.info_hash.as_bytes());
        packet.put_slice(request.peer_id.as_bytes());
        packet.put_u64(request.progress.downloaded);
        packet.put_u64(request.progress.left);
        packet.put_u64(request.progress.uploaded);
        packet.put_u32(request.event.udp_code());
        packet.put_u32(0); // ip: use sender address
        packet.put_u32(key);
        packet.put_i32(request.num_want);
        packet.put_u16(request.port);
        packet
    }

    /// Parse an Announce reply.
    ///
    /// # Errors
    /// - `TorrentError::ProtocolMismatch` - Transaction id not echoed
    /// - `TorrentError::TrackerFailure` - Tracker replied with an error action
    /// - `TorrentError::InvalidTrackerResponse` - Short reply or unexpected action
    /// - `TorrentError::MalformedPeerList` - Truncated peer record
    pub(crate) fn parse_announce_response(
        url: &Url,
        reply: &[u8],
        transaction_id: u32,
    ) -> Result<AnnounceResponse, TorrentError> {
        let action = check_header(url, reply, transaction_id)?;
        if action != ACTION_ANNOUNCE {
            return Err(TorrentError::invalid_response(format!(
                "UDP announce unexpected action: {action}"
            )));
        }
        if reply.len() < ANNOUNCE_RESPONSE_HEADER_SIZE {
            return Err(TorrentError::invalid_response(format!(
                "UDP announce response too short ({} bytes)",
                reply.len()
            )));
        }

        let mut fields = &reply[8..ANNOUNCE_RESPONSE_HEADER_SIZE];
        Ok(AnnounceResponse {
            interval: fields.get_u32(),
            leechers: Some(fields.get_u32()),
            seeders: Some(fields.get_u32()),
            peers: parse_udp_peers(&reply[ANNOUNCE_RESPONSE_HEADER_SIZE..])?,
        })
    }

    async fn open_socket(&self, url: &Url) -> Result<(UdpSocket, String), TorrentError> {
        let connection_failed = || TorrentError::TrackerConnectionFailed {
            url: url.to_string(),
        };

        let host = url.host_str().ok_or_else(connection_failed)?;
        let port = url.port().ok_or_else(connection_failed)?;
        let tracker = format!("{host}:{port}");

        let lookup = tokio::net::lookup_host(tracker.as_str());
        let addr: SocketAddr = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| TorrentError::TrackerTimeout {
                url: url.to_string(),
            })?
            .map_err(|e| {
                tracing::warn!("Failed to resolve tracker {}: {}", tracker, e);
                connection_failed()
            })?
            .next()
            .ok_or_else(connection_failed)?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;
        Ok((socket, tracker))
    }

    /// Send one datagram and wait for the reply, bounded by the timeout.
    async fn exchange(
        &self,
        url: &Url,
        socket: &UdpSocket,
        packet: &[u8],
    ) -> Result<Vec<u8>, TorrentError> {
        socket.send(packet).await?;

        let mut buffer = vec![0u8; self.buffer_size];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| {
                tracing::warn!("UDP tracker {} timed out", url);
                TorrentError::TrackerTimeout {
                    url: url.to_string(),
                }
            })?
            .map_err(|e| {
                tracing::warn!("UDP receive from {} failed: {}", url, e);
                TorrentError::TrackerConnectionFailed {
                    url: url.to_string(),
                }
            })?;
        buffer.truncate(len);
        Ok(buffer)
    }

    async fn connect(
        &mut self,
        url: &Url,
        socket: &UdpSocket,
        tracker: &str,
    ) -> Result<u64, TorrentError> {
        let transaction_id: u32 = rand::rng().random();
        // Expiry counts from the request, never later than the tracker's clock.
        let issued_at = Instant::now();
        let reply = self
            .exchange(url, socket, &Self::connect_packet(transaction_id))
            .await?;
        let id = Self::parse_connect_response(url, &reply, transaction_id)?;

        tracing::debug!("Obtained connection id {:#x} from {}", id, tracker);
        self.connections
            .insert(tracker.to_string(), ConnectionId { id, issued_at });
        Ok(id)
    }
}

#[async_trait]
impl TrackerClient for UdpTrackerClient {
    /// Connect (when no unexpired id is cached) then Announce.
    ///
    /// # Errors
    /// - `TorrentError::TrackerTimeout` - No reply within the configured timeout
    /// - `TorrentError::ProtocolMismatch` - Transaction id not echoed
    /// - `TorrentError::TrackerFailure` - Tracker replied with an error action
    async fn announce(
        &mut self,
        url: &Url,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TorrentError> {
        let (socket, tracker) = self.open_socket(url).await?;

        let connection_id = match self.connection_id(&tracker) {
            Some(id) => id,
            None => self.connect(url, &socket, &tracker).await?,
        };

        let (transaction_id, key): (u32, u32) = {
            let mut rng = rand::rng();
            (rng.random(), rng.random())
        };
        let packet = Self::announce_packet(connection_id, transaction_id, key, request);
        tracing::debug!("Announcing to UDP tracker: {}", url);

        let result = match self.exchange(url, &socket, &packet).await {
            Ok(reply) => Self::parse_announce_response(url, &reply, transaction_id),
            Err(e) => Err(e),
        };
        if result.is_err() {
            // The tracker may have forgotten our id; start over next time.
            self.connections.remove(&tracker);
        }
        result
    }
}

/// Validates the shared reply header and returns its action.
fn check_header(url: &Url, reply: &[u8], transaction_id: u32) -> Result<u32, TorrentError> {
    if reply.len() < ERROR_HEADER_SIZE {
        return Err(TorrentError::invalid_response(format!(
            "UDP response too short ({} bytes)",
            reply.len()
        )));
    }

    let mut header = &reply[..ERROR_HEADER_SIZE];
    let action = header.get_u32();
    let received = header.get_u32();
    if received != transaction_id {
        return Err(TorrentError::ProtocolMismatch {
            expected: transaction_id,
            received,
        });
    }

    if action == ACTION_ERROR {
        return Err(TorrentError::TrackerFailure {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&reply[ERROR_HEADER_SIZE..]).into_owned(),
        });
    }
    Ok(action)
}
