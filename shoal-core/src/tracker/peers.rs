//! Peer list decoding for compact, dictionary and UDP record forms
//!
//! A malformed record fails the whole parse; callers never see a partial list.

use std::net::Ipv4Addr;

use super::protocol::constants::COMPACT_PEER_SIZE;
use super::types::PeerAddress;
use crate::bencode::BencodeValue;
use crate::torrent::TorrentError;

/// Parses the polymorphic `peers` value of an HTTP announce response.
///
/// # Errors
/// - `TorrentError::MalformedPeerList` - Wrong record length or mistyped entry
pub fn parse_peers(value: &BencodeValue) -> Result<Vec<PeerAddress>, TorrentError> {
    match value {
        BencodeValue::ByteString(bytes) => parse_compact_peers(bytes),
        BencodeValue::List(entries) => parse_dictionary_peers(entries),
        other => Err(TorrentError::malformed_peers(format!(
            "expected string or list, found {}",
            other.type_name()
        ))),
    }
}

/// Parses consecutive 6-byte records: IPv4 then big-endian port.
///
/// # Errors
/// - `TorrentError::MalformedPeerList` - Length is not a multiple of 6
pub fn parse_compact_peers(bytes: &[u8]) -> Result<Vec<PeerAddress>, TorrentError> {
    if bytes.len() % COMPACT_PEER_SIZE != 0 {
        return Err(TorrentError::malformed_peers(format!(
            "compact peer data length {} is not a multiple of {COMPACT_PEER_SIZE}",
            bytes.len()
        )));
    }

    Ok(bytes.chunks_exact(COMPACT_PEER_SIZE).map(compact_record).collect())
}

/// Parses the peer records trailing a UDP announce reply.
///
/// Stops at the first record with port 0, which some trackers use as
/// padding.
///
/// # Errors
/// - `TorrentError::MalformedPeerList` - Truncated record before the end marker
pub fn parse_udp_peers(bytes: &[u8]) -> Result<Vec<PeerAddress>, TorrentError> {
    let mut peers = Vec::with_capacity(bytes.len() / COMPACT_PEER_SIZE);
    for chunk in bytes.chunks(COMPACT_PEER_SIZE) {
        if chunk.len() < COMPACT_PEER_SIZE {
            return Err(TorrentError::malformed_peers(format!(
                "truncated peer record of {} bytes",
                chunk.len()
            )));
        }
        let peer = compact_record(chunk);
        if peer.port == 0 {
            break;
        }
        peers.push(peer);
    }
    Ok(peers)
}

/// Parses a list of `{ip, port}` dictionaries.
///
/// `ip` is either a dotted-quad string or a 32-bit integer.
///
/// # Errors
/// - `TorrentError::MalformedPeerList` - Entry is not a dictionary, or has a bad `ip`/`port`
pub fn parse_dictionary_peers(entries: &[BencodeValue]) -> Result<Vec<PeerAddress>, TorrentError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| dictionary_record(index, entry))
        .collect()
}

fn compact_record(chunk: &[u8]) -> PeerAddress {
    let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
    let port = u16::from_be_bytes([chunk[4], chunk[5]]);
    PeerAddress::new(ip, port)
}

fn dictionary_record(index: usize, entry: &BencodeValue) -> Result<PeerAddress, TorrentError> {
    let malformed = |reason: &str| TorrentError::malformed_peers(format!("peer {index}: {reason}"));

    if entry.as_dict().is_none() {
        return Err(malformed("expected dictionary"));
    }

    let ip = match entry.get(b"ip") {
        Some(text @ BencodeValue::ByteString(_)) => text
            .as_str()
            .and_then(|text| text.parse::<Ipv4Addr>().ok())
            .ok_or_else(|| malformed("ip is not an IPv4 address"))?,
        Some(BencodeValue::Integer(number)) => u32::try_from(*number)
            .map(Ipv4Addr::from)
            .map_err(|_| malformed("integer ip out of range"))?,
        Some(_) => return Err(malformed("ip must be a string or integer")),
        None => return Err(malformed("missing ip")),
    };

    let port = match entry.get(b"port") {
        Some(BencodeValue::Integer(number)) => {
            u16::try_from(*number).map_err(|_| malformed("port out of range"))?
        }
        Some(_) => return Err(malformed("port must be an integer")),
        None => return Err(malformed("missing port")),
    };

    Ok(PeerAddress::new(ip, port))
}
