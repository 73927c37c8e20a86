//! BitTorrent tracker protocol utilities and constants

/// BitTorrent tracker protocol constants
pub mod constants {
    use std::time::Duration;

    /// Default tracker announce interval in seconds
    pub const DEFAULT_ANNOUNCE_INTERVAL: u32 = 1800;

    /// Minimum announce interval in seconds
    pub const MIN_ANNOUNCE_INTERVAL: u32 = 60;

    /// Compact peer response format (6 bytes per peer)
    pub const COMPACT_PEER_SIZE: usize = 6;

    /// Peers requested when the caller does not choose
    pub const DEFAULT_NUM_WANT: i32 = 5;

    /// Lifetime of a UDP connection id after issuance
    pub const CONNECTION_ID_TTL: Duration = Duration::from_secs(60);
}

/// UDP tracker wire layout (BEP 15), all integers big-endian
pub mod udp {
    /// Initial connection id sent with every connect request
    pub const PROTOCOL_MAGIC: u64 = 0x0417_2710_1980;

    pub const ACTION_CONNECT: u32 = 0;
    pub const ACTION_ANNOUNCE: u32 = 1;
    pub const ACTION_ERROR: u32 = 3;

    pub const EVENT_NONE: u32 = 0;
    pub const EVENT_COMPLETED: u32 = 1;
    pub const EVENT_STARTED: u32 = 2;
    pub const EVENT_STOPPED: u32 = 3;

    pub const CONNECT_REQUEST_SIZE: usize = 16;
    pub const CONNECT_RESPONSE_SIZE: usize = 16;
    pub const ANNOUNCE_REQUEST_SIZE: usize = 98;
    /// action, transaction id, interval, leechers, seeders
    pub const ANNOUNCE_RESPONSE_HEADER_SIZE: usize = 20;
    /// action and transaction id precede the error text
    pub const ERROR_HEADER_SIZE: usize = 8;
}

/// URL encoding utilities for tracker communication
pub mod encoding {
    /// Encode bytes for tracker URL parameters
    ///
    /// Unreserved characters pass through, everything else becomes `%XX`.
    pub fn url_encode_bytes(bytes: &[u8]) -> String {
        urlencoding::encode_binary(bytes).into_owned()
    }
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_url_encoding_binary_data() {
        let input = [0x00, 0xFF, 0x7F, 0x80, 0x01];
        let encoded = encoding::url_encode_bytes(&input);
        assert_eq!(encoded, "%00%FF%7F%80%01");
    }

    #[test]
    fn test_url_encoding_keeps_unreserved() {
        let encoded = encoding::url_encode_bytes(b"-SH0001-a.b_c~ d");
        assert_eq!(encoded, "-SH0001-a.b_c~%20d");
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(udp::PROTOCOL_MAGIC, 0x41727101980);
        assert_eq!(constants::DEFAULT_ANNOUNCE_INTERVAL, 1800);
        assert_eq!(constants::MIN_ANNOUNCE_INTERVAL, 60);
        assert_eq!(constants::COMPACT_PEER_SIZE, 6);
        assert_eq!(constants::CONNECTION_ID_TTL.as_secs(), 60);
        assert_eq!(
            udp::ANNOUNCE_REQUEST_SIZE,
            8 + 4 + 4 + 20 + 20 + 8 + 8 + 8 + 4 + 4 + 4 + 4 + 2
        );
    }
}
