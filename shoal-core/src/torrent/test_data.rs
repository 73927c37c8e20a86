//! Test data creation for torrent testing.
//!
//! Provides a standard single-file torrent so metadata and tracker tests
//! agree on the same descriptor.

use super::TorrentMetadata;
use crate::bencode::{BencodeValue, encode};

/// Builds the standard single-file torrent as a bencode value.
///
/// One piece, a primary HTTP tracker and a two-tier announce list whose
/// second tier is a UDP tracker.
pub fn sample_torrent_value() -> BencodeValue {
    let info: BencodeValue = [
        ("length", BencodeValue::Integer(1000)),
        ("name", "test.txt".into()),
        ("piece length", BencodeValue::Integer(32768)),
        ("pieces", "12345678901234567890".into()),
    ]
    .into_iter()
    .collect();

    let announce_list = BencodeValue::List(vec![
        BencodeValue::List(vec!["http://tracker.example.com/announce".into()]),
        BencodeValue::List(vec!["udp://backup.example:6969".into()]),
    ]);

    [
        ("announce", "http://tracker.example.com/announce".into()),
        ("announce-list", announce_list),
        ("created by", "shoal-test".into()),
        ("creation date", BencodeValue::Integer(1_700_000_000)),
        ("encoding", "UTF-8".into()),
        ("info", info),
    ]
    .into_iter()
    .collect()
}

pub fn sample_torrent_bytes() -> Vec<u8> {
    encode(&sample_torrent_value())
}

/// Creates standard test torrent metadata announcing to the given trackers.
pub fn create_test_torrent_metadata(announce: &str, tiers: &[&str]) -> TorrentMetadata {
    let mut value = sample_torrent_value();
    if let BencodeValue::Dictionary(root) = &mut value {
        root.insert(b"announce".to_vec(), announce.into());
        root.insert(
            b"announce-list".to_vec(),
            BencodeValue::List(
                tiers
                    .iter()
                    .map(|url| BencodeValue::List(vec![(*url).into()]))
                    .collect(),
            ),
        );
    }
    TorrentMetadata::from_bytes(&encode(&value)).unwrap()
}
