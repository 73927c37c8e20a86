//! Integration tests for the bencode codec and torrent metadata.
//!
//! Exercises the public decode/encode API the way a client reading a
//! `.torrent` file would.

use shoal_core::bencode::{self, BencodeError, BencodeValue, encode};
use shoal_core::torrent::{InfoHash, TorrentError, TorrentMetadata};

fn syntax_error(input: &[u8]) -> (usize, &'static str) {
    match bencode::decode(input) {
        Err(BencodeError::Syntax { offset, expected }) => (offset, expected),
        Ok(value) => panic!("expected syntax error, decoded {value:?}"),
    }
}

#[test]
fn test_documented_examples() {
    assert_eq!(
        bencode::decode(b"de").unwrap(),
        BencodeValue::Dictionary(Default::default())
    );
    assert_eq!(
        bencode::decode(b"d1:ki5ee").unwrap(),
        [("k", BencodeValue::Integer(5))]
            .into_iter()
            .collect::<BencodeValue>()
    );
    assert_eq!(bencode::decode(b"i-12e").unwrap(), BencodeValue::Integer(-12));
    assert_eq!(bencode::decode(b"i0e").unwrap(), BencodeValue::Integer(0));
    assert_eq!(bencode::decode(b"1:h").unwrap(), BencodeValue::from("h"));

    let value: BencodeValue = [
        ("h", BencodeValue::Integer(1)),
        ("a", BencodeValue::Integer(2)),
    ]
    .into_iter()
    .collect();
    assert_eq!(encode(&value), b"d1:ai2e1:hi1ee");
}

#[test]
fn test_malformed_inputs_report_offsets() {
    assert_eq!(syntax_error(b"ie").0, 1);
    assert_eq!(syntax_error(b"istringe").0, 1);
    assert_eq!(syntax_error(b"-1:h").0, 0);
    assert_eq!(syntax_error(b"x").0, 0);
    assert_eq!(syntax_error(b"l").0, 1);
    assert_eq!(syntax_error(b"5:abc").1, "string bytes within input");
    assert_eq!(syntax_error(b"di1ei2ee").1, "dictionary key string");
}

#[test]
fn test_torrent_file_round_trip() {
    let info: BencodeValue = [
        ("length", BencodeValue::Integer(5)),
        ("name", "a.bin".into()),
        ("piece length", BencodeValue::Integer(16384)),
        ("pieces", BencodeValue::ByteString(vec![0xAA; 40])),
    ]
    .into_iter()
    .collect();
    let root: BencodeValue = [
        ("announce", BencodeValue::from("udp://tracker.example:80")),
        ("info", info.clone()),
    ]
    .into_iter()
    .collect();
    let bytes = encode(&root);

    let metadata = TorrentMetadata::from_bytes(&bytes).unwrap();

    assert_eq!(metadata.raw_info(), encode(&info).as_slice());
    assert_eq!(metadata.info_hash(), InfoHash::from_info_bytes(&encode(&info)));
    assert_eq!(metadata.piece_count(), 2);
    assert_eq!(metadata.tracker_urls(), vec!["udp://tracker.example:80"]);
    assert!(metadata.announce_list.is_empty());
}

#[test]
fn test_corrupt_torrent_file_is_a_bencode_error() {
    let err = TorrentMetadata::from_bytes(b"d8:announce").unwrap_err();
    assert!(matches!(err, TorrentError::Bencode(_)));
}
