//! Deterministic bencode encoder

use super::value::BencodeValue;

/// Encodes a value to its canonical bencode form.
///
/// Dictionary keys are emitted in ascending byte order, so equal values
/// always encode to identical bytes.
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut output = Vec::new();
    encode_into(value, &mut output);
    output
}

/// Appends the canonical encoding of `value` to `output`.
pub fn encode_into(value: &BencodeValue, output: &mut Vec<u8>) {
    match value {
        BencodeValue::Integer(number) => {
            output.push(b'i');
            output.extend_from_slice(number.to_string().as_bytes());
            output.push(b'e');
        }
        BencodeValue::ByteString(bytes) => encode_byte_string(bytes, output),
        BencodeValue::List(items) => {
            output.push(b'l');
            for item in items {
                encode_into(item, output);
            }
            output.push(b'e');
        }
        BencodeValue::Dictionary(dict) => {
            output.push(b'd');
            // BTreeMap iteration is already sorted by key bytes
            for (key, item) in dict {
                encode_byte_string(key, output);
                encode_into(item, output);
            }
            output.push(b'e');
        }
    }
}

fn encode_byte_string(bytes: &[u8], output: &mut Vec<u8>) {
    output.extend_from_slice(bytes.len().to_string().as_bytes());
    output.push(b':');
    output.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::bencode::decode;

    #[test]
    fn test_encode_sorts_dictionary_keys() {
        let value: BencodeValue = [
            ("h", BencodeValue::Integer(1)),
            ("a", BencodeValue::Integer(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(encode(&value), b"d1:ai2e1:hi1ee");
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&BencodeValue::Integer(-12)), b"i-12e");
        assert_eq!(encode(&BencodeValue::Integer(0)), b"i0e");
        assert_eq!(encode(&BencodeValue::from("spam")), b"4:spam");
        assert_eq!(encode(&BencodeValue::ByteString(Vec::new())), b"0:");
    }

    #[test]
    fn test_encode_nested_list() {
        let value = BencodeValue::List(vec![
            BencodeValue::Integer(3),
            BencodeValue::List(vec!["h".into()]),
        ]);
        assert_eq!(encode(&value), b"li3el1:hee");
    }

    #[test]
    fn test_reencode_preserves_sorted_input() {
        let input = b"d8:announce17:udp://t.example:14:infod6:lengthi10e4:name1:xee";
        assert_eq!(encode(&decode(input).unwrap()), input);
    }

    #[test]
    fn test_reencode_sorts_unsorted_input() {
        let input = b"d1:hi1e1:ai2ee";
        assert_eq!(encode(&decode(input).unwrap()), b"d1:ai2e1:hi1ee");
    }

    fn arb_value() -> impl Strategy<Value = BencodeValue> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(BencodeValue::Integer),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(BencodeValue::ByteString),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(BencodeValue::List),
                prop::collection::btree_map(prop::collection::vec(any::<u8>(), 0..12), inner, 0..8)
                    .prop_map(BencodeValue::Dictionary),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_decode_inverts_encode(value in arb_value()) {
            let encoded = encode(&value);
            prop_assert_eq!(decode(&encoded).unwrap(), value);
        }
    }
}
