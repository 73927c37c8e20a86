//! Cursor-based recursive descent bencode decoder

use std::collections::BTreeMap;
use std::ops::Range;

use super::BencodeError;
use super::value::{BencodeDictionary, BencodeValue};

/// Maximum list/dictionary nesting accepted before decoding fails.
pub const MAX_DEPTH: usize = 256;

/// Single-pass bencode decoder over a borrowed byte slice.
///
/// Every `decode_*` method consumes exactly one item from the shared cursor
/// and leaves the cursor positioned after it. There is no backtracking, and
/// nothing is returned on failure, so callers never observe partial values.
pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            depth: 0,
        }
    }

    /// Current cursor offset into the input.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Fails unless the whole input has been consumed.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Trailing bytes follow the decoded value
    pub fn finish(&self) -> Result<(), BencodeError> {
        if self.position == self.input.len() {
            Ok(())
        } else {
            Err(self.error_here("end of input"))
        }
    }

    /// Decodes the next value at the cursor.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Input at the cursor is not a valid bencode value
    pub fn decode_value(&mut self) -> Result<BencodeValue, BencodeError> {
        match self.peek() {
            Some(b'd') => self.decode_dictionary().map(BencodeValue::Dictionary),
            Some(b'l') => self.decode_list().map(BencodeValue::List),
            Some(b'i') => self.decode_integer().map(BencodeValue::Integer),
            Some(b'0'..=b'9') => self
                .decode_byte_string()
                .map(|bytes| BencodeValue::ByteString(bytes.to_vec())),
            _ => Err(self.error_here("value ('d', 'l', 'i' or string length)")),
        }
    }

    /// Decodes `i<digits>e` into a signed 64-bit integer.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Missing digits or terminator, leading zeros,
    ///   `-0`, or a value outside the i64 range
    pub fn decode_integer(&mut self) -> Result<i64, BencodeError> {
        self.expect(b'i', "'i' starting integer")?;

        let negative = self.peek() == Some(b'-');
        if negative {
            self.position += 1;
        }

        let digits_start = self.position;
        let mut value: i64 = 0;
        while let Some(byte @ b'0'..=b'9') = self.peek() {
            let digit = i64::from(byte - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or_else(|| BencodeError::syntax(digits_start, "integer within 64-bit range"))?;
            self.position += 1;
        }

        let digit_count = self.position - digits_start;
        if digit_count == 0 {
            return Err(self.error_here("integer digits"));
        }
        if self.input[digits_start] == b'0' {
            if digit_count > 1 {
                return Err(BencodeError::syntax(
                    digits_start,
                    "integer without leading zeros",
                ));
            }
            if negative {
                return Err(BencodeError::syntax(digits_start, "non-zero negative integer"));
            }
        }

        self.expect(b'e', "'e' terminating integer")?;
        Ok(value)
    }

    /// Decodes `<length>:<bytes>` and borrows the bytes from the input.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Malformed length prefix or length exceeding the input
    pub fn decode_byte_string(&mut self) -> Result<&'a [u8], BencodeError> {
        let length_start = self.position;
        let mut length: usize = 0;
        while let Some(byte @ b'0'..=b'9') = self.peek() {
            length = length
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(byte - b'0')))
                .ok_or_else(|| BencodeError::syntax(length_start, "string length within input"))?;
            self.position += 1;
        }

        let digit_count = self.position - length_start;
        if digit_count == 0 {
            return Err(self.error_here("string length"));
        }
        if digit_count > 1 && self.input[length_start] == b'0' {
            return Err(BencodeError::syntax(
                length_start,
                "string length without leading zeros",
            ));
        }

        self.expect(b':', "':' after string length")?;

        let data_start = self.position;
        if length > self.input.len() - data_start {
            return Err(BencodeError::syntax(data_start, "string bytes within input"));
        }

        self.position += length;
        Ok(&self.input[data_start..self.position])
    }

    /// Decodes `l<values>e`.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Invalid element, missing terminator or excessive nesting
    pub fn decode_list(&mut self) -> Result<Vec<BencodeValue>, BencodeError> {
        self.enter_container()?;
        self.expect(b'l', "'l' starting list")?;

        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error_here("'e' terminating list")),
                Some(b'e') => break,
                Some(_) => items.push(self.decode_value()?),
            }
        }

        self.position += 1;
        self.depth -= 1;
        Ok(items)
    }

    /// Decodes `d<key value>*e`.
    ///
    /// # Errors
    /// - `BencodeError::Syntax` - Non-string key, duplicate key, invalid value,
    ///   missing terminator or excessive nesting
    pub fn decode_dictionary(&mut self) -> Result<BencodeDictionary, BencodeError> {
        self.decode_dictionary_with(|_, _| {})
    }

    /// Decodes a dictionary, reporting the byte range consumed by each value.
    ///
    /// Ranges are absolute offsets into the decoder input.
    pub(super) fn decode_dictionary_with(
        &mut self,
        mut record_span: impl FnMut(&[u8], Range<usize>),
    ) -> Result<BencodeDictionary, BencodeError> {
        self.enter_container()?;
        self.expect(b'd', "dictionary")?;

        let mut dict = BTreeMap::new();
        loop {
            match self.peek() {
                None => return Err(self.error_here("'e' terminating dictionary")),
                Some(b'e') => break,
                Some(b'0'..=b'9') => {
                    let key_offset = self.position;
                    let key = self.decode_byte_string()?;
                    if dict.contains_key(key) {
                        return Err(BencodeError::syntax(key_offset, "unique dictionary key"));
                    }

                    let value_start = self.position;
                    let value = self.decode_value()?;
                    record_span(key, value_start..self.position);
                    dict.insert(key.to_vec(), value);
                }
                Some(_) => return Err(self.error_here("dictionary key string")),
            }
        }

        self.position += 1;
        self.depth -= 1;
        Ok(dict)
    }

    fn enter_container(&mut self) -> Result<(), BencodeError> {
        if self.depth == MAX_DEPTH {
            return Err(self.error_here("nesting depth within limit"));
        }
        self.depth += 1;
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), BencodeError> {
        if self.peek() == Some(byte) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn error_here(&self, expected: &'static str) -> BencodeError {
        BencodeError::syntax(self.position, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decode;

    fn syntax_offset(input: &[u8]) -> usize {
        match decode(input) {
            Err(BencodeError::Syntax { offset, .. }) => offset,
            Ok(value) => panic!("expected syntax error, decoded {value:?}"),
        }
    }

    #[test]
    fn test_decode_empty_dictionary() {
        assert_eq!(decode(b"de").unwrap(), BencodeValue::Dictionary(BTreeMap::new()));
    }

    #[test]
    fn test_decode_dictionary_with_integer() {
        let value = decode(b"d1:ki5ee").unwrap();
        assert_eq!(value.get(b"k"), Some(&BencodeValue::Integer(5)));
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(decode(b"i-12e").unwrap(), BencodeValue::Integer(-12));
        assert_eq!(decode(b"i0e").unwrap(), BencodeValue::Integer(0));
        assert_eq!(
            decode(b"i9223372036854775807e").unwrap(),
            BencodeValue::Integer(i64::MAX)
        );
        assert_eq!(
            decode(b"i-9223372036854775808e").unwrap(),
            BencodeValue::Integer(i64::MIN)
        );
    }

    #[test]
    fn test_decode_invalid_integers() {
        assert_eq!(syntax_offset(b"ie"), 1);
        assert_eq!(syntax_offset(b"istringe"), 1);
        assert_eq!(syntax_offset(b"i12"), 3);
        assert_eq!(syntax_offset(b"i-e"), 2);
        assert_eq!(syntax_offset(b"i03e"), 1);
        assert_eq!(syntax_offset(b"i-0e"), 2);
        assert_eq!(syntax_offset(b"i9223372036854775808e"), 1);
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode(b"1:h").unwrap(), BencodeValue::from("h"));
        assert_eq!(decode(b"0:").unwrap(), BencodeValue::ByteString(Vec::new()));
        assert_eq!(
            decode(b"3:\x00\xff\x01").unwrap(),
            BencodeValue::ByteString(vec![0x00, 0xff, 0x01])
        );
    }

    #[test]
    fn test_decode_invalid_strings() {
        assert_eq!(syntax_offset(b"-1:h"), 0);
        assert_eq!(syntax_offset(b"1h"), 1);
        assert_eq!(syntax_offset(b"01:h"), 0);
        assert_eq!(syntax_offset(b"5:abc"), 2);
        assert_eq!(syntax_offset(b"99999999999999999999999:a"), 0);
    }

    #[test]
    fn test_decode_lists() {
        assert_eq!(decode(b"le").unwrap(), BencodeValue::List(Vec::new()));
        assert_eq!(
            decode(b"li5ei32e1:he").unwrap(),
            BencodeValue::List(vec![
                BencodeValue::Integer(5),
                BencodeValue::Integer(32),
                "h".into()
            ])
        );
        assert_eq!(
            decode(b"lli5ee1:se").unwrap(),
            BencodeValue::List(vec![
                BencodeValue::List(vec![BencodeValue::Integer(5)]),
                "s".into()
            ])
        );
    }

    #[test]
    fn test_decode_unterminated_containers() {
        assert_eq!(syntax_offset(b"l"), 1);
        assert_eq!(syntax_offset(b"li1e"), 4);
        assert_eq!(syntax_offset(b"d1:ki5e"), 7);
        assert_eq!(syntax_offset(b"l1:hhhe"), 4);
    }

    #[test]
    fn test_decode_rejects_non_string_keys() {
        let err = decode(b"di1ei2ee").unwrap_err();
        assert_eq!(
            err,
            BencodeError::Syntax {
                offset: 1,
                expected: "dictionary key string"
            }
        );
    }

    #[test]
    fn test_decode_rejects_duplicate_keys() {
        assert_eq!(syntax_offset(b"d1:ai1e1:ai2ee"), 7);
    }

    #[test]
    fn test_decode_accepts_unsorted_keys() {
        let value = decode(b"d1:hi1e1:ai2ee").unwrap();
        assert_eq!(value.as_dict().map(|dict| dict.len()), Some(2));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        assert_eq!(syntax_offset(b"i1ei2e"), 3);
        assert_eq!(syntax_offset(b""), 0);
        assert_eq!(syntax_offset(b"x"), 0);
    }

    #[test]
    fn test_decode_rejects_excessive_nesting() {
        let mut input = vec![b'l'; MAX_DEPTH + 1];
        input.extend(std::iter::repeat_n(b'e', MAX_DEPTH + 1));
        assert_eq!(syntax_offset(&input), MAX_DEPTH);

        let mut input = vec![b'l'; MAX_DEPTH];
        input.extend(std::iter::repeat_n(b'e', MAX_DEPTH));
        assert!(decode(&input).is_ok());
    }

    #[test]
    fn test_decoder_tracks_position() {
        let mut decoder = Decoder::new(b"i42e4:spam");
        assert_eq!(decoder.decode_integer().unwrap(), 42);
        assert_eq!(decoder.position(), 4);
        assert_eq!(decoder.decode_byte_string().unwrap(), b"spam");
        assert!(decoder.finish().is_ok());
    }
}
