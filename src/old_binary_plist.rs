/*!
 The old NeXTSTEP binary property-list format used by `-[NSArchiver encodePropertyList:]`
 and a handful of AppKit classes (notably `NSFont`) that embed a serialized property list
 inside a typedstream rather than decoding it field-by-field. This is *not* the modern
 `bplist00` format: it has no header, no trailer, no offset table, and is a flat recursive
 byte stream tagged by a 4-byte little-endian type number.

 Grounded directly in `old_binary_plist.py` from the original implementation; every framing
 detail below (byte order, the shared zero-padding rule for data/string payloads, and the
 two-pass read for arrays/dictionaries) matches that source.
*/

use crate::error::{invalid, TypedStreamError};

/// A value decoded from the old binary property-list format. Dictionaries keep source
/// order rather than hashing, since nothing about this format guarantees keys are unique
/// or that order is insignificant to callers.
///
/// This type is re-exported from the crate root; the `old_binary_plist` module itself
/// stays private, since the byte format it implements is an internal collaborator
/// (`NSFont`'s contribution hook is its only caller) rather than a surface this crate
/// otherwise exposes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    Nil,
    Data(Vec<u8>),
    String(String),
    Array(Vec<PlistValue>),
    Dictionary(Vec<(String, PlistValue)>),
}

impl PlistValue {
    /// Convenience accessor for contribution hooks that require a plain string (e.g.
    /// `NSFont`'s family name).
    pub fn into_string(self) -> Result<String, TypedStreamError> {
        match self {
            PlistValue::String(s) => Ok(s),
            other => Err(invalid(0, format!("expected a plist string, found {other:?}"))),
        }
    }
}

const NEXTSTEP_8_BIT_CHARACTER_MAP: &str = "\u{0}\u{1}\u{2}\u{3}\u{4}\u{5}\u{6}\u{7}\u{8}\t\n\u{b}\u{c}\r\u{e}\u{f}\
\u{10}\u{11}\u{12}\u{13}\u{14}\u{15}\u{16}\u{17}\u{18}\u{19}\u{1a}\u{1b}\u{1c}\u{1d}\u{1e}\u{1f}\
 !\"#$%&'()*+,-./\
0123456789:;<=>?\
@ABCDEFGHIJKLMNO\
PQRSTUVWXYZ[\\]^_\
`abcdefghijklmno\
pqrstuvwxyz{|}~\u{7f}\
\u{a0}ÀÁÂÃÄÅÇÈÉÊËÌÍÎÏ\
ÐÑÒÓÔÕÖÙÚÛÜÝÞµ×÷\
©¡¢£⁄¥ƒ§¤’“«‹›ﬁﬂ\
®–†‡·¦¶•‚„”»…‰¬¿\
¹ˋ´ˆ˜¯˘˙¨²˚¸³˝˛ˇ\
—±¼½¾àáâãäåçèéêë\
ìÆíªîïðñŁØŒºòóôõ\
öæùúûıüýłøœßþÿ";

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn read_exact(&mut self, count: usize) -> Result<&'a [u8], TypedStreamError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| invalid(self.pos, "unexpected end of old-binary-plist data"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32_le(&mut self) -> Result<u32, TypedStreamError> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn nextstep_8_bit_to_string(bytes: &[u8]) -> Result<String, TypedStreamError> {
    let map: Vec<char> = NEXTSTEP_8_BIT_CHARACTER_MAP.chars().collect();
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        let ch = *map
            .get(byte as usize)
            .ok_or_else(|| invalid(0, format!("byte {byte:#04x} has no NeXTSTEP-8-bit mapping")))?;
        out.push(ch);
    }
    Ok(out)
}

fn utf16_with_bom_to_string(bytes: &[u8]) -> Result<String, TypedStreamError> {
    if bytes.len() % 2 != 0 {
        return Err(invalid(0, "UTF-16 plist string has an odd byte length"));
    }
    let big_endian = match bytes.get(0..2) {
        Some([0xfe, 0xff]) => true,
        Some([0xff, 0xfe]) => false,
        _ => return Err(invalid(0, "UTF-16 plist string is missing its byte-order mark")),
    };
    let units: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| invalid(0, "UTF-16 plist string is not valid UTF-16"))
}

fn read_sized_payload(cursor: &mut Cursor<'_>) -> Result<Vec<u8>, TypedStreamError> {
    let data_length = cursor.read_u32_le()? as usize;
    let data = cursor.read_exact(data_length)?.to_vec();
    let padding_len = (4 - data_length % 4) % 4;
    let padding = cursor.read_exact(padding_len)?;
    if padding.iter().any(|&b| b != 0) {
        return Err(invalid(cursor.pos, "old-binary-plist alignment padding must be all zero"));
    }
    Ok(data)
}

fn deserialize_from(cursor: &mut Cursor<'_>) -> Result<PlistValue, TypedStreamError> {
    let type_number = cursor.read_u32_le()?;
    match type_number {
        4 => Ok(PlistValue::Data(read_sized_payload(cursor)?)),
        5 => Ok(PlistValue::String(nextstep_8_bit_to_string(&read_sized_payload(cursor)?)?)),
        6 => Ok(PlistValue::String(utf16_with_bom_to_string(&read_sized_payload(cursor)?)?)),
        2 | 7 => {
            let element_count = cursor.read_u32_le()? as usize;

            let keys = if type_number == 7 {
                let mut keys = Vec::with_capacity(element_count);
                for _ in 0..element_count {
                    keys.push(deserialize_from(cursor)?.into_string()?);
                }
                Some(keys)
            } else {
                None
            };

            let mut value_lengths = Vec::with_capacity(element_count);
            for _ in 0..element_count {
                value_lengths.push(cursor.read_u32_le()? as usize);
            }

            let mut values = Vec::with_capacity(element_count);
            let mut pos_before = cursor.pos;
            for expected_length in value_lengths {
                let value = deserialize_from(cursor)?;
                let consumed = cursor.pos - pos_before;
                if consumed != expected_length {
                    return Err(invalid(
                        cursor.pos,
                        format!("expected a {expected_length}-byte plist value, but consumed {consumed} bytes"),
                    ));
                }
                values.push(value);
                pos_before = cursor.pos;
            }

            match (type_number, keys) {
                (2, _) => Ok(PlistValue::Array(values)),
                (7, Some(keys)) => Ok(PlistValue::Dictionary(keys.into_iter().zip(values).collect())),
                _ => unreachable!("dictionary branch always reads keys"),
            }
        }
        8 => Ok(PlistValue::Nil),
        other => Err(invalid(cursor.pos, format!("unknown old-binary-plist type number {other}"))),
    }
}

/// Decodes a complete old-binary-plist value from `bytes`, requiring that the whole slice
/// be consumed (matching `old_binary_plist.py`'s `deserialize`, as opposed to its
/// stream-based `deserialize_from_stream`).
pub(crate) fn decode(bytes: &[u8]) -> Result<PlistValue, TypedStreamError> {
    let mut cursor = Cursor::new(bytes);
    let value = deserialize_from(&mut cursor)?;
    if cursor.pos != bytes.len() {
        return Err(invalid(
            cursor.pos,
            format!("{} bytes of data remain after the end of the plist", bytes.len() - cursor.pos),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le(n: u32) -> [u8; 4] {
        n.to_le_bytes()
    }

    #[test]
    fn decodes_nil() {
        let bytes = le(8);
        assert_eq!(decode(&bytes).unwrap(), PlistValue::Nil);
    }

    #[test]
    fn decodes_data_with_padding() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(4));
        bytes.extend_from_slice(&le(3));
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0]); // pad to a multiple of 4
        assert_eq!(decode(&bytes).unwrap(), PlistValue::Data(b"abc".to_vec()));
    }

    #[test]
    fn rejects_nonzero_padding() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(4));
        bytes.extend_from_slice(&le(3));
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[1]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn decodes_nextstep_8_bit_string() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(5));
        bytes.extend_from_slice(&le(5));
        bytes.extend_from_slice(b"Hello");
        bytes.extend_from_slice(&[0, 0, 0]);
        assert_eq!(decode(&bytes).unwrap(), PlistValue::String("Hello".to_string()));
    }

    #[test]
    fn decodes_utf16_string_with_bom() {
        let payload: Vec<u8> = [0xffu16, 'H' as u16, 'i' as u16]
            .iter()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        // The BOM itself is 0xfffe little-endian, i.e. bytes [0xff, 0xfe].
        let mut full = vec![0xff, 0xfe];
        full.extend_from_slice(&payload[2..]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(6));
        bytes.extend_from_slice(&le(full.len() as u32));
        bytes.extend_from_slice(&full);
        let pad = (4 - full.len() % 4) % 4;
        bytes.extend(std::iter::repeat(0).take(pad));
        assert_eq!(decode(&bytes).unwrap(), PlistValue::String("Hi".to_string()));
    }

    #[test]
    fn decodes_array_of_nils() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(2));
        bytes.extend_from_slice(&le(2));
        bytes.extend_from_slice(&le(4)); // length of each nested "nil" encoding
        bytes.extend_from_slice(&le(4));
        bytes.extend_from_slice(&le(8));
        bytes.extend_from_slice(&le(8));
        assert_eq!(decode(&bytes).unwrap(), PlistValue::Array(vec![PlistValue::Nil, PlistValue::Nil]));
    }

    #[test]
    fn decodes_dictionary_preserving_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(7));
        bytes.extend_from_slice(&le(2));
        // keys: "b" then "a", each as an NSString-in-NeXTSTEP-8-bit record
        for key in ["b", "a"] {
            bytes.extend_from_slice(&le(5));
            bytes.extend_from_slice(&le(key.len() as u32));
            bytes.extend_from_slice(key.as_bytes());
            let pad = (4 - key.len() % 4) % 4;
            bytes.extend(std::iter::repeat(0).take(pad));
        }
        // both values are nil (4 bytes each)
        bytes.extend_from_slice(&le(4));
        bytes.extend_from_slice(&le(4));
        bytes.extend_from_slice(&le(8));
        bytes.extend_from_slice(&le(8));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            decoded,
            PlistValue::Dictionary(vec![("b".to_string(), PlistValue::Nil), ("a".to_string(), PlistValue::Nil)])
        );
    }

    #[test]
    fn rejects_trailing_data() {
        let mut bytes = le(8).to_vec();
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_mismatched_declared_length() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&le(2));
        bytes.extend_from_slice(&le(1));
        bytes.extend_from_slice(&le(100)); // declared length is wrong for a 4-byte nil
        bytes.extend_from_slice(&le(8));
        assert!(decode(&bytes).is_err());
    }
}
