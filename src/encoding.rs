/*!
 The Objective-C-like type-encoding grammar: splitting a multi-value encoding string into
 its elements, and parsing/matching the two compound forms, arrays (`[N T]`) and structs
 (`{Name=F1F2...}`).
*/

use crate::error::{invalid, TypedStreamError};

/// Splits a type-encoding string into its component single-type encodings, honoring
/// bracket nesting (`()`, `[]`, `{}`) so that e.g. `{Foo=[3i]i}i` splits into
/// `[b"{Foo=[3i]i}", b"i"]`, not into pieces that cut a compound encoding in half.
pub fn split(encodings: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, &byte) in encodings.iter().enumerate() {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            out.push(&encodings[start..=i]);
            start = i + 1;
        }
    }
    out
}

/// Parses `[N T]` into `(N, T)`. `enc` must be exactly one complete array encoding (as
/// produced by [`split`]).
pub fn parse_array(enc: &[u8]) -> Result<(usize, &[u8]), TypedStreamError> {
    if enc.first() != Some(&b'[') || enc.last() != Some(&b']') {
        return Err(invalid(0, "array encoding missing brackets"));
    }
    let inner = &enc[1..enc.len() - 1];
    let digits_end = inner
        .iter()
        .position(|b| !b.is_ascii_digit())
        .ok_or_else(|| invalid(0, "array encoding missing element type"))?;
    if digits_end == 0 {
        return Err(invalid(0, "array encoding missing length"));
    }
    let length: usize = std::str::from_utf8(&inner[..digits_end])?
        .parse()
        .map_err(|_| invalid(0, "array length is not a valid integer"))?;
    let element = &inner[digits_end..];
    if element.is_empty() {
        return Err(invalid(0, "array encoding missing element type"));
    }
    Ok((length, element))
}

/// Parses `{Name=F1F2...}` into `(name, field_encodings)`. The name is the substring up
/// to the first `=` in the encoding; nested structs only ever occur after that `=` (as
/// part of a field encoding), so the first `=` anywhere in the string is always the
/// struct's own name separator. A struct with no `=` at all, or whose name is empty or
/// `?`, is anonymous.
pub fn parse_struct(enc: &[u8]) -> Result<(Option<&[u8]>, Vec<&[u8]>), TypedStreamError> {
    if enc.first() != Some(&b'{') || enc.last() != Some(&b'}') {
        return Err(invalid(0, "struct encoding missing braces"));
    }
    let inner = &enc[1..enc.len() - 1];
    let (name, fields_enc) = match inner.iter().position(|&b| b == b'=') {
        Some(eq) => (&inner[..eq], &inner[eq + 1..]),
        None => (&inner[0..0], inner),
    };
    let name = if name.is_empty() || name == b"?" {
        None
    } else {
        Some(name)
    };
    Ok((name, split(fields_enc)))
}

/// Builds a canonical `{Name=F1F2...}` encoding from a name (or `None` for anonymous, which
/// renders as `?`) and field encodings, joined without separators (field encodings are
/// already self-delimiting).
pub fn build_struct_encoding(name: Option<&[u8]>, fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(b'{');
    out.extend_from_slice(name.unwrap_or(b"?"));
    out.push(b'=');
    for field in fields {
        out.extend_from_slice(field);
    }
    out.push(b'}');
    out
}

/// Recursively tolerant comparison of an actual wire encoding against an expected
/// encoding: inside a struct, an actual name of `?` or empty matches any expected name
/// (anonymization is always permitted); arrays must match on length and elementwise;
/// every other encoding must be byte-for-byte equal.
pub fn matches(actual: &[u8], expected: &[u8]) -> bool {
    if actual == expected {
        return true;
    }
    if actual.first() == Some(&b'{') && expected.first() == Some(&b'{') {
        let (actual_name, actual_fields) = match parse_struct(actual) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let (expected_name, expected_fields) = match parse_struct(expected) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let name_ok = actual_name.is_none() || actual_name == expected_name;
        name_ok
            && actual_fields.len() == expected_fields.len()
            && actual_fields
                .iter()
                .zip(expected_fields.iter())
                .all(|(a, e)| matches(a, e))
    } else if actual.first() == Some(&b'[') && expected.first() == Some(&b'[') {
        let (actual_len, actual_elem) = match parse_array(actual) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let (expected_len, expected_elem) = match parse_array(expected) {
            Ok(v) => v,
            Err(_) => return false,
        };
        actual_len == expected_len && matches(actual_elem, expected_elem)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_run() {
        assert_eq!(split(b"ci@"), vec![&b"c"[..], &b"i"[..], &b"@"[..]]);
    }

    #[test]
    fn splits_honoring_nested_brackets() {
        assert_eq!(
            split(b"{Foo=[3i]i}i"),
            vec![&b"{Foo=[3i]i}"[..], &b"i"[..]]
        );
    }

    #[test]
    fn parses_array_encoding() {
        assert_eq!(parse_array(b"[3i]").unwrap(), (3, &b"i"[..]));
        assert_eq!(parse_array(b"[904c]").unwrap(), (904, &b"c"[..]));
    }

    #[test]
    fn parses_named_struct() {
        let (name, fields) = parse_struct(b"{_NSPoint=ff}").unwrap();
        assert_eq!(name, Some(&b"_NSPoint"[..]));
        assert_eq!(fields, vec![&b"f"[..], &b"f"[..]]);
    }

    #[test]
    fn parses_anonymous_struct() {
        let (name, fields) = parse_struct(b"{?=ff}").unwrap();
        assert_eq!(name, None);
        assert_eq!(fields, vec![&b"f"[..], &b"f"[..]]);
    }

    #[test]
    fn struct_name_is_first_equals_even_with_nested_struct_fields() {
        let (name, fields) = parse_struct(b"{_NSRect={_NSPoint=ff}{_NSSize=ff}}").unwrap();
        assert_eq!(name, Some(&b"_NSRect"[..]));
        assert_eq!(fields, vec![&b"{_NSPoint=ff}"[..], &b"{_NSSize=ff}"[..]]);
    }

    #[test]
    fn tolerant_match_allows_anonymized_struct_name() {
        assert!(matches(b"{?=ff}", b"{_NSPoint=ff}"));
        assert!(matches(b"{=ff}", b"{_NSPoint=ff}"));
        assert!(!matches(b"{_NSPoint=ff}", b"{_NSOther=ff}"));
    }

    #[test]
    fn tolerant_match_requires_equal_array_length() {
        assert!(matches(b"[3i]", b"[3i]"));
        assert!(!matches(b"[3i]", b"[4i]"));
    }
}
