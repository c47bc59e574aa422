//! End-to-end scenarios exercising the full reader → unarchiver pipeline against
//! hand-built byte streams, mirroring the worked examples and quantified invariants this
//! crate's format is specified against. `Builder` is a minimal test-only wire-format
//! encoder (this crate is read-only; nothing here is reused by the library itself).

use std::rc::Rc;
use typedstream::{Event, EventReader, Node, ObjectData, Unarchiver, Value};

/// Assembles a little-endian (`streamtyped`) typedstream byte-for-byte, one wire primitive
/// at a time. Every helper here writes exactly what the format specification says that
/// primitive looks like on the wire; there is no abstraction beyond "one method per
/// grammar production".
struct Builder {
    bytes: Vec<u8>,
}

impl Builder {
    /// A fresh stream with just the header written (streamer version 4, little-endian,
    /// the given `system_version`, encoded as a single literal byte — callers only pass
    /// values small enough to stay outside the reserved tag range).
    fn new(system_version: i64) -> Self {
        let mut b = Builder { bytes: Vec::new() };
        b.bytes.push(4);
        b.bytes.push(11);
        b.bytes.extend_from_slice(b"streamtyped");
        b.lit(system_version);
        b
    }

    fn lit(&mut self, n: i64) -> &mut Self {
        self.bytes.push((n as i8) as u8);
        self
    }

    fn nil(&mut self) -> &mut Self {
        self.lit(-123)
    }

    fn new_tag(&mut self) -> &mut Self {
        self.lit(-124)
    }

    fn end_of_object(&mut self) -> &mut Self {
        self.lit(-122)
    }

    /// An unshared string (`+`'s wire shape, and the tail of every "new" shared string):
    /// a literal length followed by the raw bytes.
    fn unshared_string(&mut self, s: &[u8]) -> &mut Self {
        self.lit(s.len() as i64);
        self.bytes.extend_from_slice(s);
        self
    }

    /// A literal (never-before-seen) shared string: the `NEW` tag, then an unshared
    /// string.
    fn new_shared_string(&mut self, s: &[u8]) -> &mut Self {
        self.new_tag();
        self.unshared_string(s)
    }

    /// The type-encoding header of one typed-value group.
    fn type_header(&mut self, enc: &[u8]) -> &mut Self {
        self.new_shared_string(enc)
    }

    /// A literal class-chain entry: a chain-level `NEW` tag, the name (itself a literal
    /// shared string, so its own `NEW` tag precedes it), then the version.
    fn class_entry(&mut self, name: &[u8], version: i64) -> &mut Self {
        self.new_tag();
        self.new_shared_string(name);
        self.lit(version)
    }

    /// A reference to shared-object-table slot `index`, valid anywhere a class/C-string/
    /// object reference can appear (the bias is baked in at encode time, same as the
    /// reader un-biases it at decode time).
    fn reference(&mut self, index: usize) -> &mut Self {
        self.lit(index as i64 - 110)
    }

    /// A `d` field's wire shape: the FLOATING_POINT tag followed by 8 little-endian bytes.
    fn double(&mut self, value: f64) -> &mut Self {
        self.lit(-125);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

fn known(node: &Node) -> std::cell::Ref<'_, dyn typedstream::KnownObject> {
    std::cell::Ref::map(node.borrow(), |data| data.known_instance().expect("known instance"))
}

// ---- §8a: minimal NSString, bit-exact against the spec's worked example -------------

const MINIMAL_NSSTRING_BYTES: &[u8] = &[
    0x04, 0x0B, b's', b't', b'r', b'e', b'a', b'm', b't', b'y', b'p', b'e', b'd', 0x81, 0xE8, 0x03, 0x84, 0x01, 0x40,
    0x84, 0x84, 0x84, 0x08, b'N', b'S', b'S', b't', b'r', b'i', b'n', b'g', 0x01, 0x84, 0x84, 0x08, b'N', b'S', b'O',
    b'b', b'j', b'e', b'c', b't', 0x00, 0x85, 0x84, 0x01, 0x2B, 0x0C, b's', b't', b'r', b'i', b'n', b'g', b' ', b'v',
    b'a', b'l', b'u', b'e', 0x86,
];

#[test]
fn minimal_nsstring_vector_decodes_to_expected_value() {
    let mut unarchiver = Unarchiver::new(MINIMAL_NSSTRING_BYTES).unwrap();
    assert_eq!(unarchiver.header().system_version, 1000);
    assert!(!unarchiver.header().big_endian);

    let root = unarchiver.decode_single_root().unwrap();
    let node = match root {
        Value::Object(Some(node)) => node,
        other => panic!("expected an object, got {other:?}"),
    };
    let instance = known(&node);
    let string = instance.as_any().downcast_ref::<typedstream::classes::foundation::NSString>().unwrap();
    assert_eq!(string.value, "string value");
}

#[test]
fn minimal_nsstring_vector_produces_expected_event_sequence() {
    let mut reader = EventReader::new(MINIMAL_NSSTRING_BYTES).unwrap();
    let events = reader.read_all_events().unwrap();
    assert!(reader.at_eof(), "no trailing bytes should remain");

    let expected = vec![
        Event::BeginTypedValues(vec![b"@".to_vec()]),
        Event::BeginObject,
        Event::SingleClass { name: "NSString".to_string(), version: 1 },
        Event::SingleClass { name: "NSObject".to_string(), version: 0 },
        Event::Nil,
        Event::BeginTypedValues(vec![b"+".to_vec()]),
        Event::UnsharedBytes(b"string value".to_vec()),
        Event::EndTypedValues,
        Event::EndObject,
        Event::EndTypedValues,
    ];
    assert_eq!(events, expected);
}

// ---- Invariant 1: reading to EOF consumes exactly the stream, no trailing bytes ------

#[test]
fn reading_to_eof_consumes_the_whole_stream() {
    let mut reader = EventReader::new(MINIMAL_NSSTRING_BYTES).unwrap();
    reader.read_all_events().unwrap();
    assert_eq!(reader.position(), MINIMAL_NSSTRING_BYTES.len());
}

// ---- §8f: invalid boolean / NUL-in-C-string ------------------------------------------

#[test]
fn invalid_boolean_byte_is_rejected() {
    let mut bytes = Builder::new(1);
    bytes.type_header(b"B").lit(2);
    let err = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::InvalidTypedStream { .. }));
}

#[test]
fn boolean_zero_and_one_are_accepted() {
    for (wire, expected) in [(0i64, false), (1i64, true)] {
        let mut bytes = Builder::new(1);
        bytes.type_header(b"B").lit(wire);
        let value = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap();
        assert!(matches!(value, Value::Bool(b) if b == expected));
    }
}

#[test]
fn literal_c_byte_other_than_0_or_1_is_accepted() {
    let mut bytes = Builder::new(1);
    bytes.type_header(b"c").lit(42);
    let value = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap();
    assert!(matches!(value, Value::SignedInt(42)));
}

#[test]
fn nul_byte_in_c_string_is_rejected() {
    let mut bytes = Builder::new(1);
    // A literal `*` value needs two `NEW` markers: one saying "this C string is a
    // literal, not a reference", one saying "its backing shared string is itself new".
    bytes.type_header(b"*").new_tag().new_shared_string(b"a\0b");
    let err = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::InvalidTypedStream { .. }));
}

#[test]
fn literal_c_string_without_nul_decodes_to_a_shared_value() {
    let mut bytes = Builder::new(1);
    bytes.type_header(b"*").new_tag().new_shared_string(b"hello");
    let value = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap();
    match value {
        Value::CString(Some(cstring_bytes)) => assert_eq!(&*cstring_bytes, b"hello"),
        other => panic!("expected a C string, found {other:?}"),
    }
}

// ---- §8d: object backreference shares identity ---------------------------------------

#[test]
fn class_backreference_resolves_to_a_known_instance_of_the_same_class() {
    // Two top-level `@` objects: the first is a literal NSObject. Reserving its own
    // object slot happens before its class is pushed, so the first object occupies
    // table slot 0 and its class occupies slot 1; the second object's class chain is a
    // bare reference straight to that class slot instead of a literal name.
    let mut bytes = Builder::new(1);
    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.class_entry(b"NSObject", 0);
    bytes.nil();
    bytes.end_of_object();

    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.reference(1); // class chain: no literal entries, terminated by a reference to slot 1
    bytes.end_of_object();

    let mut unarchiver = Unarchiver::new(&bytes.finish()).unwrap();
    let groups = unarchiver.decode_all().unwrap();
    assert_eq!(groups.len(), 2);
    let first = groups[0].single().unwrap().as_object().unwrap().clone();
    let second = groups[1].single().unwrap().as_object().unwrap().clone();

    // NSObject is registered and contributes no fields, so both objects resolve as
    // `Known` rather than carrying their own `wire_class`; identity of the resolved
    // class is exercised directly against the shared-object table below, where the
    // wire class is still observable (an unregistered class's `Unknown` object data).
    assert_eq!(known(&first).archived_class_name(), "NSObject");
    assert_eq!(known(&second).archived_class_name(), "NSObject");
    assert!(!Rc::ptr_eq(&first, &second), "distinct literal objects must not share identity");
}

#[test]
fn class_table_returns_the_same_allocation_for_a_backreference() {
    let mut bytes = Builder::new(1);
    // A literal object using an *unknown* class, so the decoded value carries its own
    // `wire_class: Rc<Class>` we can pointer-compare directly.
    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.class_entry(b"NotARealClass", 0);
    bytes.nil();
    bytes.end_of_object();

    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.reference(1); // slot 0 is the first object itself; its class landed in slot 1
    bytes.end_of_object();

    let mut unarchiver = Unarchiver::new(&bytes.finish()).unwrap();
    let groups = unarchiver.decode_all().unwrap();
    let first = groups[0].single().unwrap().as_object().unwrap().clone();
    let second = groups[1].single().unwrap().as_object().unwrap().clone();

    let class_of = |node: &Node| match &*node.borrow() {
        ObjectData::Unknown { wire_class, .. } => wire_class.clone(),
        other => panic!("expected an Unknown object, found {other:?}"),
    };
    let class1 = class_of(&first);
    let class2 = class_of(&second);
    assert!(Rc::ptr_eq(&class1, &class2));
    assert_eq!(class1.name, "NotARealClass");
}

// ---- §8e: circular self-reference decodes without infinite recursion ----------------

#[test]
fn object_field_referencing_itself_decodes_by_identity() {
    // A single literal object of an unknown class, whose one trailing field is an `@`
    // reference back to its own (still-under-construction) object-table slot.
    let mut bytes = Builder::new(1);
    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.class_entry(b"SelfReferential", 0);
    bytes.nil();
    bytes.type_header(b"@");
    bytes.reference(0);
    bytes.end_of_object();

    let mut unarchiver = Unarchiver::new(&bytes.finish()).unwrap();
    let root = unarchiver.decode_single_root().unwrap();
    let node = root.as_object().unwrap().clone();

    let tail = match &*node.borrow() {
        ObjectData::Unknown { tail, .. } => tail.clone(),
        other => panic!("expected an Unknown object, found {other:?}"),
    };
    assert_eq!(tail.len(), 1);
    let inner = tail[0].single().unwrap().as_object().unwrap();
    assert!(Rc::ptr_eq(&node, inner));
}

// ---- §8g: struct name tolerance --------------------------------------------------------

#[test]
fn anonymized_struct_name_resolves_against_the_registered_struct() {
    // `_NSPoint` and `_NSSize` alone share an identical field shape (two `f`s), so an
    // anonymized `{?=ff}` tolerantly matches either one and the registry's choice
    // between them is not meaningful to assert on. Nesting two anonymized points inside
    // an anonymized outer struct is unambiguous: only `_NSRect` has that shape.
    let mut bytes = Builder::new(1);
    // `f` (float) values are tag-encoded only via FLOATING_POINT (-125); a literal byte
    // is read as the integer `0` widened to float, which is enough to exercise the name
    // resolution without needing to hand-encode IEEE-754 bit patterns.
    bytes.type_header(b"{?={?=ff}{?=ff}}").lit(0).lit(0).lit(0).lit(0);
    let value = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap();
    match value {
        Value::Struct { name, fields } => {
            assert_eq!(name.as_deref(), Some("_NSRect"));
            assert_eq!(fields.len(), 2);
        }
        other => panic!("expected a struct, found {other:?}"),
    }
}

// ---- Invariant 6: single-root property -------------------------------------------------

#[test]
fn decode_single_root_rejects_multiple_groups() {
    let mut bytes = Builder::new(1);
    bytes.type_header(b"c").lit(1);
    bytes.type_header(b"c").lit(2);
    let err = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::MultipleRoots));
}

#[test]
fn decode_single_root_rejects_multi_value_group() {
    let mut bytes = Builder::new(1);
    bytes.new_tag();
    bytes.unshared_string(b"ci"); // one group, two encodings: "c" then "i"
    bytes.lit(1);
    bytes.lit(2);
    let err = Unarchiver::new(&bytes.finish()).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::MultipleRoots));
}

#[test]
fn decode_single_root_rejects_empty_stream() {
    let bytes = Builder::new(1).finish();
    let err = Unarchiver::new(&bytes).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::NoRoots));
}

// ---- Unsupported streamer version ------------------------------------------------------

#[test]
fn old_nextstep_streamer_version_is_rejected() {
    let mut bytes = vec![3u8, 11];
    bytes.extend_from_slice(b"streamtyped");
    let err = Unarchiver::new(&bytes).unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::InvalidTypedStream { .. }));
}

#[test]
fn big_endian_signature_is_recognized() {
    let mut bytes = vec![4u8, 11];
    bytes.extend_from_slice(b"typedstream");
    bytes.push(1); // system_version, literal
    bytes.extend_from_slice(&[0x84, 0x01, b'c']); // type header "c"
    bytes.push(42); // the `c` value itself
    let mut unarchiver = Unarchiver::new(&bytes).unwrap();
    assert!(unarchiver.header().big_endian);
    let value = unarchiver.decode_single_root().unwrap();
    assert!(matches!(value, Value::SignedInt(42)));
}

// ---- NSDate: microsecond precision, no panic on an unrepresentable offset --------------

fn nsdate_object(offset: f64) -> Vec<u8> {
    let mut bytes = Builder::new(1);
    bytes.type_header(b"@");
    bytes.new_tag();
    bytes.class_entry(b"NSDate", 0);
    bytes.class_entry(b"NSObject", 0);
    bytes.nil();
    bytes.type_header(b"d");
    bytes.double(offset);
    bytes.end_of_object();
    bytes.finish()
}

#[test]
fn nsdate_retains_sub_millisecond_precision() {
    let offset = 1.0001235; // 123.5us past a whole second, finer than millisecond rounding
    let mut unarchiver = Unarchiver::new(&nsdate_object(offset)).unwrap();
    let root = unarchiver.decode_single_root().unwrap();
    let node = match root {
        Value::Object(Some(node)) => node,
        other => panic!("expected an object, got {other:?}"),
    };
    let instance = known(&node);
    let date = instance.as_any().downcast_ref::<typedstream::classes::foundation::NSDate>().unwrap();
    let expected_micros = (offset * 1_000_000.0).round() as i64;
    let actual_micros = (date.value - typedstream::classes::foundation::cocoa_reference_date())
        .num_microseconds()
        .unwrap();
    assert_eq!(actual_micros, expected_micros);
}

#[test]
fn nsdate_offset_too_large_to_represent_is_rejected_not_panicking() {
    let bytes = nsdate_object(f64::MAX);
    let err = Unarchiver::new(&bytes).unwrap().decode_single_root().unwrap_err();
    assert!(matches!(err, typedstream::TypedStreamError::InvalidTypedStream { .. }));
}
