/*!
 The unarchiver: consumes the low-level event reader's primitives, maintains the
 shared-object table, reconstructs class hierarchies, and dispatches to the known-class
 and known-struct registries for semantic reconstruction (falling back to a generic,
 opaque representation when a class or struct is unknown).
*/

pub mod registry;
pub mod value;

use crate::encoding;
use crate::error::{invalid, TypedStreamError};
use crate::event::{ClassChainEnd, CStringRead, EventReader, ObjectHead};
use crate::table::SharedObjectTable;
use registry::{class_registry, struct_registry, ClassDescriptor, Resolution};
use std::rc::Rc;
use value::{Class, KnownObject, Node, ObjectData, TypedGroup, Value};

/// Consumes a typedstream and reconstructs the object graph it describes.
pub struct Unarchiver<'a> {
    reader: EventReader<'a>,
    table: SharedObjectTable,
}

impl<'a> Unarchiver<'a> {
    /// Builds an unarchiver over a borrowed typedstream. Callers reading from a path or
    /// an owned buffer read the bytes into a `Vec<u8>` first and construct over `&bytes`;
    /// this crate keeps the core borrowing rather than introducing a self-referential
    /// owned reader.
    pub fn new(bytes: &'a [u8]) -> Result<Self, TypedStreamError> {
        Ok(Self {
            reader: EventReader::new(bytes)?,
            table: SharedObjectTable::new(),
        })
    }

    pub fn header(&self) -> crate::event::Header {
        self.reader.header
    }

    /// The reader's current byte offset, for error messages raised by catalog code that
    /// needs to report a position but only has a decoded [`Value`] in hand.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    // ---- class / object decoding -----------------------------------------------------

    fn decode_class_value(&mut self) -> Result<Option<Rc<Class>>, TypedStreamError> {
        let (classes, end) = self.reader.read_class_chain(None)?;
        if classes.is_empty() {
            return match end {
                ClassChainEnd::Nil => Ok(None),
                ClassChainEnd::Reference(index) => Ok(Some(self.table.get_class(index)?)),
            };
        }
        let mut superclass = match end {
            ClassChainEnd::Nil => None,
            ClassChainEnd::Reference(index) => Some(self.table.get_class(index)?),
        };
        let mut built = Vec::with_capacity(classes.len());
        for single in classes.iter().rev() {
            let class = Rc::new(Class {
                name: single.name.clone(),
                version: single.version,
                superclass: superclass.clone(),
            });
            superclass = Some(class.clone());
            built.push(class);
        }
        built.reverse();
        for class in &built {
            self.table.push_class(class.clone());
        }
        Ok(built.into_iter().next())
    }

    fn decode_object_value(&mut self) -> Result<Option<Node>, TypedStreamError> {
        match self.reader.read_object_head(None)? {
            ObjectHead::Nil => Ok(None),
            ObjectHead::Reference(index) => Ok(Some(self.table.get_object(index)?)),
            ObjectHead::New => {
                let node = self.table.reserve_object();
                let wire_class = self
                    .decode_class_value()?
                    .ok_or_else(|| invalid(self.reader.position(), "object's class cannot be nil"))?;
                let data = self.construct_object_data(wire_class)?;
                self.table.fill_object(&node, data);
                Ok(Some(node))
            }
        }
    }

    /// The resolve-construct-initialize portion of the object-construction protocol,
    /// without the object-table placeholder bookkeeping step 1/4 need. Factored out so
    /// that [`classes::appkit::NSClassSwapper`](crate::classes::appkit::NSClassSwapper)
    /// can build a nested instance from a class descriptor it already holds (an
    /// Interface Builder template object, not itself a separate `@` reference) using the
    /// exact same resolution and contribution-hook machinery as a top-level object.
    pub(crate) fn construct_object_data(&mut self, wire_class: Rc<Class>) -> Result<ObjectData, TypedStreamError> {
        let wire_chain = wire_class.chain();
        let wire_chain_names: Vec<&str> = wire_chain.iter().map(|c| c.name.as_str()).collect();
        let resolution = {
            let registry = class_registry();
            match registry.resolve(&wire_chain_names) {
                Resolution::Unknown => None,
                Resolution::Exact { descriptor } => Some((descriptor, 0usize)),
                Resolution::Ancestor { descriptor, depth } => Some((descriptor, depth)),
            }
        };

        match resolution {
            None => {
                let tail = self.read_trailing_groups()?;
                Ok(ObjectData::Unknown { wire_class, tail })
            }
            Some((descriptor, 0)) => {
                let mut instance = (descriptor.construct)();
                self.run_contribution_chain(descriptor, &wire_chain)?;
                self.run_contribution_hooks(descriptor, &wire_chain, instance.as_mut())?;
                self.expect_end_object()?;
                Ok(ObjectData::Known(instance))
            }
            Some((descriptor, depth)) => {
                let mut instance = (descriptor.construct)();
                let ancestor_chain = &wire_chain[depth..];
                self.run_contribution_chain(descriptor, ancestor_chain)?;
                self.run_contribution_hooks(descriptor, ancestor_chain, instance.as_mut())?;
                let tail = self.read_trailing_groups()?;
                Ok(ObjectData::PartialKnown {
                    super_instance: instance,
                    wire_class,
                    tail,
                })
            }
        }
    }

    /// Verifies that the registry's base-class chain for `descriptor` matches the wire
    /// superclass names at each level, without yet invoking any contribution hook.
    fn run_contribution_chain(
        &self,
        leaf_descriptor: &ClassDescriptor,
        wire_chain: &[Rc<Class>],
    ) -> Result<(), TypedStreamError> {
        let descriptor_chain = class_registry().descriptor_chain(leaf_descriptor.archived_name);
        if descriptor_chain.len() > wire_chain.len() {
            return Err(TypedStreamError::ClassHierarchyMismatch {
                class: leaf_descriptor.archived_name.to_string(),
                expected_base: descriptor_chain
                    .last()
                    .map(|d| d.archived_name.to_string())
                    .unwrap_or_default(),
                found_base: "(end of wire chain)".to_string(),
            });
        }
        for (descriptor, wire) in descriptor_chain.iter().zip(wire_chain.iter()) {
            if descriptor.archived_name != wire.name {
                return Err(TypedStreamError::ClassHierarchyMismatch {
                    class: leaf_descriptor.archived_name.to_string(),
                    expected_base: descriptor.archived_name.to_string(),
                    found_base: wire.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Invokes each class's own contribution hook exactly once, root first.
    fn run_contribution_hooks(
        &mut self,
        leaf_descriptor: &ClassDescriptor,
        wire_chain: &[Rc<Class>],
        instance: &mut dyn KnownObject,
    ) -> Result<(), TypedStreamError> {
        let descriptor_chain = class_registry().descriptor_chain(leaf_descriptor.archived_name);
        for (descriptor, wire) in descriptor_chain.iter().zip(wire_chain.iter()).rev() {
            (descriptor.contribute)(instance, self, wire.version)?;
        }
        Ok(())
    }

    fn expect_end_object(&mut self) -> Result<(), TypedStreamError> {
        let head = self.reader.read_head_byte()?;
        if !EventReader::is_end_of_object(head) {
            return Err(invalid(
                self.reader.position(),
                "known object does not permit trailing data, but more was found",
            ));
        }
        Ok(())
    }

    fn read_trailing_groups(&mut self) -> Result<Vec<TypedGroup>, TypedStreamError> {
        let mut groups = Vec::new();
        loop {
            let head = self.reader.read_head_byte()?;
            if EventReader::is_end_of_object(head) {
                return Ok(groups);
            }
            groups.push(self.decode_typed_values_with_head(head)?);
        }
    }

    // ---- typed-value groups -----------------------------------------------------------

    fn decode_typed_values_with_head(&mut self, head: i8) -> Result<TypedGroup, TypedStreamError> {
        let encodings = self.reader.read_typed_values_header(Some(head))?;
        let mut values = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            values.push(self.decode_any_untyped(encoding)?);
        }
        Ok(TypedGroup { encodings, values })
    }

    /// Reads one full typed-value group (`BeginTypedValues` ... `EndTypedValues`).
    pub fn decode_typed_values(&mut self) -> Result<TypedGroup, TypedStreamError> {
        let head = self.reader.read_head_byte()?;
        self.decode_typed_values_with_head(head)
    }

    /// Reads one typed-value group and asserts its wire encodings tolerantly match
    /// `expected`, decoding each value using `expected`'s own encoding (which may carry
    /// struct field names the wire anonymized).
    pub fn decode_values_of_types(&mut self, expected: &[&[u8]]) -> Result<Vec<Value>, TypedStreamError> {
        let head = self.reader.read_head_byte()?;
        let wire_encodings = self.reader.read_typed_values_header(Some(head))?;
        if wire_encodings.len() != expected.len() {
            return Err(TypedStreamError::UnexpectedEncoding {
                expected: expected.iter().map(|e| String::from_utf8_lossy(e).into_owned()).collect::<Vec<_>>().join(""),
                found: wire_encodings
                    .iter()
                    .map(|e| String::from_utf8_lossy(e).into_owned())
                    .collect::<Vec<_>>()
                    .join(""),
            });
        }
        let mut values = Vec::with_capacity(expected.len());
        for (wire_enc, exp_enc) in wire_encodings.iter().zip(expected.iter()) {
            if !encoding::matches(wire_enc, exp_enc) {
                return Err(TypedStreamError::UnexpectedEncoding {
                    expected: String::from_utf8_lossy(exp_enc).into_owned(),
                    found: String::from_utf8_lossy(wire_enc).into_owned(),
                });
            }
            values.push(self.decode_any_untyped(exp_enc)?);
        }
        Ok(values)
    }

    /// Convenience single-value case of [`Unarchiver::decode_values_of_types`].
    pub fn decode_value_of_type(&mut self, expected: &[u8]) -> Result<Value, TypedStreamError> {
        let mut values = self.decode_values_of_types(&[expected])?;
        Ok(values.remove(0))
    }

    /// Decodes one signed-integer-typed field (`c`/`s`/`i`/`l`/`q`), for catalog code
    /// that would otherwise repeat the same `match` on every primitive field.
    pub fn decode_signed(&mut self, encoding: &[u8]) -> Result<i64, TypedStreamError> {
        match self.decode_value_of_type(encoding)? {
            Value::SignedInt(n) => Ok(n),
            other => Err(invalid(self.position(), format!("expected a signed integer, found {other:?}"))),
        }
    }

    /// Decodes one unsigned-integer-typed field (`C`/`S`/`I`/`L`/`Q`).
    pub fn decode_unsigned(&mut self, encoding: &[u8]) -> Result<u64, TypedStreamError> {
        match self.decode_value_of_type(encoding)? {
            Value::UnsignedInt(n) => Ok(n),
            other => Err(invalid(self.position(), format!("expected an unsigned integer, found {other:?}"))),
        }
    }

    /// Decodes an `f` field.
    pub fn decode_float(&mut self) -> Result<f32, TypedStreamError> {
        match self.decode_value_of_type(b"f")? {
            Value::Float(n) => Ok(n),
            other => Err(invalid(self.position(), format!("expected a float, found {other:?}"))),
        }
    }

    /// Decodes a `d` field.
    pub fn decode_double(&mut self) -> Result<f64, TypedStreamError> {
        match self.decode_value_of_type(b"d")? {
            Value::Double(n) => Ok(n),
            other => Err(invalid(self.position(), format!("expected a double, found {other:?}"))),
        }
    }

    /// Decodes a byte-sized field (`c`/`C`) known by convention to hold a 0/1 boolean,
    /// the idiom several Foundation/AppKit classes use in place of the dedicated `B`
    /// encoding (e.g. `NSURL`'s `is_relative` flag, `NSTextFieldCell`'s `draws_background`).
    pub fn decode_bool01(&mut self, encoding: &[u8]) -> Result<bool, TypedStreamError> {
        match self.decode_signed(encoding)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(invalid(self.position(), format!("unexpected value for boolean: {other}"))),
        }
    }

    /// Decodes `length` elements of type `element_encoding` by synthesizing and reading
    /// an `[N T]`-typed group.
    pub fn decode_array(&mut self, element_encoding: &[u8], length: usize) -> Result<Vec<Value>, TypedStreamError> {
        let mut synthesized = Vec::new();
        synthesized.push(b'[');
        synthesized.extend(length.to_string().into_bytes());
        synthesized.extend_from_slice(element_encoding);
        synthesized.push(b']');
        match self.decode_value_of_type(&synthesized)? {
            Value::Array(items) => Ok(items),
            Value::ByteArray(bytes) => Ok(bytes
                .into_iter()
                .map(|b| {
                    if element_encoding == b"c" {
                        Value::SignedInt(b as i8 as i64)
                    } else {
                        Value::UnsignedInt(b as u64)
                    }
                })
                .collect()),
            other => Err(invalid(self.reader.position(), format!("expected an array, found {other:?}"))),
        }
    }

    /// Decodes an `i` length followed by that many raw bytes; the primitive `NSData` is
    /// built from.
    pub fn decode_data_object(&mut self) -> Result<Vec<u8>, TypedStreamError> {
        let length = self.decode_value_of_type(b"i")?;
        let length = match length {
            Value::SignedInt(n) if n >= 0 => n as usize,
            Value::SignedInt(n) => {
                return Err(invalid(self.reader.position(), format!("data object length {n} is negative")))
            }
            other => return Err(invalid(self.reader.position(), format!("expected a length, found {other:?}"))),
        };
        match self.decode_array(b"c", length)? {
            values => Ok(values
                .into_iter()
                .map(|v| match v {
                    Value::SignedInt(n) => n as u8,
                    Value::UnsignedInt(n) => n as u8,
                    _ => 0,
                })
                .collect()),
        }
    }

    /// Decodes a data object, then delegates to the old-binary-plist decoder.
    pub fn decode_property_list(&mut self) -> Result<crate::old_binary_plist::PlistValue, TypedStreamError> {
        let bytes = self.decode_data_object()?;
        crate::old_binary_plist::decode(&bytes)
    }

    /// Drains the stream, returning every top-level typed-value group.
    pub fn decode_all(&mut self) -> Result<Vec<TypedGroup>, TypedStreamError> {
        let mut groups = Vec::new();
        while !self.reader.at_eof() {
            let head = self.reader.read_head_byte()?;
            groups.push(self.decode_typed_values_with_head(head)?);
        }
        Ok(groups)
    }

    /// Drains the stream and asserts it contains exactly one single-value group, returning
    /// that value.
    pub fn decode_single_root(&mut self) -> Result<Value, TypedStreamError> {
        let mut groups = self.decode_all()?;
        match groups.len() {
            0 => Err(TypedStreamError::NoRoots),
            1 => {
                let group = groups.remove(0);
                if group.values.len() != 1 {
                    return Err(TypedStreamError::MultipleRoots);
                }
                Ok(group.values.into_iter().next().unwrap())
            }
            _ => Err(TypedStreamError::MultipleRoots),
        }
    }

    /// Decodes an `@` field and, if it isn't nil, asserts it is (or wraps) an instance of
    /// the known class `class_name`. This is the Rust counterpart of the reference
    /// decoder's trick of passing a `KnownArchivedObject` subclass itself as an "expected
    /// type" to `decode_value_of_type`: catalog code names the class it expects and gets
    /// back the object, already checked.
    pub fn decode_known_object(&mut self, class_name: &str) -> Result<Option<Node>, TypedStreamError> {
        let node = match self.decode_value_of_type(b"@")? {
            Value::Object(node) => node,
            other => return Err(invalid(self.position(), format!("expected an object, found {other:?}"))),
        };
        if let Some(n) = &node {
            self.expect_known_class(n, class_name)?;
        }
        Ok(node)
    }

    /// Asserts that `node` is (or wraps) an instance of the known class `name`, for
    /// catalog code that needs to check a decoded `@` field's concrete type.
    pub fn expect_known_class(&self, node: &Node, name: &str) -> Result<(), TypedStreamError> {
        let found = node.borrow().known_instance().map(|i| i.archived_class_name().to_string());
        match found {
            Some(ref found_name) if found_name == name => Ok(()),
            Some(found_name) => Err(TypedStreamError::UnexpectedClass {
                expected: name.to_string(),
                found: found_name,
            }),
            None => Err(TypedStreamError::UnexpectedClass {
                expected: name.to_string(),
                found: "(unknown class)".to_string(),
            }),
        }
    }

    // ---- the core per-encoding dispatch -------------------------------------------------

    /// Reads one value already known to have encoding `encoding` (split from a just-read
    /// type-encoding string, or supplied by a caller that already validated it against
    /// the wire via [`Unarchiver::decode_values_of_types`]).
    pub fn decode_any_untyped(&mut self, encoding: &[u8]) -> Result<Value, TypedStreamError> {
        match encoding {
            b"B" => Ok(Value::Bool(self.reader.read_bool()?)),
            b"C" => Ok(Value::UnsignedInt(self.reader.read_literal_byte()? as u64)),
            b"c" => Ok(Value::SignedInt(self.reader.read_literal_byte()? as i8 as i64)),
            b"S" | b"I" | b"L" | b"Q" => Ok(Value::UnsignedInt(self.reader.read_unsigned_int(None)?)),
            b"s" | b"i" | b"l" | b"q" => Ok(Value::SignedInt(self.reader.read_signed_int(None)?)),
            b"f" => Ok(Value::Float(self.reader.read_float(None)?)),
            b"d" => Ok(Value::Double(self.reader.read_double(None)?)),
            b"*" => match self.reader.read_c_string(None)? {
                CStringRead::Nil => Ok(Value::CString(None)),
                CStringRead::Literal(bytes) => {
                    let index = self.table.push_c_string(bytes.clone());
                    let _ = index;
                    Ok(Value::CString(Some(Rc::from(bytes.into_boxed_slice()))))
                }
                CStringRead::Reference(index) => Ok(Value::CString(Some(self.table.get_c_string(index)?))),
            },
            b"%" => Ok(Value::Atom(self.reader.read_shared_string(None)?.map(|b| Rc::from(b.into_boxed_slice())))),
            b":" => Ok(Value::Selector(self.reader.read_shared_string(None)?.map(|b| Rc::from(b.into_boxed_slice())))),
            b"+" => Ok(match self.reader.read_unshared_string(None)? {
                Some(bytes) => Value::Bytes(bytes),
                None => Value::Nil,
            }),
            b"#" => Ok(match self.decode_class_value()? {
                Some(class) => Value::Class(class),
                None => Value::Nil,
            }),
            b"@" => Ok(Value::Object(self.decode_object_value()?)),
            b"!" => Ok(Value::Nil),
            _ if encoding.first() == Some(&b'[') => self.decode_array_value(encoding),
            _ if encoding.first() == Some(&b'{') => self.decode_struct_value(encoding),
            other => Err(invalid(
                self.reader.position(),
                format!("don't know how to decode a value with encoding {:?}", String::from_utf8_lossy(other)),
            )),
        }
    }

    fn decode_array_value(&mut self, encoding: &[u8]) -> Result<Value, TypedStreamError> {
        let (length, element_encoding) = encoding::parse_array(encoding)?;
        if element_encoding == b"c" || element_encoding == b"C" {
            let bytes = self.reader.read_raw_bytes(length)?;
            Ok(Value::ByteArray(bytes))
        } else {
            let mut items = Vec::with_capacity(length);
            for _ in 0..length {
                items.push(self.decode_any_untyped(element_encoding)?);
            }
            Ok(Value::Array(items))
        }
    }

    fn decode_struct_value(&mut self, encoding: &[u8]) -> Result<Value, TypedStreamError> {
        let (name, fields) = encoding::parse_struct(encoding)?;
        let mut values = Vec::with_capacity(fields.len());
        for field in &fields {
            values.push(self.decode_any_untyped(field)?);
        }
        // The wire is free to anonymize a struct's name (`{?=ff}` / `{=ff}`); if a known
        // struct's canonical encoding tolerantly matches what we just read, report the
        // registered name instead of the anonymized one, so a caller that did not know
        // the expected encoding up front (e.g. NSValue decoding by its own wire-reported
        // type_encoding) still recovers e.g. "_NSPoint" rather than nothing.
        let resolved_name = match name {
            Some(n) => Some(String::from_utf8_lossy(n).into_owned()),
            None => struct_registry().find_tolerant(encoding).map(|d| d.name.to_string()),
        };
        Ok(Value::Struct {
            name: resolved_name,
            fields: values,
        })
    }
}

/// Looks up a registered struct type by canonical encoding and, if the wire's struct name
/// is anonymous or matches, reports whether catalog code should treat `value` as that
/// struct. Catalog code calls this after `decode_value_of_type` with the struct's own
/// canonical encoding as `expected`, so the two are already known to shape-match; this
/// just resolves the registry lookup other classes' contribution hooks rely on.
pub fn lookup_struct(canonical_encoding: &[u8]) -> Option<&'static registry::StructDescriptor> {
    struct_registry().get(canonical_encoding)
}
