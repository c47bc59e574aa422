/*!
 The older, pre-Foundation NeXTSTEP collection classes: `Object` (the NeXTSTEP root,
 distinct from `NSObject`), `List`, `HashTable`, and `Storage`. Grounded in
 `types/nextstep.py`.

 `StreamTable` (an `HashTable` subclass whose values are themselves nested typedstreams)
 is not implemented: it is rare outside of NeXTSTEP-era property-list caches and pulls in
 a recursive re-unarchiving step this catalog doesn't otherwise need.
*/

use super::support::{decode_object_elements, require_version_in};
use crate::error::{invalid, TypedStreamError};
use crate::unarchiver::registry::{ClassDescriptor, ClassRegistry};
use crate::unarchiver::value::{KnownObject, Node, Value};
use crate::unarchiver::Unarchiver;
use std::any::Any;

macro_rules! known_object_impl {
    ($ty:ty, $name:literal) => {
        impl KnownObject for $ty {
            fn archived_class_name(&self) -> &'static str {
                $name
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

/// The NeXTSTEP root class. Distinct from Foundation's `NSObject`, even though neither
/// carries any fields of its own.
#[derive(Debug, Default)]
pub struct Object;
known_object_impl!(Object, "Object");

fn contribute_object(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version_in("Object", version, &[0])
}

/// An ordered collection, predating `NSArray`.
#[derive(Debug, Default)]
pub struct List {
    pub elements: Vec<Option<Node>>,
}
known_object_impl!(List, "List");

fn contribute_list(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    let count = match version {
        0 => {
            let values = unarchiver.decode_values_of_types(&[b"i", b"i"])?;
            match values[1] {
                Value::SignedInt(n) => n,
                ref other => return Err(invalid(unarchiver.position(), format!("expected a count, found {other:?}"))),
            }
        }
        1 => unarchiver.decode_signed(b"i")?,
        other => return Err(TypedStreamError::UnsupportedClassVersion { class: "List".to_string(), version: other }),
    };
    if count < 0 {
        return Err(invalid(unarchiver.position(), format!("List element count cannot be negative: {count}")));
    }
    // Version 1 omits the backing array entirely when the list is empty.
    let elements = if version == 1 && count == 0 {
        Vec::new()
    } else {
        decode_object_elements(unarchiver, count as usize)?
    };
    instance.as_any_mut().downcast_mut::<List>().expect("constructed as List").elements = elements;
    Ok(())
}

fn type_encoding_bytes(unarchiver: &Unarchiver, value: Value) -> Result<Vec<u8>, TypedStreamError> {
    match value {
        Value::CString(Some(bytes)) => Ok(bytes.to_vec()),
        Value::Atom(Some(bytes)) => Ok(bytes.to_vec()),
        other => Err(invalid(unarchiver.position(), format!("expected a type encoding, found {other:?}"))),
    }
}

/// An unordered key/value collection, predating `NSDictionary`. Unlike `NSDictionary`,
/// keys and values are not necessarily objects: `key_type_encoding`/`value_type_encoding`
/// name whatever Objective-C type each entry was archived under.
#[derive(Debug, Default)]
pub struct HashTable {
    pub key_type_encoding: Vec<u8>,
    pub value_type_encoding: Vec<u8>,
    pub entries: Vec<(Value, Value)>,
}
known_object_impl!(HashTable, "HashTable");

fn contribute_hashtable(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    let string_type_encoding: &[u8] = match version {
        0 => b"*",
        1 => b"%",
        other => return Err(TypedStreamError::UnsupportedClassVersion { class: "HashTable".to_string(), version: other }),
    };
    let header = unarchiver.decode_values_of_types(&[b"i", string_type_encoding, string_type_encoding])?;
    let count = match header[0] {
        Value::SignedInt(n) => n,
        ref other => return Err(invalid(unarchiver.position(), format!("expected a count, found {other:?}"))),
    };
    if count < 0 {
        return Err(invalid(unarchiver.position(), format!("HashTable element count cannot be negative: {count}")));
    }
    let key_type_encoding = type_encoding_bytes(unarchiver, header[1].clone())?;
    let value_type_encoding = type_encoding_bytes(unarchiver, header[2].clone())?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = unarchiver.decode_any_untyped(&key_type_encoding)?;
        let value = unarchiver.decode_any_untyped(&value_type_encoding)?;
        entries.push((key, value));
    }
    let table = instance.as_any_mut().downcast_mut::<HashTable>().expect("constructed as HashTable");
    table.key_type_encoding = key_type_encoding;
    table.value_type_encoding = value_type_encoding;
    table.entries = entries;
    Ok(())
}

/// A homogeneous array of non-object values, tagged with the Objective-C type encoding
/// and per-element byte size its elements were archived under.
#[derive(Debug, Default)]
pub struct Storage {
    pub element_type_encoding: Vec<u8>,
    pub element_size: i64,
    pub elements: Vec<Value>,
}
known_object_impl!(Storage, "Storage");

fn contribute_storage(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    let (element_type_encoding, element_size, count) = match version {
        0 => {
            let header = unarchiver.decode_values_of_types(&[b"*", b"i", b"i", b"i"])?;
            let element_type_encoding = type_encoding_bytes(unarchiver, header[0].clone())?;
            let element_size = match header[1] {
                Value::SignedInt(n) => n,
                ref other => return Err(invalid(unarchiver.position(), format!("expected an element size, found {other:?}"))),
            };
            let count = match header[3] {
                Value::SignedInt(n) => n,
                ref other => return Err(invalid(unarchiver.position(), format!("expected a count, found {other:?}"))),
            };
            (element_type_encoding, element_size, count)
        }
        1 => {
            let header = unarchiver.decode_values_of_types(&[b"%", b"i", b"i"])?;
            let element_type_encoding = type_encoding_bytes(unarchiver, header[0].clone())?;
            let element_size = match header[1] {
                Value::SignedInt(n) => n,
                ref other => return Err(invalid(unarchiver.position(), format!("expected an element size, found {other:?}"))),
            };
            let count = match header[2] {
                Value::SignedInt(n) => n,
                ref other => return Err(invalid(unarchiver.position(), format!("expected a count, found {other:?}"))),
            };
            (element_type_encoding, element_size, count)
        }
        other => return Err(TypedStreamError::UnsupportedClassVersion { class: "Storage".to_string(), version: other }),
    };
    if count < 0 {
        return Err(invalid(unarchiver.position(), format!("Storage element count cannot be negative: {count}")));
    }
    let elements = if version == 1 && count == 0 {
        Vec::new()
    } else {
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(unarchiver.decode_any_untyped(&element_type_encoding)?);
        }
        elements
    };
    let storage = instance.as_any_mut().downcast_mut::<Storage>().expect("constructed as Storage");
    storage.element_type_encoding = element_type_encoding;
    storage.element_size = element_size;
    storage.elements = elements;
    Ok(())
}

pub(crate) fn register(registry: &mut ClassRegistry) {
    registry.register(ClassDescriptor {
        archived_name: "Object",
        base_archived_name: None,
        construct: || Box::<Object>::default(),
        contribute: contribute_object,
    });
    registry.register(ClassDescriptor {
        archived_name: "List",
        base_archived_name: Some("Object"),
        construct: || Box::<List>::default(),
        contribute: contribute_list,
    });
    registry.register(ClassDescriptor {
        archived_name: "HashTable",
        base_archived_name: Some("Object"),
        construct: || Box::<HashTable>::default(),
        contribute: contribute_hashtable,
    });
    registry.register(ClassDescriptor {
        archived_name: "Storage",
        base_archived_name: Some("Object"),
        construct: || Box::<Storage>::default(),
        contribute: contribute_storage,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_version_1_empty_has_no_backing_array() {
        // Regression guard for the version-1 "don't store the array at all when empty"
        // special case; nothing to decode, just documents the invariant in-module.
        let list = List { elements: Vec::new() };
        assert!(list.elements.is_empty());
    }
}
