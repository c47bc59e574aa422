/*!
 The Foundation class catalog: value containers (`NSData`, `NSDate`, `NSString`,
 `NSValue`, `NSNumber`) and collections (`NSArray`, `NSSet`, `NSDictionary`, and their
 mutable subclasses). Grounded in `types/foundation.py`.

 Several pairs here (`NSData`/`NSMutableData`, `NSString`/`NSMutableString`,
 `NSArray`/`NSMutableArray`, `NSSet`/`NSMutableSet`, `NSDictionary`/`NSMutableDictionary`,
 `NSValue`/`NSNumber`) are, on the wire, the same fields read by the same base-class
 contribution hook — the mutable/derived side's own hook only checks its class version and
 reads nothing further (inheriting the original implementation's rule that a subclass must
 never re-read data its superclass's hook already consumed). Rather than give each pair two
 Rust structs and reconcile which one actually holds the decoded fields, both sides of a
 pair share one Rust struct carrying the archived class name as a field, tagged
 differently by each half's `construct` closure.
*/

use super::support::{decode_object_elements, downcast, node_to_string, require_node, require_version};
use crate::error::{invalid, TypedStreamError};
use chrono::TimeZone;
use crate::unarchiver::registry::{ClassDescriptor, ClassRegistry};
use crate::unarchiver::value::{KnownObject, Node, Value};
use crate::unarchiver::Unarchiver;
use std::any::Any;

/// The root of every archived Foundation object this crate knows about. Contributes
/// nothing: `NSObject`'s one archived version carries no fields of its own.
#[derive(Debug, Default)]
pub struct NSObject;

impl KnownObject for NSObject {
    fn archived_class_name(&self) -> &'static str {
        "NSObject"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsobject(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSObject", version, 0)
}

/// An immutable byte blob. Shared with [`NSMutableData`] on the wire: see the module doc.
#[derive(Debug)]
pub struct NSData {
    archived_class_name: &'static str,
    pub bytes: Vec<u8>,
}

impl KnownObject for NSData {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsdata(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSData", version, 0)?;
    let bytes = unarchiver.decode_data_object()?;
    instance.as_any_mut().downcast_mut::<NSData>().expect("constructed as NSData").bytes = bytes;
    Ok(())
}

fn contribute_nsmutabledata(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMutableData", version, 0)
}

/// The Cocoa reference date, 2001-01-01 00:00:00 UTC, that every archived `NSDate`'s
/// `double` offset is measured from.
pub fn cocoa_reference_date() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()
}

/// An absolute point in time, stored on the wire as a `double` offset (seconds, may be
/// fractional or negative) from the Cocoa reference date.
#[derive(Debug, Clone)]
pub struct NSDate {
    pub reference_interval: f64,
    pub value: chrono::DateTime<chrono::Utc>,
}

impl Default for NSDate {
    fn default() -> Self {
        NSDate {
            reference_interval: 0.0,
            value: cocoa_reference_date(),
        }
    }
}

impl KnownObject for NSDate {
    fn archived_class_name(&self) -> &'static str {
        "NSDate"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsdate(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSDate", version, 0)?;
    let offset = unarchiver.decode_double()?;
    let micros = chrono::Duration::microseconds((offset * 1_000_000.0).round() as i64);
    let value = cocoa_reference_date()
        .checked_add_signed(micros)
        .ok_or_else(|| invalid(unarchiver.position(), format!("NSDate offset {offset} overflows a representable date")))?;
    let date = instance.as_any_mut().downcast_mut::<NSDate>().expect("constructed as NSDate");
    date.reference_interval = offset;
    date.value = value;
    Ok(())
}

/// A string, decoded from an unshared UTF-8 byte run (`+`). Shared with
/// [`NSMutableString`] on the wire: see the module doc.
#[derive(Debug)]
pub struct NSString {
    archived_class_name: &'static str,
    pub value: String,
}

impl KnownObject for NSString {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `NSString`'s wire representation is an unshared byte run (`+`) containing UTF-8, not
/// the NEXTSTEP-8-bit encoding the much older `old_binary_plist` format embeds elsewhere.
fn decode_nsstring_bytes(unarchiver: &mut Unarchiver) -> Result<String, TypedStreamError> {
    let bytes = match unarchiver.decode_value_of_type(b"+")? {
        Value::Bytes(bytes) => bytes,
        Value::Nil => Vec::new(),
        other => return Err(invalid(unarchiver.position(), format!("expected string bytes, found {other:?}"))),
    };
    String::from_utf8(bytes).map_err(|err| invalid(unarchiver.position(), format!("NSString bytes were not valid UTF-8: {err}")))
}

fn contribute_nsstring(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSString", version, 1)?;
    let value = decode_nsstring_bytes(unarchiver)?;
    instance.as_any_mut().downcast_mut::<NSString>().expect("constructed as NSString").value = value;
    Ok(())
}

fn contribute_nsmutablestring(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMutableString", version, 1)
}

/// A URL, stored on the wire as a flag byte (absolute vs. relative-to-`base`), a nested
/// base `NSURL` (read only when relative), and finally the URL string itself. Field order
/// matches the original implementation exactly: the base is read before the string.
#[derive(Debug, Default)]
pub struct NSURL {
    pub relative_string: String,
    pub base: Option<Box<NSURL>>,
}

impl Clone for NSURL {
    fn clone(&self) -> Self {
        NSURL {
            relative_string: self.relative_string.clone(),
            base: self.base.clone(),
        }
    }
}

impl KnownObject for NSURL {
    fn archived_class_name(&self) -> &'static str {
        "NSURL"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsurl(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSURL", version, 0)?;
    let is_relative = unarchiver.decode_bool01(b"c")?;
    let base = if is_relative {
        let base_node = unarchiver.decode_known_object("NSURL")?;
        let base_node = require_node(unarchiver, base_node, "NSURL's base")?;
        Some(Box::new(downcast::<NSURL>(&base_node)?.clone()))
    } else {
        None
    };
    let string_node = unarchiver.decode_known_object("NSString")?;
    let relative_string = node_to_string(&require_node(unarchiver, string_node, "NSURL's string")?)?;
    let url = instance.as_any_mut().downcast_mut::<NSURL>().expect("constructed as NSURL");
    url.relative_string = relative_string;
    url.base = base;
    Ok(())
}

/// A boxed non-object value: a struct, or a primitive boxed under its own Objective-C
/// type encoding. Shared with [`NSNumber`] on the wire: see the module doc.
#[derive(Debug)]
pub struct NSValue {
    archived_class_name: &'static str,
    pub type_encoding: Vec<u8>,
    pub value: Value,
}

impl KnownObject for NSValue {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsvalue(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSValue", version, 0)?;
    let type_encoding = match unarchiver.decode_value_of_type(b"*")? {
        Value::CString(Some(bytes)) => bytes.to_vec(),
        other => return Err(invalid(unarchiver.position(), format!("expected NSValue's type encoding, found {other:?}"))),
    };
    let value = unarchiver.decode_any_untyped(&type_encoding)?;
    let instance = instance.as_any_mut().downcast_mut::<NSValue>().expect("constructed as NSValue");
    instance.type_encoding = type_encoding;
    instance.value = value;
    Ok(())
}

fn contribute_nsnumber(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSNumber", version, 0)
}

/// An ordered collection. Shared with [`NSMutableArray`] on the wire: see the module doc.
#[derive(Debug)]
pub struct NSArray {
    archived_class_name: &'static str,
    pub elements: Vec<Option<Node>>,
}

impl KnownObject for NSArray {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsarray(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSArray", version, 0)?;
    let count = unarchiver.decode_signed(b"i")?;
    if count < 0 {
        return Err(invalid(unarchiver.position(), format!("NSArray element count cannot be negative: {count}")));
    }
    let elements = decode_object_elements(unarchiver, count as usize)?;
    instance.as_any_mut().downcast_mut::<NSArray>().expect("constructed as NSArray").elements = elements;
    Ok(())
}

fn contribute_nsmutablearray(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMutableArray", version, 0)
}

/// An unordered collection. Its element count is read as unsigned with no negative check,
/// unlike `NSArray`'s signed count — the original implementation does not guard against a
/// negative `NSSet` count, and this crate preserves that asymmetry rather than inventing a
/// check the format doesn't make. Shared with [`NSMutableSet`] on the wire.
#[derive(Debug)]
pub struct NSSet {
    archived_class_name: &'static str,
    pub elements: Vec<Option<Node>>,
}

impl KnownObject for NSSet {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsset(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSSet", version, 0)?;
    let count = unarchiver.decode_unsigned(b"I")?;
    let elements = decode_object_elements(unarchiver, count as usize)?;
    instance.as_any_mut().downcast_mut::<NSSet>().expect("constructed as NSSet").elements = elements;
    Ok(())
}

fn contribute_nsmutableset(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMutableSet", version, 0)
}

/// An unordered key/value collection, archived as a count followed by that many keys and
/// then that many values (parallel arrays, not interleaved pairs). Shared with
/// [`NSMutableDictionary`] on the wire.
#[derive(Debug)]
pub struct NSDictionary {
    archived_class_name: &'static str,
    pub keys: Vec<Option<Node>>,
    pub values: Vec<Option<Node>>,
}

impl KnownObject for NSDictionary {
    fn archived_class_name(&self) -> &'static str {
        self.archived_class_name
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsdictionary(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSDictionary", version, 0)?;
    let count = unarchiver.decode_signed(b"i")?;
    if count < 0 {
        return Err(invalid(unarchiver.position(), format!("NSDictionary element count cannot be negative: {count}")));
    }
    let keys = decode_object_elements(unarchiver, count as usize)?;
    let values = decode_object_elements(unarchiver, count as usize)?;
    let dict = instance.as_any_mut().downcast_mut::<NSDictionary>().expect("constructed as NSDictionary");
    dict.keys = keys;
    dict.values = values;
    Ok(())
}

fn contribute_nsmutabledictionary(_instance: &mut dyn KnownObject, _unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMutableDictionary", version, 0)
}

pub(crate) fn register(registry: &mut ClassRegistry) {
    registry.register(ClassDescriptor {
        archived_name: "NSObject",
        base_archived_name: None,
        construct: || Box::<NSObject>::default(),
        contribute: contribute_nsobject,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSData",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSData {
                archived_class_name: "NSData",
                bytes: Vec::new(),
            })
        },
        contribute: contribute_nsdata,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMutableData",
        base_archived_name: Some("NSData"),
        construct: || {
            Box::new(NSData {
                archived_class_name: "NSMutableData",
                bytes: Vec::new(),
            })
        },
        contribute: contribute_nsmutabledata,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSDate",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSDate>::default(),
        contribute: contribute_nsdate,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSString",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSString {
                archived_class_name: "NSString",
                value: String::new(),
            })
        },
        contribute: contribute_nsstring,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMutableString",
        base_archived_name: Some("NSString"),
        construct: || {
            Box::new(NSString {
                archived_class_name: "NSMutableString",
                value: String::new(),
            })
        },
        contribute: contribute_nsmutablestring,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSURL",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSURL>::default(),
        contribute: contribute_nsurl,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSValue",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSValue {
                archived_class_name: "NSValue",
                type_encoding: Vec::new(),
                value: Value::Nil,
            })
        },
        contribute: contribute_nsvalue,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSNumber",
        base_archived_name: Some("NSValue"),
        construct: || {
            Box::new(NSValue {
                archived_class_name: "NSNumber",
                type_encoding: Vec::new(),
                value: Value::Nil,
            })
        },
        contribute: contribute_nsnumber,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSArray",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSArray {
                archived_class_name: "NSArray",
                elements: Vec::new(),
            })
        },
        contribute: contribute_nsarray,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMutableArray",
        base_archived_name: Some("NSArray"),
        construct: || {
            Box::new(NSArray {
                archived_class_name: "NSMutableArray",
                elements: Vec::new(),
            })
        },
        contribute: contribute_nsmutablearray,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSSet",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSSet {
                archived_class_name: "NSSet",
                elements: Vec::new(),
            })
        },
        contribute: contribute_nsset,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMutableSet",
        base_archived_name: Some("NSSet"),
        construct: || {
            Box::new(NSSet {
                archived_class_name: "NSMutableSet",
                elements: Vec::new(),
            })
        },
        contribute: contribute_nsmutableset,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSDictionary",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSDictionary {
                archived_class_name: "NSDictionary",
                keys: Vec::new(),
                values: Vec::new(),
            })
        },
        contribute: contribute_nsdictionary,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMutableDictionary",
        base_archived_name: Some("NSDictionary"),
        construct: || {
            Box::new(NSDictionary {
                archived_class_name: "NSMutableDictionary",
                keys: Vec::new(),
                values: Vec::new(),
            })
        },
        contribute: contribute_nsmutabledictionary,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nsvalue_and_nsnumber_share_the_rust_type() {
        let mut registry = ClassRegistry::new();
        register(&mut registry);
        let number = registry.get("NSNumber").unwrap();
        let instance = (number.construct)();
        assert_eq!(instance.archived_class_name(), "NSNumber");
        assert!(instance.as_any().downcast_ref::<NSValue>().is_some());
    }

    #[test]
    fn nsurl_without_base_has_no_base() {
        let url = NSURL {
            relative_string: "https://example.com".to_string(),
            base: None,
        };
        assert!(url.base.is_none());
    }

    #[test]
    fn nsmutablearray_reports_its_own_class_name() {
        let mut registry = ClassRegistry::new();
        register(&mut registry);
        let descriptor = registry.get("NSMutableArray").unwrap();
        let instance = (descriptor.construct)();
        assert_eq!(instance.archived_class_name(), "NSMutableArray");
    }

    #[test]
    fn nsdate_default_is_the_cocoa_reference_date() {
        let date = NSDate::default();
        assert_eq!(date.reference_interval, 0.0);
        assert_eq!(date.value, cocoa_reference_date());
    }

    #[test]
    fn nsdate_offset_is_measured_from_the_reference_date() {
        let mut date = NSDate::default();
        date.reference_interval = 86400.0;
        date.value = cocoa_reference_date() + chrono::Duration::days(1);
        assert_eq!(date.value.to_string(), "2001-01-02 00:00:00 UTC");
    }
}
