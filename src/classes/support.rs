/*!
 Small helpers shared by every file in the built-in class catalog: extracting a
 [`Node`]'s concrete known instance by downcast, and raising a consistent
 [`TypedStreamError::UnsupportedClassVersion`] for the common "one accepted version, or a
 small fixed set of them" shape every contribution hook starts with.
*/

use crate::error::{invalid, TypedStreamError};
use crate::unarchiver::value::{KnownObject, Node, Value};
use crate::unarchiver::Unarchiver;

/// Raises [`TypedStreamError::UnsupportedClassVersion`] unless `version` is `expected`.
pub(crate) fn require_version(class: &'static str, version: i32, expected: i32) -> Result<(), TypedStreamError> {
    if version != expected {
        return Err(TypedStreamError::UnsupportedClassVersion {
            class: class.to_string(),
            version,
        });
    }
    Ok(())
}

/// Raises [`TypedStreamError::UnsupportedClassVersion`] unless `version` is one of `accepted`.
pub(crate) fn require_version_in(class: &'static str, version: i32, accepted: &[i32]) -> Result<(), TypedStreamError> {
    if !accepted.contains(&version) {
        return Err(TypedStreamError::UnsupportedClassVersion {
            class: class.to_string(),
            version,
        });
    }
    Ok(())
}

/// Downcasts a decoded node's known instance to a concrete catalog type. Used by class
/// contribution hooks that embed another known class by value (e.g. `NSColor`'s
/// `NamedValue` embeds another `NSColor`).
pub(crate) fn downcast<'a, T: 'static>(node: &'a Node) -> Result<std::cell::Ref<'a, T>, TypedStreamError> {
    std::cell::Ref::filter_map(node.borrow(), |data| {
        data.known_instance().and_then(|known| known.as_any().downcast_ref::<T>())
    })
    .map_err(|_| invalid(0, "decoded object was not the expected known class"))
}

/// Pulls a field's `Node` out of the already-checked-by-class-name object an
/// [`Unarchiver::decode_known_object`] call returned, failing if it was nil. Several
/// fields the reference decoder treats as always-present (e.g. `NSColor.NamedValue`'s
/// nested color) are modeled here as a hard error on nil rather than an `Option`, to
/// match the reference decoder's implicit assumption.
pub(crate) fn require_node(unarchiver: &Unarchiver, node: Option<Node>, what: &str) -> Result<Node, TypedStreamError> {
    node.ok_or_else(|| invalid(unarchiver.position(), format!("{what} cannot be nil")))
}

/// Clones an `NSString`-typed node's decoded value out, used wherever a field is
/// unconditionally a string.
pub(crate) fn node_to_string(node: &Node) -> Result<String, TypedStreamError> {
    Ok(downcast::<super::foundation::NSString>(node)?.value.clone())
}

/// Decodes `count` consecutive `@`-typed fields into the object (or nil) they each
/// resolved to. The common element-reading loop behind every array/set/list/dictionary
/// contribution hook in the catalog.
pub(crate) fn decode_object_elements(unarchiver: &mut Unarchiver, count: usize) -> Result<Vec<Option<Node>>, TypedStreamError> {
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        match unarchiver.decode_value_of_type(b"@")? {
            Value::Object(node) => elements.push(node),
            other => return Err(invalid(unarchiver.position(), format!("expected an object element, found {other:?}"))),
        }
    }
    Ok(elements)
}

/// Unwraps an already-decoded `@`-typed [`Value`] (e.g. one element of a combined
/// [`Unarchiver::decode_values_of_types`] call) as an `NSString`, checking its class.
/// Several AppKit classes decode a string field this way instead of calling
/// [`Unarchiver::decode_known_object`] directly, because the string sits alongside other
/// fields in one typed-value group the wire requires to be read together.
pub(crate) fn value_as_known_string(unarchiver: &Unarchiver, value: Value) -> Result<Option<String>, TypedStreamError> {
    match value {
        Value::Object(None) => Ok(None),
        Value::Object(Some(node)) => {
            unarchiver.expect_known_class(&node, "NSString")?;
            Ok(Some(node_to_string(&node)?))
        }
        other => Err(invalid(unarchiver.position(), format!("expected an NSString, found {other:?}"))),
    }
}

/// Like [`value_as_known_string`] but fails if the field was nil.
pub(crate) fn value_as_required_string(unarchiver: &Unarchiver, value: Value, what: &str) -> Result<String, TypedStreamError> {
    value_as_known_string(unarchiver, value)?.ok_or_else(|| invalid(unarchiver.position(), format!("{what} cannot be nil")))
}

/// Unwraps an already-decoded `@`-typed [`Value`] as a plain `Node`, for fields a caller
/// will downcast or re-check itself.
pub(crate) fn value_as_object(unarchiver: &Unarchiver, value: Value) -> Result<Option<Node>, TypedStreamError> {
    match value {
        Value::Object(node) => Ok(node),
        other => Err(invalid(unarchiver.position(), format!("expected an object, found {other:?}"))),
    }
}
