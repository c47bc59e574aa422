/*!
 Value-type structs registered with the known-struct registry: the float-precision
 `NSPoint`/`NSSize`/`NSRect` triad and the double-precision Core Graphics equivalents.
 Grounded in `types/foundation.py`'s `NSPoint`/`NSSize`/`NSRect` and
 `types/core_graphics.py`.

 None of these are read directly off the wire as a single `{Name=...}`-encoded value by
 any catalog class in this crate (`NSView`, the one user, reads its frame/bounds as eight
 separate floats and assembles the struct afterwards, exactly as `NSView._init_from_unarchiver_`
 does) — they exist so the struct registry has canonical entries to tolerantly match
 against when a wire struct's name has been anonymized (see [`crate::unarchiver::lookup_struct`]
 and the registry fill-in `decode_struct_value` performs).
*/

use crate::unarchiver::registry::{StructDescriptor, StructRegistry};

/// A point in the float-precision AppKit coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NSPoint {
    pub x: f32,
    pub y: f32,
}

/// A size in the float-precision AppKit coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NSSize {
    pub width: f32,
    pub height: f32,
}

/// A rectangle in the float-precision AppKit coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NSRect {
    pub origin: NSPoint,
    pub size: NSSize,
}

impl NSRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: NSPoint { x, y },
            size: NSSize { width, height },
        }
    }
}

/// A point in the double-precision Core Graphics coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CGPoint {
    pub x: f64,
    pub y: f64,
}

/// A size in the double-precision Core Graphics coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CGSize {
    pub width: f64,
    pub height: f64,
}

/// A 2D vector in the double-precision Core Graphics coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CGVector {
    pub dx: f64,
    pub dy: f64,
}

/// A rectangle in the double-precision Core Graphics coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CGRect {
    pub origin: CGPoint,
    pub size: CGSize,
}

pub(crate) fn register(registry: &mut StructRegistry) {
    registry.register(StructDescriptor {
        name: "_NSPoint",
        field_encodings: &[b"f", b"f"],
    });
    registry.register(StructDescriptor {
        name: "_NSSize",
        field_encodings: &[b"f", b"f"],
    });
    registry.register(StructDescriptor {
        name: "_NSRect",
        field_encodings: &[b"{_NSPoint=ff}", b"{_NSSize=ff}"],
    });
    registry.register(StructDescriptor {
        name: "CGPoint",
        field_encodings: &[b"d", b"d"],
    });
    registry.register(StructDescriptor {
        name: "CGSize",
        field_encodings: &[b"d", b"d"],
    });
    registry.register(StructDescriptor {
        name: "CGVector",
        field_encodings: &[b"d", b"d"],
    });
    registry.register(StructDescriptor {
        name: "CGRect",
        field_encodings: &[b"{CGPoint=dd}", b"{CGSize=dd}"],
    });
}
