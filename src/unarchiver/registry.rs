/*!
 The known-class and known-struct registries: name/encoding-keyed maps populated once at
 startup and treated as read-only afterwards, plus the superclass-chain resolution
 algorithm the unarchiver uses to decide how to wrap a wire class.
*/

use super::value::KnownObject;
use crate::error::TypedStreamError;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use super::Unarchiver;

/// A known archived class: its wire name, the name of its declared base class (if any),
/// a constructor producing a zeroed/default instance, and the per-class contribution hook
/// that reads exactly the fields that class version contributes.
pub struct ClassDescriptor {
    pub archived_name: &'static str,
    pub base_archived_name: Option<&'static str>,
    pub construct: fn() -> Box<dyn KnownObject>,
    pub contribute: fn(&mut dyn KnownObject, &mut Unarchiver, i32) -> Result<(), TypedStreamError>,
}

/// A known struct type: its canonical `{Name=...}` encoding and field encodings.
pub struct StructDescriptor {
    pub name: &'static str,
    pub field_encodings: &'static [&'static [u8]],
}

#[derive(Default)]
pub struct ClassRegistry {
    by_name: HashMap<&'static str, ClassDescriptor>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ClassDescriptor) {
        self.by_name.insert(descriptor.archived_name, descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.by_name.get(name)
    }

    /// The chain of descriptors from `name` up to its root, most-derived first, by
    /// repeatedly following `base_archived_name`.
    pub fn descriptor_chain(&self, name: &str) -> Vec<&ClassDescriptor> {
        let mut out = Vec::new();
        let mut current = self.get(name);
        while let Some(descriptor) = current {
            out.push(descriptor);
            current = descriptor.base_archived_name.and_then(|base| self.get(base));
        }
        out
    }
}

#[derive(Default)]
pub struct StructRegistry {
    by_encoding: HashMap<Vec<u8>, StructDescriptor>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: StructDescriptor) {
        let encoding = crate::encoding::build_struct_encoding(
            Some(descriptor.name.as_bytes()),
            &descriptor.field_encodings.iter().map(|f| *f).collect::<Vec<_>>(),
        );
        self.by_encoding.insert(encoding, descriptor);
    }

    pub fn get(&self, canonical_encoding: &[u8]) -> Option<&StructDescriptor> {
        self.by_encoding.get(canonical_encoding)
    }

    /// Finds a registered struct whose canonical encoding tolerantly matches
    /// `wire_encoding` (see [`crate::encoding::matches`]), even if the wire anonymized
    /// its struct name. Used to recover a registered struct's name when nothing in the
    /// call chain already named an expected encoding to match against.
    pub fn find_tolerant(&self, wire_encoding: &[u8]) -> Option<&StructDescriptor> {
        self.by_encoding
            .iter()
            .find(|(canonical, _)| crate::encoding::matches(wire_encoding, canonical))
            .map(|(_, descriptor)| descriptor)
    }
}

/// The outcome of resolving a wire class name/chain against the class registry, per the
/// object-construction protocol (§4.4/§4.5 of the format specification).
pub enum Resolution<'a> {
    /// No class anywhere in the wire chain is known.
    Unknown,
    /// `descriptor` is the nearest known ancestor; `depth` wire classes (counted from the
    /// leaf) sit above it and are not known.
    Ancestor { descriptor: &'a ClassDescriptor, depth: usize },
    /// The wire's leaf class is known exactly.
    Exact { descriptor: &'a ClassDescriptor },
}

impl ClassRegistry {
    /// Resolves a wire superclass chain (leaf first) against the registry.
    pub fn resolve(&self, wire_chain_names: &[&str]) -> Resolution<'_> {
        for (depth, name) in wire_chain_names.iter().enumerate() {
            if let Some(descriptor) = self.get(name) {
                return if depth == 0 {
                    Resolution::Exact { descriptor }
                } else {
                    Resolution::Ancestor { descriptor, depth }
                };
            }
        }
        Resolution::Unknown
    }
}

static CLASS_REGISTRY: OnceLock<ClassRegistry> = OnceLock::new();
static STRUCT_REGISTRY: OnceLock<StructRegistry> = OnceLock::new();
static PENDING_CLASSES: Mutex<Vec<ClassDescriptor>> = Mutex::new(Vec::new());
static PENDING_STRUCTS: Mutex<Vec<StructDescriptor>> = Mutex::new(Vec::new());

/// The process-wide class registry, populated with this crate's built-in catalog (plus
/// anything queued with [`register_archived_class`] beforehand) on first access, and
/// read-only thereafter.
pub fn class_registry() -> &'static ClassRegistry {
    CLASS_REGISTRY.get_or_init(|| {
        let mut registry = ClassRegistry::new();
        crate::classes::register_all_classes(&mut registry);
        for descriptor in PENDING_CLASSES.lock().unwrap().drain(..) {
            registry.register(descriptor);
        }
        registry
    })
}

/// The process-wide struct registry, populated with this crate's built-in value-type
/// catalog (plus anything queued with [`register_struct_class`] beforehand) on first
/// access, and read-only thereafter.
pub fn struct_registry() -> &'static StructRegistry {
    STRUCT_REGISTRY.get_or_init(|| {
        let mut registry = StructRegistry::new();
        crate::classes::register_all_structs(&mut registry);
        for descriptor in PENDING_STRUCTS.lock().unwrap().drain(..) {
            registry.register(descriptor);
        }
        registry
    })
}

/// Queues an additional archived-class descriptor for the process-wide registry.
///
/// This only has an effect before the first call to [`class_registry`] (directly, or
/// indirectly through any decode operation) in the process; the registry is populated once
/// and treated as read-only afterwards, so later calls are silently ignored. Callers that
/// need this should register their classes during program startup, before constructing any
/// [`crate::unarchiver::Unarchiver`].
pub fn register_archived_class(descriptor: ClassDescriptor) {
    PENDING_CLASSES.lock().unwrap().push(descriptor);
}

/// Queues an additional struct descriptor for the process-wide registry. See
/// [`register_archived_class`] for the same before-first-use caveat.
pub fn register_struct_class(descriptor: StructDescriptor) {
    PENDING_STRUCTS.lock().unwrap().push(descriptor);
}
