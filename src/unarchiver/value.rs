/*!
 The domain values the unarchiver produces: classes, decoded objects (known, partially
 known, or fully generic), and the generic `Value`/`TypedGroup` shapes used for untyped
 decoding and for the trailing data a generic wrapper collects.
*/

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A class descriptor as it appeared on the wire: name, version, and (if the chain
/// continued) its superclass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: String,
    pub version: i32,
    pub superclass: Option<Rc<Class>>,
}

impl Class {
    /// Walks `self` and its superclasses, most-derived first.
    pub fn chain(self: &Rc<Self>) -> Vec<Rc<Class>> {
        let mut out = Vec::new();
        let mut current = Some(self.clone());
        while let Some(class) = current {
            current = class.superclass.clone();
            out.push(class);
        }
        out
    }
}

/// Implemented by every concrete archived class this crate knows how to decode. A known
/// class's state is entirely populated by its own and its superclasses' contribution
/// hooks (see [`crate::unarchiver::registry::ClassDescriptor`]); this trait only needs to
/// support runtime downcasting so that [`ObjectData`] can store heterogeneous known
/// instances behind one dynamically-dispatched type.
pub trait KnownObject: fmt::Debug {
    fn archived_class_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One atomic on-wire typed-value group: a non-empty list of type encodings paired with
/// one decoded value per encoding.
#[derive(Debug, Clone)]
pub struct TypedGroup {
    pub encodings: Vec<Vec<u8>>,
    pub values: Vec<Value>,
}

impl TypedGroup {
    /// Convenience accessor for the common single-encoding case.
    pub fn single(&self) -> Option<&Value> {
        if self.values.len() == 1 {
            self.values.first()
        } else {
            None
        }
    }
}

/// Any value the unarchiver can decode.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    /// Unshared raw bytes (`+`).
    Bytes(Vec<u8>),
    /// A shared, deduplicated C string (`*`).
    CString(Option<Rc<[u8]>>),
    /// A shared string under `%` (atom).
    Atom(Option<Rc<[u8]>>),
    /// A shared string under `:` (selector).
    Selector(Option<Rc<[u8]>>),
    Class(Rc<Class>),
    Object(Option<Node>),
    Array(Vec<Value>),
    ByteArray(Vec<u8>),
    Struct { name: Option<String>, fields: Vec<Value> },
}

impl Value {
    pub fn as_object(&self) -> Option<&Node> {
        match self {
            Value::Object(Some(node)) => Some(node),
            _ => None,
        }
    }
}

/// The three shapes a decoded literal object can take, per the object-construction
/// protocol: an instance of a class this crate knows about, a known ancestor wrapped with
/// unknown trailing subclass data, or a fully opaque object of an unknown class.
#[derive(Debug)]
pub enum ObjectData {
    Known(Box<dyn KnownObject>),
    PartialKnown {
        super_instance: Box<dyn KnownObject>,
        wire_class: Rc<Class>,
        tail: Vec<TypedGroup>,
    },
    Unknown {
        wire_class: Rc<Class>,
        tail: Vec<TypedGroup>,
    },
    /// A literal object's slot between reservation and construction completing. Only
    /// observable by a field that references the object back to itself (directly or
    /// through a cycle) while its own fields are still being read; never observed once
    /// decoding of the whole stream finishes successfully.
    Reserved,
}

impl ObjectData {
    /// Returns the known (possibly partial) instance, if any, unwrapping the
    /// `PartialKnown` case. This is `is_instance_of_known` from the design notes.
    pub fn known_instance(&self) -> Option<&dyn KnownObject> {
        match self {
            ObjectData::Known(instance) => Some(instance.as_ref()),
            ObjectData::PartialKnown { super_instance, .. } => Some(super_instance.as_ref()),
            ObjectData::Unknown { .. } | ObjectData::Reserved => None,
        }
    }
}

/// A decoded object's shared, possibly-cyclic identity. Objects are constructed once, then
/// mutated in place while their fields are read from the stream; after that they are
/// treated as frozen. `Rc`+`RefCell` give the reference semantics a back-reference or a
/// circular reference needs: two `Node`s that came from the same wire reference are
/// `Rc::ptr_eq`.
pub type Node = Rc<RefCell<ObjectData>>;
