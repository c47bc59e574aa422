/*!
 The shared-object table: an insertion-ordered, kind-tagged table of C strings, classes,
 and objects, distinct from the event reader's shared-*string* table.
*/

use crate::error::{ReferenceKind, TypedStreamError};
use crate::unarchiver::value::{Class, Node, ObjectData};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Slot {
    CString(Rc<[u8]>),
    Class(Rc<Class>),
    /// The object's `Rc<RefCell<_>>` is allocated at reservation time, before its class
    /// or contents are read (see the object-construction protocol); the cell holds
    /// [`ObjectData::Reserved`] until [`SharedObjectTable::fill_object`] replaces it. A
    /// reference resolved while the cell is still reserved is exactly the circular- or
    /// self-reference case (spec §8 scenario e): the caller gets a clone of the same `Rc`
    /// the eventual contents will be written into, not a dangling placeholder.
    Object(Node),
}

/// Ordered, kind-tagged table of shared-object-table slots.
#[derive(Debug, Default)]
pub struct SharedObjectTable {
    slots: Vec<Slot>,
}

impl SharedObjectTable {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn push_c_string(&mut self, bytes: Vec<u8>) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot::CString(Rc::from(bytes.into_boxed_slice())));
        index
    }

    pub fn push_class(&mut self, class: Rc<Class>) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot::Class(class));
        index
    }

    /// Reserves a slot for a literal object before its class or contents are read,
    /// allocating the `Node` up front so a field that references the object back to
    /// itself (directly, or through a cycle) resolves to the same shared cell that
    /// [`fill_object`] will later populate.
    pub fn reserve_object(&mut self) -> Node {
        let node: Node = Rc::new(RefCell::new(ObjectData::Reserved));
        self.slots.push(Slot::Object(node.clone()));
        node
    }

    /// Replaces a reserved object's contents in place, so every clone of its `Node`
    /// (including ones handed out to circular references while construction was still in
    /// progress) observes the final data.
    pub fn fill_object(&self, node: &Node, data: ObjectData) {
        *node.borrow_mut() = data;
    }

    pub fn get_c_string(&self, index: usize) -> Result<Rc<[u8]>, TypedStreamError> {
        match self.slots.get(index) {
            Some(Slot::CString(bytes)) => Ok(bytes.clone()),
            Some(other) => Err(TypedStreamError::ReferenceKindMismatch {
                index,
                expected: ReferenceKind::CString,
                found: other.kind(),
            }),
            None => Err(TypedStreamError::OutOfBounds {
                at: index,
                what: "shared-object table slot",
            }),
        }
    }

    pub fn get_class(&self, index: usize) -> Result<Rc<Class>, TypedStreamError> {
        match self.slots.get(index) {
            Some(Slot::Class(class)) => Ok(class.clone()),
            Some(other) => Err(TypedStreamError::ReferenceKindMismatch {
                index,
                expected: ReferenceKind::Class,
                found: other.kind(),
            }),
            None => Err(TypedStreamError::OutOfBounds {
                at: index,
                what: "shared-object table slot",
            }),
        }
    }

    pub fn get_object(&self, index: usize) -> Result<Node, TypedStreamError> {
        match self.slots.get(index) {
            Some(Slot::Object(node)) => Ok(node.clone()),
            Some(other) => Err(TypedStreamError::ReferenceKindMismatch {
                index,
                expected: ReferenceKind::Object,
                found: other.kind(),
            }),
            None => Err(TypedStreamError::OutOfBounds {
                at: index,
                what: "shared-object table slot",
            }),
        }
    }
}

impl Slot {
    fn kind(&self) -> ReferenceKind {
        match self {
            Slot::CString(_) => ReferenceKind::CString,
            Slot::Class(_) => ReferenceKind::Class,
            Slot::Object(_) => ReferenceKind::Object,
        }
    }
}
