#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod classes;
pub mod encoding;
pub mod error;
pub mod event;
mod old_binary_plist;
pub mod table;
pub mod unarchiver;

pub use error::TypedStreamError;
pub use event::{Event, EventReader, Header};
pub use old_binary_plist::PlistValue;
pub use unarchiver::registry::{
    register_archived_class, register_struct_class, ClassDescriptor, StructDescriptor,
};
pub use unarchiver::value::{Class, KnownObject, Node, ObjectData, TypedGroup, Value};
pub use unarchiver::Unarchiver;
