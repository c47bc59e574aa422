/*!
 The built-in catalog of known archived classes and structs: enough of Foundation,
 AppKit, and the older NeXTSTEP collection classes to decode the object graphs a typical
 Interface Builder `.nib` or `NSArchiver`-produced file contains, plus the handful of
 value-type structs (`NSPoint`/`NSRect`, the Core Graphics equivalents) those classes
 embed.

 Each submodule owns one family of classes and a `register` function that adds its
 descriptors to a registry; [`register_all_classes`]/[`register_all_structs`] just fan out
 to each submodule, matching how `typedstream/types/__init__.py` collects each
 type-module's classes into the original implementation's class lookup table.
*/

pub mod appkit;
pub mod foundation;
pub mod nextstep;
mod support;
pub mod structs;

use crate::unarchiver::registry::{ClassRegistry, StructRegistry};

pub(crate) fn register_all_classes(registry: &mut ClassRegistry) {
    foundation::register(registry);
    nextstep::register(registry);
    appkit::register(registry);
}

pub(crate) fn register_all_structs(registry: &mut StructRegistry) {
    structs::register(registry);
}
