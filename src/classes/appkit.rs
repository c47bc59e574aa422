/*!
 A working subset of AppKit: the Interface Builder archiving glue (`NSClassSwapper`,
 `NSCustomObject`, `NSIBObjectData`), menus, a two-level cell hierarchy, and a two-level
 view hierarchy. Grounded in `types/appkit.py`.

 `NSBezierPath`, `NSCustomResource`, `NSImageCell`, `NSButtonCell`, `NSButtonImageSource`,
 `NSTextFieldCell`, `NSComboBoxCell`, `NSTableHeaderCell`, `NSIBHelpConnector`, and the
 `NSNibConnector` family are not implemented; none of the classes this crate does
 implement require decoding them by name (a `connections` entry or an `on_state_image`
 Node simply decodes generically when its class is unregistered).

 A few multi-level hierarchies here (`NSCell`/`NSActionCell`, `NSResponder`/`NSView`/
 `NSControl`) genuinely add fields at each level, unlike the trivial Foundation "mutable"
 subclasses. Since every contribution hook in a wire class's chain runs against the same
 constructed instance, each such family shares one merged Rust struct holding every level's
 fields, tagged with the archived class name actually found on the wire.
*/

use super::structs::NSRect;
use super::support::{downcast, require_node, require_version, require_version_in, value_as_known_string, value_as_object, value_as_required_string};
use crate::error::{invalid, TypedStreamError};
use crate::unarchiver::registry::{ClassDescriptor, ClassRegistry};
use crate::unarchiver::value::{KnownObject, Node, ObjectData, Value};
use crate::unarchiver::Unarchiver;
use std::any::Any;
use std::rc::Rc;

/// The original implementation does not reject a negative count here (Python's
/// `range(negative)` silently iterates zero times); this mirrors that rather than
/// invent a stricter check the format doesn't make.
fn non_negative_count(n: i64) -> usize {
    if n < 0 {
        0
    } else {
        n as usize
    }
}

fn expect_nil(unarchiver: &Unarchiver, value: Value, what: &str) -> Result<(), TypedStreamError> {
    match value {
        Value::Object(None) | Value::Nil => Ok(()),
        other => Err(invalid(unarchiver.position(), format!("{what} is not nil: {other:?}"))),
    }
}

/// An Interface Builder template: a named class plus a nested instance constructed from a
/// separately-decoded [`Class`] descriptor rather than a literal `@` reference. See
/// [`Unarchiver::construct_object_data`] for why this doesn't go through the object table.
#[derive(Debug, Default)]
pub struct NSClassSwapper {
    pub class_name: String,
    pub template: Option<ObjectData>,
}

impl KnownObject for NSClassSwapper {
    fn archived_class_name(&self) -> &'static str {
        "NSClassSwapper"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsclassswapper(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSClassSwapper", version, 42)?;
    let mut fields = unarchiver.decode_values_of_types(&[b"@", b"#"])?.into_iter();
    let class_name = value_as_required_string(unarchiver, fields.next().unwrap(), "NSClassSwapper's class name")?;
    let template_class = match fields.next().unwrap() {
        Value::Class(class) => class,
        other => return Err(invalid(unarchiver.position(), format!("expected NSClassSwapper's template class, found {other:?}"))),
    };
    let template = unarchiver.construct_object_data(template_class)?;
    let swapper = instance.as_any_mut().downcast_mut::<NSClassSwapper>().expect("constructed as NSClassSwapper");
    swapper.class_name = class_name;
    swapper.template = Some(template);
    Ok(())
}

/// `NSColor`'s boxed payload, shaped by its `kind` tag.
#[derive(Debug, Clone)]
pub enum NSColorValue {
    CalibratedOrDeviceRgba { red: f32, green: f32, blue: f32, alpha: f32 },
    CalibratedOrDeviceWhiteAlpha { white: f32, alpha: f32 },
    DeviceCmyka { cyan: f32, magenta: f32, yellow: f32, black: f32, alpha: f32 },
    Named { group: String, name: String, color: Box<NSColor> },
}

/// A color value. `kind` is the raw wire tag (1 = calibrated RGBA, 2 = device RGBA, 3 =
/// calibrated white/alpha, 4 = device white/alpha, 5 = device CMYKA, 6 = named) that
/// `value`'s variant was read according to.
#[derive(Debug, Clone)]
pub struct NSColor {
    pub kind: i64,
    pub value: NSColorValue,
}

impl KnownObject for NSColor {
    fn archived_class_name(&self) -> &'static str {
        "NSColor"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nscolor(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSColor", version, 0)?;
    let kind = unarchiver.decode_signed(b"c")?;
    let value = match kind {
        1 | 2 => {
            let parts = unarchiver.decode_values_of_types(&[b"f", b"f", b"f", b"f"])?;
            NSColorValue::CalibratedOrDeviceRgba {
                red: as_float(&parts[0]),
                green: as_float(&parts[1]),
                blue: as_float(&parts[2]),
                alpha: as_float(&parts[3]),
            }
        }
        3 | 4 => {
            let parts = unarchiver.decode_values_of_types(&[b"f", b"f"])?;
            NSColorValue::CalibratedOrDeviceWhiteAlpha {
                white: as_float(&parts[0]),
                alpha: as_float(&parts[1]),
            }
        }
        5 => {
            let parts = unarchiver.decode_values_of_types(&[b"f", b"f", b"f", b"f", b"f"])?;
            NSColorValue::DeviceCmyka {
                cyan: as_float(&parts[0]),
                magenta: as_float(&parts[1]),
                yellow: as_float(&parts[2]),
                black: as_float(&parts[3]),
                alpha: as_float(&parts[4]),
            }
        }
        6 => {
            let group_node = unarchiver.decode_known_object("NSString")?;
            let group = super::support::node_to_string(&require_node(unarchiver, group_node, "NSColor's named group")?)?;
            let name_node = unarchiver.decode_known_object("NSString")?;
            let name = super::support::node_to_string(&require_node(unarchiver, name_node, "NSColor's named name")?)?;
            let color_node = unarchiver.decode_known_object("NSColor")?;
            let color_node = require_node(unarchiver, color_node, "NSColor's named color")?;
            let color = downcast::<NSColor>(&color_node)?.clone();
            NSColorValue::Named {
                group,
                name,
                color: Box::new(color),
            }
        }
        other => return Err(invalid(unarchiver.position(), format!("unhandled NSColor kind: {other}"))),
    };
    let instance = instance.as_any_mut().downcast_mut::<NSColor>().expect("constructed as NSColor");
    instance.kind = kind;
    instance.value = value;
    Ok(())
}

fn as_float(value: &Value) -> f32 {
    match value {
        Value::Float(f) => *f,
        Value::Double(d) => *d as f32,
        _ => 0.0,
    }
}

/// An Interface Builder placeholder object: a class name plus the object it stands in for.
#[derive(Debug, Default)]
pub struct NSCustomObject {
    pub class_name: String,
    pub object: Option<Node>,
}

impl KnownObject for NSCustomObject {
    fn archived_class_name(&self) -> &'static str {
        "NSCustomObject"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nscustomobject(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSCustomObject", version, 41)?;
    let mut fields = unarchiver.decode_values_of_types(&[b"@", b"@"])?.into_iter();
    let class_name = value_as_required_string(unarchiver, fields.next().unwrap(), "NSCustomObject's class name")?;
    let object = value_as_object(unarchiver, fields.next().unwrap())?;
    let custom = instance.as_any_mut().downcast_mut::<NSCustomObject>().expect("constructed as NSCustomObject");
    custom.class_name = class_name;
    custom.object = object;
    Ok(())
}

/// A font: a name (read via the old-binary-plist property list format, not a typed
/// field), a point size, and four unexplained flag bytes the original implementation
/// leaves uninterpreted.
#[derive(Debug, Default)]
pub struct NSFont {
    pub name: String,
    pub size: f32,
    pub flags_unknown: [i64; 4],
}

impl KnownObject for NSFont {
    fn archived_class_name(&self) -> &'static str {
        "NSFont"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsfont(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version_in("NSFont", version, &[21, 30])?;
    let name = unarchiver.decode_property_list()?.into_string()?;
    let size = unarchiver.decode_float()?;
    let flags_unknown = [
        unarchiver.decode_signed(b"c")?,
        unarchiver.decode_signed(b"c")?,
        unarchiver.decode_signed(b"c")?,
        unarchiver.decode_signed(b"c")?,
    ];
    let font = instance.as_any_mut().downcast_mut::<NSFont>().expect("constructed as NSFont");
    font.name = name;
    font.size = size;
    font.flags_unknown = flags_unknown;
    Ok(())
}

/// The Interface Builder object graph itself: the document root, parent/name/ID lookup
/// tables keyed by object (kept as parallel association lists here, since an archived
/// `Node` has no stable hash), the connections array, and the framework identifier IB
/// stamped the archive with.
#[derive(Debug, Default)]
pub struct NSIBObjectData {
    pub root: Option<Node>,
    pub object_parents: Vec<(Option<Node>, Option<Node>)>,
    pub object_names: Vec<(Option<Node>, Option<String>)>,
    pub unknown_set: Option<Node>,
    pub connections: Vec<Option<Node>>,
    pub unknown_object: Option<Node>,
    pub object_ids: Vec<(Option<Node>, i64)>,
    pub next_object_id: i64,
    pub swapper_class_names: Vec<(Option<Node>, String)>,
    pub target_framework: String,
}

impl KnownObject for NSIBObjectData {
    fn archived_class_name(&self) -> &'static str {
        "NSIBObjectData"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsibobjectdata(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSIBObjectData", version, 224)?;

    let root = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;

    let parents_count = non_negative_count(unarchiver.decode_signed(b"i")?);
    let mut object_parents = Vec::with_capacity(parents_count);
    for _ in 0..parents_count {
        let mut pair = unarchiver.decode_values_of_types(&[b"@", b"@"])?.into_iter();
        let child = value_as_object(unarchiver, pair.next().unwrap())?;
        let parent = value_as_object(unarchiver, pair.next().unwrap())?;
        object_parents.push((child, parent));
    }

    let names_count = non_negative_count(unarchiver.decode_signed(b"i")?);
    let mut object_names = Vec::with_capacity(names_count);
    for _ in 0..names_count {
        let mut pair = unarchiver.decode_values_of_types(&[b"@", b"@"])?.into_iter();
        let obj = value_as_object(unarchiver, pair.next().unwrap())?;
        let name = value_as_known_string(unarchiver, pair.next().unwrap())?;
        object_names.push((obj, name));
    }

    let unknown_set = unarchiver.decode_known_object("NSSet")?;

    let array_node = unarchiver.decode_known_object("NSArray")?;
    let connections = match array_node {
        Some(node) => downcast::<super::foundation::NSArray>(&node)?.elements.clone(),
        None => Vec::new(),
    };

    let unknown_object = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;

    let oids_count = non_negative_count(unarchiver.decode_signed(b"i")?);
    let mut object_ids = Vec::with_capacity(oids_count);
    for _ in 0..oids_count {
        let mut pair = unarchiver.decode_values_of_types(&[b"@", b"i"])?.into_iter();
        let obj = value_as_object(unarchiver, pair.next().unwrap())?;
        let oid = match pair.next().unwrap() {
            Value::SignedInt(n) => n,
            other => return Err(invalid(unarchiver.position(), format!("expected an object ID, found {other:?}"))),
        };
        object_ids.push((obj, oid));
    }

    let next_object_id = unarchiver.decode_signed(b"i")?;

    let swapper_names_count = non_negative_count(unarchiver.decode_signed(b"i")?);
    let mut swapper_class_names = Vec::with_capacity(swapper_names_count);
    for _ in 0..swapper_names_count {
        let mut pair = unarchiver.decode_values_of_types(&[b"@", b"@"])?.into_iter();
        let obj = value_as_object(unarchiver, pair.next().unwrap())?;
        let class_name = value_as_required_string(unarchiver, pair.next().unwrap(), "a swapper class name")?;
        swapper_class_names.push((obj, class_name));
    }

    let framework_node = unarchiver.decode_known_object("NSString")?;
    let target_framework = super::support::node_to_string(&require_node(unarchiver, framework_node, "NSIBObjectData's target framework")?)?;

    let data = instance.as_any_mut().downcast_mut::<NSIBObjectData>().expect("constructed as NSIBObjectData");
    data.root = root;
    data.object_parents = object_parents;
    data.object_names = object_names;
    data.unknown_set = unknown_set;
    data.connections = connections;
    data.unknown_object = unknown_object;
    data.object_ids = object_ids;
    data.next_object_id = next_object_id;
    data.swapper_class_names = swapper_class_names;
    data.target_framework = target_framework;
    Ok(())
}

/// A single menu entry. `menu` and `submenu` are checked to be `NSMenu` instances;
/// `target` is left generic since it can be any responder.
#[derive(Debug, Default)]
pub struct NSMenuItem {
    pub menu: Option<Node>,
    pub flags: u32,
    pub title: String,
    pub key_equivalent: String,
    pub modifier_flags: u32,
    pub state: i64,
    pub on_state_image: Option<Node>,
    pub off_state_image: Option<Node>,
    pub mixed_state_image: Option<Node>,
    pub action: Option<Rc<[u8]>>,
    pub unknown_int_2: i64,
    pub target: Option<Node>,
    pub submenu: Option<Node>,
}

impl KnownObject for NSMenuItem {
    fn archived_class_name(&self) -> &'static str {
        "NSMenuItem"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsmenuitem(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version_in("NSMenuItem", version, &[505, 671])?;
    let menu = unarchiver.decode_known_object("NSMenu")?;

    let mut fields = unarchiver
        .decode_values_of_types(&[b"i", b"@", b"@", b"I", b"I", b"i", b"@", b"@", b"@", b"@", b":", b"i", b"@"])?
        .into_iter();
    let flags = match fields.next().unwrap() {
        Value::SignedInt(n) => n as u32,
        other => return Err(invalid(unarchiver.position(), format!("expected flags, found {other:?}"))),
    };
    let title = value_as_required_string(unarchiver, fields.next().unwrap(), "NSMenuItem's title")?;
    let key_equivalent = value_as_known_string(unarchiver, fields.next().unwrap())?.unwrap_or_default();
    let modifier_flags = match fields.next().unwrap() {
        Value::UnsignedInt(n) => n as u32,
        other => return Err(invalid(unarchiver.position(), format!("expected modifier flags, found {other:?}"))),
    };
    let unknown_int_1 = match fields.next().unwrap() {
        Value::UnsignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected an unknown int, found {other:?}"))),
    };
    if unknown_int_1 != 0x7fffffff {
        return Err(invalid(unarchiver.position(), format!("NSMenuItem's unknown int 1 is not 0x7fffffff: {unknown_int_1:#x}")));
    }
    let state = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected a state, found {other:?}"))),
    };
    expect_nil(unarchiver, fields.next().unwrap(), "NSMenuItem's unknown object 1")?;
    let on_state_image = value_as_object(unarchiver, fields.next().unwrap())?;
    let off_state_image = value_as_object(unarchiver, fields.next().unwrap())?;
    let mixed_state_image = value_as_object(unarchiver, fields.next().unwrap())?;
    let action = match fields.next().unwrap() {
        Value::Selector(sel) => sel,
        other => return Err(invalid(unarchiver.position(), format!("expected a selector, found {other:?}"))),
    };
    let unknown_int_2 = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected an unknown int, found {other:?}"))),
    };
    expect_nil(unarchiver, fields.next().unwrap(), "NSMenuItem's unknown object 2")?;

    let target = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    let submenu = unarchiver.decode_known_object("NSMenu")?;

    let item = instance.as_any_mut().downcast_mut::<NSMenuItem>().expect("constructed as NSMenuItem");
    item.menu = menu;
    item.flags = flags;
    item.title = title;
    item.key_equivalent = key_equivalent;
    item.modifier_flags = modifier_flags;
    item.state = state;
    item.on_state_image = on_state_image;
    item.off_state_image = off_state_image;
    item.mixed_state_image = mixed_state_image;
    item.action = action;
    item.unknown_int_2 = unknown_int_2;
    item.target = target;
    item.submenu = submenu;
    Ok(())
}

/// A menu: a title, its items (each asserted to be an [`NSMenuItem`]), and an optional
/// identifier.
#[derive(Debug, Default)]
pub struct NSMenu {
    pub title: String,
    pub items: Vec<Option<Node>>,
    pub identifier: Option<String>,
}

impl KnownObject for NSMenu {
    fn archived_class_name(&self) -> &'static str {
        "NSMenu"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn contribute_nsmenu(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSMenu", version, 204)?;
    let mut fields = unarchiver.decode_values_of_types(&[b"i", b"@", b"@", b"@"])?.into_iter();
    let unknown_int = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected an unknown int, found {other:?}"))),
    };
    if unknown_int != 0 {
        return Err(invalid(unarchiver.position(), format!("NSMenu's unknown int is not 0: {unknown_int}")));
    }
    let title = value_as_required_string(unarchiver, fields.next().unwrap(), "NSMenu's title")?;
    let items_node = value_as_object(unarchiver, fields.next().unwrap())?;
    let items = match items_node {
        Some(node) => {
            let array = downcast::<super::foundation::NSArray>(&node)?;
            for element in &array.elements {
                if let Some(element) = element {
                    unarchiver.expect_known_class(element, "NSMenuItem")?;
                }
            }
            array.elements.clone()
        }
        None => Vec::new(),
    };
    let identifier = value_as_known_string(unarchiver, fields.next().unwrap())?;
    let menu = instance.as_any_mut().downcast_mut::<NSMenu>().expect("constructed as NSMenu");
    menu.title = title;
    menu.items = items;
    menu.identifier = identifier;
    Ok(())
}

/// `NSCell` merged with [`NSActionCell`]'s fields (see the module doc): `tag`, `action`,
/// `target`, and `control_view` are only populated when the wire class was
/// `NSActionCell` (or a further subclass this crate doesn't otherwise know).
#[derive(Debug, Default)]
pub struct NSCell {
    archived_class_name: &'static str,
    pub flags_unknown: (u32, u32),
    pub title_or_image: Option<Node>,
    pub font: Option<Node>,
    pub tag: i64,
    pub action: Option<Rc<[u8]>>,
    pub target: Option<Node>,
    pub control_view: Option<Node>,
}

impl KnownObject for NSCell {
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

fn contribute_nscell(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSCell", version, 65)?;
    let flags = unarchiver.decode_values_of_types(&[b"i", b"i"])?;
    let flags_unknown = (as_u32(&flags[0]), as_u32(&flags[1]));
    let mut rest = unarchiver.decode_values_of_types(&[b"@", b"@", b"@", b"@"])?.into_iter();
    let title_or_image = value_as_object(unarchiver, rest.next().unwrap())?;
    let font = value_as_object(unarchiver, rest.next().unwrap())?;
    expect_nil(unarchiver, rest.next().unwrap(), "NSCell's unknown object 3")?;
    expect_nil(unarchiver, rest.next().unwrap(), "NSCell's unknown object 4")?;
    let cell = instance.as_any_mut().downcast_mut::<NSCell>().expect("constructed as NSCell");
    cell.flags_unknown = flags_unknown;
    cell.title_or_image = title_or_image;
    cell.font = font;
    Ok(())
}

fn as_u32(value: &Value) -> u32 {
    match value {
        Value::SignedInt(n) => *n as u32,
        Value::UnsignedInt(n) => *n as u32,
        _ => 0,
    }
}

fn contribute_nsactioncell(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSActionCell", version, 17)?;
    let mut fields = unarchiver.decode_values_of_types(&[b"i", b":"])?.into_iter();
    let tag = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected a tag, found {other:?}"))),
    };
    let action = match fields.next().unwrap() {
        Value::Selector(sel) => sel,
        other => return Err(invalid(unarchiver.position(), format!("expected a selector, found {other:?}"))),
    };
    let target = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    let control_view = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    let cell = instance.as_any_mut().downcast_mut::<NSCell>().expect("constructed as NSCell");
    cell.tag = tag;
    cell.action = action;
    cell.target = target;
    cell.control_view = control_view;
    Ok(())
}

/// `NSResponder` merged with [`NSView`] and [`NSControl`]'s fields (see the module doc):
/// the view- and control-level fields are only populated when the wire class was `NSView`,
/// `NSControl`, or a further subclass this crate doesn't otherwise know.
#[derive(Debug, Default)]
pub struct NSView {
    archived_class_name: &'static str,
    pub next_responder: Option<Node>,
    pub flags: u32,
    pub subviews: Vec<Option<Node>>,
    pub registered_dragged_types: Vec<String>,
    pub frame: NSRect,
    pub bounds: NSRect,
    pub superview: Option<Node>,
    pub content_view: Option<Node>,
    pub control_unknown_int: i64,
    pub control_enabled: bool,
    pub cell: Option<Node>,
}

impl KnownObject for NSView {
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

fn contribute_nsresponder(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSResponder", version, 0)?;
    let next_responder = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    instance.as_any_mut().downcast_mut::<NSView>().expect("constructed as NSView").next_responder = next_responder;
    Ok(())
}

fn contribute_nsview(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSView", version, 41)?;
    let flags = unarchiver.decode_signed(b"i")? as u32;

    let mut fields = unarchiver
        .decode_values_of_types(&[b"@", b"@", b"@", b"@", b"f", b"f", b"f", b"f", b"f", b"f", b"f", b"f"])?
        .into_iter();
    let subviews_node = value_as_object(unarchiver, fields.next().unwrap())?;
    let subviews = match subviews_node {
        Some(node) => downcast::<super::foundation::NSArray>(&node)?.elements.clone(),
        None => Vec::new(),
    };
    expect_nil(unarchiver, fields.next().unwrap(), "NSView's unknown object 2")?;
    expect_nil(unarchiver, fields.next().unwrap(), "NSView's unknown object 3")?;
    let dragged_types_node = value_as_object(unarchiver, fields.next().unwrap())?;
    let mut registered_dragged_types = Vec::new();
    if let Some(node) = dragged_types_node {
        for element in &downcast::<super::foundation::NSSet>(&node)?.elements {
            if let Some(element) = element {
                unarchiver.expect_known_class(element, "NSString")?;
                registered_dragged_types.push(super::support::node_to_string(element)?);
            }
        }
    }
    let frame = NSRect::new(as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()));
    let bounds = NSRect::new(as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()), as_float(&fields.next().unwrap()));

    let superview = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    expect_nil(unarchiver, unarchiver.decode_value_of_type(b"@")?, "NSView's unknown object 6")?;
    let content_view = value_as_object(unarchiver, unarchiver.decode_value_of_type(b"@")?)?;
    expect_nil(unarchiver, unarchiver.decode_value_of_type(b"@")?, "NSView's unknown object 8")?;

    let view = instance.as_any_mut().downcast_mut::<NSView>().expect("constructed as NSView");
    view.flags = flags;
    view.subviews = subviews;
    view.registered_dragged_types = registered_dragged_types;
    view.frame = frame;
    view.bounds = bounds;
    view.superview = superview;
    view.content_view = content_view;
    Ok(())
}

fn contribute_nscontrol(instance: &mut dyn KnownObject, unarchiver: &mut Unarchiver, version: i32) -> Result<(), TypedStreamError> {
    require_version("NSControl", version, 41)?;
    let mut fields = unarchiver.decode_values_of_types(&[b"i", b"c", b"c", b"@"])?.into_iter();
    let control_unknown_int = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected an unknown int, found {other:?}"))),
    };
    let control_enabled = match fields.next().unwrap() {
        Value::SignedInt(0) => false,
        Value::SignedInt(1) => true,
        other => return Err(invalid(unarchiver.position(), format!("unexpected value for boolean: {other:?}"))),
    };
    let unknown_int_3 = match fields.next().unwrap() {
        Value::SignedInt(n) => n,
        other => return Err(invalid(unarchiver.position(), format!("expected an unknown int, found {other:?}"))),
    };
    if unknown_int_3 != 0 {
        return Err(invalid(unarchiver.position(), format!("NSControl's unknown int 3 is not 0: {unknown_int_3}")));
    }
    let cell = value_as_object(unarchiver, fields.next().unwrap())?;
    let view = instance.as_any_mut().downcast_mut::<NSView>().expect("constructed as NSView");
    view.control_unknown_int = control_unknown_int;
    view.control_enabled = control_enabled;
    view.cell = cell;
    Ok(())
}

pub(crate) fn register(registry: &mut ClassRegistry) {
    registry.register(ClassDescriptor {
        archived_name: "NSClassSwapper",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSClassSwapper>::default(),
        contribute: contribute_nsclassswapper,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSColor",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSColor {
                kind: 0,
                value: NSColorValue::CalibratedOrDeviceWhiteAlpha { white: 0.0, alpha: 0.0 },
            })
        },
        contribute: contribute_nscolor,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSCustomObject",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSCustomObject>::default(),
        contribute: contribute_nscustomobject,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSFont",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSFont>::default(),
        contribute: contribute_nsfont,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSIBObjectData",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSIBObjectData>::default(),
        contribute: contribute_nsibobjectdata,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMenuItem",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSMenuItem>::default(),
        contribute: contribute_nsmenuitem,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSMenu",
        base_archived_name: Some("NSObject"),
        construct: || Box::<NSMenu>::default(),
        contribute: contribute_nsmenu,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSCell",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSCell {
                archived_class_name: "NSCell",
                ..Default::default()
            })
        },
        contribute: contribute_nscell,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSActionCell",
        base_archived_name: Some("NSCell"),
        construct: || {
            Box::new(NSCell {
                archived_class_name: "NSActionCell",
                ..Default::default()
            })
        },
        contribute: contribute_nsactioncell,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSResponder",
        base_archived_name: Some("NSObject"),
        construct: || {
            Box::new(NSView {
                archived_class_name: "NSResponder",
                ..Default::default()
            })
        },
        contribute: contribute_nsresponder,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSView",
        base_archived_name: Some("NSResponder"),
        construct: || {
            Box::new(NSView {
                archived_class_name: "NSView",
                ..Default::default()
            })
        },
        contribute: contribute_nsview,
    });
    registry.register(ClassDescriptor {
        archived_name: "NSControl",
        base_archived_name: Some("NSView"),
        construct: || {
            Box::new(NSView {
                archived_class_name: "NSControl",
                ..Default::default()
            })
        },
        contribute: contribute_nscontrol,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nscell_and_nsactioncell_share_the_rust_type() {
        let mut registry = ClassRegistry::new();
        register(&mut registry);
        let action_cell = registry.get("NSActionCell").unwrap();
        let instance = (action_cell.construct)();
        assert_eq!(instance.archived_class_name(), "NSActionCell");
        assert!(instance.as_any().downcast_ref::<NSCell>().is_some());
    }

    #[test]
    fn nscontrol_shares_the_nsview_rust_type() {
        let mut registry = ClassRegistry::new();
        register(&mut registry);
        let control = registry.get("NSControl").unwrap();
        let instance = (control.construct)();
        assert_eq!(instance.archived_class_name(), "NSControl");
        assert!(instance.as_any().downcast_ref::<NSView>().is_some());
    }

    #[test]
    fn non_negative_count_treats_negative_as_zero() {
        assert_eq!(non_negative_count(-5), 0);
        assert_eq!(non_negative_count(3), 3);
    }
}
