//! The native scene database contract.
//!
//! `SceneDatabase` is everything the binding layer needs from the toolkit:
//! runtime type queries, container refcounting, typed field primitives, kit
//! parts, group children and engine connections. Ids are plain handles; a
//! stale id never panics and simply answers `None`, `false` or an empty list.

use std::fmt;

use crate::catalog::FieldStorage;
use crate::types::TypeTag;
use crate::values::{Image, NumericBuffer, Plane};

/// Handle to a native container (node, engine or generic field container).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// A field addressed by its owning container and declaration index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub container: ContainerId,
    pub index: usize,
}

/// An engine output addressed by its engine and declaration index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub container: ContainerId,
    pub index: usize,
}

/// The master end of a field connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Connection {
    Field(FieldRef),
    Output(OutputRef),
}

impl Connection {
    pub fn container(&self) -> ContainerId {
        match self {
            Connection::Field(f) => f.container,
            Connection::Output(o) => o.container,
        }
    }
}

/// One entry of a kit's part catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartInfo {
    pub name: String,
    /// Type every occupant must derive from.
    pub part_type: String,
    /// Type built when the part is created on demand.
    pub default_type: String,
}

pub trait SceneDatabase: Send + Sync {
    // --- Type system ---

    fn type_from_name(&self, name: &str) -> Option<TypeTag>;
    fn type_name(&self, tag: TypeTag) -> Option<String>;
    fn parent_type(&self, tag: TypeTag) -> Option<TypeTag>;

    fn parent_type_name(&self, tag: TypeTag) -> Option<String> {
        self.parent_type(tag).and_then(|p| self.type_name(p))
    }

    /// True when `tag` equals `ancestor` or inherits from it.
    fn is_type_derived_from(&self, tag: TypeTag, ancestor: TypeTag) -> bool;
    fn can_create_instance(&self, tag: TypeTag) -> bool;
    /// Every type derived from `ancestor`, excluding `ancestor` itself.
    fn derived_types(&self, ancestor: TypeTag) -> Vec<TypeTag>;
    /// Storage family of a field type, inherited when not declared directly.
    fn field_storage(&self, tag: TypeTag) -> Option<FieldStorage>;

    // --- Containers ---

    /// New container of type `tag` with a reference count of zero.
    fn create_instance(&self, tag: TypeTag) -> Option<ContainerId>;
    fn container_type(&self, id: ContainerId) -> Option<TypeTag>;
    fn ref_container(&self, id: ContainerId) -> bool;
    /// Drop one reference; the container is destroyed when the count reaches
    /// zero and releases everything it references in turn.
    fn unref_container(&self, id: ContainerId) -> bool;
    fn ref_count(&self, id: ContainerId) -> Option<u32>;
    fn container_name(&self, id: ContainerId) -> Option<String>;
    fn set_container_name(&self, id: ContainerId, name: &str) -> bool;
    /// Most recently created live container called `name` whose type derives
    /// from `base`.
    fn find_by_name(&self, name: &str, base: TypeTag) -> Option<ContainerId>;
    /// Non-default fields as `name value` lines.
    fn container_text(&self, id: ContainerId) -> Option<String>;
    /// Apply a `name value ...` field initialiser.
    fn set_container_text(&self, id: ContainerId, text: &str) -> bool;
    fn container_version(&self, id: ContainerId) -> Option<u64>;
    /// Mark the container as changed without writing any field.
    fn touch_container(&self, id: ContainerId) -> bool;

    // --- Fields ---

    fn get_field(&self, id: ContainerId, name: &str) -> Option<FieldRef>;
    fn field_name(&self, field: FieldRef) -> Option<String>;
    fn enumerate_fields(&self, id: ContainerId) -> Vec<FieldRef>;
    fn field_type(&self, field: FieldRef) -> Option<TypeTag>;
    /// Item count; single-value fields always report 1.
    fn field_num(&self, field: FieldRef) -> Option<usize>;
    fn set_field_num(&self, field: FieldRef, num: usize) -> bool;

    /// Flat buffer of all components in the field's element type.
    fn read_numeric(&self, field: FieldRef) -> Option<NumericBuffer>;
    /// Single-value fields need exactly one item of components; multi-value
    /// fields are resized to `len / width` items and reject other lengths.
    fn write_numeric(&self, field: FieldRef, values: &NumericBuffer) -> bool;
    fn read_planes(&self, field: FieldRef) -> Option<Vec<Plane>>;
    fn write_planes(&self, field: FieldRef, planes: &[Plane]) -> bool;
    fn read_image(&self, field: FieldRef) -> Option<Image>;
    fn write_image(&self, field: FieldRef, image: &Image) -> bool;
    fn read_strings(&self, field: FieldRef) -> Option<Vec<String>>;
    fn write_strings(&self, field: FieldRef, values: &[String]) -> bool;
    fn read_refs(&self, field: FieldRef) -> Option<Vec<Option<ContainerId>>>;
    /// Set item `index` of a reference field. The target must derive from the
    /// field's reference type; the new target is acquired before the old one
    /// is released.
    fn write_ref(&self, field: FieldRef, index: usize, target: Option<ContainerId>) -> bool;
    /// Symbolic names accepted by an enum field, in declared order.
    fn enum_names(&self, field: FieldRef) -> Option<Vec<String>>;
    fn field_text(&self, field: FieldRef) -> Option<String>;
    fn set_field_text(&self, field: FieldRef, text: &str) -> bool;
    fn field_item_text(&self, field: FieldRef, index: usize) -> Option<String>;
    fn set_field_item_text(&self, field: FieldRef, index: usize, text: &str) -> bool;
    fn touch_field(&self, field: FieldRef) -> bool;

    // --- Kits ---

    fn is_part(&self, id: ContainerId, name: &str) -> bool;
    /// Current part, built from its default type when empty and `create` is set.
    fn get_part(&self, id: ContainerId, name: &str, create: bool) -> Option<ContainerId>;
    fn set_part(&self, id: ContainerId, name: &str, target: Option<ContainerId>) -> bool;
    /// Part catalog in declaration order, inherited parts first. Empty for
    /// containers that are not kits; `None` for a stale id.
    fn part_catalog(&self, id: ContainerId) -> Option<Vec<PartInfo>>;

    // --- Groups ---

    fn is_group(&self, id: ContainerId) -> bool;
    fn children(&self, id: ContainerId) -> Option<Vec<ContainerId>>;
    fn insert_child(&self, id: ContainerId, child: ContainerId, index: usize) -> bool;
    fn remove_child(&self, id: ContainerId, index: usize) -> bool;
    fn replace_child(&self, id: ContainerId, index: usize, child: ContainerId) -> bool;

    // --- Engine outputs and connections ---

    fn engine_outputs(&self, id: ContainerId) -> Vec<OutputRef>;
    fn get_output(&self, id: ContainerId, name: &str) -> Option<OutputRef>;
    fn output_name(&self, output: OutputRef) -> Option<String>;
    fn output_type(&self, output: OutputRef) -> Option<TypeTag>;
    fn enable_output(&self, output: OutputRef, enabled: bool) -> bool;
    fn is_output_enabled(&self, output: OutputRef) -> Option<bool>;
    /// Connect `field` from `master`, replacing existing connections unless
    /// `append` is set.
    fn connect_field(&self, field: FieldRef, master: Connection, append: bool) -> bool;
    /// Remove one connection, or all of them when `master` is `None`.
    fn disconnect_field(&self, field: FieldRef, master: Option<Connection>) -> bool;
    fn field_connections(&self, field: FieldRef) -> Vec<Connection>;
    fn enable_connection(&self, field: FieldRef, enabled: bool) -> bool;
    fn is_connection_enabled(&self, field: FieldRef) -> Option<bool>;
}
