//! Scene object wrappers.
//!
//! A [`SceneObject`] is what the host sees for a native container. Clones
//! share one wrapper (and its single native reference); wrapping the same
//! container twice gives two wrappers that each hold their own reference
//! and compare equal.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scenebind_native::{Connection, ContainerId, SceneDatabase};

use crate::binding::Binding;
use crate::bridge::Bridge;
use crate::codec::{get_field_value, set_field_value, SetOutcome};
use crate::error::{BridgeError, Result};
use crate::field::{FieldHandle, OutputHandle};
use crate::kit::KitCatalog;
use crate::synth::{RootKind, SynthesizedType};
use crate::value::ScriptValue;

struct ObjectCell {
    bridge: Arc<Bridge>,
    class: Arc<SynthesizedType>,
    binding: Mutex<Binding>,
}

#[derive(Clone)]
pub struct SceneObject(Arc<ObjectCell>);

impl SceneObject {
    pub(crate) fn from_parts(bridge: Arc<Bridge>, class: Arc<SynthesizedType>, binding: Binding) -> Self {
        SceneObject(Arc::new(ObjectCell {
            bridge,
            class,
            binding: Mutex::new(binding),
        }))
    }

    fn binding(&self) -> MutexGuard<'_, Binding> {
        self.0.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn db(&self) -> &dyn SceneDatabase {
        self.0.bridge.db()
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.0.bridge
    }

    pub fn class(&self) -> &Arc<SynthesizedType> {
        &self.0.class
    }

    pub fn container_id(&self) -> Option<ContainerId> {
        self.binding().container()
    }

    pub fn is_bound(&self) -> bool {
        self.container_id().is_some()
    }

    fn require(&self) -> Result<ContainerId> {
        self.container_id().ok_or(BridgeError::Unbound)
    }

    /// Whether both handles are the same wrapper, not just the same
    /// container.
    pub fn is_same_wrapper(&self, other: &SceneObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // --- Attribute access ---

    /// Read a field. Kit parts are returned as objects (or `None` when empty
    /// and not built on access).
    pub fn get_attr(&self, name: &str) -> Result<ScriptValue> {
        let id = self.require()?;
        let field = self
            .db()
            .get_field(id, name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))?;
        if self.db().is_part(id, name) {
            let create = self.0.bridge.config().create_parts_on_access;
            return match self.db().get_part(id, name, create) {
                Some(part) => Ok(ScriptValue::Object(self.0.bridge.wrap(part)?)),
                None => Ok(ScriptValue::None),
            };
        }
        Ok(get_field_value(&self.0.bridge, field))
    }

    /// Assign a field. Values that do not fit are ignored unless the bridge
    /// is strict.
    pub fn set_attr(&self, name: &str, value: impl Into<ScriptValue>) -> Result<SetOutcome> {
        let id = self.require()?;
        let field = self
            .db()
            .get_field(id, name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))?;
        let outcome = set_field_value(&self.0.bridge, field, &value.into());
        self.0.bridge.settle(name, outcome)
    }

    pub fn field(&self, name: &str) -> Result<FieldHandle> {
        let id = self.require()?;
        let field = self
            .db()
            .get_field(id, name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))?;
        FieldHandle::new(Arc::clone(&self.0.bridge), field).ok_or(BridgeError::Unbound)
    }

    /// Field handles in declaration order.
    pub fn fields(&self) -> Result<Vec<FieldHandle>> {
        let id = self.require()?;
        Ok(self
            .db()
            .enumerate_fields(id)
            .into_iter()
            .filter_map(|f| FieldHandle::new(Arc::clone(&self.0.bridge), f))
            .collect())
    }

    pub fn output(&self, name: &str) -> Result<OutputHandle> {
        let id = self.require()?;
        let output = self
            .db()
            .get_output(id, name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))?;
        OutputHandle::new(Arc::clone(&self.0.bridge), output).ok_or(BridgeError::Unbound)
    }

    pub fn outputs(&self) -> Result<Vec<OutputHandle>> {
        let id = self.require()?;
        Ok(self
            .db()
            .engine_outputs(id)
            .into_iter()
            .filter_map(|o| OutputHandle::new(Arc::clone(&self.0.bridge), o))
            .collect())
    }

    // --- Type and identity ---

    /// Native type name of the bound container.
    pub fn get_type(&self) -> Result<String> {
        let id = self.require()?;
        self.db()
            .container_type(id)
            .and_then(|t| self.db().type_name(t))
            .ok_or(BridgeError::Unbound)
    }

    /// Whether the container's type is `type_name` or derives from it.
    pub fn check_type(&self, type_name: &str) -> Result<bool> {
        let id = self.require()?;
        let wanted = self
            .db()
            .type_from_name(type_name)
            .ok_or_else(|| BridgeError::UnknownType(type_name.to_string()))?;
        Ok(self
            .db()
            .container_type(id)
            .is_some_and(|t| self.db().is_type_derived_from(t, wanted)))
    }

    pub fn name(&self) -> Result<String> {
        let id = self.require()?;
        self.db().container_name(id).ok_or(BridgeError::Unbound)
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        let id = self.require()?;
        if self.db().set_container_name(id, name) {
            Ok(())
        } else {
            Err(BridgeError::Unbound)
        }
    }

    /// Change counter of the container; every write or touch advances it.
    pub fn node_id(&self) -> Result<u64> {
        let id = self.require()?;
        self.db().container_version(id).ok_or(BridgeError::Unbound)
    }

    pub fn internal_pointer(&self) -> Option<ContainerId> {
        self.container_id()
    }

    pub fn touch(&self) -> Result<()> {
        let id = self.require()?;
        checked(self.db().touch_container(id), BridgeError::Unbound)
    }

    /// Bind this wrapper to another container of a compatible type. The new
    /// container is acquired before the old one is released.
    pub fn rebind(&self, target: Option<ContainerId>) -> Result<()> {
        if let Some(id) = target {
            let actual = self
                .db()
                .container_type(id)
                .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
            if !self.db().is_type_derived_from(actual, self.0.class.native_type()) {
                return Err(BridgeError::TypeMismatch {
                    given: self.db().type_name(actual).unwrap_or_default(),
                    expected: self.0.class.name().to_string(),
                });
            }
        }
        if self.binding().rebind(target) {
            Ok(())
        } else {
            Err(BridgeError::Unbound)
        }
    }

    // --- Native text ---

    /// Apply a `name value ...` field initialiser.
    pub fn set(&self, init: &str) -> Result<bool> {
        let id = self.require()?;
        Ok(self.db().set_container_text(id, init))
    }

    /// Set one field from its native text.
    pub fn set_field(&self, name: &str, text: &str) -> Result<bool> {
        let id = self.require()?;
        let field = self
            .db()
            .get_field(id, name)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))?;
        Ok(self.db().set_field_text(field, text))
    }

    /// Native text of the whole container, of one field, or a kit part
    /// object.
    pub fn get(&self, name: Option<&str>, create_if_needed: bool) -> Result<ScriptValue> {
        let id = self.require()?;
        let Some(name) = name else {
            return Ok(ScriptValue::Str(self.db().container_text(id).unwrap_or_default()));
        };
        if self.db().is_part(id, name) {
            return match self.db().get_part(id, name, create_if_needed) {
                Some(part) => Ok(ScriptValue::Object(self.0.bridge.wrap(part)?)),
                None => Ok(ScriptValue::None),
            };
        }
        self.db()
            .get_field(id, name)
            .and_then(|f| self.db().field_text(f))
            .map(ScriptValue::Str)
            .ok_or_else(|| BridgeError::UnknownAttribute(name.to_string()))
    }

    /// Part catalog of a kit; `None` when the container declares no parts.
    pub fn catalog(&self) -> Result<Option<KitCatalog>> {
        let id = self.require()?;
        let parts = self.db().part_catalog(id).ok_or(BridgeError::Unbound)?;
        Ok((!parts.is_empty()).then(|| KitCatalog::new(parts)))
    }

    // --- Connections ---

    /// Connect `field_to` from a field of `from`, or from one of its engine
    /// outputs when it has no field of that name.
    pub fn connect(&self, field_to: &str, from: &SceneObject, field_from: &str) -> Result<bool> {
        let id = self.require()?;
        let source = from.require()?;
        let slave = self
            .db()
            .get_field(id, field_to)
            .ok_or_else(|| BridgeError::UnknownAttribute(field_to.to_string()))?;
        let master = match self.db().get_field(source, field_from) {
            Some(f) => Connection::Field(f),
            None => self
                .db()
                .get_output(source, field_from)
                .map(Connection::Output)
                .ok_or_else(|| BridgeError::UnknownAttribute(field_from.to_string()))?,
        };
        Ok(self.db().connect_field(slave, master, false))
    }

    pub fn disconnect(&self, field: &str) -> Result<()> {
        self.field(field)?.disconnect(None);
        Ok(())
    }

    pub fn is_connected(&self, field: &str) -> Result<bool> {
        Ok(self.field(field)?.is_connected())
    }

    // --- Group children ---

    fn group(&self) -> Result<(ContainerId, Vec<ContainerId>)> {
        let id = self.require()?;
        let children = self.db().children(id).ok_or(BridgeError::NotAGroup)?;
        Ok((id, children))
    }

    fn normalise(index: i64, len: usize) -> Option<usize> {
        let len = len as i64;
        let i = if index < 0 { index + len } else { index };
        (0..len).contains(&i).then_some(i as usize)
    }

    fn node_child(&self, child: &SceneObject) -> Result<ContainerId> {
        let id = child.require()?;
        let node = self.0.bridge.classes().root(RootKind::Node);
        let is_node = self
            .db()
            .container_type(id)
            .is_some_and(|t| self.db().is_type_derived_from(t, node.native_type()));
        if is_node {
            Ok(id)
        } else {
            Err(BridgeError::TypeMismatch {
                given: child.get_type().unwrap_or_default(),
                expected: node.name().to_string(),
            })
        }
    }

    /// Number of children; zero for anything that is not a group.
    pub fn len(&self) -> usize {
        self.group().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self) -> Result<Vec<SceneObject>> {
        let (_, children) = self.group()?;
        children.into_iter().map(|c| self.0.bridge.wrap(c)).collect()
    }

    /// Child at `index`; negative indices count from the end.
    pub fn child(&self, index: i64) -> Result<SceneObject> {
        let (_, children) = self.group()?;
        let i = Self::normalise(index, children.len()).ok_or(BridgeError::IndexOutOfRange(index))?;
        self.0.bridge.wrap(children[i])
    }

    /// Children in `start..end` with slice clamping; negative bounds count
    /// from the end.
    pub fn slice(&self, start: i64, end: i64) -> Result<Vec<SceneObject>> {
        let (_, children) = self.group()?;
        let len = children.len() as i64;
        let clamp = |i: i64| (if i < 0 { i + len } else { i }).clamp(0, len) as usize;
        let (s, e) = (clamp(start), clamp(end));
        if s >= e {
            return Ok(Vec::new());
        }
        children[s..e].iter().map(|c| self.0.bridge.wrap(*c)).collect()
    }

    pub fn append(&self, child: &SceneObject) -> Result<()> {
        let (id, children) = self.group()?;
        let child = self.node_child(child)?;
        checked(
            self.db().insert_child(id, child, children.len()),
            BridgeError::ChildRejected,
        )
    }

    /// Append every node of `items`; anything else is skipped.
    pub fn extend(&self, items: &[SceneObject]) -> Result<()> {
        let (id, _) = self.group()?;
        for item in items {
            if let Ok(child) = self.node_child(item) {
                let len = self.db().children(id).map_or(0, |c| c.len());
                checked(self.db().insert_child(id, child, len), BridgeError::ChildRejected)?;
            }
        }
        Ok(())
    }

    /// Insert before `index`, clamped like a list insert.
    pub fn insert(&self, index: i64, child: &SceneObject) -> Result<()> {
        let (id, children) = self.group()?;
        let child = self.node_child(child)?;
        let len = children.len() as i64;
        let at = (if index < 0 { index + len } else { index }).clamp(0, len) as usize;
        checked(self.db().insert_child(id, child, at), BridgeError::ChildRejected)
    }

    /// Remove the first occurrence of `child`. Returns whether it was found.
    pub fn remove(&self, child: &SceneObject) -> Result<bool> {
        let (id, children) = self.group()?;
        let Some(target) = child.container_id() else {
            return Ok(false);
        };
        match children.iter().position(|c| *c == target) {
            Some(i) => Ok(self.db().remove_child(id, i)),
            None => Ok(false),
        }
    }

    pub fn remove_at(&self, index: i64) -> Result<()> {
        let (id, children) = self.group()?;
        let i = Self::normalise(index, children.len()).ok_or(BridgeError::IndexOutOfRange(index))?;
        checked(self.db().remove_child(id, i), BridgeError::IndexOutOfRange(index))
    }

    pub fn clear_children(&self) -> Result<()> {
        let (id, children) = self.group()?;
        for i in (0..children.len()).rev() {
            checked(self.db().remove_child(id, i), BridgeError::IndexOutOfRange(i as i64))?;
        }
        Ok(())
    }

    /// Item assignment: `None` removes, an index inside the group replaces,
    /// anything past the end appends.
    pub fn set_child(&self, index: i64, child: Option<&SceneObject>) -> Result<()> {
        let (id, children) = self.group()?;
        let len = children.len();
        match child {
            None => match Self::normalise(index, len) {
                Some(i) => checked(
                    self.db().remove_child(id, i),
                    BridgeError::IndexOutOfRange(index),
                ),
                None => Err(BridgeError::IndexOutOfRange(index)),
            },
            Some(child) => {
                let child = self.node_child(child)?;
                let ok = match Self::normalise(index, len) {
                    Some(i) => self.db().replace_child(id, i, child),
                    None => self.db().insert_child(id, child, len),
                };
                checked(ok, BridgeError::ChildRejected)
            }
        }
    }

    pub fn contains(&self, child: &SceneObject) -> bool {
        match (self.group(), child.container_id()) {
            (Ok((_, children)), Some(target)) => children.contains(&target),
            _ => false,
        }
    }

    /// New group of the same type holding this group's children followed by
    /// `other` (or `other`'s children when it is a group too).
    pub fn concat(&self, other: &SceneObject) -> Result<SceneObject> {
        self.group()?;
        let joined = self.0.bridge.create(&self.get_type()?, None)?;
        joined.extend(&self.children()?)?;
        match other.children() {
            Ok(items) => joined.extend(&items)?,
            Err(_) => joined.append(other)?,
        }
        Ok(joined)
    }

    // --- Formatting ---

    /// `<Type "name" at 0x...>`, or `Uninitialized` when unbound.
    pub fn repr(&self) -> String {
        let Some(id) = self.container_id() else {
            return "Uninitialized".to_string();
        };
        let type_name = self
            .db()
            .container_type(id)
            .and_then(|t| self.db().type_name(t))
            .unwrap_or_else(|| self.0.class.name().to_string());
        match self.db().container_name(id).filter(|n| !n.is_empty()) {
            Some(name) => format!("<{type_name} \"{name}\" at {id}>"),
            None => format!("<{type_name} at {id}>"),
        }
    }
}

fn checked(ok: bool, err: BridgeError) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(err)
    }
}

impl PartialEq for SceneObject {
    fn eq(&self, other: &Self) -> bool {
        match (self.container_id(), other.container_id()) {
            (Some(a), Some(b)) => a == b,
            _ => self.is_same_wrapper(other),
        }
    }
}

impl fmt::Display for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())?;
        let text = self
            .container_id()
            .and_then(|id| self.db().container_text(id))
            .unwrap_or_default();
        if text.len() > 1 {
            write!(f, "\n{text}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("class", &self.0.class.name())
            .field("container", &self.container_id())
            .finish()
    }
}
