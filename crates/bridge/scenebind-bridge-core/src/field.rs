//! Field and engine output handles.
//!
//! Both hold one native reference on the owning container, so a handle stays
//! valid after every object wrapper of its container is gone.

use std::fmt;
use std::sync::Arc;

use scenebind_native::{Connection, FieldRef, OutputRef, SceneDatabase};

use crate::binding::Binding;
use crate::bridge::Bridge;
use crate::codec::{get_field_value, set_field_value, SetOutcome};
use crate::error::Result;
use crate::object::SceneObject;
use crate::value::ScriptValue;

/// Master end of a connection as seen from the host.
#[derive(Copy, Clone, Debug)]
pub enum ConnectionSource<'a> {
    Field(&'a FieldHandle),
    Output(&'a OutputHandle),
}

impl ConnectionSource<'_> {
    fn connection(&self) -> Connection {
        match self {
            ConnectionSource::Field(f) => Connection::Field(f.field),
            ConnectionSource::Output(o) => Connection::Output(o.output),
        }
    }
}

impl<'a> From<&'a FieldHandle> for ConnectionSource<'a> {
    fn from(f: &'a FieldHandle) -> Self {
        ConnectionSource::Field(f)
    }
}

impl<'a> From<&'a OutputHandle> for ConnectionSource<'a> {
    fn from(o: &'a OutputHandle) -> Self {
        ConnectionSource::Output(o)
    }
}

#[derive(Clone)]
pub struct FieldHandle {
    bridge: Arc<Bridge>,
    _owner: Binding,
    field: FieldRef,
}

impl FieldHandle {
    pub(crate) fn new(bridge: Arc<Bridge>, field: FieldRef) -> Option<Self> {
        let owner = Binding::bound(bridge.db_handle(), field.container)?;
        Some(Self {
            bridge,
            _owner: owner,
            field,
        })
    }

    fn db(&self) -> &dyn SceneDatabase {
        self.bridge.db()
    }

    pub fn field_ref(&self) -> FieldRef {
        self.field
    }

    pub fn get_name(&self) -> String {
        self.db().field_name(self.field).unwrap_or_default()
    }

    /// Native type name of the field.
    pub fn get_type(&self) -> String {
        self.db()
            .field_type(self.field)
            .and_then(|t| self.db().type_name(t))
            .unwrap_or_default()
    }

    pub fn get_container(&self) -> Result<SceneObject> {
        self.bridge.wrap(self.field.container)
    }

    pub fn value(&self) -> ScriptValue {
        get_field_value(&self.bridge, self.field)
    }

    pub fn set_value(&self, value: impl Into<ScriptValue>) -> Result<SetOutcome> {
        let outcome = set_field_value(&self.bridge, self.field, &value.into());
        self.bridge.settle_field(self.field, outcome)
    }

    /// Symbolic names of an enum field, `None` for other fields.
    pub fn get_enums(&self) -> Option<Vec<String>> {
        self.db().enum_names(self.field)
    }

    pub fn touch(&self) -> bool {
        self.db().touch_field(self.field)
    }

    /// Replace every connection with one from `source`.
    pub fn connect_from<'a>(&self, source: impl Into<ConnectionSource<'a>>) -> bool {
        self.db()
            .connect_field(self.field, source.into().connection(), false)
    }

    pub fn append_connection<'a>(&self, source: impl Into<ConnectionSource<'a>>) -> bool {
        self.db()
            .connect_field(self.field, source.into().connection(), true)
    }

    /// Remove the connection from `source`, or all of them.
    pub fn disconnect(&self, source: Option<ConnectionSource<'_>>) -> bool {
        self.db()
            .disconnect_field(self.field, source.map(|s| s.connection()))
    }

    pub fn is_connected(&self) -> bool {
        !self.db().field_connections(self.field).is_empty()
    }

    /// First field this one is connected from.
    pub fn get_connected_field(&self) -> Option<FieldHandle> {
        self.db()
            .field_connections(self.field)
            .into_iter()
            .find_map(|c| match c {
                Connection::Field(f) => FieldHandle::new(Arc::clone(&self.bridge), f),
                Connection::Output(_) => None,
            })
    }

    /// First engine output this field is connected from.
    pub fn get_connected_engine(&self) -> Option<OutputHandle> {
        self.db()
            .field_connections(self.field)
            .into_iter()
            .find_map(|c| match c {
                Connection::Output(o) => OutputHandle::new(Arc::clone(&self.bridge), o),
                Connection::Field(_) => None,
            })
    }

    /// Every field this one is connected from, in connection order.
    pub fn get_connections(&self) -> Vec<FieldHandle> {
        self.db()
            .field_connections(self.field)
            .into_iter()
            .filter_map(|c| match c {
                Connection::Field(f) => FieldHandle::new(Arc::clone(&self.bridge), f),
                Connection::Output(_) => None,
            })
            .collect()
    }

    pub fn enable_connection(&self, enabled: bool) -> bool {
        self.db().enable_connection(self.field, enabled)
    }

    pub fn is_connection_enabled(&self) -> bool {
        self.db().is_connection_enabled(self.field).unwrap_or(false)
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("name", &self.get_name())
            .field("type", &self.get_type())
            .field("container", &self.field.container)
            .finish()
    }
}

#[derive(Clone)]
pub struct OutputHandle {
    bridge: Arc<Bridge>,
    _owner: Binding,
    output: OutputRef,
}

impl OutputHandle {
    pub(crate) fn new(bridge: Arc<Bridge>, output: OutputRef) -> Option<Self> {
        let owner = Binding::bound(bridge.db_handle(), output.container)?;
        Some(Self {
            bridge,
            _owner: owner,
            output,
        })
    }

    pub fn output_ref(&self) -> OutputRef {
        self.output
    }

    pub fn get_name(&self) -> String {
        self.bridge.db().output_name(self.output).unwrap_or_default()
    }

    pub fn get_type(&self) -> String {
        let db = self.bridge.db();
        db.output_type(self.output)
            .and_then(|t| db.type_name(t))
            .unwrap_or_default()
    }

    pub fn get_container(&self) -> Result<SceneObject> {
        self.bridge.wrap(self.output.container)
    }

    pub fn enable(&self, enabled: bool) -> bool {
        self.bridge.db().enable_output(self.output, enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.bridge.db().is_output_enabled(self.output).unwrap_or(false)
    }
}

impl PartialEq for OutputHandle {
    fn eq(&self, other: &Self) -> bool {
        self.output == other.output
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle")
            .field("name", &self.get_name())
            .field("container", &self.output.container)
            .finish()
    }
}
