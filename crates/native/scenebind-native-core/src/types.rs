//! Open runtime type registry.
//!
//! Every field type and container type is identified by a [`TypeTag`]. Tags
//! are handed out in registration order and never reused, so a tag obtained
//! before an extension catalog is loaded stays valid afterwards.

use std::fmt;

use hashbrown::HashMap;

use crate::catalog::{CatalogSpec, ContainerTypeSpec, EnumSpec, FieldStorage, FieldTypeSpec};
use crate::error::NativeError;

/// Opaque runtime type identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub(crate) u32);

impl TypeTag {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name of the abstract root of all multi-value field types.
pub const MULTI_FIELD_ROOT: &str = "MField";

#[derive(Clone, Debug)]
pub(crate) struct FieldTypeInfo {
    pub storage: Option<FieldStorage>,
    pub multi: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct FieldDecl {
    pub name: String,
    pub field_type: TypeTag,
    pub default: Option<String>,
    pub enums: Vec<EnumSpec>,
}

#[derive(Clone, Debug)]
pub(crate) struct PartDecl {
    pub name: String,
    pub part_type: TypeTag,
    pub default_type: TypeTag,
}

#[derive(Clone, Debug)]
pub(crate) struct OutputDecl {
    pub name: String,
    pub output_type: TypeTag,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ContainerTypeInfo {
    pub is_abstract: bool,
    pub group: bool,
    /// Inherited declarations first, then this type's own.
    pub fields: Vec<FieldDecl>,
    pub parts: Vec<PartDecl>,
    pub outputs: Vec<OutputDecl>,
}

#[derive(Clone, Debug)]
pub(crate) enum TypeBody {
    Field(FieldTypeInfo),
    Container(ContainerTypeInfo),
}

#[derive(Clone, Debug)]
pub(crate) struct TypeEntry {
    pub name: String,
    pub parent: Option<TypeTag>,
    pub body: TypeBody,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TypeRegistry {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeTag>,
}

impl TypeRegistry {
    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    pub fn entry(&self, tag: TypeTag) -> Option<&TypeEntry> {
        self.entries.get(tag.0 as usize)
    }

    pub fn name(&self, tag: TypeTag) -> Option<&str> {
        self.entry(tag).map(|e| e.name.as_str())
    }

    pub fn parent(&self, tag: TypeTag) -> Option<TypeTag> {
        self.entry(tag).and_then(|e| e.parent)
    }

    pub fn is_derived_from(&self, tag: TypeTag, ancestor: TypeTag) -> bool {
        let mut cursor = Some(tag);
        while let Some(t) = cursor {
            if t == ancestor {
                return true;
            }
            cursor = self.parent(t);
        }
        false
    }

    /// Every registered type derived from `ancestor` (excluding itself), in
    /// registration order.
    pub fn derived(&self, ancestor: TypeTag) -> Vec<TypeTag> {
        (0..self.entries.len() as u32)
            .map(TypeTag)
            .filter(|t| *t != ancestor && self.is_derived_from(*t, ancestor))
            .collect()
    }

    pub fn field_info(&self, tag: TypeTag) -> Option<&FieldTypeInfo> {
        match &self.entry(tag)?.body {
            TypeBody::Field(info) => Some(info),
            TypeBody::Container(_) => None,
        }
    }

    pub fn container_info(&self, tag: TypeTag) -> Option<&ContainerTypeInfo> {
        match &self.entry(tag)?.body {
            TypeBody::Container(info) => Some(info),
            TypeBody::Field(_) => None,
        }
    }

    /// Register every type in `spec`, all or nothing. Entries may refer to
    /// types declared earlier in the same catalog.
    pub fn register(&mut self, spec: &CatalogSpec) -> Result<Vec<TypeTag>, NativeError> {
        let mut staged = self.clone();
        let mut added = Vec::new();
        for ft in &spec.field_types {
            added.push(staged.register_field_type(ft)?);
        }
        for ct in &spec.container_types {
            added.push(staged.register_container_type(ct)?);
        }
        // reference targets may name container types declared further down
        for ft in &spec.field_types {
            if let Some(FieldStorage::Reference { target }) = &ft.storage {
                staged.expect_container_type(&ft.name, target)?;
            }
        }
        *self = staged;
        Ok(added)
    }

    fn push(&mut self, entry: TypeEntry) -> Result<TypeTag, NativeError> {
        if self.by_name.contains_key(&entry.name) {
            return Err(NativeError::DuplicateType(entry.name));
        }
        let tag = TypeTag(self.entries.len() as u32);
        self.by_name.insert(entry.name.clone(), tag);
        self.entries.push(entry);
        Ok(tag)
    }

    fn resolve_parent(&self, name: &str, parent: Option<&str>) -> Result<Option<TypeTag>, NativeError> {
        match parent {
            None => Ok(None),
            Some(p) => self.lookup(p).map(Some).ok_or_else(|| NativeError::InvalidCatalog {
                name: name.to_string(),
                reason: format!("unknown parent type '{p}'"),
            }),
        }
    }

    fn expect_field_type(&self, owner: &str, name: &str) -> Result<TypeTag, NativeError> {
        let tag = self.lookup(name).ok_or_else(|| NativeError::InvalidCatalog {
            name: owner.to_string(),
            reason: format!("unknown field type '{name}'"),
        })?;
        if self.field_info(tag).is_none() {
            return Err(NativeError::WrongTypeClass {
                name: name.to_string(),
                expected: "field",
            });
        }
        Ok(tag)
    }

    fn expect_container_type(&self, owner: &str, name: &str) -> Result<TypeTag, NativeError> {
        let tag = self.lookup(name).ok_or_else(|| NativeError::InvalidCatalog {
            name: owner.to_string(),
            reason: format!("unknown container type '{name}'"),
        })?;
        if self.container_info(tag).is_none() {
            return Err(NativeError::WrongTypeClass {
                name: name.to_string(),
                expected: "container",
            });
        }
        Ok(tag)
    }

    fn register_field_type(&mut self, spec: &FieldTypeSpec) -> Result<TypeTag, NativeError> {
        let parent = self.resolve_parent(&spec.name, spec.parent.as_deref())?;
        let inherited = match parent {
            Some(p) => Some(self.field_info(p).cloned().ok_or_else(|| {
                NativeError::WrongTypeClass {
                    name: spec.parent.clone().unwrap_or_default(),
                    expected: "field",
                }
            })?),
            None => None,
        };
        if let Some(FieldStorage::Numeric { width, .. }) = &spec.storage {
            if *width == 0 {
                return Err(NativeError::InvalidCatalog {
                    name: spec.name.clone(),
                    reason: "numeric width must be at least 1".into(),
                });
            }
        }
        let multi = spec.name == MULTI_FIELD_ROOT || inherited.as_ref().is_some_and(|i| i.multi);
        let storage = spec
            .storage
            .clone()
            .or_else(|| inherited.and_then(|i| i.storage));
        self.push(TypeEntry {
            name: spec.name.clone(),
            parent,
            body: TypeBody::Field(FieldTypeInfo { storage, multi }),
        })
    }

    fn register_container_type(&mut self, spec: &ContainerTypeSpec) -> Result<TypeTag, NativeError> {
        let parent = self.resolve_parent(&spec.name, spec.parent.as_deref())?;
        let mut info = match parent {
            Some(p) => self.container_info(p).cloned().ok_or_else(|| {
                NativeError::WrongTypeClass {
                    name: spec.parent.clone().unwrap_or_default(),
                    expected: "container",
                }
            })?,
            None => ContainerTypeInfo::default(),
        };
        info.is_abstract = spec.is_abstract;
        info.group |= spec.group;

        for f in &spec.fields {
            let decl = FieldDecl {
                name: f.name.clone(),
                field_type: self.expect_field_type(&spec.name, &f.field_type)?,
                default: f.default.clone(),
                enums: f.enums.clone(),
            };
            match info.fields.iter_mut().find(|d| d.name == f.name) {
                Some(existing) => *existing = decl,
                None => info.fields.push(decl),
            }
        }

        let part_field = self.lookup("SFNode");
        for p in &spec.parts {
            let part_type = self.expect_container_type(&spec.name, &p.part_type)?;
            let default_type = match &p.default_type {
                Some(d) => self.expect_container_type(&spec.name, d)?,
                None => part_type,
            };
            if !self.is_derived_from(default_type, part_type) {
                return Err(NativeError::InvalidCatalog {
                    name: spec.name.clone(),
                    reason: format!("part '{}' default type is not a '{}'", p.name, p.part_type),
                });
            }
            let field_type = part_field.ok_or_else(|| NativeError::InvalidCatalog {
                name: spec.name.clone(),
                reason: "kit parts require the SFNode field type".into(),
            })?;
            if !info.fields.iter().any(|d| d.name == p.name) {
                info.fields.push(FieldDecl {
                    name: p.name.clone(),
                    field_type,
                    default: None,
                    enums: Vec::new(),
                });
            }
            let decl = PartDecl {
                name: p.name.clone(),
                part_type,
                default_type,
            };
            match info.parts.iter_mut().find(|d| d.name == p.name) {
                Some(existing) => *existing = decl,
                None => info.parts.push(decl),
            }
        }

        for o in &spec.outputs {
            info.outputs.push(OutputDecl {
                name: o.name.clone(),
                output_type: self.expect_field_type(&spec.name, &o.output_type)?,
            });
        }

        self.push(TypeEntry {
            name: spec.name.clone(),
            parent,
            body: TypeBody::Container(info),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> TypeRegistry {
        let mut reg = TypeRegistry::default();
        reg.register(&CatalogSpec::builtin().expect("builtin"))
            .expect("register builtin");
        reg
    }

    #[test]
    fn multi_flag_follows_ancestry() {
        let reg = builtin();
        let mf = reg.lookup("MFVec3f").expect("MFVec3f");
        let sf = reg.lookup("SFVec3f").expect("SFVec3f");
        assert!(reg.field_info(mf).expect("field").multi);
        assert!(!reg.field_info(sf).expect("field").multi);
    }

    #[test]
    fn inherited_fields_come_first() {
        let reg = builtin();
        let kit = reg.lookup("ShapeKit").expect("ShapeKit");
        let info = reg.container_info(kit).expect("container");
        let names: Vec<_> = info.parts.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"shape"));
        assert!(info.fields.iter().any(|f| f.name == "shape"));
    }

    #[test]
    fn failed_catalog_leaves_registry_untouched() {
        let mut reg = builtin();
        let before = reg.entries.len();
        let spec = CatalogSpec::from_json_str(
            r#"{"field_types":[{"name":"SFGood","parent":"SField","storage":{"kind":"opaque"}},
                               {"name":"SFBad","parent":"NoSuchParent"}]}"#,
        )
        .expect("parse");
        assert!(reg.register(&spec).is_err());
        assert_eq!(reg.entries.len(), before);
        assert!(reg.lookup("SFGood").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut reg = builtin();
        let spec = CatalogSpec::from_json_str(r#"{"field_types":[{"name":"SFFloat"}]}"#)
            .expect("parse");
        assert!(matches!(
            reg.register(&spec),
            Err(NativeError::DuplicateType(name)) if name == "SFFloat"
        ));
    }
}
