//! JSON type catalogs.
//!
//! A catalog declares field types (with their storage family) and container
//! types (with fields, kit parts and engine outputs). Catalogs can be loaded
//! at any time, which is how extension libraries add types after startup.

use serde::{Deserialize, Serialize};

use crate::error::NativeError;
use crate::values::ElementType;

/// Built-in core node, engine and field type set.
pub const BUILTIN_CATALOG: &str = include_str!("../catalog/builtin.json");

/// How values of a field type are stored natively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldStorage {
    Numeric { element: ElementType, width: usize },
    Bool,
    Rotation,
    Plane,
    Image,
    String,
    Name,
    Enum,
    Reference { target: String },
    Trigger,
    Opaque,
}

impl FieldStorage {
    /// Element type and per-item width for storages kept as numeric buffers.
    pub fn numeric_layout(&self) -> Option<(ElementType, usize)> {
        match self {
            FieldStorage::Numeric { element, width } => Some((*element, *width)),
            FieldStorage::Bool => Some((ElementType::I32, 1)),
            FieldStorage::Rotation => Some((ElementType::F32, 4)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub field_types: Vec<FieldTypeSpec>,
    #[serde(default)]
    pub container_types: Vec<ContainerTypeSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldTypeSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Omitted storage is inherited from the parent type.
    #[serde(default)]
    pub storage: Option<FieldStorage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContainerTypeSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub parts: Vec<PartSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    /// Default value in the native text format.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub enums: Vec<EnumSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumSpec {
    pub name: String,
    pub value: i32,
}

/// A named kit part. Parts are exposed as single node-reference fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub part_type: String,
    /// Concrete type built on lazy construction; defaults to `part_type`.
    #[serde(default)]
    pub default_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: String,
}

impl CatalogSpec {
    pub fn from_json_str(text: &str) -> Result<Self, NativeError> {
        serde_json::from_str(text).map_err(|e| NativeError::CatalogParse(e.to_string()))
    }

    pub fn builtin() -> Result<Self, NativeError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let spec = CatalogSpec::builtin().expect("builtin catalog");
        assert!(spec.field_types.iter().any(|t| t.name == "SFVec3f"));
        assert!(spec.container_types.iter().any(|t| t.name == "ShapeKit"));
    }

    #[test]
    fn storage_tagging() {
        let storage: FieldStorage =
            serde_json::from_str(r#"{"kind":"numeric","element":"u16","width":2}"#)
                .expect("numeric storage");
        assert_eq!(
            storage,
            FieldStorage::Numeric {
                element: ElementType::U16,
                width: 2
            }
        );
        let storage: FieldStorage =
            serde_json::from_str(r#"{"kind":"reference","target":"Node"}"#).expect("reference");
        assert_eq!(
            storage,
            FieldStorage::Reference {
                target: "Node".into()
            }
        );
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let err = CatalogSpec::from_json_str("{\"field_types\": 3}").unwrap_err();
        assert!(matches!(err, NativeError::CatalogParse(_)));
    }
}
