//! Field type classification against the native runtime type system.
//!
//! Every query goes to the database on each call, so types registered after
//! the bridge started are classified like built-in ones. Unknown names and
//! stale fields simply do not match.

use scenebind_native::{FieldRef, SceneDatabase, TypeTag};

/// Root field families that split single-value from multi-value fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldFamily {
    Single,
    Multi,
}

impl FieldFamily {
    pub fn root_type_name(self) -> &'static str {
        match self {
            FieldFamily::Single => "SField",
            FieldFamily::Multi => "MField",
        }
    }
}

pub struct TypeRegistryAdapter<'a> {
    db: &'a dyn SceneDatabase,
}

impl<'a> TypeRegistryAdapter<'a> {
    pub fn new(db: &'a dyn SceneDatabase) -> Self {
        Self { db }
    }

    pub fn is_field_of_exact_type(&self, field: FieldRef, type_name: &str) -> bool {
        match (self.db.field_type(field), self.db.type_from_name(type_name)) {
            (Some(actual), Some(wanted)) => actual == wanted,
            _ => false,
        }
    }

    /// Exact type or any subtype of it.
    pub fn is_field_of_type(&self, field: FieldRef, type_name: &str) -> bool {
        match (self.db.field_type(field), self.db.type_from_name(type_name)) {
            (Some(actual), Some(wanted)) => self.db.is_type_derived_from(actual, wanted),
            _ => false,
        }
    }

    pub fn is_field_derived_from(&self, field: FieldRef, family: FieldFamily) -> bool {
        self.is_field_of_type(field, family.root_type_name())
    }

    pub fn family_of(&self, tag: TypeTag) -> Option<FieldFamily> {
        [FieldFamily::Multi, FieldFamily::Single]
            .into_iter()
            .find(|family| {
                self.db
                    .type_from_name(family.root_type_name())
                    .is_some_and(|root| self.db.is_type_derived_from(tag, root))
            })
    }

    /// `tag` followed by each of its ancestors, most specific first.
    pub fn ancestry(&self, tag: TypeTag) -> Vec<TypeTag> {
        let mut out = vec![tag];
        let mut cursor = self.db.parent_type(tag);
        while let Some(parent) = cursor {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            cursor = self.db.parent_type(parent);
        }
        out
    }
}
