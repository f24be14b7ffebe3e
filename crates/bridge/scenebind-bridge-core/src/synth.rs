//! Dynamic class synthesis.
//!
//! One [`SynthesizedType`] exists per native container type name. Its base is
//! the class of the native parent type, so host-side subclass checks mirror
//! native inheritance. The three roots are created with the registry; every
//! other class is built on first request and memoised for the registry's
//! lifetime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use log::trace;
use scenebind_native::{SceneDatabase, TypeTag};

use crate::error::{BridgeError, Result};

/// The fixed roots of the class tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RootKind {
    FieldContainer,
    Node,
    Engine,
}

impl RootKind {
    pub const ALL: [RootKind; 3] = [RootKind::FieldContainer, RootKind::Node, RootKind::Engine];

    pub fn type_name(self) -> &'static str {
        match self {
            RootKind::FieldContainer => "FieldContainer",
            RootKind::Node => "Node",
            RootKind::Engine => "Engine",
        }
    }
}

/// A host-visible class for one native container type.
pub struct SynthesizedType {
    name: String,
    native: TypeTag,
    base: Option<Arc<SynthesizedType>>,
    root: RootKind,
}

impl SynthesizedType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_type(&self) -> TypeTag {
        self.native
    }

    pub fn base(&self) -> Option<&Arc<SynthesizedType>> {
        self.base.as_ref()
    }

    /// The root this class descends from. Roots report themselves.
    pub fn root(&self) -> RootKind {
        self.root
    }

    pub fn is_root(&self) -> bool {
        self.name == self.root.type_name()
    }

    /// True when `other` is this class or one of its bases.
    pub fn is_subclass_of(&self, other: &SynthesizedType) -> bool {
        let mut cursor = Some(self);
        while let Some(class) = cursor {
            if std::ptr::eq(class, other) {
                return true;
            }
            cursor = class.base.as_deref();
        }
        false
    }

    /// Class names from this class up to `FieldContainer`.
    pub fn mro(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut cursor = Some(self);
        while let Some(class) = cursor {
            out.push(class.name.as_str());
            cursor = class.base.as_deref();
        }
        out
    }
}

impl fmt::Debug for SynthesizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedType")
            .field("name", &self.name)
            .field("native", &self.native)
            .field("base", &self.base.as_ref().map(|b| b.name.as_str()))
            .field("root", &self.root)
            .finish()
    }
}

/// Process-scoped class cache. Lookups and creation share one mutex, so two
/// threads asking for the same new type always get the same `Arc`.
pub struct ClassRegistry {
    roots: [Arc<SynthesizedType>; 3],
    cache: Mutex<HashMap<String, Arc<SynthesizedType>>>,
}

impl ClassRegistry {
    /// Build the registry and its roots. The database must know all three
    /// root type names.
    pub fn new(db: &dyn SceneDatabase) -> Result<Self> {
        let tag = |kind: RootKind| {
            db.type_from_name(kind.type_name())
                .ok_or_else(|| BridgeError::UnknownType(kind.type_name().to_string()))
        };
        let container = Arc::new(SynthesizedType {
            name: RootKind::FieldContainer.type_name().to_string(),
            native: tag(RootKind::FieldContainer)?,
            base: None,
            root: RootKind::FieldContainer,
        });
        let child_root = |kind: RootKind| -> Result<Arc<SynthesizedType>> {
            Ok(Arc::new(SynthesizedType {
                name: kind.type_name().to_string(),
                native: tag(kind)?,
                base: Some(Arc::clone(&container)),
                root: kind,
            }))
        };
        let node = child_root(RootKind::Node)?;
        let engine = child_root(RootKind::Engine)?;
        let registry = Self {
            roots: [container, node, engine],
            cache: Mutex::new(HashMap::new()),
        };
        registry.reset();
        Ok(registry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SynthesizedType>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self, kind: RootKind) -> Arc<SynthesizedType> {
        let index = match kind {
            RootKind::FieldContainer => 0,
            RootKind::Node => 1,
            RootKind::Engine => 2,
        };
        Arc::clone(&self.roots[index])
    }

    /// Class for `type_name`, creating it and any missing ancestors.
    pub fn resolve(&self, db: &dyn SceneDatabase, type_name: &str) -> Result<Arc<SynthesizedType>> {
        let mut cache = self.lock();
        if let Some(hit) = cache.get(type_name) {
            return Ok(Arc::clone(hit));
        }
        let tag = db
            .type_from_name(type_name)
            .ok_or_else(|| BridgeError::UnknownType(type_name.to_string()))?;

        let mut missing = Vec::new();
        let mut cursor = Some(tag);
        let base = loop {
            let Some(current) = cursor else {
                return Err(BridgeError::NotSceneObjectType(type_name.to_string()));
            };
            let name = db
                .type_name(current)
                .ok_or_else(|| BridgeError::UnknownType(type_name.to_string()))?;
            if let Some(hit) = cache.get(&name) {
                break Arc::clone(hit);
            }
            missing.push((name, current));
            cursor = db.parent_type(current);
        };

        let mut class = base;
        for (name, native) in missing.into_iter().rev() {
            trace!("synthesized class {name} (base {})", class.name);
            let next = Arc::new(SynthesizedType {
                name: name.clone(),
                native,
                root: class.root,
                base: Some(class),
            });
            cache.insert(name, Arc::clone(&next));
            class = next;
        }
        Ok(class)
    }

    /// Already synthesized class, without creating anything.
    pub fn get(&self, type_name: &str) -> Option<Arc<SynthesizedType>> {
        self.lock().get(type_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every synthesized class. The roots stay registered.
    pub fn reset(&self) {
        let mut cache = self.lock();
        cache.clear();
        for root in &self.roots {
            cache.insert(root.name.clone(), Arc::clone(root));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenebind_native::MemoryDatabase;

    #[test]
    fn roots_are_preregistered() {
        let db = MemoryDatabase::new().unwrap();
        let classes = ClassRegistry::new(&db).unwrap();
        assert_eq!(classes.len(), 3);
        let node = classes.resolve(&db, "Node").unwrap();
        assert!(Arc::ptr_eq(&node, &classes.root(RootKind::Node)));
        assert!(node.is_root());
        assert_eq!(node.base().unwrap().name(), "FieldContainer");
    }

    #[test]
    fn classes_mirror_native_inheritance() {
        let db = MemoryDatabase::new().unwrap();
        let classes = ClassRegistry::new(&db).unwrap();
        let selection = classes.resolve(&db, "Selection").unwrap();
        assert_eq!(
            selection.mro(),
            vec!["Selection", "Separator", "Group", "Node", "FieldContainer"]
        );
        assert_eq!(selection.root(), RootKind::Node);
        let group = classes.get("Group").unwrap();
        assert!(selection.is_subclass_of(&group));
        assert!(!group.is_subclass_of(&selection));
        assert_eq!(classes.resolve(&db, "Calculator").unwrap().root(), RootKind::Engine);
    }

    #[test]
    fn non_container_types_are_rejected() {
        let db = MemoryDatabase::new().unwrap();
        let classes = ClassRegistry::new(&db).unwrap();
        assert!(matches!(
            classes.resolve(&db, "SFFloat"),
            Err(BridgeError::NotSceneObjectType(_))
        ));
        assert!(matches!(
            classes.resolve(&db, "NoSuchNode"),
            Err(BridgeError::UnknownType(_))
        ));
        assert_eq!(classes.len(), 3);
    }

    #[test]
    fn reset_keeps_roots() {
        let db = MemoryDatabase::new().unwrap();
        let classes = ClassRegistry::new(&db).unwrap();
        let before = classes.resolve(&db, "Cube").unwrap();
        classes.reset();
        assert!(classes.get("Cube").is_none());
        let after = classes.resolve(&db, "Cube").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(classes.get("Node").is_some());
    }
}
