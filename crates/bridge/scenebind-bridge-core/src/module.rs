//! The host module namespace that synthesized classes are published into.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use log::debug;
use scenebind_native::SceneDatabase;

use crate::error::Result;
use crate::synth::{ClassRegistry, RootKind, SynthesizedType};

#[derive(Default)]
pub struct Module {
    entries: Mutex<HashMap<String, Arc<SynthesizedType>>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SynthesizedType>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `class` under its native type name.
    pub fn insert(&self, class: Arc<SynthesizedType>) {
        self.lock().insert(class.name().to_string(), class);
    }

    pub fn get(&self, name: &str) -> Option<Arc<SynthesizedType>> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Published names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Publish the roots and a class for every creatable node and engine
    /// type the database currently knows. Returns how many classes were
    /// added that were not published before.
    pub fn create_classes(&self, db: &dyn SceneDatabase, classes: &ClassRegistry) -> Result<usize> {
        let mut added = 0;
        for kind in RootKind::ALL {
            if !self.contains(kind.type_name()) {
                self.insert(classes.root(kind));
                added += 1;
            }
        }
        for kind in [RootKind::Node, RootKind::Engine] {
            let root = classes.root(kind).native_type();
            for tag in db.derived_types(root) {
                if !db.can_create_instance(tag) {
                    continue;
                }
                let Some(name) = db.type_name(tag) else {
                    continue;
                };
                if self.contains(&name) {
                    continue;
                }
                self.insert(classes.resolve(db, &name)?);
                added += 1;
            }
        }
        debug!("published {added} classes ({} total)", self.len());
        Ok(added)
    }
}
