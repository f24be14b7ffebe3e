use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use scenebind_native::{ContainerId, MemoryDatabase, SceneDatabase};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    catalogs: BTreeMap<String, String>,
    #[serde(default)]
    scenes: BTreeMap<String, SceneEntry>,
}

#[derive(Debug, Deserialize)]
struct SceneEntry {
    #[serde(default)]
    catalogs: Vec<String>,
    objects: String,
}

/// One container of a fixture scene.
#[derive(Clone, Debug, Deserialize)]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub init: Option<String>,
}

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("valid fixtures manifest")
});

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_to_string(path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing fixture {}", path.display()))
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, kind: &str, name: &str) -> Result<&'a V> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod catalogs {
    use super::*;

    pub fn keys() -> impl Iterator<Item = &'static str> {
        MANIFEST.catalogs.keys().map(|s| s.as_str())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.catalogs, "catalog", name)?;
        Ok(resolve_path(rel))
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(&path(name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(&path(name)?)
    }

    /// Register the named catalog into `db`.
    pub fn register(db: &MemoryDatabase, name: &str) -> Result<()> {
        let text = json(name)?;
        db.register_catalog_json(&text)
            .map_err(|e| anyhow!("registering catalog '{name}': {e}"))?;
        Ok(())
    }
}

/// A database populated from a fixture scene. Every listed object holds one
/// native reference, released when the scene is dropped.
pub struct Scene {
    db: Arc<MemoryDatabase>,
    objects: BTreeMap<String, ContainerId>,
}

impl Scene {
    pub fn db(&self) -> Arc<MemoryDatabase> {
        Arc::clone(&self.db)
    }

    /// Container created for the object named `name`.
    pub fn id(&self, name: &str) -> Result<ContainerId> {
        lookup(&self.objects, "scene object", name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(|s| s.as_str())
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        for id in self.objects.values() {
            self.db.unref_container(*id);
        }
    }
}

pub mod scenes {
    use super::*;

    pub fn keys() -> impl Iterator<Item = &'static str> {
        MANIFEST.scenes.keys().map(|s| s.as_str())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.scenes, "scene", name)?;
        Ok(resolve_path(&entry.objects))
    }

    pub fn objects(name: &str) -> Result<Vec<ObjectSpec>> {
        load_json(&path(name)?)
    }

    /// Database with the built-in catalog plus every catalog the scene
    /// lists, and no containers.
    pub fn database(name: &str) -> Result<MemoryDatabase> {
        let entry = lookup(&MANIFEST.scenes, "scene", name)?;
        let db = MemoryDatabase::new().map_err(|e| anyhow!("builtin catalog: {e}"))?;
        for catalog in &entry.catalogs {
            catalogs::register(&db, catalog)?;
        }
        Ok(db)
    }

    /// Build the named scene into a fresh database.
    pub fn build(name: &str) -> Result<Scene> {
        let db = Arc::new(database(name)?);
        let mut scene = Scene {
            db: Arc::clone(&db),
            objects: BTreeMap::new(),
        };
        for (index, spec) in objects(name)?.into_iter().enumerate() {
            let id = db
                .create_named(&spec.type_name)
                .map_err(|e| anyhow!("scene '{name}' object {index}: {e}"))?;
            db.ref_container(id);
            let key = spec.name.clone().unwrap_or_else(|| format!("#{index}"));
            scene.objects.insert(key, id);
            if let Some(object_name) = &spec.name {
                db.set_container_name(id, object_name);
            }
            if let Some(init) = &spec.init {
                if !db.set_container_text(id, init) {
                    return Err(anyhow!(
                        "scene '{name}' object {index}: initializer rejected: {init}"
                    ));
                }
            }
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_registers() {
        for name in catalogs::keys() {
            let db = MemoryDatabase::new().unwrap();
            catalogs::register(&db, name).unwrap();
        }
    }

    #[test]
    fn every_scene_builds() {
        for name in scenes::keys() {
            let scene = scenes::build(name).unwrap();
            let db = scene.db();
            for object in scene.names() {
                let id = scene.id(object).unwrap();
                assert_eq!(db.ref_count(id), Some(1), "{name}/{object}");
            }
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        let err = catalogs::path("missing").unwrap_err();
        assert!(err.to_string().contains("unknown catalog fixture 'missing'"));
    }

    #[test]
    fn dropping_a_scene_releases_its_objects() {
        let scene = scenes::build("basic").unwrap();
        let db = scene.db();
        assert!(db.live_count() > 0);
        drop(scene);
        assert_eq!(db.live_count(), 0);
    }
}
