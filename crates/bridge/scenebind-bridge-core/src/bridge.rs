//! The bridge: one native database, its codec table, its class registry and
//! the module namespace classes are published into.

use std::sync::Arc;

use log::debug;
use scenebind_native::{ContainerId, FieldRef, NativeError, SceneDatabase};

use crate::binding::Binding;
use crate::codec::{CodecTable, IgnoreReason, SetOutcome};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::module::Module;
use crate::object::SceneObject;
use crate::synth::{ClassRegistry, RootKind, SynthesizedType};

/// Constructor arguments of a scene object class.
///
/// `pointer` binds an existing container, `type_name` creates a new one (root
/// classes only; synthesized classes always create their own type) and a
/// bare `name` looks an existing node or engine up. `init` and `name` are
/// applied to created or bound containers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructArgs {
    pub type_name: Option<String>,
    pub init: Option<String>,
    pub name: Option<String>,
    pub pointer: Option<ContainerId>,
}

impl ConstructArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_pointer(mut self, pointer: ContainerId) -> Self {
        self.pointer = Some(pointer);
        self
    }
}

pub struct Bridge {
    db: Arc<dyn SceneDatabase>,
    config: BridgeConfig,
    codecs: CodecTable,
    classes: ClassRegistry,
    module: Module,
}

impl Bridge {
    pub fn new(db: Arc<dyn SceneDatabase>, config: BridgeConfig) -> Result<Arc<Self>> {
        let classes = ClassRegistry::new(db.as_ref())?;
        let module = Module::new();
        for kind in RootKind::ALL {
            module.insert(classes.root(kind));
        }
        if config.synthesize_classes_on_init {
            module.create_classes(db.as_ref(), &classes)?;
        }
        Ok(Arc::new(Self {
            db,
            config,
            codecs: CodecTable::new(),
            classes,
            module,
        }))
    }

    pub fn db(&self) -> &dyn SceneDatabase {
        self.db.as_ref()
    }

    pub fn db_handle(&self) -> Arc<dyn SceneDatabase> {
        Arc::clone(&self.db)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Class for a native type name, published into the module namespace.
    pub fn class(&self, type_name: &str) -> Result<Arc<SynthesizedType>> {
        let class = self.classes.resolve(self.db(), type_name)?;
        if !self.module.contains(type_name) {
            self.module.insert(Arc::clone(&class));
        }
        Ok(class)
    }

    /// Publish classes for node and engine types registered since start-up.
    pub fn create_classes(&self) -> Result<usize> {
        self.module.create_classes(self.db(), &self.classes)
    }

    /// Wrap an existing container in a new object of its own class. The
    /// object takes one native reference.
    pub fn wrap(self: &Arc<Self>, id: ContainerId) -> Result<SceneObject> {
        let tag = self
            .db
            .container_type(id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
        let type_name = self
            .db
            .type_name(tag)
            .ok_or_else(|| BridgeError::UnknownType(tag.to_string()))?;
        let class = self.class(&type_name)?;
        let binding = Binding::bound(self.db_handle(), id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
        Ok(SceneObject::from_parts(Arc::clone(self), class, binding))
    }

    /// Create a new container of `type_name`, optionally initialised with a
    /// field initialiser.
    pub fn create(self: &Arc<Self>, type_name: &str, init: Option<&str>) -> Result<SceneObject> {
        let class = self.class(type_name)?;
        let mut args = ConstructArgs::new();
        args.init = init.map(str::to_string);
        self.instantiate(&class, args)
    }

    /// Construct an object of `class` the way the host calls the class.
    pub fn instantiate(self: &Arc<Self>, class: &Arc<SynthesizedType>, args: ConstructArgs) -> Result<SceneObject> {
        let db = self.db();
        if let Some(pointer) = args.pointer {
            let actual = db
                .container_type(pointer)
                .ok_or_else(|| BridgeError::NotFound(pointer.to_string()))?;
            if !db.is_type_derived_from(actual, class.native_type()) {
                return Err(BridgeError::TypeMismatch {
                    given: db.type_name(actual).unwrap_or_default(),
                    expected: class.name().to_string(),
                });
            }
            return self.bind_new(class, pointer, &args);
        }

        let type_name = if class.is_root() {
            args.type_name.clone()
        } else {
            match &args.type_name {
                Some(t) if t != class.name() => {
                    return Err(BridgeError::InvalidArgument(format!(
                        "class {} cannot create '{t}'",
                        class.name()
                    )))
                }
                _ => Some(class.name().to_string()),
            }
        };

        if let Some(type_name) = type_name {
            let tag = db
                .type_from_name(&type_name)
                .ok_or_else(|| BridgeError::UnknownType(type_name.clone()))?;
            if !db.can_create_instance(tag) {
                return Err(NativeError::NotCreatable(type_name).into());
            }
            let allowed = class.root() != RootKind::FieldContainer
                && db.is_type_derived_from(tag, class.native_type());
            if !allowed {
                let expected = match class.root() {
                    RootKind::FieldContainer => "Node or Engine".to_string(),
                    _ => class.name().to_string(),
                };
                return Err(BridgeError::TypeMismatch {
                    given: type_name,
                    expected,
                });
            }
            let id = db
                .create_instance(tag)
                .ok_or_else(|| NativeError::NotCreatable(type_name.clone()))?;
            return self.bind_new(class, id, &args);
        }

        if let Some(name) = &args.name {
            if class.root() == RootKind::FieldContainer {
                return Err(BridgeError::InvalidArgument(
                    "name lookup requires a Node or Engine class".into(),
                ));
            }
            let id = db
                .find_by_name(name, class.native_type())
                .ok_or_else(|| BridgeError::NotFound(name.clone()))?;
            let binding = Binding::bound(self.db_handle(), id)
                .ok_or_else(|| BridgeError::NotFound(name.clone()))?;
            return Ok(SceneObject::from_parts(Arc::clone(self), Arc::clone(class), binding));
        }

        Ok(SceneObject::from_parts(
            Arc::clone(self),
            Arc::clone(class),
            Binding::unbound(self.db_handle()),
        ))
    }

    /// Construct through the most specific class: `pointer` and `name` wrap
    /// an existing container, `type_name` creates one.
    pub fn create_object(self: &Arc<Self>, args: ConstructArgs) -> Result<SceneObject> {
        let object = if let Some(pointer) = args.pointer {
            self.wrap(pointer)?
        } else if let Some(type_name) = &args.type_name {
            let class = self.class(type_name)?;
            return self.instantiate(&class, args);
        } else if let Some(name) = &args.name {
            let id = [RootKind::Node, RootKind::Engine]
                .into_iter()
                .find_map(|kind| {
                    self.db
                        .find_by_name(name, self.classes.root(kind).native_type())
                })
                .ok_or_else(|| BridgeError::NotFound(name.clone()))?;
            return self.wrap(id);
        } else {
            return Err(BridgeError::InvalidArgument(
                "a type name, object name or pointer is required".into(),
            ));
        };
        self.apply_args(&object, &args)?;
        Ok(object)
    }

    fn bind_new(
        self: &Arc<Self>,
        class: &Arc<SynthesizedType>,
        id: ContainerId,
        args: &ConstructArgs,
    ) -> Result<SceneObject> {
        let binding = Binding::bound(self.db_handle(), id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
        let object = SceneObject::from_parts(Arc::clone(self), Arc::clone(class), binding);
        self.apply_args(&object, args)?;
        Ok(object)
    }

    fn apply_args(&self, object: &SceneObject, args: &ConstructArgs) -> Result<()> {
        if let Some(name) = args.name.as_deref().filter(|n| !n.is_empty()) {
            object.set_name(name)?;
        }
        if let Some(init) = args.init.as_deref().filter(|i| !i.is_empty()) {
            if !object.set(init)? {
                self.settle("<init>", SetOutcome::Ignored(IgnoreReason::TextRejected))?;
            }
        }
        Ok(())
    }

    /// Log an ignored assignment and, in strict mode, turn it into an error.
    pub(crate) fn settle(&self, field_name: &str, outcome: SetOutcome) -> Result<SetOutcome> {
        if let SetOutcome::Ignored(reason) = &outcome {
            debug!("assignment to '{field_name}' ignored: {reason}");
            if self.config.strict_values {
                return Err(BridgeError::ValueRejected {
                    field: field_name.to_string(),
                    reason: reason.clone(),
                });
            }
        }
        Ok(outcome)
    }

    pub(crate) fn settle_field(&self, field: FieldRef, outcome: SetOutcome) -> Result<SetOutcome> {
        let name = self.db.field_name(field).unwrap_or_default();
        self.settle(&name, outcome)
    }

    /// Drop every synthesized class and unpublish the module namespace.
    /// Existing objects keep their classes alive.
    pub fn shutdown(&self) {
        self.module.clear();
        self.classes.reset();
        debug!("bridge shut down");
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("classes", &self.classes.len())
            .field("module", &self.module.len())
            .finish()
    }
}
