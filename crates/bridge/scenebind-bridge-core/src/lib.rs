//! scenebind-bridge-core: typed field marshalling between a native scene
//! database and a dynamically typed scripting host, plus the object lifetime
//! bridge and dynamic class synthesis that make it usable from the host.

pub mod binding;
pub mod bridge;
pub mod codec;
pub mod coercion;
pub mod config;
pub mod error;
pub mod field;
pub mod kit;
pub mod module;
pub mod object;
pub mod registry;
pub mod synth;
pub mod value;

pub use bridge::{Bridge, ConstructArgs};
pub use codec::{Codec, CodecTable, IgnoreReason, ItemShape, NumericFamily, SetOutcome};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use field::{ConnectionSource, FieldHandle, OutputHandle};
pub use kit::KitCatalog;
pub use module::Module;
pub use object::SceneObject;
pub use registry::{FieldFamily, TypeRegistryAdapter};
pub use synth::{ClassRegistry, RootKind, SynthesizedType};
pub use value::{NdArray, ScriptValue};
