//! scenebind-native-core: the native scene database contract and an
//! in-memory reference runtime implementing it.

pub mod catalog;
pub mod database;
pub mod error;
mod field_data;
pub mod memory;
mod text;
pub mod types;
pub mod values;

pub use catalog::{CatalogSpec, FieldStorage};
pub use database::{Connection, ContainerId, FieldRef, OutputRef, PartInfo, SceneDatabase};
pub use error::NativeError;
pub use memory::MemoryDatabase;
pub use types::TypeTag;
pub use values::{ElementType, Image, NumericBuffer, Plane, Rotation, MAX_IMAGE_DIMENSION};
