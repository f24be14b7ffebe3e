use scenebind_native::NativeError;
use thiserror::Error;

use crate::codec::IgnoreReason;

/// Errors surfaced to the scripting host.
///
/// Data-shape problems on field assignment are not errors unless the bridge
/// runs with `strict_values`; see [`crate::codec::SetOutcome`].
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("object has no attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown native type '{0}'")]
    UnknownType(String),
    #[error("'{0}' is not a field container type")]
    NotSceneObjectType(String),
    #[error("type '{given}' is not derived from '{expected}'")]
    TypeMismatch { given: String, expected: String },
    #[error("no object named '{0}' found")]
    NotFound(String),
    #[error("value rejected by field '{field}': {reason}")]
    ValueRejected { field: String, reason: IgnoreReason },
    #[error("object is not bound to a native container")]
    Unbound,
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    #[error("object is not a group")]
    NotAGroup,
    #[error("group refused the child")]
    ChildRejected,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("bridge config: {0}")]
    Config(String),
    #[error(transparent)]
    Native(#[from] NativeError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
