//! Fixed-width numeric families.

use scenebind_native::{FieldRef, SceneDatabase};

use super::{IgnoreReason, ItemShape, NumericCodec, SetOutcome};
use crate::coercion::to_buffer;
use crate::value::{NdArray, ScriptValue};

pub(super) fn decode(db: &dyn SceneDatabase, field: FieldRef, codec: &NumericCodec) -> Option<ScriptValue> {
    let buffer = db.read_numeric(field)?;
    let width = codec.width.max(1);
    if !codec.multi {
        let array = NdArray::from_buffer(buffer);
        return match codec.shape {
            ItemShape::Scalar if width == 1 => array.scalar(0),
            ItemShape::Matrix => array.reshape(vec![4, 4]).map(ScriptValue::Array),
            _ => Some(ScriptValue::Array(array)),
        };
    }
    let items = buffer.len() / width;
    let shape = match codec.shape {
        ItemShape::Matrix => vec![items, 4, 4],
        _ if width == 1 => vec![items],
        _ => vec![items, width],
    };
    NdArray::new(shape, buffer).map(ScriptValue::Array)
}

pub(super) fn encode(
    db: &dyn SceneDatabase,
    field: FieldRef,
    codec: &NumericCodec,
    value: &ScriptValue,
) -> SetOutcome {
    let Some(buffer) = to_buffer(value, codec.element) else {
        return SetOutcome::Ignored(IgnoreReason::NotNumeric);
    };
    let got = buffer.len();
    let width = codec.width.max(1);
    if codec.multi {
        if got % width != 0 {
            return SetOutcome::Ignored(IgnoreReason::NotMultiple { width, got });
        }
    } else if got != width {
        return SetOutcome::Ignored(IgnoreReason::WrongLength {
            expected: width,
            got,
        });
    }
    SetOutcome::from_native(db.write_numeric(field, &buffer))
}
