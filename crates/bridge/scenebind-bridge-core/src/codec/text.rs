//! String fields and the generic text fallback.
//!
//! Text is UTF-8 in both directions. The generic codec talks to the native
//! text format only, so it covers every field type, including ones the
//! bridge has never heard of.

use scenebind_native::{FieldRef, SceneDatabase};

use super::{IgnoreReason, SetOutcome};
use crate::value::ScriptValue;

pub(super) fn decode_strings(db: &dyn SceneDatabase, field: FieldRef, multi: bool) -> Option<ScriptValue> {
    let strings = db.read_strings(field)?;
    if multi {
        Some(ScriptValue::list(strings.into_iter().map(ScriptValue::Str)))
    } else {
        strings.into_iter().next().map(ScriptValue::Str)
    }
}

pub(super) fn encode_strings(
    db: &dyn SceneDatabase,
    field: FieldRef,
    multi: bool,
    value: &ScriptValue,
) -> SetOutcome {
    let strings: Vec<String> = match (multi, value.sequence_items()) {
        (true, Some(items)) => items.iter().map(ToString::to_string).collect(),
        _ => vec![value.to_string()],
    };
    SetOutcome::from_native(db.write_strings(field, &strings))
}

/// Item texts for multi-value fields, the whole field text otherwise.
pub(super) fn decode_generic(db: &dyn SceneDatabase, field: FieldRef, multi: bool) -> Option<ScriptValue> {
    if !multi {
        return db.field_text(field).map(ScriptValue::Str);
    }
    let count = db.field_num(field)?;
    (0..count)
        .map(|i| db.field_item_text(field, i).map(ScriptValue::Str))
        .collect::<Option<Vec<_>>>()
        .map(ScriptValue::List)
}

pub(super) fn encode_generic(
    db: &dyn SceneDatabase,
    field: FieldRef,
    multi: bool,
    value: &ScriptValue,
) -> SetOutcome {
    if let ScriptValue::Str(text) = value {
        return encode_native_text(db, field, text);
    }
    match (multi, value.sequence_items()) {
        (true, Some(items)) => {
            if !db.set_field_num(field, items.len()) {
                return SetOutcome::Ignored(IgnoreReason::NativeRejected);
            }
            let all = items
                .iter()
                .enumerate()
                .all(|(i, item)| db.set_field_item_text(field, i, &item.to_string()));
            if all {
                SetOutcome::Applied
            } else {
                SetOutcome::Ignored(IgnoreReason::TextRejected)
            }
        }
        _ => encode_native_text(db, field, &value.to_string()),
    }
}

pub(super) fn encode_native_text(db: &dyn SceneDatabase, field: FieldRef, text: &str) -> SetOutcome {
    if db.set_field_text(field, text) {
        SetOutcome::Applied
    } else {
        SetOutcome::Ignored(IgnoreReason::TextRejected)
    }
}
