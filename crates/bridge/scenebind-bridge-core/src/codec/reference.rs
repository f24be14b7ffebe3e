//! Node and engine reference fields, including kit part routing.

use std::sync::Arc;

use log::debug;
use scenebind_native::{ContainerId, FieldRef, FieldStorage, SceneDatabase};

use super::{IgnoreReason, SetOutcome};
use crate::bridge::Bridge;
use crate::value::ScriptValue;

fn wrap(bridge: &Arc<Bridge>, target: Option<ContainerId>) -> ScriptValue {
    let Some(id) = target else {
        return ScriptValue::None;
    };
    match bridge.wrap(id) {
        Ok(object) => ScriptValue::Object(object),
        Err(err) => {
            debug!("cannot wrap referenced container {id}: {err}");
            ScriptValue::None
        }
    }
}

pub(super) fn decode(bridge: &Arc<Bridge>, field: FieldRef, multi: bool) -> Option<ScriptValue> {
    let refs = bridge.db().read_refs(field)?;
    if multi {
        Some(ScriptValue::list(refs.into_iter().map(|r| wrap(bridge, r))))
    } else {
        Some(wrap(bridge, refs.first().copied().flatten()))
    }
}

/// Container behind `value` when it is a bound object whose type derives
/// from the field's reference target.
fn accepted_target(db: &dyn SceneDatabase, field: FieldRef, value: &ScriptValue) -> Option<ContainerId> {
    let id = value.as_object()?.container_id()?;
    let field_type = db.field_type(field)?;
    let Some(FieldStorage::Reference { target }) = db.field_storage(field_type) else {
        return None;
    };
    let target = db.type_from_name(&target)?;
    let actual = db.container_type(id)?;
    db.is_type_derived_from(actual, target).then_some(id)
}

fn kit_part(db: &dyn SceneDatabase, field: FieldRef) -> Option<String> {
    let name = db.field_name(field)?;
    db.is_part(field.container, &name).then_some(name)
}

pub(super) fn encode(
    db: &dyn SceneDatabase,
    field: FieldRef,
    multi: bool,
    value: &ScriptValue,
) -> SetOutcome {
    if multi {
        return encode_multi(db, field, value);
    }
    let target = match value {
        ScriptValue::None => None,
        other => match accepted_target(db, field, other) {
            Some(id) => Some(id),
            None => return SetOutcome::Ignored(IgnoreReason::WrongReferenceKind),
        },
    };
    let ok = match kit_part(db, field) {
        Some(part) => db.set_part(field.container, &part, target),
        None => db.write_ref(field, 0, target),
    };
    if ok {
        SetOutcome::Applied
    } else {
        SetOutcome::Ignored(IgnoreReason::WrongReferenceKind)
    }
}

/// A single object makes a one-element field; a sequence resizes the field
/// and writes only the accepted objects. Other slots keep their previous
/// occupant, or stay empty when the field grew.
fn encode_multi(db: &dyn SceneDatabase, field: FieldRef, value: &ScriptValue) -> SetOutcome {
    if value.is_none() {
        return SetOutcome::from_native(db.set_field_num(field, 0));
    }
    if let ScriptValue::Object(_) = value {
        let Some(id) = accepted_target(db, field, value) else {
            return SetOutcome::Ignored(IgnoreReason::WrongReferenceKind);
        };
        // Acquire the new target before shrinking releases the old items.
        let ok = db.write_ref(field, 0, Some(id)) && db.set_field_num(field, 1);
        return SetOutcome::from_native(ok);
    }
    let Some(items) = value.sequence_items() else {
        return SetOutcome::Ignored(IgnoreReason::WrongReferenceKind);
    };
    let targets: Vec<Option<ContainerId>> = items
        .iter()
        .map(|item| accepted_target(db, field, item))
        .collect();
    let current = db.field_num(field).unwrap_or(0);
    // Overwrite the shared prefix first so reassigned objects stay alive.
    for (i, target) in targets.iter().enumerate().take(current) {
        if let Some(id) = target {
            if !db.write_ref(field, i, Some(*id)) {
                return SetOutcome::Ignored(IgnoreReason::NativeRejected);
            }
        }
    }
    if !db.set_field_num(field, targets.len()) {
        return SetOutcome::Ignored(IgnoreReason::NativeRejected);
    }
    for (i, target) in targets.iter().enumerate().skip(current) {
        if let Some(id) = target {
            if !db.write_ref(field, i, Some(*id)) {
                return SetOutcome::Ignored(IgnoreReason::NativeRejected);
            }
        }
    }
    let skipped = targets.iter().filter(|t| t.is_none()).count();
    if skipped > 0 {
        debug!("skipped {skipped} element(s) that are not objects of the referenced kind");
    }
    SetOutcome::Applied
}
