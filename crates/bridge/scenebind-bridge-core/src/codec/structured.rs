//! Rotations, images and planes.

use scenebind_native::{
    FieldRef, Image, NumericBuffer, Plane, Rotation, SceneDatabase, MAX_IMAGE_DIMENSION,
};

use super::{IgnoreReason, SetOutcome};
use crate::coercion::{as_bytes, as_int, flatten_numbers, to_f32_array};
use crate::value::{NdArray, ScriptValue};

pub(super) fn decode_rotation(db: &dyn SceneDatabase, field: FieldRef) -> Option<ScriptValue> {
    let buffer = db.read_numeric(field)?;
    Some(ScriptValue::Array(NdArray::from_buffer(buffer)))
}

/// Accepted forms, first match wins: `(axis, angle)`, `(from, to)`, a flat
/// 4×4 matrix, a flat quaternion.
fn parse_rotation(value: &ScriptValue) -> Option<Rotation> {
    if let ScriptValue::Tuple(items) | ScriptValue::List(items) = value {
        if let [first, second] = items.as_slice() {
            if let Some(axis) = to_f32_array::<3>(first) {
                if axis.iter().any(|v| !v.is_finite()) {
                    return None;
                }
                if let Some(angle) = second.as_f64() {
                    return angle
                        .is_finite()
                        .then(|| Rotation::from_axis_angle(axis, angle as f32));
                }
                if let Some(to) = to_f32_array::<3>(second) {
                    return to
                        .iter()
                        .all(|v| v.is_finite())
                        .then(|| Rotation::from_vectors(axis, to));
                }
            }
        }
    }
    let numbers = flatten_numbers(value)?;
    let flat: Vec<f32> = numbers.iter().map(|n| n.as_f64() as f32).collect();
    if flat.iter().any(|v| !v.is_finite()) {
        return None;
    }
    match flat.len() {
        16 => {
            let mut m = [0.0f32; 16];
            m.copy_from_slice(&flat);
            Rotation::from_matrix(&m)
        }
        4 => Some(Rotation::from_quat([flat[0], flat[1], flat[2], flat[3]])),
        _ => None,
    }
}

pub(super) fn encode_rotation(db: &dyn SceneDatabase, field: FieldRef, value: &ScriptValue) -> SetOutcome {
    match parse_rotation(value) {
        Some(rotation) => {
            let quat = NumericBuffer::F32(rotation.quat().to_vec());
            SetOutcome::from_native(db.write_numeric(field, &quat))
        }
        None => SetOutcome::Ignored(IgnoreReason::Unsupported("rotation")),
    }
}

pub(super) fn decode_image(db: &dyn SceneDatabase, field: FieldRef) -> Option<ScriptValue> {
    let image = db.read_image(field)?;
    Some(ScriptValue::tuple([
        ScriptValue::Int(image.width as i64),
        ScriptValue::Int(image.height as i64),
        ScriptValue::Int(image.channels as i64),
        ScriptValue::Array(NdArray::from_bytes(&image.pixels)),
    ]))
}

pub(super) fn encode_image(db: &dyn SceneDatabase, field: FieldRef, value: &ScriptValue) -> SetOutcome {
    const SHAPE: IgnoreReason = IgnoreReason::Unsupported("image (width, height, channels[, pixels])");
    let ScriptValue::Tuple(items) = value else {
        return SetOutcome::Ignored(SHAPE);
    };
    let (dims, pixels) = match items.as_slice() {
        [w, h, c] => ([w, h, c], None),
        [w, h, c, p] => ([w, h, c], Some(p)),
        _ => return SetOutcome::Ignored(SHAPE),
    };
    let mut size = [0u32; 3];
    for (slot, dim) in size.iter_mut().zip(dims) {
        match as_int(dim).and_then(|d| u32::try_from(d).ok()) {
            Some(d) => *slot = d,
            None => return SetOutcome::Ignored(SHAPE),
        }
    }
    let [width, height, channels] = size;
    let too_large = SetOutcome::Ignored(IgnoreReason::ImageTooLarge { width, height });
    let Some(needed) = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
    else {
        return too_large;
    };
    if needed == 0 {
        return SetOutcome::from_native(db.write_image(field, &Image::empty()));
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return too_large;
    }
    let bytes = match pixels.map(as_bytes) {
        Some(Some(bytes)) => bytes,
        Some(None) => return SetOutcome::Ignored(IgnoreReason::NotNumeric),
        None => Vec::new(),
    };
    match Image::new(width, height, channels, &bytes) {
        Some(image) => SetOutcome::from_native(db.write_image(field, &image)),
        None => SetOutcome::Ignored(IgnoreReason::ImageTooSmall {
            needed,
            got: bytes.len(),
        }),
    }
}

pub(super) fn decode_planes(db: &dyn SceneDatabase, field: FieldRef, multi: bool) -> Option<ScriptValue> {
    let planes = db.read_planes(field)?;
    let flat: Vec<f32> = planes.iter().flat_map(Plane::to_vec4).collect();
    let shape = if multi {
        vec![planes.len(), 4]
    } else {
        vec![4]
    };
    NdArray::new(shape, NumericBuffer::F32(flat)).map(ScriptValue::Array)
}

pub(super) fn encode_planes(
    db: &dyn SceneDatabase,
    field: FieldRef,
    multi: bool,
    value: &ScriptValue,
) -> SetOutcome {
    let Some(numbers) = flatten_numbers(value) else {
        return SetOutcome::Ignored(IgnoreReason::NotNumeric);
    };
    let got = numbers.len();
    if multi && got % 4 != 0 {
        return SetOutcome::Ignored(IgnoreReason::NotMultiple { width: 4, got });
    }
    if !multi && got != 4 {
        return SetOutcome::Ignored(IgnoreReason::WrongLength { expected: 4, got });
    }
    let planes: Vec<Plane> = numbers
        .chunks_exact(4)
        .map(|c| {
            let v: Vec<f32> = c.iter().map(|n| n.as_f64() as f32).collect();
            Plane::new([v[0], v[1], v[2]], v[3])
        })
        .collect();
    SetOutcome::from_native(db.write_planes(field, &planes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v3(x: f64, y: f64, z: f64) -> ScriptValue {
        ScriptValue::list([x.into(), y.into(), z.into()])
    }

    #[test]
    fn axis_angle_form_wins_over_quaternion() {
        let value = ScriptValue::tuple([v3(0.0, 0.0, 1.0), std::f64::consts::PI.into()]);
        let q = parse_rotation(&value).unwrap().quat();
        assert_relative_eq!(q[2], 1.0, epsilon = 1e-6);
        assert_relative_eq!(q[3], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn two_vectors_form_a_rotation() {
        let value = ScriptValue::list([v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)]);
        let (axis, angle) = parse_rotation(&value).unwrap().axis_angle();
        assert_relative_eq!(axis[2], 1.0, epsilon = 1e-6);
        assert_relative_eq!(angle, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn identity_matrix_is_identity_rotation() {
        let mut m = vec![0.0f32; 16];
        for i in 0..4 {
            m[i * 5] = 1.0;
        }
        let value = ScriptValue::from(NdArray::from_f32s(&m));
        assert_eq!(parse_rotation(&value).unwrap().quat(), Rotation::IDENTITY.quat());
    }

    #[test]
    fn non_finite_components_are_not_rotations() {
        let nan_matrix = ScriptValue::from(NdArray::from_f32s(&[f32::NAN; 16]));
        assert!(parse_rotation(&nan_matrix).is_none());
        let nan_quat = ScriptValue::from(NdArray::from_f32s(&[0.0, 0.0, f32::NAN, 1.0]));
        assert!(parse_rotation(&nan_quat).is_none());
        let nan_angle = ScriptValue::tuple([v3(0.0, 0.0, 1.0), f64::NAN.into()]);
        assert!(parse_rotation(&nan_angle).is_none());
        let inf_to = ScriptValue::tuple([v3(1.0, 0.0, 0.0), v3(f64::INFINITY, 0.0, 0.0)]);
        assert!(parse_rotation(&inf_to).is_none());
    }

    #[test]
    fn other_lengths_are_not_rotations() {
        assert!(parse_rotation(&v3(1.0, 2.0, 3.0)).is_none());
        assert!(parse_rotation(&ScriptValue::from("0 0 1 0")).is_none());
    }
}
