//! Coercion helpers from host values to native buffers.
//!
//! Numeric coercion mirrors a forced array cast: any nesting of scalars,
//! lists, tuples and arrays flattens to one buffer, and each component is
//! converted to the target element type with C cast rules (floats truncate
//! toward zero, integers wrap). Nothing out of range is rejected.

use scenebind_native::{ElementType, NumericBuffer};

use crate::value::ScriptValue;

/// One flattened numeric component, keeping integer precision.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(v) => v,
        }
    }

    /// Integer view with C truncation. NaN maps to 0, infinities saturate.
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(i) => i,
            Number::Float(v) => v as i64,
        }
    }
}

/// Flatten every numeric component of `value` in row-major order. Returns
/// `None` as soon as a non-numeric leaf is found.
pub fn flatten_numbers(value: &ScriptValue) -> Option<Vec<Number>> {
    let mut out = Vec::new();
    collect(value, &mut out).then_some(out)
}

fn collect(value: &ScriptValue, out: &mut Vec<Number>) -> bool {
    match value {
        ScriptValue::Bool(b) => out.push(Number::Int(*b as i64)),
        ScriptValue::Int(i) => out.push(Number::Int(*i)),
        ScriptValue::Float(v) => out.push(Number::Float(*v)),
        ScriptValue::Array(a) => {
            let floats = a.element_type().is_float();
            out.extend(a.to_f64_vec().into_iter().map(|v| {
                if floats {
                    Number::Float(v)
                } else {
                    Number::Int(v as i64)
                }
            }));
        }
        ScriptValue::List(items) | ScriptValue::Tuple(items) => {
            return items.iter().all(|item| collect(item, out));
        }
        _ => return false,
    }
    true
}

/// Convert components to `element` with cast semantics.
pub fn forcecast(numbers: &[Number], element: ElementType) -> NumericBuffer {
    match element {
        ElementType::F32 => NumericBuffer::F32(numbers.iter().map(|n| n.as_f64() as f32).collect()),
        ElementType::F64 => NumericBuffer::F64(numbers.iter().map(|n| n.as_f64()).collect()),
        ElementType::I32 => NumericBuffer::I32(numbers.iter().map(|n| n.as_i64() as i32).collect()),
        ElementType::U32 => NumericBuffer::U32(numbers.iter().map(|n| n.as_i64() as u32).collect()),
        ElementType::I16 => NumericBuffer::I16(numbers.iter().map(|n| n.as_i64() as i16).collect()),
        ElementType::U16 => NumericBuffer::U16(numbers.iter().map(|n| n.as_i64() as u16).collect()),
        ElementType::U8 => NumericBuffer::U8(numbers.iter().map(|n| n.as_i64() as u8).collect()),
    }
}

/// Flat buffer of `element` built from any numeric host value.
pub fn to_buffer(value: &ScriptValue, element: ElementType) -> Option<NumericBuffer> {
    if let ScriptValue::Array(a) = value {
        if a.element_type() == element {
            return Some(a.data().clone());
        }
    }
    flatten_numbers(value).map(|n| forcecast(&n, element))
}

/// Components as `f32`, only when there are exactly `N` of them.
pub fn to_f32_array<const N: usize>(value: &ScriptValue) -> Option<[f32; N]> {
    let numbers = flatten_numbers(value)?;
    if numbers.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, n) in out.iter_mut().zip(numbers) {
        *slot = n.as_f64() as f32;
    }
    Some(out)
}

/// Integer argument: `int` or `bool`, never a float.
pub fn as_int(value: &ScriptValue) -> Option<i64> {
    match value {
        ScriptValue::Int(i) => Some(*i),
        ScriptValue::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

/// Raw bytes from `bytes`, `bytearray` or any numeric sequence cast to `u8`.
pub fn as_bytes(value: &ScriptValue) -> Option<Vec<u8>> {
    match value {
        ScriptValue::Bytes(b) | ScriptValue::ByteArray(b) => Some(b.clone()),
        ScriptValue::Array(_) | ScriptValue::List(_) | ScriptValue::Tuple(_) => {
            match to_buffer(value, ElementType::U8)? {
                NumericBuffer::U8(v) => Some(v),
                _ => None,
            }
        }
        _ => None,
    }
}
