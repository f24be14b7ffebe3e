//! Dynamic values exchanged with the scripting host.
//!
//! `ScriptValue` models the value space of a Python host with numpy arrays:
//! scalars, text, the two byte containers, typed n-dimensional arrays, lists,
//! tuples and wrapped scene objects. `Display` reproduces the host's `str()`
//! so "coerce to text" means the same thing on both sides of the bridge.

use std::fmt;

use scenebind_native::{ElementType, NumericBuffer};

use crate::object::SceneObject;

/// A typed, row-major n-dimensional numeric array.
#[derive(Clone, Debug)]
pub struct NdArray {
    shape: Vec<usize>,
    data: NumericBuffer,
}

impl NdArray {
    /// Returns `None` when the element count does not match `shape`.
    pub fn new(shape: Vec<usize>, data: NumericBuffer) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        Some(Self { shape, data })
    }

    /// One-dimensional array over the whole buffer.
    pub fn from_buffer(data: NumericBuffer) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        Self::from_buffer(NumericBuffer::F32(values.to_vec()))
    }

    pub fn from_f64s(values: &[f64]) -> Self {
        Self::from_buffer(NumericBuffer::F64(values.to_vec()))
    }

    pub fn from_bytes(values: &[u8]) -> Self {
        Self::from_buffer(NumericBuffer::U8(values.to_vec()))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &NumericBuffer {
        &self.data
    }

    pub fn into_data(self) -> NumericBuffer {
        self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Length of the first axis; a zero-dimensional array has length 0.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn reshape(self, shape: Vec<usize>) -> Option<Self> {
        Self::new(shape, self.data)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }

    /// Element `index` of the flat buffer as a host scalar.
    pub fn scalar(&self, index: usize) -> Option<ScriptValue> {
        let v = self.data.get_f64(index)?;
        Some(if self.element_type().is_float() {
            ScriptValue::Float(v)
        } else {
            ScriptValue::Int(v as i64)
        })
    }

    /// Sub-arrays along the first axis, or scalars for a 1-D array.
    pub fn rows(&self) -> Vec<ScriptValue> {
        match self.shape.as_slice() {
            [] => Vec::new(),
            [n] => (0..*n).filter_map(|i| self.scalar(i)).collect(),
            [n, rest @ ..] => {
                let stride: usize = rest.iter().product();
                (0..*n)
                    .map(|i| {
                        ScriptValue::Array(NdArray {
                            shape: rest.to_vec(),
                            data: self.data.slice(i * stride, stride),
                        })
                    })
                    .collect()
            }
        }
    }

    fn fmt_element(&self, index: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.data.get_f64(index).unwrap_or_default();
        if !self.element_type().is_float() {
            return write!(f, "{}", v as i64);
        }
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
            write!(f, "{}.", v as i64)
        } else {
            write_float(f, v)
        }
    }

    fn fmt_axis(
        &self,
        axis: usize,
        offset: usize,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let Some(&n) = self.shape.get(axis) else {
            return self.fmt_element(offset, f);
        };
        let stride: usize = self.shape[axis + 1..].iter().product();
        f.write_str("[")?;
        for i in 0..n {
            if i > 0 {
                if axis + 1 < self.shape.len() {
                    write!(f, "\n{:indent$}", "", indent = axis + 1)?;
                } else {
                    f.write_str(" ")?;
                }
            }
            self.fmt_axis(axis + 1, offset + i * stride, f)?;
        }
        f.write_str("]")
    }
}

impl PartialEq for NdArray {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data.to_f64_vec() == other.data.to_f64_vec()
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_axis(0, 0, f)
    }
}

/// A value on the scripting side of the bridge.
#[derive(Clone, Debug, Default)]
pub enum ScriptValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Immutable byte string.
    Bytes(Vec<u8>),
    /// Mutable byte buffer.
    ByteArray(Vec<u8>),
    Array(NdArray),
    List(Vec<ScriptValue>),
    Tuple(Vec<ScriptValue>),
    Object(SceneObject),
}

impl ScriptValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ScriptValue::None)
    }

    pub fn list<I: IntoIterator<Item = ScriptValue>>(items: I) -> Self {
        ScriptValue::List(items.into_iter().collect())
    }

    pub fn tuple<I: IntoIterator<Item = ScriptValue>>(items: I) -> Self {
        ScriptValue::Tuple(items.into_iter().collect())
    }

    /// Host type name, as `type(value).__name__` would report it.
    pub fn type_name(&self) -> String {
        match self {
            ScriptValue::None => "NoneType".into(),
            ScriptValue::Bool(_) => "bool".into(),
            ScriptValue::Int(_) => "int".into(),
            ScriptValue::Float(_) => "float".into(),
            ScriptValue::Str(_) => "str".into(),
            ScriptValue::Bytes(_) => "bytes".into(),
            ScriptValue::ByteArray(_) => "bytearray".into(),
            ScriptValue::Array(_) => "ndarray".into(),
            ScriptValue::List(_) => "list".into(),
            ScriptValue::Tuple(_) => "tuple".into(),
            ScriptValue::Object(o) => o.class().name().to_string(),
        }
    }

    /// Items of a list, tuple or array (first axis). Text and byte strings
    /// are treated as atoms.
    pub fn sequence_items(&self) -> Option<Vec<ScriptValue>> {
        match self {
            ScriptValue::List(items) | ScriptValue::Tuple(items) => Some(items.clone()),
            ScriptValue::Array(a) if a.ndim() > 0 => Some(a.rows()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SceneObject> {
        match self {
            ScriptValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            ScriptValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The host's `repr()`.
    pub fn repr(&self) -> String {
        match self {
            ScriptValue::Str(s) => quote_repr(s),
            ScriptValue::Array(a) => format!("array({})", ReprRows(a)),
            other => other.to_string(),
        }
    }
}

struct ReprRows<'a>(&'a NdArray);

impl fmt::Display for ReprRows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.0.to_string();
        f.write_str(&rendered.replace(' ', ", ").replace("\n,", ",\n"))
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

fn quote_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::from("b'");
    for b in bytes {
        match b {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7e => out.push(*b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('\'');
    out
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::None => f.write_str("None"),
            ScriptValue::Bool(true) => f.write_str("True"),
            ScriptValue::Bool(false) => f.write_str("False"),
            ScriptValue::Int(i) => write!(f, "{i}"),
            ScriptValue::Float(v) => write_float(f, *v),
            ScriptValue::Str(s) => f.write_str(s),
            ScriptValue::Bytes(b) => f.write_str(&bytes_repr(b)),
            ScriptValue::ByteArray(b) => write!(f, "bytearray({})", bytes_repr(b)),
            ScriptValue::Array(a) => write!(f, "{a}"),
            ScriptValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            ScriptValue::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            ScriptValue::Object(o) => f.write_str(&o.repr()),
        }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        use ScriptValue::*;
        match (self, other) {
            (None, None) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) | (ByteArray(a), ByteArray(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        ScriptValue::Bool(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        ScriptValue::Int(v)
    }
}

impl From<i32> for ScriptValue {
    fn from(v: i32) -> Self {
        ScriptValue::Int(v as i64)
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        ScriptValue::Float(v)
    }
}

impl From<f32> for ScriptValue {
    fn from(v: f32) -> Self {
        ScriptValue::Float(v as f64)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        ScriptValue::Str(v.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        ScriptValue::Str(v)
    }
}

impl From<NdArray> for ScriptValue {
    fn from(v: NdArray) -> Self {
        ScriptValue::Array(v)
    }
}

impl From<SceneObject> for ScriptValue {
    fn from(v: SceneObject) -> Self {
        ScriptValue::Object(v)
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(v: Vec<ScriptValue>) -> Self {
        ScriptValue::List(v)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ScriptValue::None, Into::into)
    }
}
