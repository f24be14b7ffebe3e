//! Native value types shared by every storage family.
//!
//! `NumericBuffer` is the flat, typed representation used for all fixed-width
//! numeric fields; the structured types (`Plane`, `Image`, `Rotation`) mirror
//! the toolkit's own value classes and carry their normalisation rules.

use std::f32::consts::PI;

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Element type of a numeric buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F32,
    F64,
    I32,
    U32,
    I16,
    U16,
    U8,
}

impl ElementType {
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    /// Size of one element in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F64 => 8,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::U8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::I32 => "int32",
            ElementType::U32 => "uint32",
            ElementType::I16 => "int16",
            ElementType::U16 => "uint16",
            ElementType::U8 => "uint8",
        }
    }
}

/// Flat homogeneous numeric storage.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U8(Vec<u8>),
}

macro_rules! each_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            NumericBuffer::F32($v) => $body,
            NumericBuffer::F64($v) => $body,
            NumericBuffer::I32($v) => $body,
            NumericBuffer::U32($v) => $body,
            NumericBuffer::I16($v) => $body,
            NumericBuffer::U16($v) => $body,
            NumericBuffer::U8($v) => $body,
        }
    };
}

macro_rules! each_buffer_map {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            NumericBuffer::F32($v) => NumericBuffer::F32($body),
            NumericBuffer::F64($v) => NumericBuffer::F64($body),
            NumericBuffer::I32($v) => NumericBuffer::I32($body),
            NumericBuffer::U32($v) => NumericBuffer::U32($body),
            NumericBuffer::I16($v) => NumericBuffer::I16($body),
            NumericBuffer::U16($v) => NumericBuffer::U16($body),
            NumericBuffer::U8($v) => NumericBuffer::U8($body),
        }
    };
}

impl NumericBuffer {
    /// A zero-filled buffer of `len` elements.
    pub fn zeros(element: ElementType, len: usize) -> Self {
        match element {
            ElementType::F32 => NumericBuffer::F32(vec![0.0; len]),
            ElementType::F64 => NumericBuffer::F64(vec![0.0; len]),
            ElementType::I32 => NumericBuffer::I32(vec![0; len]),
            ElementType::U32 => NumericBuffer::U32(vec![0; len]),
            ElementType::I16 => NumericBuffer::I16(vec![0; len]),
            ElementType::U16 => NumericBuffer::U16(vec![0; len]),
            ElementType::U8 => NumericBuffer::U8(vec![0; len]),
        }
    }

    /// Build a buffer from `f64` components using plain `as` conversion.
    pub fn from_f64s(element: ElementType, values: &[f64]) -> Self {
        match element {
            ElementType::F32 => NumericBuffer::F32(values.iter().map(|v| *v as f32).collect()),
            ElementType::F64 => NumericBuffer::F64(values.to_vec()),
            ElementType::I32 => NumericBuffer::I32(values.iter().map(|v| *v as i32).collect()),
            ElementType::U32 => NumericBuffer::U32(values.iter().map(|v| *v as u32).collect()),
            ElementType::I16 => NumericBuffer::I16(values.iter().map(|v| *v as i16).collect()),
            ElementType::U16 => NumericBuffer::U16(values.iter().map(|v| *v as u16).collect()),
            ElementType::U8 => NumericBuffer::U8(values.iter().map(|v| *v as u8).collect()),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            NumericBuffer::F32(_) => ElementType::F32,
            NumericBuffer::F64(_) => ElementType::F64,
            NumericBuffer::I32(_) => ElementType::I32,
            NumericBuffer::U32(_) => ElementType::U32,
            NumericBuffer::I16(_) => ElementType::I16,
            NumericBuffer::U16(_) => ElementType::U16,
            NumericBuffer::U8(_) => ElementType::U8,
        }
    }

    pub fn len(&self) -> usize {
        each_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one element widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        each_buffer!(self, v => v.get(index).map(|x| *x as f64))
    }

    /// Copy of the elements in `start..start + len`, clamped to the buffer.
    pub fn slice(&self, start: usize, len: usize) -> NumericBuffer {
        each_buffer_map!(self, v => {
            let begin = start.min(v.len());
            let end = start.saturating_add(len).min(v.len());
            v[begin..end].to_vec()
        })
    }

    /// Grow with zeros or truncate to exactly `len` elements.
    pub fn resize(&mut self, len: usize) {
        each_buffer!(self, v => v.resize(len, Default::default()))
    }

    /// Overwrite elements starting at `start` with the contents of `src`.
    /// Returns `false` when the element types differ or `src` does not fit.
    pub fn write_at(&mut self, start: usize, src: &NumericBuffer) -> bool {
        if start + src.len() > self.len() {
            return false;
        }
        match (self, src) {
            (NumericBuffer::F32(d), NumericBuffer::F32(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::F64(d), NumericBuffer::F64(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::I32(d), NumericBuffer::I32(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::U32(d), NumericBuffer::U32(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::I16(d), NumericBuffer::I16(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::U16(d), NumericBuffer::U16(s)) => d[start..start + s.len()].copy_from_slice(s),
            (NumericBuffer::U8(d), NumericBuffer::U8(s)) => d[start..start + s.len()].copy_from_slice(s),
            _ => return false,
        }
        true
    }

    /// Components widened to `f64`, in storage order.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        each_buffer!(self, v => v.iter().map(|x| *x as f64).collect())
    }

    /// Format element `index` the way the text format writes numbers.
    pub fn format_element(&self, index: usize) -> Option<String> {
        each_buffer!(self, v => v.get(index).map(|x| x.to_string()))
    }

    /// Little-endian raw bytes of the buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.element_type().byte_width());
        each_buffer!(self, v => {
            for x in v.iter() {
                out.extend_from_slice(&x.to_le_bytes());
            }
        });
        out
    }
}

/// Plane stored as unit normal plus signed distance from the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: [f32; 3],
    pub distance: f32,
}

impl Plane {
    /// Construct a plane, normalising `normal` when it has non-zero length.
    pub fn new(normal: [f32; 3], distance: f32) -> Self {
        let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        let normal = if len > 0.0 {
            [normal[0] / len, normal[1] / len, normal[2] / len]
        } else {
            normal
        };
        Plane { normal, distance }
    }

    /// Flatten to `(nx, ny, nz, d)`.
    pub fn to_vec4(&self) -> [f32; 4] {
        [self.normal[0], self.normal[1], self.normal[2], self.distance]
    }
}

impl Default for Plane {
    fn default() -> Self {
        Plane::new([1.0, 0.0, 0.0], 0.0)
    }
}

/// Largest width/height the native image size type can hold.
pub const MAX_IMAGE_DIMENSION: u32 = i16::MAX as u32;

/// 2D image with interleaved 8-bit channels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn empty() -> Self {
        Image::default()
    }

    /// Build an image from the leading `width * height * channels` bytes of
    /// `pixels`. A zero-sized request yields the empty image; oversize
    /// dimensions or a short buffer yield `None`.
    pub fn new(width: u32, height: u32, channels: u32, pixels: &[u8]) -> Option<Self> {
        let needed = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(channels as usize)?;
        if needed == 0 {
            return Some(Image::empty());
        }
        if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
            return None;
        }
        if pixels.len() < needed {
            return None;
        }
        Some(Image {
            width,
            height,
            channels,
            pixels: pixels[..needed].to_vec(),
        })
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }
}

// zero would let the fit loop until convergence
const MATRIX_FIT_ITERATIONS: usize = 64;

/// Rotation stored as a unit quaternion `(x, y, z, w)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rotation {
    quat: [f32; 4],
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation {
        quat: [0.0, 0.0, 0.0, 1.0],
    };

    fn from_unit(q: UnitQuaternion<f32>) -> Self {
        let c = q.into_inner().coords;
        Rotation {
            quat: [c.x, c.y, c.z, c.w],
        }
    }

    /// Quaternion components are normalised; a zero quaternion is the identity.
    pub fn from_quat(q: [f32; 4]) -> Self {
        let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        if len == 0.0 || !len.is_finite() {
            return Rotation::IDENTITY;
        }
        Rotation {
            quat: [q[0] / len, q[1] / len, q[2] / len, q[3] / len],
        }
    }

    pub fn from_axis_angle(axis: [f32; 3], angle: f32) -> Self {
        let axis = Vector3::from(axis);
        if axis.norm() == 0.0 {
            return Rotation::IDENTITY;
        }
        Self::from_unit(UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(axis),
            angle,
        ))
    }

    /// Shortest rotation taking direction `from` onto direction `to`.
    pub fn from_vectors(from: [f32; 3], to: [f32; 3]) -> Self {
        let a = Vector3::from(from);
        let b = Vector3::from(to);
        if a.norm() == 0.0 || b.norm() == 0.0 {
            return Rotation::IDENTITY;
        }
        match UnitQuaternion::rotation_between(&a, &b) {
            Some(q) => Self::from_unit(q),
            None => {
                // opposite directions: half turn about any perpendicular axis
                let helper = if a.x.abs() < 0.9 {
                    Vector3::x()
                } else {
                    Vector3::y()
                };
                let axis = a.cross(&helper);
                Self::from_unit(UnitQuaternion::from_axis_angle(
                    &Unit::new_normalize(axis),
                    PI,
                ))
            }
        }
    }

    /// Rotation part of a row-major 4x4 matrix in the toolkit's row-vector
    /// convention (`v' = v * M`). Matrices with non-finite entries give `None`.
    pub fn from_matrix(m: &[f32; 16]) -> Option<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let r = Matrix3::new(m[0], m[4], m[8], m[1], m[5], m[9], m[2], m[6], m[10]);
        // seed from the raw matrix; an identity guess stalls on half turns
        let guess = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r))
            .to_rotation_matrix();
        let rot = Rotation3::from_matrix_eps(&r, f32::EPSILON, MATRIX_FIT_ITERATIONS, guess);
        Some(Self::from_unit(UnitQuaternion::from_rotation_matrix(&rot)))
    }

    pub fn quat(&self) -> [f32; 4] {
        self.quat
    }

    /// Axis and angle in radians; the identity reports axis `(0, 0, 1)`.
    pub fn axis_angle(&self) -> ([f32; 3], f32) {
        let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            self.quat[3],
            self.quat[0],
            self.quat[1],
            self.quat[2],
        ));
        match q.axis_angle() {
            Some((axis, angle)) => ([axis.x, axis.y, axis.z], angle),
            None => ([0.0, 0.0, 1.0], 0.0),
        }
    }
}
