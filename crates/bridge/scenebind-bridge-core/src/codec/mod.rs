//! Field value marshalling.
//!
//! A [`CodecTable`] maps native field type names to a [`Codec`]. Selection
//! walks the field type's ancestry, most specific first, so a type derived
//! from a known family (for example an extension `SFPoint3f` deriving from
//! `SFVec3f`) reuses that family's codec. Types that match nothing fall back
//! to the generic text codec, which every field type supports through the
//! native text format.
//!
//! Encoding never fails on bad data. A value that does not fit the field
//! leaves it untouched and reports [`SetOutcome::Ignored`] with the reason.

mod numeric;
mod reference;
mod structured;
mod text;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use log::trace;
use scenebind_native::{ElementType, FieldRef, SceneDatabase, TypeTag};

use crate::bridge::Bridge;
use crate::registry::{FieldFamily, TypeRegistryAdapter};
use crate::value::ScriptValue;

/// Shape of one decoded item of a numeric family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemShape {
    /// A bare scalar for single-value fields.
    Scalar,
    /// A flat vector of `width` components.
    Vector,
    /// A 4×4 matrix (`width` must be 16).
    Matrix,
}

/// Parameters of a fixed-width numeric codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NumericCodec {
    pub element: ElementType,
    pub width: usize,
    pub shape: ItemShape,
    pub multi: bool,
}

/// One row of the numeric family table: the single and multi type names that
/// share an element layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericFamily {
    pub single: Option<String>,
    pub multi: Option<String>,
    pub element: ElementType,
    pub width: usize,
    pub shape: ItemShape,
}

impl NumericFamily {
    pub fn new(
        single: Option<&str>,
        multi: Option<&str>,
        element: ElementType,
        width: usize,
        shape: ItemShape,
    ) -> Self {
        Self {
            single: single.map(str::to_string),
            multi: multi.map(str::to_string),
            element,
            width,
            shape,
        }
    }
}

type FamilyRow = (Option<&'static str>, Option<&'static str>, ElementType, usize, ItemShape);

const NUMERIC_FAMILIES: &[FamilyRow] = &[
    (Some("SFFloat"), Some("MFFloat"), ElementType::F32, 1, ItemShape::Scalar),
    (Some("SFDouble"), Some("MFDouble"), ElementType::F64, 1, ItemShape::Scalar),
    (Some("SFInt32"), Some("MFInt32"), ElementType::I32, 1, ItemShape::Scalar),
    (Some("SFUInt32"), Some("MFUInt32"), ElementType::U32, 1, ItemShape::Scalar),
    (Some("SFShort"), Some("MFShort"), ElementType::I16, 1, ItemShape::Scalar),
    (Some("SFUShort"), Some("MFUShort"), ElementType::U16, 1, ItemShape::Scalar),
    (Some("SFBool"), Some("MFBool"), ElementType::I32, 1, ItemShape::Scalar),
    (Some("SFVec2f"), Some("MFVec2f"), ElementType::F32, 2, ItemShape::Vector),
    (Some("SFVec3f"), Some("MFVec3f"), ElementType::F32, 3, ItemShape::Vector),
    (Some("SFVec4f"), Some("MFVec4f"), ElementType::F32, 4, ItemShape::Vector),
    (Some("SFColor"), Some("MFColor"), ElementType::F32, 3, ItemShape::Vector),
    (Some("SFMatrix"), Some("MFMatrix"), ElementType::F32, 16, ItemShape::Matrix),
    (Some("SFVec2s"), Some("MFVec2s"), ElementType::I16, 2, ItemShape::Vector),
    (Some("SFVec3d"), Some("MFVec3d"), ElementType::F64, 3, ItemShape::Vector),
    (None, Some("MFRotation"), ElementType::F32, 4, ItemShape::Vector),
];

/// The conversion strategy selected for a field type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Numeric(NumericCodec),
    Rotation,
    Image,
    Plane { multi: bool },
    String { multi: bool },
    Reference { multi: bool },
    Trigger,
    Generic { multi: bool },
}

impl Codec {
    pub fn is_multi(&self) -> bool {
        match self {
            Codec::Numeric(n) => n.multi,
            Codec::Plane { multi }
            | Codec::String { multi }
            | Codec::Reference { multi }
            | Codec::Generic { multi } => *multi,
            Codec::Rotation | Codec::Image | Codec::Trigger => false,
        }
    }

    /// Whether a text value goes through the native text parser instead of
    /// the codec itself.
    fn parses_text_natively(&self) -> bool {
        matches!(
            self,
            Codec::Numeric(_) | Codec::Rotation | Codec::Image | Codec::Plane { .. }
        )
    }
}

/// Why an assignment left the field unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    WrongLength { expected: usize, got: usize },
    NotMultiple { width: usize, got: usize },
    NotNumeric,
    Unsupported(&'static str),
    WrongReferenceKind,
    ImageTooSmall { needed: usize, got: usize },
    ImageTooLarge { width: u32, height: u32 },
    TextRejected,
    NativeRejected,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::WrongLength { expected, got } => {
                write!(f, "expected {expected} values, got {got}")
            }
            IgnoreReason::NotMultiple { width, got } => {
                write!(f, "{got} values is not a multiple of {width}")
            }
            IgnoreReason::NotNumeric => f.write_str("value is not numeric"),
            IgnoreReason::Unsupported(what) => write!(f, "unsupported {what} value"),
            IgnoreReason::WrongReferenceKind => {
                f.write_str("object is not of the referenced kind")
            }
            IgnoreReason::ImageTooSmall { needed, got } => {
                write!(f, "image needs {needed} bytes, got {got}")
            }
            IgnoreReason::ImageTooLarge { width, height } => {
                write!(f, "image of {width}x{height} exceeds the native size limit")
            }
            IgnoreReason::TextRejected => f.write_str("text could not be parsed"),
            IgnoreReason::NativeRejected => f.write_str("native field rejected the value"),
        }
    }
}

/// Result of an assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    Ignored(IgnoreReason),
}

impl SetOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SetOutcome::Applied)
    }

    fn from_native(ok: bool) -> Self {
        if ok {
            SetOutcome::Applied
        } else {
            SetOutcome::Ignored(IgnoreReason::NativeRejected)
        }
    }
}

#[derive(Default)]
struct TableState {
    by_name: HashMap<String, Codec>,
    memo: HashMap<TypeTag, Codec>,
}

/// Type-name keyed codec registry with a per-type-tag selection memo.
pub struct CodecTable {
    state: Mutex<TableState>,
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecTable {
    /// Table holding the built-in families and bespoke codecs.
    pub fn new() -> Self {
        let mut state = TableState::default();
        for (single, multi, element, width, shape) in NUMERIC_FAMILIES {
            insert_family(
                &mut state.by_name,
                &NumericFamily::new(*single, *multi, *element, *width, *shape),
            );
        }
        let bespoke = [
            ("SFRotation", Codec::Rotation),
            ("SFImage", Codec::Image),
            ("SFPlane", Codec::Plane { multi: false }),
            ("MFPlane", Codec::Plane { multi: true }),
            ("SFString", Codec::String { multi: false }),
            ("MFString", Codec::String { multi: true }),
            ("SFNode", Codec::Reference { multi: false }),
            ("MFNode", Codec::Reference { multi: true }),
            ("SFEngine", Codec::Reference { multi: false }),
            ("MFEngine", Codec::Reference { multi: true }),
            ("SFTrigger", Codec::Trigger),
        ];
        for (name, codec) in bespoke {
            state.by_name.insert(name.to_string(), codec);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add (or replace) a numeric family. Clears the selection memo so
    /// fields of already-seen types pick the new family up.
    pub fn register_numeric_family(&self, family: NumericFamily) {
        let mut state = self.lock();
        insert_family(&mut state.by_name, &family);
        state.memo.clear();
    }

    /// Codec registered directly under `type_name`, without ancestry lookup.
    pub fn get(&self, type_name: &str) -> Option<Codec> {
        self.lock().by_name.get(type_name).copied()
    }

    /// Codec for fields of type `tag`.
    pub fn select(&self, db: &dyn SceneDatabase, tag: TypeTag) -> Codec {
        let mut state = self.lock();
        if let Some(codec) = state.memo.get(&tag) {
            return *codec;
        }
        let adapter = TypeRegistryAdapter::new(db);
        let found = adapter
            .ancestry(tag)
            .into_iter()
            .filter_map(|t| db.type_name(t))
            .find_map(|name| state.by_name.get(&name).copied());
        let codec = found.unwrap_or_else(|| Codec::Generic {
            multi: adapter.family_of(tag) == Some(FieldFamily::Multi),
        });
        trace!("codec for field type {tag}: {codec:?}");
        state.memo.insert(tag, codec);
        codec
    }

    pub fn memo_len(&self) -> usize {
        self.lock().memo.len()
    }
}

fn insert_family(by_name: &mut HashMap<String, Codec>, family: &NumericFamily) {
    let codec = |multi| {
        Codec::Numeric(NumericCodec {
            element: family.element,
            width: family.width,
            shape: family.shape,
            multi,
        })
    };
    if let Some(name) = &family.single {
        by_name.insert(name.clone(), codec(false));
    }
    if let Some(name) = &family.multi {
        by_name.insert(name.clone(), codec(true));
    }
}

/// Decode the current value of `field`. Stale fields decode to `None`.
pub fn get_field_value(bridge: &Arc<Bridge>, field: FieldRef) -> ScriptValue {
    let db = bridge.db();
    let Some(tag) = db.field_type(field) else {
        return ScriptValue::None;
    };
    let codec = bridge.codecs().select(db, tag);
    let decoded = match codec {
        Codec::Numeric(n) => numeric::decode(db, field, &n),
        Codec::Rotation => structured::decode_rotation(db, field),
        Codec::Image => structured::decode_image(db, field),
        Codec::Plane { multi } => structured::decode_planes(db, field, multi),
        Codec::String { multi } => text::decode_strings(db, field, multi),
        Codec::Reference { multi } => reference::decode(bridge, field, multi),
        Codec::Trigger => Some(ScriptValue::None),
        Codec::Generic { multi } => text::decode_generic(db, field, multi),
    };
    decoded.unwrap_or_default()
}

/// Encode `value` into `field`.
pub fn set_field_value(bridge: &Arc<Bridge>, field: FieldRef, value: &ScriptValue) -> SetOutcome {
    let db = bridge.db();
    let Some(tag) = db.field_type(field) else {
        return SetOutcome::Ignored(IgnoreReason::NativeRejected);
    };
    let codec = bridge.codecs().select(db, tag);
    if let (ScriptValue::Str(s), true) = (value, codec.parses_text_natively()) {
        return text::encode_native_text(db, field, s);
    }
    match codec {
        Codec::Numeric(n) => numeric::encode(db, field, &n, value),
        Codec::Rotation => structured::encode_rotation(db, field, value),
        Codec::Image => structured::encode_image(db, field, value),
        Codec::Plane { multi } => structured::encode_planes(db, field, multi, value),
        Codec::String { multi } => text::encode_strings(db, field, multi, value),
        Codec::Reference { multi } => reference::encode(db, field, multi, value),
        Codec::Trigger => SetOutcome::from_native(db.touch_field(field)),
        Codec::Generic { multi } => text::encode_generic(db, field, multi, value),
    }
}
