//! Per-field storage and its text encoding.

use crate::catalog::{EnumSpec, FieldStorage};
use crate::database::ContainerId;
use crate::text::{format_bool, parse_bool, parse_number, quote, quote_if_needed, Cursor, Token};
use crate::values::{Image, NumericBuffer, Plane, Rotation, MAX_IMAGE_DIMENSION};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FieldData {
    /// Numeric, bool and rotation storage. `buffer.len()` is a multiple of `width`.
    Numeric { buffer: NumericBuffer, width: usize },
    Planes(Vec<Plane>),
    Image(Image),
    /// String, name and opaque storage.
    Strings(Vec<String>),
    Enums(Vec<i32>),
    Refs(Vec<Option<ContainerId>>),
    Trigger,
}

/// One parsed item, already in storage form.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Item {
    Numbers(Vec<f64>),
    Plane(Plane),
    Image(Image),
    Text(String),
    Enum(i32),
    Ref(Option<ContainerId>),
    Trigger,
}

impl FieldData {
    pub fn new(storage: &FieldStorage, multi: bool) -> Self {
        let items = usize::from(!multi);
        if let Some((element, width)) = storage.numeric_layout() {
            let mut data = FieldData::Numeric {
                buffer: NumericBuffer::zeros(element, items * width),
                width,
            };
            if matches!(storage, FieldStorage::Rotation) {
                data.fill_identity_rotations(0);
            }
            return data;
        }
        match storage {
            FieldStorage::Plane => FieldData::Planes(vec![Plane::default(); items]),
            FieldStorage::Image => FieldData::Image(Image::empty()),
            FieldStorage::Enum => FieldData::Enums(vec![0; items]),
            FieldStorage::Reference { .. } => FieldData::Refs(vec![None; items]),
            FieldStorage::Trigger => FieldData::Trigger,
            _ => FieldData::Strings(vec![String::new(); items]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldData::Numeric { buffer, width } => buffer.len() / width,
            FieldData::Planes(v) => v.len(),
            FieldData::Image(_) => 1,
            FieldData::Strings(v) => v.len(),
            FieldData::Enums(v) => v.len(),
            FieldData::Refs(v) => v.len(),
            FieldData::Trigger => 0,
        }
    }

    /// Containers this field currently holds references to.
    pub fn held_refs(&self) -> Vec<ContainerId> {
        match self {
            FieldData::Refs(v) => v.iter().flatten().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub fn resize(&mut self, storage: &FieldStorage, num: usize) {
        let old = self.len();
        match self {
            FieldData::Numeric { buffer, width } => buffer.resize(num * *width),
            FieldData::Planes(v) => v.resize(num, Plane::default()),
            FieldData::Strings(v) => v.resize(num, String::new()),
            FieldData::Enums(v) => v.resize(num, 0),
            FieldData::Refs(v) => v.resize(num, None),
            FieldData::Image(_) | FieldData::Trigger => {}
        }
        if matches!(storage, FieldStorage::Rotation) && num > old {
            self.fill_identity_rotations(old);
        }
    }

    fn fill_identity_rotations(&mut self, from_item: usize) {
        if let FieldData::Numeric { buffer, width } = self {
            let items = buffer.len() / *width;
            let identity = NumericBuffer::F32(Rotation::IDENTITY.quat().to_vec());
            for i in from_item..items {
                buffer.write_at(i * *width, &identity);
            }
        }
    }

    /// Store `item` at `index`, growing a multi-value field as needed.
    pub fn set_item(&mut self, storage: &FieldStorage, multi: bool, index: usize, item: Item) -> bool {
        if !multi && index != 0 {
            return false;
        }
        if multi && index >= self.len() {
            self.resize(storage, index + 1);
        }
        match (self, item) {
            (FieldData::Numeric { buffer, width }, Item::Numbers(values)) => {
                if values.len() != *width {
                    return false;
                }
                let src = NumericBuffer::from_f64s(buffer.element_type(), &values);
                buffer.write_at(index * *width, &src)
            }
            (FieldData::Planes(v), Item::Plane(p)) => {
                v[index] = p;
                true
            }
            (FieldData::Image(img), Item::Image(new)) => {
                *img = new;
                true
            }
            (FieldData::Strings(v), Item::Text(s)) => {
                v[index] = s;
                true
            }
            (FieldData::Enums(v), Item::Enum(e)) => {
                v[index] = e;
                true
            }
            (FieldData::Refs(v), Item::Ref(r)) => {
                v[index] = r;
                true
            }
            (FieldData::Trigger, Item::Trigger) => true,
            _ => false,
        }
    }

    /// Parse one item from `cur` according to `storage`.
    pub fn parse_item(storage: &FieldStorage, enums: &[EnumSpec], cur: &mut Cursor<'_>) -> Option<Item> {
        match storage {
            FieldStorage::Numeric { width, .. } => cur.numbers(*width).map(Item::Numbers),
            FieldStorage::Bool => {
                let b = parse_bool(cur.word()?)?;
                Some(Item::Numbers(vec![if b { 1.0 } else { 0.0 }]))
            }
            FieldStorage::Rotation => {
                let v = cur.numbers(4)?;
                let r = Rotation::from_axis_angle([v[0] as f32, v[1] as f32, v[2] as f32], v[3] as f32);
                Some(Item::Numbers(r.quat().iter().map(|c| *c as f64).collect()))
            }
            FieldStorage::Plane => {
                let v = cur.numbers(4)?;
                Some(Item::Plane(Plane::new(
                    [v[0] as f32, v[1] as f32, v[2] as f32],
                    v[3] as f32,
                )))
            }
            FieldStorage::Image => parse_image(cur).map(Item::Image),
            FieldStorage::String | FieldStorage::Name | FieldStorage::Opaque => {
                cur.text().map(|s| Item::Text(s.to_string()))
            }
            FieldStorage::Enum => match cur.next_token()? {
                Token::Word(w) => enum_value(enums, w).map(Item::Enum),
                Token::Paren(expr) => {
                    let mut mask = 0;
                    for name in expr.split('|').map(str::trim).filter(|s| !s.is_empty()) {
                        mask |= enum_value(enums, name)?;
                    }
                    Some(Item::Enum(mask))
                }
                _ => None,
            },
            FieldStorage::Reference { .. } => match cur.word()? {
                "NULL" => Some(Item::Ref(None)),
                _ => None,
            },
            FieldStorage::Trigger => Some(Item::Trigger),
        }
    }

    /// Parse a complete field value: one item for single-value fields, and
    /// either a `[...]` group or a run of bare items for multi-value fields.
    pub fn parse_value(
        storage: &FieldStorage,
        enums: &[EnumSpec],
        multi: bool,
        cur: &mut Cursor<'_>,
    ) -> Option<Vec<Item>> {
        if !multi {
            return Self::parse_item(storage, enums, cur).map(|i| vec![i]);
        }
        if let Some(Token::Bracket(inner)) = cur.peek() {
            cur.next_token();
            let mut inner_cur = Cursor::new(inner);
            let mut items = Vec::new();
            while !inner_cur.is_empty() {
                items.push(Self::parse_item(storage, enums, &mut inner_cur)?);
            }
            return Some(items);
        }
        Self::parse_item(storage, enums, cur).map(|i| vec![i])
    }

    /// Build a fresh value holding exactly `items`.
    pub fn from_items(storage: &FieldStorage, multi: bool, items: Vec<Item>) -> Option<FieldData> {
        let mut data = FieldData::new(storage, multi);
        if multi {
            data.resize(storage, items.len());
        } else if items.len() != 1 {
            return None;
        }
        for (i, item) in items.into_iter().enumerate() {
            if !data.set_item(storage, multi, i, item) {
                return None;
            }
        }
        Some(data)
    }

    pub fn format_item(
        &self,
        storage: &FieldStorage,
        enums: &[EnumSpec],
        index: usize,
        ref_label: &dyn Fn(ContainerId) -> String,
    ) -> Option<String> {
        if index >= self.len() && !matches!(self, FieldData::Trigger) {
            return None;
        }
        Some(match self {
            FieldData::Numeric { buffer, width } => {
                let item = buffer.slice(index * width, *width);
                match storage {
                    FieldStorage::Bool => format_bool(item.get_f64(0)? != 0.0).to_string(),
                    FieldStorage::Rotation => {
                        let q = item.to_f64_vec();
                        let (axis, angle) =
                            Rotation::from_quat([q[0] as f32, q[1] as f32, q[2] as f32, q[3] as f32])
                                .axis_angle();
                        format!("{} {} {} {}", axis[0], axis[1], axis[2], angle)
                    }
                    _ => (0..*width)
                        .filter_map(|i| item.format_element(i))
                        .collect::<Vec<_>>()
                        .join(" "),
                }
            }
            FieldData::Planes(v) => {
                let p = v[index];
                format!("{} {} {} {}", p.normal[0], p.normal[1], p.normal[2], p.distance)
            }
            FieldData::Image(img) => format_image(img),
            FieldData::Strings(v) => match storage {
                FieldStorage::String => quote(&v[index]),
                _ => quote_if_needed(&v[index]),
            },
            FieldData::Enums(v) => enum_label(enums, v[index]),
            FieldData::Refs(v) => match v[index] {
                Some(id) => ref_label(id),
                None => "NULL".to_string(),
            },
            FieldData::Trigger => String::new(),
        })
    }

    pub fn format(
        &self,
        storage: &FieldStorage,
        enums: &[EnumSpec],
        multi: bool,
        ref_label: &dyn Fn(ContainerId) -> String,
    ) -> String {
        if !multi {
            return self
                .format_item(storage, enums, 0, ref_label)
                .unwrap_or_default();
        }
        let items: Vec<String> = (0..self.len())
            .filter_map(|i| self.format_item(storage, enums, i, ref_label))
            .collect();
        if items.len() == 1 {
            items.into_iter().next().unwrap_or_default()
        } else {
            format!("[{}]", items.join(", "))
        }
    }
}

fn enum_value(enums: &[EnumSpec], word: &str) -> Option<i32> {
    if let Some(e) = enums.iter().find(|e| e.name == word) {
        return Some(e.value);
    }
    parse_number(word).map(|v| v as i32)
}

fn enum_label(enums: &[EnumSpec], value: i32) -> String {
    if let Some(e) = enums.iter().find(|e| e.value == value) {
        return e.name.clone();
    }
    let mut remaining = value;
    let mut names = Vec::new();
    for e in enums.iter().filter(|e| e.value != 0) {
        if remaining & e.value == e.value {
            remaining &= !e.value;
            names.push(e.name.as_str());
        }
    }
    if remaining == 0 && !names.is_empty() {
        format!("({})", names.join(" | "))
    } else {
        value.to_string()
    }
}

fn parse_image(cur: &mut Cursor<'_>) -> Option<Image> {
    let dims = cur.numbers(3)?;
    if dims.iter().any(|d| *d < 0.0) {
        return None;
    }
    let (w, h, c) = (dims[0] as u32, dims[1] as u32, dims[2] as u32);
    if w > MAX_IMAGE_DIMENSION || h > MAX_IMAGE_DIMENSION || c > 4 {
        return None;
    }
    let count = w as usize * h as usize;
    if count * c as usize == 0 {
        return Some(Image::empty());
    }
    let mut pixels = Vec::with_capacity(count * c as usize);
    for _ in 0..count {
        let word = cur.word()?;
        let value = parse_number(word)? as u64;
        for b in (0..c).rev() {
            pixels.push((value >> (8 * b)) as u8);
        }
    }
    Image::new(w, h, c, &pixels)
}

fn format_image(img: &Image) -> String {
    if img.is_empty() {
        return "0 0 0".to_string();
    }
    let mut out = format!("{} {} {}", img.width, img.height, img.channels);
    for pixel in img.pixels.chunks(img.channels as usize) {
        out.push_str(" 0x");
        for byte in pixel {
            out.push_str(&format!("{byte:02x}"));
        }
    }
    out
}
