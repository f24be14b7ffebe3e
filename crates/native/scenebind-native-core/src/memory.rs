//! In-process reference implementation of [`SceneDatabase`].
//!
//! All containers live in one mutex-guarded store. The type registry sits
//! behind its own `RwLock` so catalogs can be registered while containers
//! exist. When both are needed the store is always locked first.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use hashbrown::HashMap;
use log::{trace, warn};

use crate::catalog::{CatalogSpec, EnumSpec, FieldStorage};
use crate::database::{Connection, ContainerId, FieldRef, OutputRef, PartInfo, SceneDatabase};
use crate::error::NativeError;
use crate::field_data::{FieldData, Item};
use crate::text::{tokenize, Cursor, Token};
use crate::types::{FieldDecl, TypeRegistry, TypeTag};
use crate::values::{Image, NumericBuffer, Plane, Rotation, MAX_IMAGE_DIMENSION};

#[derive(Debug)]
struct FieldSlot {
    name: String,
    type_tag: TypeTag,
    storage: FieldStorage,
    multi: bool,
    enums: Vec<EnumSpec>,
    data: FieldData,
    is_default: bool,
    connections: Vec<Connection>,
    connection_enabled: bool,
}

#[derive(Debug)]
struct OutputSlot {
    name: String,
    type_tag: TypeTag,
    enabled: bool,
}

#[derive(Debug)]
struct ContainerRecord {
    type_tag: TypeTag,
    refs: u32,
    name: String,
    fields: Vec<FieldSlot>,
    children: Vec<ContainerId>,
    outputs: Vec<OutputSlot>,
    version: u64,
}

impl ContainerRecord {
    /// Everything this container keeps alive.
    fn held(&self, own: ContainerId) -> Vec<ContainerId> {
        let mut out = self.children.clone();
        for slot in &self.fields {
            out.extend(slot.data.held_refs());
            out.extend(
                slot.connections
                    .iter()
                    .map(Connection::container)
                    .filter(|c| *c != own),
            );
        }
        out
    }
}

#[derive(Debug, Default)]
struct Store {
    containers: HashMap<ContainerId, ContainerRecord>,
    next_id: u64,
}

impl Store {
    fn record(&self, id: ContainerId) -> Option<&ContainerRecord> {
        self.containers.get(&id)
    }

    fn record_mut(&mut self, id: ContainerId) -> Option<&mut ContainerRecord> {
        self.containers.get_mut(&id)
    }

    fn slot(&self, field: FieldRef) -> Option<&FieldSlot> {
        self.record(field.container)?.fields.get(field.index)
    }

    fn slot_mut(&mut self, field: FieldRef) -> Option<&mut FieldSlot> {
        self.record_mut(field.container)?.fields.get_mut(field.index)
    }

    fn output(&self, output: OutputRef) -> Option<&OutputSlot> {
        self.record(output.container)?.outputs.get(output.index)
    }

    fn bump(&mut self, id: ContainerId) {
        if let Some(rec) = self.record_mut(id) {
            rec.version += 1;
        }
    }

    fn insert(&mut self, record: ContainerRecord) -> ContainerId {
        self.next_id += 1;
        let id = ContainerId(self.next_id);
        self.containers.insert(id, record);
        id
    }

    /// Whether `target` is `from` or sits anywhere below it in the child graph.
    fn reaches(&self, from: ContainerId, target: ContainerId) -> bool {
        let mut pending = vec![from];
        let mut seen = Vec::new();
        while let Some(next) = pending.pop() {
            if next == target {
                return true;
            }
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            if let Some(rec) = self.record(next) {
                pending.extend(rec.children.iter().copied());
            }
        }
        false
    }

    fn acquire(&mut self, id: ContainerId) -> bool {
        match self.record_mut(id) {
            Some(rec) => {
                rec.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference, destroying containers whose count reaches zero
    /// and cascading into whatever they held.
    fn release(&mut self, id: ContainerId) -> bool {
        if !self.containers.contains_key(&id) {
            return false;
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let Some(rec) = self.record_mut(next) else {
                continue;
            };
            rec.refs = rec.refs.saturating_sub(1);
            if rec.refs == 0 {
                if let Some(rec) = self.containers.remove(&next) {
                    trace!("destroying container {next}");
                    pending.extend(rec.held(next));
                }
            }
        }
        true
    }

    /// Swap in new field data, acquiring its references before releasing
    /// the ones held by the old value.
    fn replace_data(&mut self, field: FieldRef, data: FieldData) -> bool {
        if self.slot(field).is_none() {
            return false;
        }
        let incoming = data.held_refs();
        if incoming.iter().any(|id| self.record(*id).is_none()) {
            return false;
        }
        for id in &incoming {
            self.acquire(*id);
        }
        let old = match self.slot_mut(field) {
            Some(slot) => {
                slot.is_default = false;
                std::mem::replace(&mut slot.data, data)
            }
            None => return false,
        };
        self.bump(field.container);
        for id in old.held_refs() {
            self.release(id);
        }
        true
    }

    fn set_ref(&mut self, field: FieldRef, index: usize, target: Option<ContainerId>) -> bool {
        if let Some(t) = target {
            if !self.acquire(t) {
                return false;
            }
        }
        let old = match self.slot_mut(field) {
            Some(FieldSlot {
                data: FieldData::Refs(v),
                multi,
                is_default,
                ..
            }) if *multi || index == 0 => {
                if index >= v.len() {
                    v.resize(index + 1, None);
                }
                *is_default = false;
                std::mem::replace(&mut v[index], target)
            }
            _ => {
                if let Some(t) = target {
                    self.release(t);
                }
                return false;
            }
        };
        self.bump(field.container);
        if let Some(o) = old {
            self.release(o);
        }
        true
    }

    fn master_exists(&self, master: Connection) -> bool {
        match master {
            Connection::Field(f) => self.slot(f).is_some(),
            Connection::Output(o) => self.output(o).is_some(),
        }
    }

    fn ref_label<'a>(&'a self, types: &'a TypeRegistry) -> impl Fn(ContainerId) -> String + 'a {
        move |id| {
            self.record(id)
                .and_then(|r| types.name(r.type_tag))
                .unwrap_or("NULL")
                .to_string()
        }
    }
}

fn build_slot(types: &TypeRegistry, decl: &FieldDecl) -> FieldSlot {
    let (storage, multi) = types
        .field_info(decl.field_type)
        .map(|i| (i.storage.clone().unwrap_or(FieldStorage::Opaque), i.multi))
        .unwrap_or((FieldStorage::Opaque, false));
    let mut slot = FieldSlot {
        name: decl.name.clone(),
        type_tag: decl.field_type,
        data: FieldData::new(&storage, multi),
        storage,
        multi,
        enums: decl.enums.clone(),
        is_default: true,
        connections: Vec::new(),
        connection_enabled: true,
    };
    if let Some(text) = &decl.default {
        match parse_slot_text(&slot, text) {
            Some(data) => slot.data = data,
            None => warn!("default '{text}' for field '{}' does not parse", decl.name),
        }
    }
    slot
}

fn instantiate(store: &mut Store, types: &TypeRegistry, tag: TypeTag) -> Option<ContainerId> {
    let info = types.container_info(tag)?;
    if info.is_abstract {
        return None;
    }
    let record = ContainerRecord {
        type_tag: tag,
        refs: 0,
        name: String::new(),
        fields: info.fields.iter().map(|d| build_slot(types, d)).collect(),
        children: Vec::new(),
        outputs: info
            .outputs
            .iter()
            .map(|o| OutputSlot {
                name: o.name.clone(),
                type_tag: o.output_type,
                enabled: true,
            })
            .collect(),
        version: 0,
    };
    let id = store.insert(record);
    trace!("created {} as {id}", types.name(tag).unwrap_or("?"));
    Some(id)
}

/// Whole-field text: a `[...]` group, a single item, or for multi-value
/// fields a bare run of items.
fn parse_slot_text(slot: &FieldSlot, text: &str) -> Option<FieldData> {
    let tokens = tokenize(text)?;
    let mut cur = Cursor::new(&tokens);
    let items = if slot.multi && !matches!(cur.peek(), Some(Token::Bracket(_))) {
        let mut items = Vec::new();
        while !cur.is_empty() {
            items.push(FieldData::parse_item(&slot.storage, &slot.enums, &mut cur)?);
        }
        items
    } else {
        FieldData::parse_value(&slot.storage, &slot.enums, slot.multi, &mut cur)?
    };
    if !cur.is_empty() {
        return None;
    }
    FieldData::from_items(&slot.storage, slot.multi, items)
}

fn parse_slot_item(slot: &FieldSlot, text: &str) -> Option<Item> {
    if matches!(slot.storage, FieldStorage::Opaque) {
        return Some(Item::Text(text.to_string()));
    }
    let tokens = tokenize(text)?;
    let mut cur = Cursor::new(&tokens);
    let item = FieldData::parse_item(&slot.storage, &slot.enums, &mut cur)?;
    cur.is_empty().then_some(item)
}

/// In-memory scene database with an open type registry.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    types: RwLock<TypeRegistry>,
    store: Mutex<Store>,
}

impl MemoryDatabase {
    /// Database preloaded with the built-in catalog.
    pub fn new() -> Result<Self, NativeError> {
        let db = Self::empty();
        db.register_catalog(&CatalogSpec::builtin()?)?;
        Ok(db)
    }

    /// Database with no registered types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register extension types. Existing containers are unaffected.
    pub fn register_catalog(&self, spec: &CatalogSpec) -> Result<Vec<TypeTag>, NativeError> {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        types.register(spec)
    }

    pub fn register_catalog_json(&self, text: &str) -> Result<Vec<TypeTag>, NativeError> {
        self.register_catalog(&CatalogSpec::from_json_str(text)?)
    }

    /// Create an instance by type name.
    pub fn create_named(&self, type_name: &str) -> Result<ContainerId, NativeError> {
        let tag = self
            .type_from_name(type_name)
            .ok_or_else(|| NativeError::UnknownType(type_name.to_string()))?;
        self.create_instance(tag)
            .ok_or_else(|| NativeError::NotCreatable(type_name.to_string()))
    }

    /// Number of containers currently alive.
    pub fn live_count(&self) -> usize {
        self.store().containers.len()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn types(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.types.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn node_tag(types: &TypeRegistry) -> Option<TypeTag> {
        types.lookup("Node")
    }
}

impl SceneDatabase for MemoryDatabase {
    fn type_from_name(&self, name: &str) -> Option<TypeTag> {
        self.types().lookup(name)
    }

    fn type_name(&self, tag: TypeTag) -> Option<String> {
        self.types().name(tag).map(str::to_string)
    }

    fn parent_type(&self, tag: TypeTag) -> Option<TypeTag> {
        self.types().parent(tag)
    }

    fn is_type_derived_from(&self, tag: TypeTag, ancestor: TypeTag) -> bool {
        self.types().is_derived_from(tag, ancestor)
    }

    fn can_create_instance(&self, tag: TypeTag) -> bool {
        self.types()
            .container_info(tag)
            .is_some_and(|i| !i.is_abstract)
    }

    fn derived_types(&self, ancestor: TypeTag) -> Vec<TypeTag> {
        self.types().derived(ancestor)
    }

    fn field_storage(&self, tag: TypeTag) -> Option<FieldStorage> {
        self.types().field_info(tag).and_then(|i| i.storage.clone())
    }

    fn create_instance(&self, tag: TypeTag) -> Option<ContainerId> {
        let mut store = self.store();
        let types = self.types();
        instantiate(&mut store, &types, tag)
    }

    fn container_type(&self, id: ContainerId) -> Option<TypeTag> {
        self.store().record(id).map(|r| r.type_tag)
    }

    fn ref_container(&self, id: ContainerId) -> bool {
        self.store().acquire(id)
    }

    fn unref_container(&self, id: ContainerId) -> bool {
        self.store().release(id)
    }

    fn ref_count(&self, id: ContainerId) -> Option<u32> {
        self.store().record(id).map(|r| r.refs)
    }

    fn container_name(&self, id: ContainerId) -> Option<String> {
        self.store().record(id).map(|r| r.name.clone())
    }

    fn set_container_name(&self, id: ContainerId, name: &str) -> bool {
        match self.store().record_mut(id) {
            Some(rec) => {
                rec.name = name.to_string();
                true
            }
            None => false,
        }
    }

    fn find_by_name(&self, name: &str, base: TypeTag) -> Option<ContainerId> {
        let store = self.store();
        let types = self.types();
        store
            .containers
            .iter()
            .filter(|(_, r)| r.name == name && types.is_derived_from(r.type_tag, base))
            .map(|(id, _)| *id)
            .max()
    }

    fn container_text(&self, id: ContainerId) -> Option<String> {
        let store = self.store();
        let types = self.types();
        let label = store.ref_label(&types);
        let rec = store.record(id)?;
        let lines: Vec<String> = rec
            .fields
            .iter()
            .filter(|s| !s.is_default)
            .map(|s| {
                let value = s.data.format(&s.storage, &s.enums, s.multi, &label);
                format!("{} {}", s.name, value).trim_end().to_string()
            })
            .collect();
        Some(lines.join("\n"))
    }

    fn set_container_text(&self, id: ContainerId, text: &str) -> bool {
        let Some(tokens) = tokenize(text) else {
            return false;
        };
        let mut store = self.store();
        let mut cur = Cursor::new(&tokens);
        while !cur.is_empty() {
            let Some(name) = cur.word() else {
                return false;
            };
            let Some(index) = store
                .record(id)
                .and_then(|r| r.fields.iter().position(|s| s.name == name))
            else {
                return false;
            };
            let field = FieldRef {
                container: id,
                index,
            };
            let parsed = store.slot(field).and_then(|slot| {
                let items = FieldData::parse_value(&slot.storage, &slot.enums, slot.multi, &mut cur)?;
                FieldData::from_items(&slot.storage, slot.multi, items)
            });
            match parsed {
                Some(data) => {
                    if !store.replace_data(field, data) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    fn container_version(&self, id: ContainerId) -> Option<u64> {
        self.store().record(id).map(|r| r.version)
    }

    fn touch_container(&self, id: ContainerId) -> bool {
        let mut store = self.store();
        if store.record(id).is_none() {
            return false;
        }
        store.bump(id);
        true
    }

    fn get_field(&self, id: ContainerId, name: &str) -> Option<FieldRef> {
        let store = self.store();
        let index = store.record(id)?.fields.iter().position(|s| s.name == name)?;
        Some(FieldRef {
            container: id,
            index,
        })
    }

    fn field_name(&self, field: FieldRef) -> Option<String> {
        self.store().slot(field).map(|s| s.name.clone())
    }

    fn enumerate_fields(&self, id: ContainerId) -> Vec<FieldRef> {
        let store = self.store();
        match store.record(id) {
            Some(rec) => (0..rec.fields.len())
                .map(|index| FieldRef {
                    container: id,
                    index,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn field_type(&self, field: FieldRef) -> Option<TypeTag> {
        self.store().slot(field).map(|s| s.type_tag)
    }

    fn field_num(&self, field: FieldRef) -> Option<usize> {
        self.store()
            .slot(field)
            .map(|s| if s.multi { s.data.len() } else { 1 })
    }

    fn set_field_num(&self, field: FieldRef, num: usize) -> bool {
        let mut store = self.store();
        let Some(slot) = store.slot(field) else {
            return false;
        };
        if !slot.multi {
            return num == 1;
        }
        let mut data = slot.data.clone();
        data.resize(&slot.storage, num);
        store.replace_data(field, data)
    }

    fn read_numeric(&self, field: FieldRef) -> Option<NumericBuffer> {
        match &self.store().slot(field)?.data {
            FieldData::Numeric { buffer, .. } => Some(buffer.clone()),
            _ => None,
        }
    }

    fn write_numeric(&self, field: FieldRef, values: &NumericBuffer) -> bool {
        let mut store = self.store();
        let Some(slot) = store.slot(field) else {
            return false;
        };
        let Some((element, width)) = slot.storage.numeric_layout() else {
            return false;
        };
        let len = values.len();
        if slot.multi {
            if len % width != 0 {
                return false;
            }
        } else if len != width {
            return false;
        }
        let mut buffer = if values.element_type() == element {
            values.clone()
        } else {
            NumericBuffer::from_f64s(element, &values.to_f64_vec())
        };
        match slot.storage {
            FieldStorage::Bool => {
                let normalised: Vec<f64> = buffer
                    .to_f64_vec()
                    .into_iter()
                    .map(|v| if v != 0.0 { 1.0 } else { 0.0 })
                    .collect();
                buffer = NumericBuffer::from_f64s(element, &normalised);
            }
            FieldStorage::Rotation => {
                let raw = buffer.to_f64_vec();
                let normalised: Vec<f64> = raw
                    .chunks(4)
                    .flat_map(|q| {
                        Rotation::from_quat([q[0] as f32, q[1] as f32, q[2] as f32, q[3] as f32])
                            .quat()
                            .map(|c| c as f64)
                    })
                    .collect();
                buffer = NumericBuffer::from_f64s(element, &normalised);
            }
            _ => {}
        }
        store.replace_data(field, FieldData::Numeric { buffer, width })
    }

    fn read_planes(&self, field: FieldRef) -> Option<Vec<Plane>> {
        match &self.store().slot(field)?.data {
            FieldData::Planes(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn write_planes(&self, field: FieldRef, planes: &[Plane]) -> bool {
        let mut store = self.store();
        match store.slot(field) {
            Some(slot) if matches!(slot.storage, FieldStorage::Plane) => {
                if !slot.multi && planes.len() != 1 {
                    return false;
                }
            }
            _ => return false,
        }
        let planes = planes
            .iter()
            .map(|p| Plane::new(p.normal, p.distance))
            .collect();
        store.replace_data(field, FieldData::Planes(planes))
    }

    fn read_image(&self, field: FieldRef) -> Option<Image> {
        match &self.store().slot(field)?.data {
            FieldData::Image(img) => Some(img.clone()),
            _ => None,
        }
    }

    fn write_image(&self, field: FieldRef, image: &Image) -> bool {
        let mut store = self.store();
        if !store
            .slot(field)
            .is_some_and(|s| matches!(s.storage, FieldStorage::Image))
        {
            return false;
        }
        let valid = image.is_empty()
            || (image.width <= MAX_IMAGE_DIMENSION
                && image.height <= MAX_IMAGE_DIMENSION
                && image.pixels.len() == image.byte_len());
        if !valid {
            return false;
        }
        let image = if image.is_empty() {
            Image::empty()
        } else {
            image.clone()
        };
        store.replace_data(field, FieldData::Image(image))
    }

    fn read_strings(&self, field: FieldRef) -> Option<Vec<String>> {
        match &self.store().slot(field)?.data {
            FieldData::Strings(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn write_strings(&self, field: FieldRef, values: &[String]) -> bool {
        let mut store = self.store();
        match store.slot(field) {
            Some(slot) if matches!(slot.data, FieldData::Strings(_)) => {
                if !slot.multi && values.len() != 1 {
                    return false;
                }
            }
            _ => return false,
        }
        store.replace_data(field, FieldData::Strings(values.to_vec()))
    }

    fn read_refs(&self, field: FieldRef) -> Option<Vec<Option<ContainerId>>> {
        match &self.store().slot(field)?.data {
            FieldData::Refs(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn write_ref(&self, field: FieldRef, index: usize, target: Option<ContainerId>) -> bool {
        let mut store = self.store();
        let types = self.types();
        let Some(FieldStorage::Reference { target: base_name }) = store.slot(field).map(|s| &s.storage)
        else {
            return false;
        };
        if let Some(t) = target {
            let Some(target_type) = store.record(t).map(|r| r.type_tag) else {
                return false;
            };
            let derived = types
                .lookup(base_name)
                .is_some_and(|base| types.is_derived_from(target_type, base));
            if !derived {
                return false;
            }
        }
        store.set_ref(field, index, target)
    }

    fn enum_names(&self, field: FieldRef) -> Option<Vec<String>> {
        let store = self.store();
        let slot = store.slot(field)?;
        match slot.storage {
            FieldStorage::Enum => Some(slot.enums.iter().map(|e| e.name.clone()).collect()),
            _ => None,
        }
    }

    fn field_text(&self, field: FieldRef) -> Option<String> {
        let store = self.store();
        let types = self.types();
        let label = store.ref_label(&types);
        let slot = store.slot(field)?;
        Some(slot.data.format(&slot.storage, &slot.enums, slot.multi, &label))
    }

    fn set_field_text(&self, field: FieldRef, text: &str) -> bool {
        let mut store = self.store();
        let Some(data) = store.slot(field).and_then(|s| parse_slot_text(s, text)) else {
            return false;
        };
        store.replace_data(field, data)
    }

    fn field_item_text(&self, field: FieldRef, index: usize) -> Option<String> {
        let store = self.store();
        let types = self.types();
        let label = store.ref_label(&types);
        let slot = store.slot(field)?;
        slot.data.format_item(&slot.storage, &slot.enums, index, &label)
    }

    fn set_field_item_text(&self, field: FieldRef, index: usize, text: &str) -> bool {
        let mut store = self.store();
        let Some(slot) = store.slot(field) else {
            return false;
        };
        let Some(item) = parse_slot_item(slot, text) else {
            return false;
        };
        let mut data = slot.data.clone();
        if !data.set_item(&slot.storage, slot.multi, index, item) {
            return false;
        }
        store.replace_data(field, data)
    }

    fn touch_field(&self, field: FieldRef) -> bool {
        let mut store = self.store();
        if store.slot(field).is_none() {
            return false;
        }
        store.bump(field.container);
        true
    }

    fn is_part(&self, id: ContainerId, name: &str) -> bool {
        let store = self.store();
        let types = self.types();
        store
            .record(id)
            .and_then(|r| types.container_info(r.type_tag))
            .is_some_and(|info| info.parts.iter().any(|p| p.name == name))
    }

    fn get_part(&self, id: ContainerId, name: &str, create: bool) -> Option<ContainerId> {
        let mut store = self.store();
        let types = self.types();
        let rec = store.record(id)?;
        let part = types
            .container_info(rec.type_tag)?
            .parts
            .iter()
            .find(|p| p.name == name)?;
        let field = FieldRef {
            container: id,
            index: rec.fields.iter().position(|s| s.name == name)?,
        };
        if let Some(FieldData::Refs(v)) = store.slot(field).map(|s| &s.data) {
            if let Some(Some(current)) = v.first() {
                return Some(*current);
            }
        }
        if !create {
            return None;
        }
        let child = instantiate(&mut store, &types, part.default_type)?;
        store.set_ref(field, 0, Some(child)).then_some(child)
    }

    fn part_catalog(&self, id: ContainerId) -> Option<Vec<PartInfo>> {
        let store = self.store();
        let types = self.types();
        let info = types.container_info(store.record(id)?.type_tag)?;
        let name_of = |tag: TypeTag| types.name(tag).unwrap_or_default().to_string();
        Some(
            info.parts
                .iter()
                .map(|p| PartInfo {
                    name: p.name.clone(),
                    part_type: name_of(p.part_type),
                    default_type: name_of(p.default_type),
                })
                .collect(),
        )
    }

    fn set_part(&self, id: ContainerId, name: &str, target: Option<ContainerId>) -> bool {
        let mut store = self.store();
        let types = self.types();
        let Some(rec) = store.record(id) else {
            return false;
        };
        let Some(part) = types
            .container_info(rec.type_tag)
            .and_then(|info| info.parts.iter().find(|p| p.name == name))
        else {
            return false;
        };
        let Some(index) = rec.fields.iter().position(|s| s.name == name) else {
            return false;
        };
        if let Some(t) = target {
            let ok = store
                .record(t)
                .is_some_and(|r| types.is_derived_from(r.type_tag, part.part_type));
            if !ok {
                return false;
            }
        }
        store.set_ref(
            FieldRef {
                container: id,
                index,
            },
            0,
            target,
        )
    }

    fn is_group(&self, id: ContainerId) -> bool {
        let store = self.store();
        let types = self.types();
        store
            .record(id)
            .and_then(|r| types.container_info(r.type_tag))
            .is_some_and(|info| info.group)
    }

    fn children(&self, id: ContainerId) -> Option<Vec<ContainerId>> {
        if !self.is_group(id) {
            return None;
        }
        self.store().record(id).map(|r| r.children.clone())
    }

    fn insert_child(&self, id: ContainerId, child: ContainerId, index: usize) -> bool {
        if !self.is_group(id) {
            return false;
        }
        let mut store = self.store();
        let types = self.types();
        let is_node = match (store.record(child), Self::node_tag(&types)) {
            (Some(r), Some(node)) => types.is_derived_from(r.type_tag, node),
            _ => false,
        };
        let fits = store.record(id).is_some_and(|r| index <= r.children.len());
        if !is_node || !fits || store.reaches(child, id) {
            return false;
        }
        store.acquire(child);
        if let Some(rec) = store.record_mut(id) {
            rec.children.insert(index, child);
            rec.version += 1;
        }
        true
    }

    fn remove_child(&self, id: ContainerId, index: usize) -> bool {
        let mut store = self.store();
        let removed = match store.record_mut(id) {
            Some(rec) if index < rec.children.len() => {
                rec.version += 1;
                rec.children.remove(index)
            }
            _ => return false,
        };
        store.release(removed);
        true
    }

    fn replace_child(&self, id: ContainerId, index: usize, child: ContainerId) -> bool {
        let mut store = self.store();
        let types = self.types();
        let is_node = match (store.record(child), Self::node_tag(&types)) {
            (Some(r), Some(node)) => types.is_derived_from(r.type_tag, node),
            _ => false,
        };
        let fits = store.record(id).is_some_and(|r| index < r.children.len());
        if !is_node || !fits || store.reaches(child, id) {
            return false;
        }
        store.acquire(child);
        let old = match store.record_mut(id) {
            Some(rec) => {
                rec.version += 1;
                std::mem::replace(&mut rec.children[index], child)
            }
            None => return false,
        };
        store.release(old);
        true
    }

    fn engine_outputs(&self, id: ContainerId) -> Vec<OutputRef> {
        let store = self.store();
        match store.record(id) {
            Some(rec) => (0..rec.outputs.len())
                .map(|index| OutputRef {
                    container: id,
                    index,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn get_output(&self, id: ContainerId, name: &str) -> Option<OutputRef> {
        let store = self.store();
        let index = store.record(id)?.outputs.iter().position(|o| o.name == name)?;
        Some(OutputRef {
            container: id,
            index,
        })
    }

    fn output_name(&self, output: OutputRef) -> Option<String> {
        self.store().output(output).map(|o| o.name.clone())
    }

    fn output_type(&self, output: OutputRef) -> Option<TypeTag> {
        self.store().output(output).map(|o| o.type_tag)
    }

    fn enable_output(&self, output: OutputRef, enabled: bool) -> bool {
        let mut store = self.store();
        match store
            .record_mut(output.container)
            .and_then(|r| r.outputs.get_mut(output.index))
        {
            Some(o) => {
                o.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn is_output_enabled(&self, output: OutputRef) -> Option<bool> {
        self.store().output(output).map(|o| o.enabled)
    }

    fn connect_field(&self, field: FieldRef, master: Connection, append: bool) -> bool {
        let mut store = self.store();
        if store.slot(field).is_none() || !store.master_exists(master) {
            return false;
        }
        if master == Connection::Field(field) {
            return false;
        }
        let dropped: Vec<Connection> = match store.slot_mut(field) {
            Some(slot) if !append => std::mem::take(&mut slot.connections),
            _ => Vec::new(),
        };
        let already = store
            .slot(field)
            .is_some_and(|s| s.connections.contains(&master));
        if !already {
            if master.container() != field.container {
                store.acquire(master.container());
            }
            if let Some(slot) = store.slot_mut(field) {
                slot.connections.push(master);
            }
        }
        store.bump(field.container);
        for c in dropped {
            if c.container() != field.container {
                store.release(c.container());
            }
        }
        true
    }

    fn disconnect_field(&self, field: FieldRef, master: Option<Connection>) -> bool {
        let mut store = self.store();
        let removed: Vec<Connection> = match store.slot_mut(field) {
            Some(slot) => match master {
                Some(m) => {
                    let before = slot.connections.len();
                    slot.connections.retain(|c| *c != m);
                    if slot.connections.len() == before {
                        Vec::new()
                    } else {
                        vec![m]
                    }
                }
                None => std::mem::take(&mut slot.connections),
            },
            None => return false,
        };
        if !removed.is_empty() {
            store.bump(field.container);
        }
        for c in removed {
            if c.container() != field.container {
                store.release(c.container());
            }
        }
        true
    }

    fn field_connections(&self, field: FieldRef) -> Vec<Connection> {
        self.store()
            .slot(field)
            .map(|s| s.connections.clone())
            .unwrap_or_default()
    }

    fn enable_connection(&self, field: FieldRef, enabled: bool) -> bool {
        match self.store().slot_mut(field) {
            Some(slot) => {
                slot.connection_enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn is_connection_enabled(&self, field: FieldRef) -> Option<bool> {
        self.store().slot(field).map(|s| s.connection_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> MemoryDatabase {
        MemoryDatabase::new().expect("builtin database")
    }

    #[test]
    fn defaults_are_applied() {
        let db = db();
        let sphere = db.create_named("Sphere").expect("sphere");
        let radius = db.get_field(sphere, "radius").expect("radius");
        assert_eq!(db.read_numeric(radius), Some(NumericBuffer::F32(vec![1.0])));
        assert_eq!(db.container_text(sphere).as_deref(), Some(""));
    }

    #[test]
    fn container_text_initialiser() {
        let db = db();
        let cone = db.create_named("Cone").expect("cone");
        assert!(db.set_container_text(cone, "height 4 parts (SIDES | BOTTOM)"));
        let height = db.get_field(cone, "height").expect("height");
        assert_eq!(db.field_text(height).as_deref(), Some("4"));
        let text = db.container_text(cone).expect("text");
        assert!(text.contains("height 4"));
        assert!(text.contains("parts ALL"));
        assert!(!db.set_container_text(cone, "nonsense 1"));
    }

    #[test]
    fn unref_to_zero_cascades() {
        let db = db();
        let group = db.create_named("Group").expect("group");
        let child = db.create_named("Cube").expect("cube");
        db.ref_container(group);
        assert!(db.insert_child(group, child, 0));
        assert_eq!(db.ref_count(child), Some(1));
        assert_eq!(db.live_count(), 2);
        db.unref_container(group);
        assert_eq!(db.live_count(), 0);
        assert_eq!(db.ref_count(child), None);
    }

    #[test]
    fn abstract_types_are_not_creatable() {
        let db = db();
        let node = db.type_from_name("Node").expect("Node");
        assert!(!db.can_create_instance(node));
        assert!(db.create_instance(node).is_none());
        assert!(matches!(
            db.create_named("Shape"),
            Err(NativeError::NotCreatable(_))
        ));
    }

    #[test]
    fn find_by_name_prefers_newest() {
        let db = db();
        let node = db.type_from_name("Node").expect("Node");
        let first = db.create_named("Cube").expect("cube");
        let second = db.create_named("Sphere").expect("sphere");
        db.set_container_name(first, "thing");
        db.set_container_name(second, "thing");
        assert_eq!(db.find_by_name("thing", node), Some(second));
        let engine = db.type_from_name("Engine").expect("Engine");
        assert_eq!(db.find_by_name("thing", engine), None);
    }

    #[test]
    fn numeric_write_rules() {
        let db = db();
        let coords = db.create_named("Coordinate3").expect("coords");
        let point = db.get_field(coords, "point").expect("point");
        assert!(db.write_numeric(point, &NumericBuffer::F64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])));
        assert_eq!(db.field_num(point), Some(2));
        assert!(!db.write_numeric(point, &NumericBuffer::F32(vec![1.0, 2.0])));
        assert_eq!(db.field_num(point), Some(2));
        assert!(db.set_field_text(point, "1 2 3 4 5 6 7 8 9"));
        assert_eq!(db.field_num(point), Some(3));
    }

    #[test]
    fn rotation_writes_are_normalised() {
        let db = db();
        let xf = db.create_named("Transform").expect("transform");
        let rot = db.get_field(xf, "rotation").expect("rotation");
        assert!(db.write_numeric(rot, &NumericBuffer::F32(vec![0.0, 0.0, 0.0, 2.0])));
        assert_eq!(
            db.read_numeric(rot),
            Some(NumericBuffer::F32(vec![0.0, 0.0, 0.0, 1.0]))
        );
    }

    #[test]
    fn kit_part_lazily_built_from_default_type() {
        let db = db();
        let kit = db.create_named("ShapeKit").expect("kit");
        db.ref_container(kit);
        assert!(db.is_part(kit, "shape"));
        assert_eq!(db.get_part(kit, "shape", false), None);
        let shape = db.get_part(kit, "shape", true).expect("shape part");
        let cube = db.type_from_name("Cube").expect("Cube");
        assert_eq!(db.container_type(shape), Some(cube));
        assert_eq!(db.get_part(kit, "shape", true), Some(shape));

        let material = db.create_named("Material").expect("material");
        assert!(!db.set_part(kit, "shape", Some(material)));
        assert!(db.set_part(kit, "material", Some(material)));
        db.unref_container(kit);
        assert_eq!(db.live_count(), 0);
    }

    #[test]
    fn connections_hold_master_alive() {
        let db = db();
        let calc = db.create_named("Calculator").expect("calc");
        let sphere = db.create_named("Sphere").expect("sphere");
        db.ref_container(sphere);
        let radius = db.get_field(sphere, "radius").expect("radius");
        let oa = db.get_output(calc, "oa").expect("oa");
        assert!(db.connect_field(radius, Connection::Output(oa), false));
        assert_eq!(db.ref_count(calc), Some(1));
        assert_eq!(db.field_connections(radius), vec![Connection::Output(oa)]);
        assert!(db.disconnect_field(radius, None));
        assert_eq!(db.ref_count(calc), None);
        db.unref_container(sphere);
    }

    #[test]
    fn write_ref_acquires_before_release() {
        let db = db();
        db.register_catalog_json(
            r#"{"container_types":[{"name":"Holder","parent":"Node",
                "fields":[{"name":"target","type":"SFNode"}]}]}"#,
        )
        .expect("extension");
        let holder = db.create_named("Holder").expect("holder");
        let target = db.get_field(holder, "target").expect("target");
        let cube = db.create_named("Cube").expect("cube");
        assert!(db.write_ref(target, 0, Some(cube)));
        // rebinding to the same target never drops it to zero
        assert!(db.write_ref(target, 0, Some(cube)));
        assert_eq!(db.ref_count(cube), Some(1));
        let engine = db.create_named("ElapsedTime").expect("engine");
        assert!(!db.write_ref(target, 0, Some(engine)));
        assert_eq!(db.read_refs(target), Some(vec![Some(cube)]));
        assert!(db.write_ref(target, 0, None));
        assert_eq!(db.ref_count(cube), None);
    }
}
