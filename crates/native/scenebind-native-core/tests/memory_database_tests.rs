use scenebind_native::{
    CatalogSpec, Connection, FieldStorage, Image, MemoryDatabase, NumericBuffer, PartInfo, Plane,
    SceneDatabase,
};

fn db() -> MemoryDatabase {
    MemoryDatabase::new().expect("builtin database")
}

// --- Type system ---

#[test]
fn parent_chain_reaches_field_container() {
    let db = db();
    let kit = db.type_from_name("ShapeKit").expect("ShapeKit");
    let mut names = Vec::new();
    let mut cursor = Some(kit);
    while let Some(tag) = cursor {
        names.push(db.type_name(tag).expect("name"));
        cursor = db.parent_type(tag);
    }
    assert_eq!(names, vec!["ShapeKit", "BaseKit", "Node", "FieldContainer"]);
    assert_eq!(db.parent_type_name(kit).as_deref(), Some("BaseKit"));
}

#[test]
fn types_registered_later_are_visible() {
    let db = db();
    assert!(db.type_from_name("SFPoint3f").is_none());
    let spec = CatalogSpec::from_json_str(
        r#"{"field_types":[{"name":"SFPoint3f","parent":"SFVec3f"}],
            "container_types":[{"name":"Marker","parent":"Node",
              "fields":[{"name":"where","type":"SFPoint3f","default":"1 2 3"}]}]}"#,
    )
    .expect("catalog");
    db.register_catalog(&spec).expect("register");
    let point = db.type_from_name("SFPoint3f").expect("SFPoint3f");
    let vec3 = db.type_from_name("SFVec3f").expect("SFVec3f");
    assert!(db.is_type_derived_from(point, vec3));
    assert!(matches!(
        db.field_storage(point),
        Some(FieldStorage::Numeric { width: 3, .. })
    ));
    let node = db.type_from_name("Node").expect("Node");
    let marker = db.type_from_name("Marker").expect("Marker");
    assert!(db.derived_types(node).contains(&marker));

    let m = db.create_instance(marker).expect("marker");
    let field = db.get_field(m, "where").expect("where");
    assert_eq!(db.field_text(field).as_deref(), Some("1 2 3"));
}

// --- Field primitives ---

#[test]
fn empty_multi_field_has_zero_items() {
    let db = db();
    let ifs = db.create_named("IndexedFaceSet").expect("ifs");
    let idx = db.get_field(ifs, "coordIndex").expect("coordIndex");
    assert!(db.set_field_num(idx, 0));
    assert_eq!(db.field_num(idx), Some(0));
    assert_eq!(db.read_numeric(idx), Some(NumericBuffer::I32(vec![])));
    assert_eq!(db.field_text(idx).as_deref(), Some("[]"));
}

#[test]
fn planes_are_normalised_on_write() {
    let db = db();
    let clip = db.create_named("ClipPlane").expect("clip");
    let plane = db.get_field(clip, "plane").expect("plane");
    assert!(db.write_planes(plane, &[Plane { normal: [0.0, 3.0, 0.0], distance: 2.0 }]));
    assert_eq!(db.field_text(plane).as_deref(), Some("0 1 0 2"));
    assert!(!db.write_planes(plane, &[]));
}

#[test]
fn image_rejects_short_buffers() {
    let db = db();
    let tex = db.create_named("Texture2").expect("texture");
    let image = db.get_field(tex, "image").expect("image");
    let bad = Image {
        width: 2,
        height: 2,
        channels: 1,
        pixels: vec![1, 2, 3],
    };
    assert!(!db.write_image(image, &bad));
    let good = Image::new(2, 2, 1, &[1, 2, 3, 4]).expect("image");
    assert!(db.write_image(image, &good));
    assert_eq!(db.read_image(image), Some(good));
    assert!(db.write_image(image, &Image::empty()));
    assert_eq!(db.field_text(image).as_deref(), Some("0 0 0"));
}

#[test]
fn enum_names_follow_declaration_order() {
    let db = db();
    let sel = db.create_named("Selection").expect("selection");
    let policy = db.get_field(sel, "policy").expect("policy");
    assert_eq!(
        db.enum_names(policy),
        Some(vec!["SINGLE".to_string(), "TOGGLE".into(), "SHIFT".into()])
    );
    let which = db.get_field(sel, "renderCaching").expect("renderCaching");
    assert!(db.enum_names(which).is_some());
    let sphere = db.create_named("Sphere").expect("sphere");
    let radius = db.get_field(sphere, "radius").expect("radius");
    assert_eq!(db.enum_names(radius), None);
}

#[test]
fn item_text_grows_multi_fields() {
    let db = db();
    let calc = db.create_named("Calculator").expect("calc");
    let expr = db.get_field(calc, "expression").expect("expression");
    assert!(db.set_field_num(expr, 0));
    assert!(db.set_field_item_text(expr, 0, "\"oa = a + b\""));
    assert!(db.set_field_item_text(expr, 2, "\"ob = a\""));
    assert_eq!(db.field_num(expr), Some(3));
    assert_eq!(db.field_item_text(expr, 1).as_deref(), Some("\"\""));
    assert_eq!(
        db.read_strings(expr),
        Some(vec!["oa = a + b".to_string(), String::new(), "ob = a".into()])
    );
}

#[test]
fn touch_and_trigger_bump_version() {
    let db = db();
    let timer = db.create_named("ElapsedTime").expect("timer");
    let reset = db.get_field(timer, "reset").expect("reset");
    let before = db.container_version(timer).expect("version");
    assert!(db.touch_field(reset));
    assert!(db.set_field_text(reset, ""));
    assert!(db.container_version(timer).expect("version") >= before + 2);
}

// --- Groups and connections ---

#[test]
fn group_child_operations_keep_counts() {
    let db = db();
    let sep = db.create_named("Separator").expect("separator");
    db.ref_container(sep);
    let a = db.create_named("Cube").expect("cube");
    let b = db.create_named("Sphere").expect("sphere");
    assert!(db.insert_child(sep, a, 0));
    assert!(db.insert_child(sep, b, 0));
    assert_eq!(db.children(sep), Some(vec![b, a]));
    assert!(!db.insert_child(sep, a, 5));

    let engine = db.create_named("Calculator").expect("calc");
    assert!(!db.insert_child(sep, engine, 0));

    let c = db.create_named("Cone").expect("cone");
    assert!(db.replace_child(sep, 0, c));
    assert_eq!(db.ref_count(b), None);
    assert!(db.remove_child(sep, 1));
    assert_eq!(db.ref_count(a), None);
    assert_eq!(db.children(sep), Some(vec![c]));

    let cube = db.create_named("Cube").expect("cube");
    assert_eq!(db.children(cube), None);
}

#[test]
fn groups_refuse_cycles() {
    let db = db();
    let outer = db.create_named("Separator").expect("outer");
    db.ref_container(outer);
    let inner = db.create_named("Group").expect("inner");
    assert!(db.insert_child(outer, inner, 0));
    assert!(!db.insert_child(outer, outer, 0));
    assert!(!db.insert_child(inner, outer, 0));

    let cube = db.create_named("Cube").expect("cube");
    assert!(db.insert_child(inner, cube, 0));
    assert!(!db.replace_child(inner, 0, outer));
    assert_eq!(db.children(inner), Some(vec![cube]));
    assert_eq!(db.ref_count(outer), Some(1));
}

#[test]
fn kit_part_catalog_lists_parts_in_order() {
    let db = db();
    let kit = db.create_named("ShapeKit").expect("kit");
    let catalog = db.part_catalog(kit).expect("catalog");
    let names: Vec<_> = catalog.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["transform", "material", "coordinate3", "shape"]);
    assert_eq!(
        catalog[3],
        PartInfo {
            name: "shape".into(),
            part_type: "Shape".into(),
            default_type: "Cube".into(),
        }
    );
    assert_eq!(catalog[0].default_type, "Transform");

    let cube = db.create_named("Cube").expect("cube");
    assert_eq!(db.part_catalog(cube), Some(Vec::new()));
    db.ref_container(cube);
    db.unref_container(cube);
    assert_eq!(db.part_catalog(cube), None);
}

#[test]
fn append_connection_keeps_existing_masters() {
    let db = db();
    let compose = db.create_named("ComposeVec3f").expect("compose");
    let calc = db.create_named("Calculator").expect("calc");
    let x = db.get_field(compose, "x").expect("x");
    let a = db.get_field(calc, "a").expect("a");
    let oa = db.get_output(calc, "oa").expect("oa");
    assert!(db.connect_field(x, Connection::Field(a), false));
    assert!(db.connect_field(x, Connection::Output(oa), true));
    assert_eq!(
        db.field_connections(x),
        vec![Connection::Field(a), Connection::Output(oa)]
    );
    assert_eq!(db.ref_count(calc), Some(2));
    assert!(db.disconnect_field(x, Some(Connection::Field(a))));
    assert_eq!(db.field_connections(x), vec![Connection::Output(oa)]);
    assert!(db.enable_connection(x, false));
    assert_eq!(db.is_connection_enabled(x), Some(false));
    assert!(db.enable_output(oa, false));
    assert_eq!(db.is_output_enabled(oa), Some(false));
}

#[test]
fn stale_ids_answer_empty() {
    let db = db();
    let cube = db.create_named("Cube").expect("cube");
    let width = db.get_field(cube, "width").expect("width");
    db.ref_container(cube);
    db.unref_container(cube);
    assert_eq!(db.container_type(cube), None);
    assert_eq!(db.read_numeric(width), None);
    assert!(!db.write_numeric(width, &NumericBuffer::F32(vec![1.0])));
    assert!(db.enumerate_fields(cube).is_empty());
    assert!(!db.unref_container(cube));
}
