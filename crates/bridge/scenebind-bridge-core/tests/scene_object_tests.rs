use std::sync::Arc;

use scenebind_bridge::{
    Bridge, BridgeConfig, BridgeError, ConstructArgs, IgnoreReason, SceneObject, ScriptValue,
    SetOutcome,
};
use scenebind_native::{MemoryDatabase, NativeError, SceneDatabase};
use scenebind_test_fixtures::scenes;

fn bridge_with(db: Arc<MemoryDatabase>, config: BridgeConfig) -> Arc<Bridge> {
    Bridge::new(db, config).expect("bridge")
}

fn fresh(scene: &str) -> (Arc<MemoryDatabase>, Arc<Bridge>) {
    let db = Arc::new(scenes::database(scene).expect("fixture database"));
    let bridge = bridge_with(Arc::clone(&db), BridgeConfig::default());
    (db, bridge)
}

fn refs(db: &MemoryDatabase, object: &SceneObject) -> u32 {
    let id = object.container_id().expect("bound object");
    db.ref_count(id).expect("live container")
}

/// it should create a sphere from an initialiser and find a cone by name
#[test]
fn smoke_create_and_lookup() {
    let (_db, bridge) = fresh("basic");
    let sphere = bridge.create("Sphere", Some("radius 4")).expect("sphere");
    assert_eq!(sphere.get_attr("radius").expect("radius"), ScriptValue::Float(4.0));

    let cone = bridge
        .create_object(ConstructArgs::new().with_type("Cone").with_name("cone"))
        .expect("cone");
    let found = bridge
        .create_object(ConstructArgs::new().with_name("cone"))
        .expect("lookup");
    assert_eq!(found, cone);
    assert!(!found.is_same_wrapper(&cone));
    assert_eq!(found.get_type().expect("type"), "Cone");
}

/// it should hold exactly one native reference per wrapper
#[test]
fn wrappers_hold_one_reference_each() {
    let (db, bridge) = fresh("basic");
    let cone = bridge.create("Cone", None).expect("cone");
    assert_eq!(refs(&db, &cone), 1);

    let clone = cone.clone();
    assert_eq!(refs(&db, &cone), 1);
    assert!(clone.is_same_wrapper(&cone));

    let id = cone.container_id().expect("id");
    let second = bridge.wrap(id).expect("wrap");
    assert_eq!(refs(&db, &cone), 2);
    drop(second);
    assert_eq!(refs(&db, &cone), 1);

    drop(clone);
    drop(cone);
    assert_eq!(db.ref_count(id), None);
    assert_eq!(db.live_count(), 0);
}

/// it should keep a container alive through a field handle after its wrapper is gone
#[test]
fn field_handles_keep_their_container() {
    let (db, bridge) = fresh("basic");
    let sphere = bridge.create("Sphere", None).expect("sphere");
    let id = sphere.container_id().expect("id");
    let radius = sphere.field("radius").expect("field");
    assert_eq!(db.ref_count(id), Some(2));
    drop(sphere);
    radius.set_value(ScriptValue::Float(2.5)).expect("set");
    assert_eq!(radius.value(), ScriptValue::Float(2.5));
    assert_eq!(radius.get_container().expect("container").container_id(), Some(id));
    drop(radius);
    assert_eq!(db.live_count(), 0);
}

/// it should acquire the new container before releasing the old one on rebind
#[test]
fn rebinding_to_the_same_container_keeps_it_alive() {
    let (db, bridge) = fresh("basic");
    let cone = bridge.create("Cone", None).expect("cone");
    let id = cone.container_id().expect("id");
    cone.rebind(Some(id)).expect("rebind");
    assert_eq!(db.ref_count(id), Some(1));

    let other = bridge.create("Cone", None).expect("other");
    let other_id = other.container_id().expect("id");
    cone.rebind(Some(other_id)).expect("rebind");
    assert_eq!(db.ref_count(id), None);
    assert_eq!(db.ref_count(other_id), Some(2));

    cone.rebind(None).expect("unbind");
    assert!(!cone.is_bound());
    assert_eq!(cone.repr(), "Uninitialized");
    assert!(matches!(cone.get_attr("height"), Err(BridgeError::Unbound)));
}

/// it should refuse to rebind a wrapper to an unrelated type
#[test]
fn rebinding_checks_the_class() {
    let (_db, bridge) = fresh("basic");
    let cone = bridge.create("Cone", None).expect("cone");
    let calc = bridge.create("Calculator", None).expect("calc");
    let err = cone
        .rebind(calc.container_id())
        .expect_err("engine is not a cone");
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
    assert_eq!(cone.get_type().expect("type"), "Cone");
}

/// it should decode references to the same container as equal objects
#[test]
fn reference_round_trip() {
    let (db, bridge) = fresh("extension");
    let holder = bridge.create("ReferenceHolder", None).expect("holder");
    let cube = bridge.create("Cube", None).expect("cube");
    assert!(holder.get_attr("target").expect("get").is_none());

    assert_eq!(holder.set_attr("target", cube.clone()).expect("set"), SetOutcome::Applied);
    assert_eq!(refs(&db, &cube), 2);
    let read = holder.get_attr("target").expect("get");
    assert_eq!(read.as_object(), Some(&cube));
    drop(read);

    holder.set_attr("target", ScriptValue::None).expect("clear");
    assert!(holder.get_attr("target").expect("get").is_none());
    assert_eq!(refs(&db, &cube), 1);
}

/// it should ignore a reference of the wrong kind and keep the old value
#[test]
fn wrong_kind_reference_is_ignored() {
    let (_db, bridge) = fresh("extension");
    let holder = bridge.create("ReferenceHolder", None).expect("holder");
    let cube = bridge.create("Cube", None).expect("cube");
    let calc = bridge.create("Calculator", None).expect("calc");
    holder.set_attr("target", cube.clone()).expect("set");

    let outcome = holder.set_attr("target", calc.clone()).expect("lenient");
    assert_eq!(outcome, SetOutcome::Ignored(IgnoreReason::WrongReferenceKind));
    assert_eq!(holder.get_attr("target").expect("get").as_object(), Some(&cube));

    let outcome = holder.set_attr("driver", cube).expect("lenient");
    assert_eq!(outcome, SetOutcome::Ignored(IgnoreReason::WrongReferenceKind));
    assert_eq!(holder.set_attr("driver", calc.clone()).expect("set"), SetOutcome::Applied);
    assert_eq!(holder.get_attr("driver").expect("get").as_object(), Some(&calc));
}

/// it should resize multi-value references and skip elements that are not accepted objects
#[test]
fn multi_reference_assignment() {
    let (db, bridge) = fresh("extension");
    let holder = bridge.create("ReferenceHolder", None).expect("holder");
    let a = bridge.create("Cube", None).expect("a");
    let b = bridge.create("Sphere", None).expect("b");
    let calc = bridge.create("Calculator", None).expect("calc");

    let value = ScriptValue::list([a.clone().into(), calc.into(), b.clone().into()]);
    assert_eq!(holder.set_attr("targets", value).expect("set"), SetOutcome::Applied);
    let ScriptValue::List(items) = holder.get_attr("targets").expect("get") else {
        panic!("multi references decode as lists");
    };
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_object(), Some(&a));
    assert!(items[1].is_none());
    assert_eq!(items[2].as_object(), Some(&b));
    drop(items);

    holder.set_attr("targets", ScriptValue::list([b.clone().into(), a.clone().into()]))
        .expect("reorder");
    assert_eq!(refs(&db, &a), 2);
    assert_eq!(refs(&db, &b), 2);

    let value = ScriptValue::list([ScriptValue::Int(7), b.clone().into()]);
    assert_eq!(holder.set_attr("targets", value).expect("set"), SetOutcome::Applied);
    let ScriptValue::List(items) = holder.get_attr("targets").expect("get") else {
        panic!("multi references decode as lists");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_object(), Some(&b), "skipped slot keeps its occupant");
    assert_eq!(items[1].as_object(), Some(&b));
    drop(items);
    assert_eq!(refs(&db, &a), 1);
    assert_eq!(refs(&db, &b), 3);

    holder.set_attr("targets", b.clone()).expect("single");
    let ScriptValue::List(items) = holder.get_attr("targets").expect("get") else {
        panic!("multi references decode as lists");
    };
    assert_eq!(items.len(), 1);
    drop(items);
    assert_eq!(refs(&db, &a), 1);

    holder.set_attr("targets", ScriptValue::None).expect("clear");
    assert_eq!(holder.get_attr("targets").expect("get"), ScriptValue::list([]));
    assert_eq!(refs(&db, &b), 1);
}

/// it should build kit parts lazily and route part assignments through the kit
#[test]
fn kit_parts() {
    let (_db, bridge) = fresh("basic");
    let kit = bridge.create("ShapeKit", None).expect("kit");
    assert!(kit.get(Some("material"), false).expect("peek").is_none());

    let shape = kit.get_attr("shape").expect("shape");
    let shape = shape.as_object().expect("part built on access");
    assert_eq!(shape.get_type().expect("type"), "Cube");

    let sphere = bridge.create("Sphere", None).expect("sphere");
    assert_eq!(kit.set_attr("shape", sphere.clone()).expect("set"), SetOutcome::Applied);
    assert_eq!(kit.get_attr("shape").expect("get").as_object(), Some(&sphere));

    let material = bridge.create("Material", None).expect("material");
    let outcome = kit.set_attr("shape", material).expect("lenient");
    assert_eq!(outcome, SetOutcome::Ignored(IgnoreReason::WrongReferenceKind));
    assert_eq!(kit.get_attr("shape").expect("get").as_object(), Some(&sphere));
}

/// it should list a kit's parts as a read-only catalog
#[test]
fn kit_part_catalog() {
    let scene = scenes::build("basic").expect("scene");
    let bridge = bridge_with(scene.db(), BridgeConfig::default());
    let kit = bridge.wrap(scene.id("kit").expect("kit")).expect("wrap");
    assert!(kit.check_type("BaseKit").expect("check"));

    let catalog = kit.catalog().expect("catalog").expect("kits have parts");
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.names(), ["transform", "material", "coordinate3", "shape"]);
    assert!(catalog.contains("material"));
    assert!(!catalog.contains("radius"));
    let shape = catalog.get(3).expect("shape part");
    assert_eq!(shape.part_type, "Shape");
    assert_eq!(shape.default_type, "Cube");
    assert!(catalog.get(4).is_none());
    assert!(catalog.iter().all(|p| kit.get_attr(&p.name).is_ok()));

    let ball = bridge.wrap(scene.id("ball").expect("ball")).expect("wrap");
    assert!(ball.catalog().expect("catalog").is_none());
}

/// it should leave parts empty on read when lazy construction is off
#[test]
fn kit_parts_without_construction() {
    let db = Arc::new(MemoryDatabase::new().expect("db"));
    let config = BridgeConfig {
        create_parts_on_access: false,
        ..BridgeConfig::default()
    };
    let bridge = bridge_with(db, config);
    let kit = bridge.create("ShapeKit", None).expect("kit");
    assert!(kit.get_attr("transform").expect("get").is_none());
    let built = kit.get(Some("transform"), true).expect("get");
    assert_eq!(
        built.as_object().expect("built").get_type().expect("type"),
        "Transform"
    );
}

/// it should turn ignored assignments into errors in strict mode
#[test]
fn strict_mode_rejects_values() {
    let db = Arc::new(MemoryDatabase::new().expect("db"));
    let config = BridgeConfig::from_json_str(r#"{"strict_values": true}"#).expect("config");
    let bridge = bridge_with(db, config);
    let xf = bridge.create("Transform", None).expect("xf");
    let err = xf
        .set_attr("translation", ScriptValue::list([ScriptValue::Float(1.0)]))
        .expect_err("strict");
    match err {
        BridgeError::ValueRejected { field, reason } => {
            assert_eq!(field, "translation");
            assert_eq!(reason, IgnoreReason::WrongLength { expected: 3, got: 1 });
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(bridge.create("Sphere", Some("radius banana")).is_err());
}

/// it should apply constructor arguments by kind
#[test]
fn construct_arguments() {
    let (db, bridge) = fresh("basic");
    let node = bridge.module().get("Node").expect("Node class");
    let sphere = bridge
        .instantiate(&node, ConstructArgs::new().with_type("Sphere").with_name("ball"))
        .expect("node creates a sphere");
    assert_eq!(sphere.name().expect("name"), "ball");
    assert_eq!(sphere.class().name(), "Node");

    let err = bridge
        .instantiate(&node, ConstructArgs::new().with_type("Calculator"))
        .expect_err("engine is not a node");
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));

    let err = bridge
        .instantiate(&node, ConstructArgs::new().with_type("Shape"))
        .expect_err("abstract");
    assert!(matches!(err, BridgeError::Native(NativeError::NotCreatable(_))));

    let container = bridge.module().get("FieldContainer").expect("root");
    let err = bridge
        .instantiate(&container, ConstructArgs::new().with_type("Sphere"))
        .expect_err("field container roots cannot create");
    assert!(matches!(err, BridgeError::TypeMismatch { expected, .. } if expected == "Node or Engine"));

    let cone = bridge.class("Cone").expect("Cone");
    let err = bridge
        .instantiate(&cone, ConstructArgs::new().with_type("Sphere"))
        .expect_err("cone class creates cones");
    assert!(matches!(err, BridgeError::InvalidArgument(_)));

    let pointer = bridge
        .instantiate(&node, ConstructArgs::new().with_pointer(sphere.container_id().expect("id")))
        .expect("pointer");
    assert_eq!(pointer, sphere);
    assert_eq!(refs(&db, &sphere), 2);

    let unbound = bridge.instantiate(&cone, ConstructArgs::new()).expect("empty");
    assert!(!unbound.is_bound());

    assert!(matches!(
        bridge.create_object(ConstructArgs::new().with_name("nobody")),
        Err(BridgeError::NotFound(_))
    ));
    assert!(matches!(
        bridge.create_object(ConstructArgs::new()),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(bridge.create("Wobble", None), Err(BridgeError::UnknownType(_))));
}

/// it should format objects like the host would
#[test]
fn repr_and_str() {
    let (_db, bridge) = fresh("basic");
    let cone = bridge.create("Cone", None).expect("cone");
    let id = cone.container_id().expect("id");
    assert_eq!(cone.repr(), format!("<Cone at {id}>"));
    assert_eq!(cone.to_string(), cone.repr());

    cone.set_name("tip").expect("name");
    cone.set("height 4").expect("init");
    assert_eq!(cone.repr(), format!("<Cone \"tip\" at {id}>"));
    assert_eq!(cone.to_string(), format!("<Cone \"tip\" at {id}>\nheight 4"));
    assert_eq!(ScriptValue::from(cone.clone()).to_string(), cone.repr());
}

/// it should expose native text per field and for the whole container
#[test]
fn native_text_access() {
    let (_db, bridge) = fresh("basic");
    let cube = bridge.create("Cube", None).expect("cube");
    assert!(cube.set("width 3 depth 5").expect("set"));
    assert!(!cube.set("width").expect("set"));
    assert!(cube.set_field("height", "7").expect("set"));
    assert_eq!(cube.get(Some("height"), false).expect("get"), ScriptValue::from("7"));
    let ScriptValue::Str(text) = cube.get(None, false).expect("get") else {
        panic!("container text is a string");
    };
    assert!(text.contains("width 3"));
    assert!(text.contains("depth 5"));
    assert!(cube.check_type("Shape").expect("check"));
    assert!(!cube.check_type("Group").expect("check"));
}

/// it should advance the change counter on writes and touches
#[test]
fn node_id_tracks_changes() {
    let (_db, bridge) = fresh("basic");
    let sphere = bridge.create("Sphere", None).expect("sphere");
    let start = sphere.node_id().expect("id");
    sphere.touch().expect("touch");
    let touched = sphere.node_id().expect("id");
    assert!(touched > start);
    sphere.set_attr("radius", ScriptValue::Float(3.0)).expect("set");
    assert!(sphere.node_id().expect("id") > touched);
}

/// it should treat groups like host lists
#[test]
fn group_operations() {
    let (_db, bridge) = fresh("basic");
    let root = bridge.create("Separator", None).expect("root");
    let a = bridge.create("Cube", None).expect("a");
    let b = bridge.create("Sphere", None).expect("b");
    let c = bridge.create("Cone", None).expect("c");

    root.append(&a).expect("append");
    root.extend(&[b.clone(), c.clone()]).expect("extend");
    assert_eq!(root.len(), 3);
    assert_eq!(root.child(-1).expect("last"), c);
    assert!(matches!(root.child(3), Err(BridgeError::IndexOutOfRange(3))));
    assert_eq!(root.slice(1, 10).expect("slice"), vec![b.clone(), c.clone()]);
    assert!(root.slice(2, 1).expect("slice").is_empty());

    root.insert(0, &c).expect("insert");
    assert_eq!(root.child(0).expect("first"), c);
    assert!(root.remove(&c).expect("remove"));
    assert_eq!(root.children().expect("children"), vec![a.clone(), b.clone(), c.clone()]);

    root.set_child(1, Some(&a)).expect("replace");
    assert_eq!(root.child(1).expect("second"), a);
    root.set_child(1, None).expect("delete");
    assert_eq!(root.len(), 2);
    root.set_child(99, Some(&b)).expect("append past end");
    assert_eq!(root.child(-1).expect("last"), b);

    assert!(root.contains(&b));
    root.remove_at(-1).expect("remove last");
    assert!(!root.contains(&b));

    let calc = bridge.create("Calculator", None).expect("calc");
    assert!(matches!(root.append(&calc), Err(BridgeError::TypeMismatch { .. })));
    root.extend(&[calc]).expect("non-nodes are skipped");
    assert_eq!(root.len(), 2);

    root.clear_children().expect("clear");
    assert!(root.is_empty());
    assert_eq!(a.len(), 0);
    assert!(matches!(a.children(), Err(BridgeError::NotAGroup)));
}

/// it should report children the group refuses instead of dropping them
#[test]
fn groups_refuse_cycles() {
    let (db, bridge) = fresh("basic");
    let outer = bridge.create("Separator", None).expect("outer");
    let inner = bridge.create("Group", None).expect("inner");
    outer.append(&inner).expect("append");

    assert!(matches!(outer.append(&outer), Err(BridgeError::ChildRejected)));
    assert!(matches!(inner.insert(0, &outer), Err(BridgeError::ChildRejected)));
    assert!(matches!(
        inner.extend(&[outer.clone()]),
        Err(BridgeError::ChildRejected)
    ));
    let cube = bridge.create("Cube", None).expect("cube");
    inner.append(&cube).expect("append");
    assert!(matches!(
        inner.set_child(0, Some(&outer)),
        Err(BridgeError::ChildRejected)
    ));
    assert_eq!(inner.children().expect("children"), vec![cube]);
    assert_eq!(refs(&db, &outer), 1);
}

/// it should concatenate groups into a new group of the same type
#[test]
fn group_concatenation() {
    let (_db, bridge) = fresh("extension");
    let left = bridge.create("ExtensionGroup", None).expect("left");
    let right = bridge.create("Group", None).expect("right");
    let a = bridge.create("Cube", None).expect("a");
    let b = bridge.create("Sphere", None).expect("b");
    left.append(&a).expect("append");
    right.append(&b).expect("append");

    let joined = left.concat(&right).expect("concat");
    assert_eq!(joined.get_type().expect("type"), "ExtensionGroup");
    assert_eq!(joined.children().expect("children"), vec![a.clone(), b.clone()]);

    let with_node = left.concat(&b).expect("concat node");
    assert_eq!(with_node.children().expect("children"), vec![a, b]);
    assert_eq!(left.len(), 1);
}

/// it should connect fields from fields and engine outputs
#[test]
fn connections() {
    let (_db, bridge) = fresh("basic");
    let sphere = bridge.create("Sphere", None).expect("sphere");
    let cube = bridge.create("Cube", None).expect("cube");
    let calc = bridge.create("Calculator", None).expect("calc");

    assert!(sphere.connect("radius", &cube, "width").expect("connect"));
    assert!(sphere.is_connected("radius").expect("connected"));
    let radius = sphere.field("radius").expect("radius");
    let width = cube.field("width").expect("width");
    assert_eq!(radius.get_connected_field(), Some(width.clone()));
    assert_eq!(radius.get_connections(), vec![width.clone()]);
    assert!(radius.get_connected_engine().is_none());

    assert!(sphere.connect("radius", &calc, "oa").expect("connect output"));
    let oa = calc.output("oa").expect("oa");
    assert_eq!(radius.get_connected_engine(), Some(oa.clone()));
    assert!(radius.get_connected_field().is_none());
    assert_eq!(oa.get_name(), "oa");
    assert_eq!(oa.get_type(), "MFFloat");
    assert_eq!(oa.get_container().expect("engine"), calc);

    assert!(radius.append_connection(&width));
    assert_eq!(radius.get_connections().len(), 1);
    assert!(radius.enable_connection(false));
    assert!(!radius.is_connection_enabled());

    assert!(radius.disconnect(Some((&oa).into())));
    assert!(radius.is_connected());
    sphere.disconnect("radius").expect("disconnect");
    assert!(!sphere.is_connected("radius").expect("connected"));

    assert!(matches!(
        sphere.connect("radius", &calc, "nothing"),
        Err(BridgeError::UnknownAttribute(_))
    ));
}

/// it should describe fields and outputs through handles
#[test]
fn field_and_output_handles() {
    let (_db, bridge) = fresh("basic");
    let cone = bridge.create("Cone", None).expect("cone");
    let names: Vec<String> = cone
        .fields()
        .expect("fields")
        .iter()
        .map(|f| f.get_name())
        .collect();
    assert_eq!(names, vec!["parts", "bottomRadius", "height"]);

    let parts = cone.field("parts").expect("parts");
    assert_eq!(parts.get_type(), "SFBitMask");
    assert_eq!(
        parts.get_enums(),
        Some(vec!["SIDES".to_string(), "BOTTOM".to_string(), "ALL".to_string()])
    );
    assert!(cone.field("height").expect("height").get_enums().is_none());

    let calc = bridge.create("Calculator", None).expect("calc");
    let outputs: Vec<String> = calc
        .outputs()
        .expect("outputs")
        .iter()
        .map(|o| o.get_name())
        .collect();
    assert_eq!(outputs, vec!["oa", "ob", "oA"]);
    let oa = calc.output("oa").expect("oa");
    assert!(oa.is_enabled());
    assert!(oa.enable(false));
    assert!(!oa.is_enabled());
    assert!(cone.outputs().expect("outputs").is_empty());
}

/// it should find objects built outside the bridge by name
#[test]
fn wraps_fixture_scene_objects() {
    let scene = scenes::build("basic").expect("scene");
    let db = scene.db();
    let bridge = bridge_with(Arc::clone(&db), BridgeConfig::default());
    let calc = bridge
        .create_object(ConstructArgs::new().with_name("calc"))
        .expect("calc");
    assert_eq!(calc.get_type().expect("type"), "Calculator");
    assert_eq!(
        calc.get_attr("expression").expect("expression"),
        ScriptValue::list(["oa = a * 2".into()])
    );
    let ball = bridge.wrap(scene.id("ball").expect("ball")).expect("wrap");
    assert_eq!(ball.get_attr("radius").expect("radius"), ScriptValue::Float(4.0));
    let cone_id = scene.id("cone").expect("cone");
    assert_eq!(db.ref_count(cone_id), Some(1));
}
