use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scenebind_bridge::{Bridge, BridgeConfig, NdArray, ScriptValue};
use scenebind_native::MemoryDatabase;

const POINTS: usize = 10_000;

fn bench_point_field(c: &mut Criterion) {
    let db = Arc::new(MemoryDatabase::new().expect("db"));
    let bridge = Bridge::new(db, BridgeConfig::default()).expect("bridge");
    let coords = bridge.create("Coordinate3", None).expect("coords");

    let flat: Vec<f32> = (0..POINTS * 3).map(|i| i as f32 * 0.5).collect();
    let array = ScriptValue::Array(
        NdArray::from_f32s(&flat)
            .reshape(vec![POINTS, 3])
            .expect("reshape"),
    );
    let list = ScriptValue::list(
        flat.chunks(3)
            .map(|p| ScriptValue::list(p.iter().map(|v| ScriptValue::Float(*v as f64)))),
    );

    c.bench_function("encode_mfvec3f_array", |b| {
        b.iter(|| coords.set_attr("point", black_box(array.clone())).expect("set"))
    });
    c.bench_function("encode_mfvec3f_nested_list", |b| {
        b.iter(|| coords.set_attr("point", black_box(list.clone())).expect("set"))
    });
    c.bench_function("decode_mfvec3f", |b| {
        b.iter(|| black_box(coords.get_attr("point").expect("get")))
    });
}

fn bench_class_lookup(c: &mut Criterion) {
    let db = Arc::new(MemoryDatabase::new().expect("db"));
    let bridge = Bridge::new(db, BridgeConfig::default()).expect("bridge");
    c.bench_function("resolve_cached_class", |b| {
        b.iter(|| bridge.class(black_box("Selection")).expect("class"))
    });
}

criterion_group!(benches, bench_point_field, bench_class_lookup);
criterion_main!(benches);
