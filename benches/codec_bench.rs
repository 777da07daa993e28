use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use game_wire_protocol::config::CodecConfig;
use game_wire_protocol::protocol::codec::Codec;
use game_wire_protocol::schema::{
    self, Hitbox, InteractionConfig, InteractionTarget, ItemCategory, ParamValue, Selector,
    Vector3f,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn codec() -> Codec<'static> {
    Codec::new(schema::registry().unwrap(), CodecConfig::default())
}

fn interaction() -> InteractionConfig {
    InteractionConfig::new("fireball", InteractionTarget::Target)
        .with_cooldown(1.5)
        .with_selector(Selector::AoeCircle {
            range: 4.0,
            offset: Vector3f::new(0.0, 1.5, 0.0),
        })
        .with_param(ParamValue::Double(12.5))
        .with_param(ParamValue::String("burn".into()))
        .with_param(ParamValue::Int(3))
        .with_tag("vfx", "fire_burst")
        .with_tag("sfx", "whoosh")
}

fn category_tree(width: usize, depth: usize) -> ItemCategory {
    let mut node = ItemCategory::new(format!("node-{depth}"), depth as i32).with_name("Category");
    if depth > 0 {
        node = node.with_children((0..width).map(|_| category_tree(width, depth - 1)).collect());
    }
    node
}

fn bench_encode(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("encode");

    let hitbox = Hitbox::new(-0.5, 0.0, -0.5, 0.5, 1.8, 0.5);
    group.bench_function("hitbox", |b| {
        b.iter(|| codec.encode_value_to_vec(&hitbox).unwrap())
    });

    let config = interaction();
    group.bench_function("interaction", |b| {
        b.iter(|| codec.encode_value_to_vec(&config).unwrap())
    });

    let tree = category_tree(4, 4);
    group.throughput(Throughput::Bytes(codec.size_of_value(&tree).unwrap() as u64));
    group.bench_function("category_tree", |b| {
        b.iter_batched(
            || bytes::BytesMut::with_capacity(64 * 1024),
            |mut out| codec.encode_value(&tree, &mut out).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("decode");

    let hitbox = codec.encode_value_to_vec(&Hitbox::default()).unwrap();
    group.bench_function("hitbox", |b| {
        b.iter(|| codec.decode_value::<Hitbox>(&hitbox, 0).unwrap())
    });

    let config = codec.encode_value_to_vec(&interaction()).unwrap();
    group.bench_function("interaction", |b| {
        b.iter(|| codec.decode_value::<InteractionConfig>(&config, 0).unwrap())
    });

    let tree = codec.encode_value_to_vec(&category_tree(4, 4)).unwrap();
    group.throughput(Throughput::Bytes(tree.len() as u64));
    group.bench_function("category_tree", |b| {
        b.iter(|| codec.decode_value::<ItemCategory>(&tree, 0).unwrap())
    });

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("validate");

    let tree = codec.encode_value_to_vec(&category_tree(4, 4)).unwrap();
    group.throughput(Throughput::Bytes(tree.len() as u64));
    group.bench_function("category_tree", |b| {
        b.iter(|| codec.validate_value::<ItemCategory>(&tree, 0))
    });
    group.bench_function("bytes_consumed", |b| {
        b.iter(|| codec.bytes_consumed_value::<ItemCategory>(&tree, 0).unwrap())
    });

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut noise = vec![0u8; 4096];
    rng.fill(&mut noise[..]);
    group.bench_function("noise", |b| {
        b.iter(|| codec.validate_value::<InteractionConfig>(&noise, 0))
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_validate);
criterion_main!(benches);
