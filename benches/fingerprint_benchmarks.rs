//! Fingerprint benchmarks
//!
//! Benchmarks for the hashing hot path of every pipeline run:
//! - Canonical serialization of the composite descriptor
//! - Full fingerprint (serialize + MD5) across model sizes
//! - Index lookups after a warm cache open

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_cache::cache::NullObserver;
use model_cache::config::CacheConfig;
use model_cache::descriptor::{ArtifactDescriptor, DataDescriptor, LayerDescriptor, TrainingConfig};
use model_cache::fingerprint::canonical::to_canonical_string;
use model_cache::fingerprint::fingerprint;
use model_cache::store::SequentialModel;
use model_cache::ModelCache;
use serde_json::json;

/// Create a descriptor with `num_layers` dense layers
fn create_descriptor(num_layers: usize) -> ArtifactDescriptor {
    let layers = (0..num_layers)
        .map(|i| {
            LayerDescriptor::new("Dense")
                .with_param("units", 64 + i)
                .with_param("activation", "relu")
                .with_param("dropout", 0.1)
        })
        .collect();
    ArtifactDescriptor::from_serializable(
        layers,
        &TrainingConfig::default(),
        &DataDescriptor::new(10, vec![64, 64, 3]),
    )
    .expect("descriptor")
}

fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_json");

    for num_layers in &[1, 10, 100] {
        let descriptor = create_descriptor(*num_layers);
        let composite = json!({
            "layers": descriptor.structure(),
            "model_config": descriptor.training_config(),
            "dataset_info": descriptor.data_descriptor(),
        });
        group.bench_with_input(BenchmarkId::from_parameter(num_layers), &composite, |b, value| {
            b.iter(|| to_canonical_string(black_box(value)).expect("canonical"));
        });
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for num_layers in &[1, 10, 100] {
        let descriptor = create_descriptor(*num_layers);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_layers),
            &descriptor,
            |b, descriptor| {
                b.iter(|| fingerprint(black_box(descriptor)).expect("fingerprint"));
            },
        );
    }

    group.finish();
}

fn bench_lookup_hit(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cache = ModelCache::open_with_observer(
        CacheConfig::new(dir.path()),
        Box::new(NullObserver),
    )
    .expect("open");
    let descriptor = create_descriptor(10);
    let model = SequentialModel::new("bench", descriptor.structure().to_vec());
    let fp = cache.put(&descriptor, &model).expect("put");

    c.bench_function("try_get_hit", |b| {
        b.iter(|| cache.try_get::<SequentialModel>(black_box(&fp)));
    });
}

criterion_group!(benches, bench_canonical, bench_fingerprint, bench_lookup_hit);
criterion_main!(benches);
