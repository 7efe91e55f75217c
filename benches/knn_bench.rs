use corrspace::baseline::{GlobalAverage, UserItemBaseline};
use corrspace::builder::KnnBuilder;
use corrspace::core::CorrelationMatrix;
use corrspace::neighbors::{nearest_neighbors, positively_correlated};
use corrspace::ratings::{EntityType, RatingMatrix, RatingRecord};
use corrspace::similarity::Similarity;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use std::hint::black_box;
use std::time::Duration;

/// Synthetic 1..=5 star ratings with the given observation density.
fn generate_ratings(n_users: usize, n_items: usize, density: f64, seed: u64) -> Vec<RatingRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::new();
    for user in 0..n_users {
        // users lean high or low so correlations are not pure noise
        let bias: f32 = rng.random_range(-1.0..1.0);
        for item in 0..n_items {
            if rng.random_bool(density) {
                let noise: f32 = rng.random_range(-1.5..1.5);
                let value = (3.0 + bias + noise).round().clamp(1.0, 5.0);
                records.push(RatingRecord::new(user, item, value));
            }
        }
    }
    records
}

fn setup_matrix(n_users: usize, n_items: usize, seed: u64) -> RatingMatrix {
    RatingMatrix::from_records(&generate_ratings(n_users, n_items, 0.1, seed))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    // Group 1: bulk correlation computation per strategy
    let mut group_bulk = c.benchmark_group("compute_all");
    group_bulk.warm_up_time(Duration::from_millis(500));
    group_bulk.measurement_time(Duration::from_secs(3));
    group_bulk.sample_size(10);

    let ratings = setup_matrix(500, 300, 42);
    for similarity in [
        Similarity::Pearson { shrinkage: 10.0 },
        Similarity::Cosine,
        Similarity::BinaryCosine,
        Similarity::Jaccard,
    ] {
        let label = format!("{:?}", similarity);
        group_bulk.bench_function(BenchmarkId::new("strategy", label), |b| {
            b.iter_batched(
                CorrelationMatrix::default,
                |mut m| {
                    similarity
                        .compute_all(&mut m, ratings.by_entity(EntityType::Item))
                        .unwrap();
                    black_box(m);
                },
                BatchSize::SmallInput,
            )
        });
    }

    for &n_items in &[100, 200, 400, 800] {
        let ratings = setup_matrix(400, n_items, 7);
        group_bulk.bench_function(BenchmarkId::new("n_items", n_items), |b| {
            b.iter_batched(
                CorrelationMatrix::default,
                |mut m| {
                    Similarity::default()
                        .compute_all(&mut m, ratings.by_item())
                        .unwrap();
                    black_box(m);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group_bulk.finish();

    // Group 2: neighbor queries without the cache
    let mut group_neighbors = c.benchmark_group("neighbor_queries");
    group_neighbors.warm_up_time(Duration::from_millis(500));
    group_neighbors.measurement_time(Duration::from_secs(3));

    let mut matrix = CorrelationMatrix::default();
    Similarity::default()
        .compute_all(&mut matrix, setup_matrix(500, 1000, 3).by_item())
        .unwrap();
    group_neighbors.bench_function("positively_correlated", |b| {
        b.iter(|| black_box(positively_correlated(&matrix, black_box(17)).unwrap()))
    });
    for &k in &[10, 80] {
        group_neighbors.bench_function(BenchmarkId::new("nearest_neighbors", k), |b| {
            b.iter(|| black_box(nearest_neighbors(&matrix, black_box(17), k).unwrap()))
        });
    }
    group_neighbors.finish();

    // Group 3: prediction, cold and warm cache
    let mut group_predict = c.benchmark_group("predict");
    group_predict.warm_up_time(Duration::from_millis(500));
    group_predict.measurement_time(Duration::from_secs(3));

    let knn = KnnBuilder::new()
        .with_k(40)
        .build(setup_matrix(500, 400, 11), UserItemBaseline::default())
        .unwrap();
    let pairs: Vec<(usize, usize)> = (0..200).map(|i| (i * 7 % 500, i * 13 % 400)).collect();

    group_predict.bench_function("warm_cache", |b| {
        knn.predict_batch(&pairs);
        b.iter(|| {
            for &(u, i) in &pairs {
                black_box(knn.predict(u, i));
            }
        })
    });
    group_predict.bench_function("cold_cache", |b| {
        b.iter(|| {
            knn.neighbor_cache().invalidate_all();
            for &(u, i) in &pairs {
                black_box(knn.predict(u, i));
            }
        })
    });
    group_predict.bench_function("predict_batch", |b| {
        b.iter(|| black_box(knn.predict_batch(&pairs)))
    });
    group_predict.finish();

    // Group 4: incremental maintenance vs full retrain
    let mut group_update = c.benchmark_group("maintenance");
    group_update.warm_up_time(Duration::from_millis(500));
    group_update.measurement_time(Duration::from_secs(5));
    group_update.sample_size(10);

    let records = generate_ratings(400, 300, 0.1, 5);
    let (initial, added) = records.split_at(records.len() - 20);
    group_update.bench_function("add_ratings_20", |b| {
        b.iter_batched(
            || {
                KnnBuilder::new()
                    .build(RatingMatrix::from_records(initial), GlobalAverage::new())
                    .unwrap()
            },
            |mut knn| {
                knn.add_ratings(added).unwrap();
                black_box(knn);
            },
            BatchSize::LargeInput,
        )
    });
    group_update.bench_function("full_retrain", |b| {
        b.iter(|| {
            let knn = KnnBuilder::new()
                .build(RatingMatrix::from_records(&records), GlobalAverage::new())
                .unwrap();
            black_box(knn);
        })
    });
    group_update.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
