use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use housing_pipeline::prelude::*;
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use std::sync::Arc;

const NEIGHBORHOODS: [&str; 5] = ["CollgCr", "Veenker", "NAmes", "OldTown", "Edwards"];

fn create_housing_data(n_rows: usize) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let lot_area: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(5000.0..20000.0)).collect();
    let quality: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(1..=10)).collect();
    let built: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(1900..2008)).collect();
    let neighborhood: Vec<&str> = (0..n_rows)
        .map(|_| NEIGHBORHOODS[rng.gen_range(0..NEIGHBORHOODS.len())])
        .collect();

    let target: Vec<f64> = (0..n_rows)
        .map(|i| {
            3.0 * lot_area[i] + 10000.0 * quality[i] as f64 - 100.0 * (2010 - built[i]) as f64
                + rng.gen::<f64>() * 1000.0
        })
        .collect();

    let df = df!(
        "LotArea" => lot_area,
        "OverallQual" => quality,
        "YrSold" => vec![2010i64; n_rows],
        "YearBuilt" => built.clone(),
        "YearRemodAdd" => built.clone(),
        "GarageYrBlt" => built,
        "Neighborhood" => neighborhood,
    )
    .unwrap();

    (df, Array1::from_vec(target))
}

fn registry() -> EstimatorRegistry {
    let metadata = DatasetColumns::new()
        .with_numeric(["LotArea", "OverallQual", "HouseAge", "RemodAddAge", "GarageAge"])
        .with_categorical("Neighborhood", NEIGHBORHOODS);
    EstimatorRegistry::with_defaults(Arc::new(metadata))
}

fn forest_config() -> PipelineConfig {
    let steps = json!([
        {"name": "age-extractor"},
        {"name": "categorical-encoder", "params": {"one_hot": true}},
        {"name": "random-forest-regressor", "params": {"n_estimators": 20, "max_features": "sqrt"}},
    ]);
    PipelineConfig::from_json_str(&steps.to_string()).unwrap()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let registry = registry();
    let config = forest_config();

    for n_rows in [1000, 5000].iter() {
        let (df, y) = create_housing_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &df, |b, df| {
            b.iter(|| {
                let mut pipeline = build_pipeline(&config, &registry).unwrap();
                pipeline.fit(black_box(df), Some(&y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");

    let (train_df, y) = create_housing_data(5000);
    let mut pipeline = build_pipeline(&forest_config(), &registry()).unwrap();
    pipeline.fit(&train_df, Some(&y)).unwrap();

    for n_rows in [100, 1000].iter() {
        let (df, _) = create_housing_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &df, |b, df| {
            b.iter(|| pipeline.predict(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
