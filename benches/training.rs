use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use salary_predictor::data::{DataLoader, Schema};
use salary_predictor::features::FeatureEngineer;
use salary_predictor::training::{Estimator, LightGBMConfig, RandomForestConfig};

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(0);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.sum_axis(ndarray::Axis(1)) + Array1::from_shape_fn(n_rows, |_| rng.gen::<f64>() * 0.1);
    (x, y)
}

fn create_postings(n_rows: usize) -> (DataFrame, DataFrame) {
    let mut rng = StdRng::seed_from_u64(1);
    let ids: Vec<String> = (0..n_rows).map(|i| format!("JOB{}", i)).collect();
    let pick = |rng: &mut StdRng, prefix: &str, n: usize| -> Vec<String> {
        (0..n_rows).map(|_| format!("{}{}", prefix, rng.gen_range(0..n))).collect()
    };
    let company = pick(&mut rng, "COMP", 60);
    let job = pick(&mut rng, "JOB_TYPE", 8);
    let degree = pick(&mut rng, "DEGREE", 5);
    let major = pick(&mut rng, "MAJOR", 9);
    let industry = pick(&mut rng, "INDUSTRY", 7);
    let years: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0..25) as f64).collect();
    let miles: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0..100) as f64).collect();
    let salary: Vec<f64> = years.iter().zip(&miles).map(|(y, m)| 60.0 + 3.0 * y - 0.4 * m).collect();

    let features = df!(
        "jobId" => &ids,
        "companyId" => &company,
        "jobType" => &job,
        "degree" => &degree,
        "major" => &major,
        "industry" => &industry,
        "yearsExperience" => &years,
        "milesFromMetropolis" => &miles
    )
    .unwrap();
    let targets = df!("jobId" => &ids, "salary" => &salary).unwrap();
    (features, targets)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let data = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("lgbr", n_rows), &data, |b, (x, y)| {
            let est = Estimator::LightGbm(LightGBMConfig::default());
            b.iter(|| est.fit(black_box(x), black_box(y)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("rf", n_rows), &data, |b, (x, y)| {
            let est = Estimator::RandomForest(RandomForestConfig {
                n_estimators: 20,
                max_depth: Some(12),
                ..Default::default()
            });
            b.iter(|| est.fit(black_box(x), black_box(y)).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let (x, y) = create_regression_data(5000, 10);
    let model = Estimator::LightGbm(LightGBMConfig::default()).fit(&x, &y).unwrap();

    c.bench_function("predict_lgbr_5000", |b| b.iter(|| model.predict(black_box(&x)).unwrap()));
}

fn bench_feature_engineering(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");
    group.sample_size(10);

    let (features, targets) = create_postings(20_000);
    let (test, _) = create_postings(2_000);
    let data = DataLoader::from_frames(features, &targets, test, &Schema::default()).unwrap();

    group.bench_function("add_features_kfold", |b| {
        b.iter(|| {
            let mut data = data.clone();
            FeatureEngineer::with_folds(10).add_features(&mut data, true).unwrap();
            data
        })
    });
    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction, bench_feature_engineering);
criterion_main!(benches);
