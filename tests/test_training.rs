//! Integration tests for the estimator families and checkpoints

use ndarray::{Array1, Array2};
use salary_predictor::training::{
    mean_squared_error, CheckpointStore, Estimator, LightGBMConfig, MaxFeatures, ModelFamily,
    RandomForestConfig,
};

/// Piecewise target over two features plus a noise-free interaction
fn regression_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(r, c)| match c {
        0 => (r % 25) as f64,
        1 => ((r * 37) % 100) as f64,
        _ => (r % 4) as f64,
    });
    let y = Array1::from_shape_fn(n, |r| {
        let years = (r % 25) as f64;
        let miles = ((r * 37) % 100) as f64;
        let level = (r % 4) as f64;
        60.0 + 2.0 * years - 0.3 * miles + if level > 1.0 { 20.0 } else { 0.0 }
    });
    (x, y)
}

fn baseline_mse(x: &Array2<f64>, y: &Array1<f64>) -> f64 {
    let model = Estimator::Baseline.fit(x, y).unwrap();
    mean_squared_error(y, &model.predict(x).unwrap()).unwrap()
}

#[test]
fn test_lightgbm_beats_baseline() {
    let (x, y) = regression_data(200);
    let est = Estimator::LightGbm(LightGBMConfig {
        n_estimators: 50,
        min_child_samples: 5,
        ..Default::default()
    });
    let model = est.fit(&x, &y).unwrap();
    assert_eq!(model.family(), ModelFamily::LightGbm);
    let mse = mean_squared_error(&y, &model.predict(&x).unwrap()).unwrap();
    assert!(mse < baseline_mse(&x, &y) * 0.2, "mse {mse}");
}

#[test]
fn test_random_forest_beats_baseline() {
    let (x, y) = regression_data(200);
    for max_features in [MaxFeatures::All, MaxFeatures::Sqrt, MaxFeatures::Fixed(2)] {
        let est = Estimator::RandomForest(RandomForestConfig {
            n_estimators: 20,
            max_features,
            ..Default::default()
        });
        let model = est.fit(&x, &y).unwrap();
        let mse = mean_squared_error(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(mse < baseline_mse(&x, &y) * 0.5, "{max_features:?}: mse {mse}");
    }
}

#[test]
fn test_same_seed_same_predictions() {
    let (x, y) = regression_data(120);
    let est = Estimator::RandomForest(RandomForestConfig {
        n_estimators: 10,
        random_state: 9,
        ..Default::default()
    });
    let a = est.fit(&x, &y).unwrap().predict(&x).unwrap();
    let b = est.fit(&x, &y).unwrap().predict(&x).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_checkpoint_restores_predictions() {
    let (x, y) = regression_data(80);
    let model = Estimator::LightGbm(LightGBMConfig {
        n_estimators: 10,
        min_child_samples: 5,
        ..Default::default()
    })
    .fit(&x, &y)
    .unwrap();

    let dir = std::env::temp_dir().join(format!("salary_ckpt_it_{}", std::process::id()));
    let store = CheckpointStore::new(&dir).unwrap();
    let path = store.save("LGBMRegressor", &model).unwrap();
    assert!(path.ends_with("LGBMRegressor_best.bin"));

    let restored = store.load("LGBMRegressor").unwrap();
    assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_rejects_bad_input() {
    let (x, y) = regression_data(10);
    let short = Array1::from_vec(vec![1.0; 5]);
    assert!(Estimator::Baseline.fit(&x, &short).is_err());

    let mut bad = x.clone();
    bad[[0, 0]] = f64::NAN;
    assert!(Estimator::LightGbm(LightGBMConfig::default()).fit(&bad, &y).is_err());
}
