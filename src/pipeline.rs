//! End-to-end runs: cross-validated training and hyperparameter search
//!
//! [`Pipeline::run_cv`] loads the tables, engineers features with fold ids,
//! cross-validates the candidate estimators, refits the winner and writes its
//! test predictions. [`Pipeline::run_search`] engineers features without folds
//! and searches model families and hyperparameters on a fixed hold-out split.

use crate::config::PipelineConfig;
use crate::data::{DataLoader, Dataset};
use crate::error::Result;
use crate::features::{FeatureConfig, FeatureEngineer};
use crate::optimizer::{HyperSearch, HyperparamRecord, ModelSearchSpace, Study, TrialObjective};
use crate::training::{
    Estimator, LightGBMConfig, MaxFeatures, ModelFamily, RandomForestConfig, Trainer, TrainingReport,
};
use std::path::PathBuf;
use tracing::info;

/// Outcome of [`Pipeline::run_cv`]
#[derive(Debug, Clone)]
pub struct CvOutcome {
    pub report: TrainingReport,
    pub predictions_path: PathBuf,
    pub report_path: PathBuf,
}

/// Outcome of [`Pipeline::run_search`]
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub record: HyperparamRecord,
    pub best_value: f64,
    pub study: Study,
    /// Parameter importances, sorted descending
    pub importances: Vec<(String, f64)>,
    pub params_path: Option<PathBuf>,
}

/// Random forest settings used when the forest is not the tuned family
pub fn default_random_forest(random_state: u64) -> RandomForestConfig {
    RandomForestConfig {
        n_estimators: 60,
        max_depth: Some(15),
        min_samples_split: 80,
        max_features: MaxFeatures::Fixed(8),
        random_state,
        ..Default::default()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    loader: DataLoader,
    search_space: ModelSearchSpace,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loader: DataLoader::new(),
            search_space: ModelSearchSpace::default(),
        })
    }

    /// Replace the loader, e.g. to change the CSV delimiter
    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the ranges searched by [`Pipeline::run_search`]
    pub fn with_search_space(mut self, space: ModelSearchSpace) -> Self {
        self.search_space = space;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the tables and engineer features; fold ids only when `kfold` is set
    pub fn get_data(&self, kfold: bool) -> Result<Dataset> {
        info!(dir = %self.config.data_dir.display(), "Loading and preprocessing data");
        let mut data = self.loader.load(&self.config.data_paths(), &self.config.schema)?;

        info!(kfold, n_folds = self.config.n_folds, "Engineering features");
        let mut engineer = FeatureEngineer::new(FeatureConfig {
            n_folds: self.config.n_folds,
            fold_seed: self.config.fold_seed,
            ..Default::default()
        });
        engineer.add_features(&mut data, kfold)?;

        if engineer.encoder().is_fitted() {
            std::fs::create_dir_all(&self.config.model_dir)?;
            engineer.encoder().save(&self.config.encoder_path())?;
        }
        Ok(data)
    }

    /// Candidate estimators: the tuned family from the hyperparameter file
    /// (when configured) and fixed settings for the other family.
    pub fn estimators(&self) -> Result<Vec<Estimator>> {
        let seed = self.config.model_seed;
        let tuned = match self.config.params_path() {
            Some(path) => {
                info!(path = %path.display(), "Loading hyperparameters");
                let record = HyperparamRecord::read(&path)?;
                Some(record.to_estimator(seed)?)
            }
            None => None,
        };
        let mut lightgbm = Estimator::LightGbm(LightGBMConfig {
            random_state: seed,
            ..Default::default()
        });
        let mut forest = Estimator::RandomForest(default_random_forest(seed));
        let mut baseline = self.config.include_baseline;
        if let Some(est) = tuned {
            match est.family() {
                ModelFamily::LightGbm => lightgbm = est,
                ModelFamily::RandomForest => forest = est,
                ModelFamily::Baseline => baseline = true,
            }
        }

        let mut estimators = vec![lightgbm, forest];
        if baseline {
            estimators.push(Estimator::Baseline);
        }
        Ok(estimators)
    }

    /// Engineered data wrapped in a trainer holding every candidate, plus
    /// `extra` estimators registered after them.
    pub fn load_models(&self, extra: Vec<Estimator>) -> Result<Trainer> {
        let data = self.get_data(true)?;
        let mut trainer = Trainer::new(data, self.config.trainer_config())?;
        for estimator in self.estimators()?.into_iter().chain(extra) {
            let label = trainer.add_model(estimator);
            info!(model = label, "Registered model");
        }
        Ok(trainer)
    }

    /// Cross-validate, select, refit and predict with the default candidates
    pub fn run_cv(&self) -> Result<CvOutcome> {
        self.run_cv_with(Vec::new())
    }

    pub fn run_cv_with(&self, extra: Vec<Estimator>) -> Result<CvOutcome> {
        let mut trainer = self.load_models(extra)?;
        trainer.cross_validate()?;
        let best = trainer.select_best_model()?.to_string();
        info!(model = %best, loss = trainer.mean_loss(&best), "Selected best model");

        trainer.refit_best_on_full_train()?;
        let predictions_path = trainer.predict_and_persist()?;

        let report_path = self.config.report_path();
        trainer.save_report(&report_path)?;
        Ok(CvOutcome {
            report: trainer.report(),
            predictions_path,
            report_path,
        })
    }

    /// Search families and hyperparameters, then persist the best record
    pub fn run_search(&self) -> Result<SearchOutcome> {
        let data = self.get_data(false)?;
        let objective = TrialObjective::from_dataset(&data, self.config.valid_ratio, self.config.split_seed)?
            .with_model_seed(self.config.model_seed);
        info!(
            n_train = objective.n_train(),
            n_valid = objective.n_valid(),
            n_trials = self.config.n_trials,
            "Optimizing model hyperparameters"
        );

        let mut search = HyperSearch::new(self.config.search_config(), self.search_space.clone())?;
        let best_value = search
            .optimize(|params| objective.evaluate(params))?
            .best_value()
            .unwrap_or(f64::INFINITY);
        let record = search.best_record()?;

        let params_path = self.config.params_path();
        if let Some(path) = &params_path {
            record.write(path)?;
        }
        if let Some(path) = self.config.study_path() {
            std::fs::create_dir_all(&self.config.model_dir)?;
            search.study().save(&path)?;
            info!(path = %path.display(), "Study saved");
        }

        let importances = search.importances();
        for (name, share) in &importances {
            info!(param = %name, importance = share, "Parameter importance");
        }

        Ok(SearchOutcome {
            record,
            best_value,
            study: search.study().clone(),
            importances,
            params_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("salary_pipeline_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn test_estimators_without_params_file() {
        let config = PipelineConfig::new().with_params_file(None).with_baseline(true);
        let pipeline = Pipeline::new(config).unwrap();
        let families: Vec<ModelFamily> = pipeline.estimators().unwrap().iter().map(Estimator::family).collect();
        assert_eq!(
            families,
            vec![ModelFamily::LightGbm, ModelFamily::RandomForest, ModelFamily::Baseline]
        );
    }

    #[test]
    fn test_tuned_forest_replaces_default() {
        let dir = temp_dir("tuned");
        let mut record = HyperparamRecord::from_estimator(&Estimator::RandomForest(default_random_forest(0)));
        record.params.insert("n_estimators".into(), ParameterValue::Int(7));
        record.write(&dir.join("best_hyperparams.json")).unwrap();

        let pipeline = Pipeline::new(PipelineConfig::new().with_model_dir(&dir)).unwrap();
        let estimators = pipeline.estimators().unwrap();
        assert_eq!(estimators.len(), 2);
        match &estimators[1] {
            Estimator::RandomForest(c) => {
                assert_eq!(c.n_estimators, 7);
                assert_eq!(c.max_features, MaxFeatures::Fixed(8));
            }
            other => panic!("unexpected estimator {other:?}"),
        }
        assert_eq!(estimators[0], Estimator::LightGbm(LightGBMConfig::default()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_params_file_is_config_error() {
        let config = PipelineConfig::new().with_model_dir(temp_dir("missing"));
        let pipeline = Pipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.estimators(),
            Err(crate::error::PredictorError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Pipeline::new(PipelineConfig::new().with_n_folds(0)).is_err());
    }
}
