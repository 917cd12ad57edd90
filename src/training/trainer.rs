//! Cross-validation, model selection, refit and prediction

use super::checkpoint::CheckpointStore;
use super::estimator::{Estimator, FittedModel};
use super::metrics::{mean_squared_error, LossSummary};
use crate::data::{Dataset, PredictionWriter};
use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What to do when one candidate fails to fit during cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole sweep on the first failure
    #[default]
    FailFast,
    /// Record the failure and continue with the remaining candidates
    Isolate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Directory for per-estimator checkpoints
    pub model_dir: PathBuf,
    /// Output path of the id → prediction file
    pub predictions_path: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            predictions_path: PathBuf::from("models/predictions.csv"),
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl TrainerConfig {
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_predictions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.predictions_path = path.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Trainer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainerState {
    Idle,
    PerFoldFit,
    FoldScored,
    ModelScored,
    BestSelected,
    Refit,
    Predicted,
}

#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    estimator: Estimator,
    fold_losses: Vec<f64>,
    mean_loss: Option<f64>,
    checkpoint: Option<PathBuf>,
    failure: Option<String>,
}

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub label: String,
    pub family: String,
    pub fold_losses: Vec<f64>,
    pub summary: Option<LossSummary>,
    pub checkpoint: Option<PathBuf>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_folds: usize,
    pub candidates: Vec<CandidateReport>,
    pub best: Option<String>,
}

impl TrainingReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Runs k-fold cross-validation over registered estimators and produces the
/// final test predictions from the best one.
///
/// The train table must already carry fold ids; they are read once when
/// cross-validation starts and reused for every candidate.
pub struct Trainer {
    config: TrainerConfig,
    data: Dataset,
    store: CheckpointStore,
    candidates: Vec<Candidate>,
    n_folds: usize,
    state: TrainerState,
    best: Option<usize>,
    fitted: Option<FittedModel>,
    predictions: Option<Array1<f64>>,
}

impl Trainer {
    pub fn new(data: Dataset, config: TrainerConfig) -> Result<Self> {
        let store = CheckpointStore::new(&config.model_dir)?;
        Ok(Self {
            config,
            data,
            store,
            candidates: Vec::new(),
            n_folds: 0,
            state: TrainerState::Idle,
            best: None,
            fitted: None,
            predictions: None,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Register a candidate under its estimator name.
    ///
    /// A repeated name gets a numeric suffix so checkpoints never collide.
    pub fn add_model(&mut self, estimator: Estimator) -> &str {
        let base = estimator.name();
        let mut label = base.to_string();
        let mut n = 2;
        while self.candidates.iter().any(|c| c.label == label) {
            label = format!("{}_{}", base, n);
            n += 1;
        }
        self.push_candidate(label, estimator)
    }

    /// Register a candidate under an explicit label
    pub fn add_named_model(&mut self, label: impl Into<String>, estimator: Estimator) -> Result<&str> {
        let label = label.into();
        if self.candidates.iter().any(|c| c.label == label) {
            return Err(PredictorError::Config(format!("model `{}` already registered", label)));
        }
        Ok(self.push_candidate(label, estimator))
    }

    fn push_candidate(&mut self, label: String, estimator: Estimator) -> &str {
        debug!(label = %label, family = %estimator.family(), "Registered model");
        self.candidates.push(Candidate {
            label,
            estimator,
            fold_losses: Vec::new(),
            mean_loss: None,
            checkpoint: None,
            failure: None,
        });
        self.state = TrainerState::Idle;
        &self.candidates[self.candidates.len() - 1].label
    }

    pub fn n_models(&self) -> usize {
        self.candidates.len()
    }

    /// Cross-validate every registered estimator.
    ///
    /// For each fold the estimator is fit on the other folds and scored by MSE
    /// on this one. The best fold so far (per estimator) is checkpointed.
    pub fn cross_validate(&mut self) -> Result<()> {
        if self.candidates.is_empty() {
            return Err(PredictorError::InvalidState("no models registered".to_string()));
        }

        let folds = self.data.fold_ids()?;
        let n_folds = folds.iter().max().map_or(0, |m| m + 1);
        if n_folds < 2 {
            return Err(PredictorError::InvalidParameter {
                name: "n_folds".to_string(),
                value: n_folds.to_string(),
                reason: "cross-validation needs at least 2 folds".to_string(),
            });
        }
        self.n_folds = n_folds;
        self.best = None;
        self.fitted = None;
        self.predictions = None;

        let (x, y) = self.data.train_matrix()?;
        let splits: Vec<(Vec<usize>, Vec<usize>)> = (0..n_folds)
            .map(|fold| {
                let (valid, train): (Vec<usize>, Vec<usize>) =
                    (0..folds.len()).partition(|&i| folds[i] == fold);
                (train, valid)
            })
            .collect();
        if let Some(empty) = splits.iter().position(|(_, valid)| valid.is_empty()) {
            return Err(PredictorError::Data(format!("fold {} has no rows", empty)));
        }

        info!(n_models = self.candidates.len(), n_folds, n_rows = x.nrows(), "Starting cross-validation");

        for idx in 0..self.candidates.len() {
            match self.validate_candidate(idx, &x, &y, &splits) {
                Ok(()) => {}
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::FailFast => return Err(err),
                    FailurePolicy::Isolate => {
                        let candidate = &mut self.candidates[idx];
                        warn!(model = %candidate.label, error = %err, "Model failed, skipping");
                        candidate.failure = Some(err.to_string());
                        candidate.mean_loss = None;
                        candidate.checkpoint = None;
                        let stale = self.store.path_for(&candidate.label);
                        if stale.exists() {
                            std::fs::remove_file(&stale)?;
                            debug!(path = %stale.display(), "Removed checkpoint of failed model");
                        }
                    }
                },
            }
        }

        if self.candidates.iter().all(|c| c.mean_loss.is_none()) {
            return Err(PredictorError::InvalidState(
                "every registered model failed cross-validation".to_string(),
            ));
        }
        self.state = TrainerState::ModelScored;
        Ok(())
    }

    fn validate_candidate(
        &mut self,
        idx: usize,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[(Vec<usize>, Vec<usize>)],
    ) -> Result<()> {
        let label = self.candidates[idx].label.clone();
        let estimator = self.candidates[idx].estimator.clone();
        let started = Instant::now();

        let mut best_loss = f64::INFINITY;
        let mut fold_losses = Vec::with_capacity(splits.len());
        let mut checkpoint = None;
        self.candidates[idx].failure = None;

        for (fold, (train_idx, valid_idx)) in splits.iter().enumerate() {
            self.state = TrainerState::PerFoldFit;
            let x_train = x.select(Axis(0), train_idx);
            let y_train = y.select(Axis(0), train_idx);
            let x_valid = x.select(Axis(0), valid_idx);
            let y_valid = y.select(Axis(0), valid_idx);

            let model = estimator.fit(&x_train, &y_train)?;
            let preds = model
                .predict(&x_valid)
                .map_err(|e| PredictorError::fit_failure(estimator.name(), e))?;
            let loss = mean_squared_error(&y_valid, &preds)?;
            fold_losses.push(loss);
            self.state = TrainerState::FoldScored;

            info!(model = %label, fold, loss, "Fold scored");
            if loss < best_loss {
                best_loss = loss;
                checkpoint = Some(self.store.save(&label, &model)?);
            } else {
                info!(model = %label, fold, "Loss didn't improve");
            }
        }

        let summary = LossSummary::from_losses(&fold_losses);
        let candidate = &mut self.candidates[idx];
        candidate.mean_loss = summary.map(|s| s.mean);
        candidate.fold_losses = fold_losses;
        candidate.checkpoint = checkpoint;

        info!(
            model = %label,
            mean_loss = candidate.mean_loss.unwrap_or(f64::NAN),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Model scored"
        );
        Ok(())
    }

    /// Pick the candidate with the smallest mean loss; ties keep the earliest
    /// registered.
    pub fn select_best_model(&mut self) -> Result<&str> {
        if self.n_folds == 0 {
            return Err(PredictorError::InvalidState(
                "cross_validate must run before select_best_model".to_string(),
            ));
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in self.candidates.iter().enumerate() {
            if let Some(loss) = candidate.mean_loss {
                if best.map_or(true, |(_, b)| loss < b) {
                    best = Some((idx, loss));
                }
            }
        }

        let (idx, loss) = best.ok_or_else(|| {
            PredictorError::InvalidState("no model has a cross-validation score".to_string())
        })?;
        self.best = Some(idx);
        self.fitted = None;
        self.predictions = None;
        self.state = TrainerState::BestSelected;

        let label = self.candidates[idx].label.as_str();
        info!(model = %label, mean_loss = loss, "Selected best model");
        Ok(label)
    }

    pub fn best_model(&self) -> Option<&str> {
        self.best.map(|i| self.candidates[i].label.as_str())
    }

    pub fn best_estimator(&self) -> Option<&Estimator> {
        self.best.map(|i| &self.candidates[i].estimator)
    }

    /// Fit the selected estimator on every train row
    pub fn refit_best_on_full_train(&mut self) -> Result<()> {
        let idx = self.best.ok_or_else(|| {
            PredictorError::InvalidState("select_best_model must run before refit".to_string())
        })?;
        let (x, y) = self.data.train_matrix()?;
        let candidate = &self.candidates[idx];
        let model = candidate.estimator.fit(&x, &y)?;

        info!(model = %candidate.label, n_rows = x.nrows(), "Refit on full train set");
        self.fitted = Some(model);
        self.predictions = None;
        self.state = TrainerState::Refit;
        Ok(())
    }

    /// Refit model, if any
    pub fn fitted_model(&self) -> Option<&FittedModel> {
        self.fitted.as_ref()
    }

    /// Predict the test table with the refit model
    pub fn predict_test(&mut self) -> Result<&Array1<f64>> {
        let model = self.fitted.as_ref().ok_or_else(|| {
            PredictorError::InvalidState("refit_best_on_full_train must run before predicting".to_string())
        })?;
        let x = self.data.test_matrix()?;
        let preds = model.predict(&x)?;
        if preds.len() != self.data.n_test() {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} predictions", self.data.n_test()),
                actual: format!("{} predictions", preds.len()),
            });
        }
        self.state = TrainerState::Predicted;
        Ok(self.predictions.insert(preds))
    }

    /// Predict the test table and write `<id>,predicted_<target>` rows in test
    /// order. Returns the output path.
    pub fn predict_and_persist(&mut self) -> Result<PathBuf> {
        let preds = self.predict_test()?.to_vec();
        let ids = self.data.test_ids()?;
        let schema = self.data.schema();
        let path = self.config.predictions_path.clone();

        PredictionWriter::write_csv(
            &path,
            &schema.id,
            &format!("predicted_{}", schema.target),
            &ids,
            &preds,
        )?;
        info!(path = %path.display(), n_rows = preds.len(), "Predictions written");
        Ok(path)
    }

    /// Per-candidate fold losses and summaries
    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            n_folds: self.n_folds,
            candidates: self
                .candidates
                .iter()
                .map(|c| CandidateReport {
                    label: c.label.clone(),
                    family: c.estimator.family().key().to_string(),
                    fold_losses: c.fold_losses.clone(),
                    summary: LossSummary::from_losses(&c.fold_losses).filter(|_| c.failure.is_none()),
                    checkpoint: c.checkpoint.clone(),
                    failure: c.failure.clone(),
                })
                .collect(),
            best: self.best_model().map(str::to_string),
        }
    }

    pub fn save_report(&self, path: &Path) -> Result<()> {
        self.report().save(path)
    }

    /// Mean cross-validation loss of a candidate
    pub fn mean_loss(&self, label: &str) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.label == label)
            .and_then(|c| c.mean_loss)
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.store
    }
}
