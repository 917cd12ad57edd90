//! Hyperparameter search
//!
//! Provides:
//! - Search spaces with integer, float (optionally log-scale) and categorical
//!   ranges, conditioned on the model family ([`ModelSearchSpace`])
//! - Injected sampling oracles ([`Sampler`]): random and TPE
//! - The trial loop ([`HyperSearch`]) scoring each trial on a fixed hold-out
//!   split ([`TrialObjective`])
//! - Persisted best parameters ([`HyperparamRecord`]) and importances

mod config;
mod importance;
mod model_space;
mod objective;
mod optimizer;
mod params;
mod samplers;
mod search_space;

pub use config::SearchConfig;
pub use importance::variance_importances;
pub use model_space::{lightgbm_space, random_forest_space, ModelSearchSpace};
pub use objective::TrialObjective;
pub use optimizer::{HyperSearch, Study, TrialResult};
pub use params::{HyperparamRecord, FAMILY_KEY};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
