//! Persisted fitted models, one file per estimator label

use super::estimator::FittedModel;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory of `<label>_best.bin` checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open a store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}_best.bin", label))
    }

    /// Overwrite the checkpoint for `label`
    pub fn save(&self, label: &str, model: &FittedModel) -> Result<PathBuf> {
        let path = self.path_for(label);
        let writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(writer, model)?;
        debug!(path = %path.display(), "Checkpoint saved");
        Ok(path)
    }

    pub fn load(&self, label: &str) -> Result<FittedModel> {
        let reader = BufReader::new(File::open(self.path_for(label))?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Estimator;
    use ndarray::array;

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("salary_ckpt_{}", std::process::id()));
        let store = CheckpointStore::new(&dir).unwrap();
        assert_eq!(store.path_for("rf"), dir.join("rf_best.bin"));

        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let model = Estimator::Baseline.fit(&x, &y).unwrap();
        store.save("MeanRegressor", &model).unwrap();

        let loaded = store.load("MeanRegressor").unwrap();
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
        assert!(store.load("missing").is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
