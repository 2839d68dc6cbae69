// ============================================================
// Layer 6 — Data Configuration
// ============================================================
// One serialisable struct carrying every knob of the pipeline:
//
//   DataConfig
//     ├── batcher    BatcherConfig    (graph / node / edge limits)
//     ├── sampler    SamplerConfig    (policy, fold sizes, seed)
//     └── multitask  MultitaskConfig  (fold, task order, chunking)
//
// Missing fields fall back to their defaults, so a config file
// only needs the values it changes:
//
//   { "sampler": { "kind": "balanced", "train_size": 32 } }
//
// ConfigStore writes and reads it as pretty JSON next to a
// training run, so the run can be repeated with the same splits.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::multitask::{MultitaskBatchIterable, MultitaskConfig};
use crate::data::batch_iter::BatchIterable;
use crate::data::batcher::BatcherConfig;
use crate::data::sampler::SamplerConfig;
use crate::domain::datapoint::MoleculeDatapoint;
use crate::domain::task::Task;
use crate::domain::traits::TaskSampler;

const CONFIG_FILE: &str = "data_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub batcher:   BatcherConfig,
    pub sampler:   SamplerConfig,
    pub multitask: MultitaskConfig,
}

impl DataConfig {
    pub fn validate(&self) -> crate::Result<()> {
        self.batcher.validate()?;
        self.sampler.validate()?;
        self.multitask.validate()
    }

    /// Batch iterable over a fixed list of datapoints, labelled per the
    /// multitask label kind.
    pub fn batch_iterable(&self, datapoints: Vec<Arc<MoleculeDatapoint>>) -> crate::Result<BatchIterable> {
        Ok(BatchIterable::new(datapoints, self.batcher.clone())?.with_label_kind(self.multitask.label_kind))
    }

    /// Multitask iterable driven by the configured sampler.
    pub fn multitask_iterable(
        &self,
        tasks:           Vec<Task>,
        task_name_to_id: &HashMap<String, usize>,
    ) -> crate::Result<MultitaskBatchIterable<Box<dyn TaskSampler>>> {
        MultitaskBatchIterable::new(
            tasks,
            self.sampler.build()?,
            task_name_to_id,
            self.batcher.clone(),
            self.multitask.clone(),
        )
    }
}

// ─── ConfigStore ──────────────────────────────────────────────────────────────
/// Saves and loads a [`DataConfig`] in a run directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Create the store, making the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create config directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn save(&self, cfg: &DataConfig) -> Result<()> {
        let path = self.path();
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved data config to '{}'", path.display());
        Ok(())
    }

    /// Load and validate. An invalid file is an error, never silently fixed.
    pub fn load(&self) -> Result<DataConfig> {
        let path = self.path();

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        let cfg: DataConfig = serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))?;
        cfg.validate()
            .with_context(|| format!("Invalid config in '{}'", path.display()))?;

        tracing::debug!("Loaded data config from '{}'", path.display());
        Ok(cfg)
    }
}
