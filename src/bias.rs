//! Preference bias learning
//!
//! This module tracks how far each user tends to move AI-suggested placements.
//! Corrections are folded into a per-user exponential moving average that a
//! prediction step can add to future suggestions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{LayoutError, Result};
use crate::types::{AdjustmentSample, PlacementObservation, UserBias};

/// Weight kept from the previous average on each update
pub const DEFAULT_BIAS_DECAY: f64 = 0.7;

/// Minimum correction (on either axis) worth learning from
pub const DEFAULT_NOISE_THRESHOLD: f64 = 5.0;

/// Persistence seam for per-user bias records.
///
/// `update_bias` is the read-modify-write used by the learner. The default
/// runs `load_bias` then `save_bias` and can lose updates under concurrent
/// writers; stores that can do better override it.
pub trait BiasStore {
    fn load_bias(&self, user_id: &str) -> Result<Option<UserBias>>;

    fn save_bias(&self, bias: &UserBias) -> Result<()>;

    fn update_bias(
        &self,
        user_id: &str,
        update: &mut dyn FnMut(Option<UserBias>) -> UserBias,
    ) -> Result<UserBias> {
        let current = self.load_bias(user_id)?;
        let next = update(current);
        self.save_bias(&next)?;
        Ok(next)
    }
}

impl<S: BiasStore + ?Sized> BiasStore for &S {
    fn load_bias(&self, user_id: &str) -> Result<Option<UserBias>> {
        (**self).load_bias(user_id)
    }

    fn save_bias(&self, bias: &UserBias) -> Result<()> {
        (**self).save_bias(bias)
    }

    fn update_bias(
        &self,
        user_id: &str,
        update: &mut dyn FnMut(Option<UserBias>) -> UserBias,
    ) -> Result<UserBias> {
        (**self).update_bias(user_id, update)
    }
}

/// Process-local store; `update_bias` holds the lock across the whole
/// read-modify-write.
#[derive(Debug, Default)]
pub struct InMemoryBiasStore {
    records: Mutex<HashMap<String, UserBias>>,
}

/// Serialized form shared by the in-memory snapshot and the file store
#[derive(Debug, Default, Serialize, Deserialize)]
struct BiasSnapshot {
    users: HashMap<String, UserBias>,
}

impl InMemoryBiasStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, UserBias>>> {
        self.records
            .lock()
            .map_err(|_| LayoutError::Store("bias store lock poisoned".to_string()))
    }

    /// Load store contents from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: BiasSnapshot = serde_json::from_str(json)?;
        Ok(Self {
            records: Mutex::new(snapshot.users),
        })
    }

    /// Serialize store contents to JSON
    pub fn to_json(&self) -> Result<String> {
        let snapshot = BiasSnapshot {
            users: self.lock()?.clone(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl BiasStore for InMemoryBiasStore {
    fn load_bias(&self, user_id: &str) -> Result<Option<UserBias>> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    fn save_bias(&self, bias: &UserBias) -> Result<()> {
        self.lock()?.insert(bias.user_id.clone(), bias.clone());
        Ok(())
    }

    fn update_bias(
        &self,
        user_id: &str,
        update: &mut dyn FnMut(Option<UserBias>) -> UserBias,
    ) -> Result<UserBias> {
        let mut records = self.lock()?;
        let next = update(records.get(user_id).cloned());
        records.insert(next.user_id.clone(), next.clone());
        Ok(next)
    }
}

/// Store backed by a single JSON document on disk.
///
/// Every call re-reads the file, so separate processes see each other's
/// writes; concurrent writers are last-write-wins.
#[derive(Debug, Clone)]
pub struct JsonFileBiasStore {
    path: PathBuf,
}

impl JsonFileBiasStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Result<BiasSnapshot> {
        if !self.path.exists() {
            return Ok(BiasSnapshot::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| LayoutError::Store(format!("{}: {e}", self.path.display())))?;
        if content.trim().is_empty() {
            return Ok(BiasSnapshot::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a sibling temp file, then rename it over the store so a
    /// crash mid-write leaves the previous document intact.
    fn write_snapshot(&self, snapshot: &BiasSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let staging = self.staging_path();
        fs::write(&staging, json)
            .and_then(|()| fs::rename(&staging, &self.path))
            .map_err(|e| {
                let _ = fs::remove_file(&staging);
                LayoutError::Store(format!("{}: {e}", self.path.display()))
            })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "bias".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BiasStore for JsonFileBiasStore {
    fn load_bias(&self, user_id: &str) -> Result<Option<UserBias>> {
        Ok(self.read_snapshot()?.users.get(user_id).cloned())
    }

    fn save_bias(&self, bias: &UserBias) -> Result<()> {
        let mut snapshot = self.read_snapshot()?;
        snapshot.users.insert(bias.user_id.clone(), bias.clone());
        self.write_snapshot(&snapshot)
    }
}

/// Learner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasLearnerConfig {
    /// Weight of the previous average, `new = old * decay + sample * (1 - decay)`
    pub decay: f64,
    /// Corrections smaller than this on both axes are ignored by
    /// `record_observations`
    pub noise_threshold: f64,
}

impl Default for BiasLearnerConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_BIAS_DECAY,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
        }
    }
}

impl BiasLearnerConfig {
    /// Require `decay` in [0, 1] and a non-negative noise threshold.
    ///
    /// Outside that range the average overshoots or diverges.
    pub fn validate(&self) -> Result<()> {
        if !self.decay.is_finite() || !(0.0..=1.0).contains(&self.decay) {
            return Err(LayoutError::InvalidOptions(format!(
                "decay must be a finite number in [0, 1], got {}",
                self.decay
            )));
        }
        if !self.noise_threshold.is_finite() || self.noise_threshold < 0.0 {
            return Err(LayoutError::InvalidOptions(format!(
                "noise_threshold must be a finite non-negative number, got {}",
                self.noise_threshold
            )));
        }
        Ok(())
    }

    /// Load settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Folds user corrections into a persisted per-user bias
pub struct PreferenceBiasLearner<S> {
    store: S,
    config: BiasLearnerConfig,
}

impl<S: BiasStore> PreferenceBiasLearner<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: BiasLearnerConfig::default(),
        }
    }

    pub fn with_config(store: S, config: BiasLearnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BiasLearnerConfig {
        &self.config
    }

    /// Fold a batch of corrections into the user's bias.
    ///
    /// The batch is averaged first. A user without a record gets the batch
    /// average as-is; otherwise the average is blended in with the EMA.
    pub fn record_adjustment(
        &self,
        user_id: &str,
        samples: &[AdjustmentSample],
    ) -> Result<UserBias> {
        let batch = mean_delta(samples)
            .ok_or_else(|| LayoutError::EmptySamples(user_id.to_string()))?;
        let decay = self.config.decay;

        let updated = self.store.update_bias(user_id, &mut |existing: Option<UserBias>| {
            let now = Utc::now();
            match existing {
                None => UserBias {
                    user_id: user_id.to_string(),
                    avg_urgency_bias: batch.urgency_delta,
                    avg_importance_bias: batch.importance_delta,
                    samples_seen: 1,
                    updated_at: now,
                },
                Some(old) => UserBias {
                    user_id: user_id.to_string(),
                    avg_urgency_bias: ema(old.avg_urgency_bias, batch.urgency_delta, decay),
                    avg_importance_bias: ema(
                        old.avg_importance_bias,
                        batch.importance_delta,
                        decay,
                    ),
                    samples_seen: old.samples_seen.saturating_add(1),
                    updated_at: now,
                },
            }
        })?;

        info!(
            user_id,
            samples = samples.len(),
            urgency_bias = updated.avg_urgency_bias,
            importance_bias = updated.avg_importance_bias,
            "preference bias updated"
        );
        Ok(updated)
    }

    /// Derive deltas from raw observations, drop those under the noise
    /// threshold, and record the rest. Returns `None` when nothing survived.
    pub fn record_observations(
        &self,
        user_id: &str,
        observations: &[PlacementObservation],
    ) -> Result<Option<UserBias>> {
        let samples: Vec<AdjustmentSample> = observations
            .iter()
            .filter(|o| o.is_meaningful(self.config.noise_threshold))
            .map(PlacementObservation::delta)
            .collect();

        if samples.is_empty() {
            debug!(user_id, observations = observations.len(), "no meaningful adjustments");
            return Ok(None);
        }
        self.record_adjustment(user_id, &samples).map(Some)
    }

    pub fn current_bias(&self, user_id: &str) -> Result<Option<UserBias>> {
        self.store.load_bias(user_id)
    }
}

fn ema(old: f64, sample: f64, decay: f64) -> f64 {
    old * decay + sample * (1.0 - decay)
}

fn mean_delta(samples: &[AdjustmentSample]) -> Option<AdjustmentSample> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let urgency: f64 = samples.iter().map(|s| s.urgency_delta).sum();
    let importance: f64 = samples.iter().map(|s| s.importance_delta).sum();
    Some(AdjustmentSample::new(urgency / n, importance / n))
}
