//! Per-run context threaded through every stage.
//!
//! A [`Session`] owns the configuration, the artifact [`Store`], the emission
//! factor table once it has been loaded, and a keyed registry of the clean and
//! enriched partitions produced or loaded during the run. Nothing is shared
//! between runs.

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::enrich::EmissionFactors;
use crate::error::Result;
use crate::store::Store;
use crate::trip::{CleanTrip, EnrichedTrip, PartitionKey};

pub struct Session {
    config: PipelineConfig,
    store: Store,
    factors: Option<EmissionFactors>,
    pub(crate) clean: BTreeMap<PartitionKey, Vec<CleanTrip>>,
    pub(crate) enriched: BTreeMap<PartitionKey, Vec<EnrichedTrip>>,
    started: Instant,
}

impl Session {
    pub fn open(config: PipelineConfig) -> Self {
        let store = Store::new(config.data_dir.clone());
        info!(data_dir = %config.data_dir.display(), "Session opened");
        Self {
            config,
            store,
            factors: None,
            clean: BTreeMap::new(),
            enriched: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The emission factor table, loaded on first use.
    pub fn emission_factors(&mut self) -> Result<&EmissionFactors> {
        let factors = match self.factors.take() {
            Some(factors) => factors,
            None => EmissionFactors::load(&self.config.emission_factors)?,
        };
        Ok(self.factors.insert(factors))
    }

    /// Replaces the emission factor table for this run.
    pub fn set_emission_factors(&mut self, factors: EmissionFactors) {
        self.factors = Some(factors);
    }

    /// Clean partitions held by this session.
    pub fn clean_partitions(&self) -> &BTreeMap<PartitionKey, Vec<CleanTrip>> {
        &self.clean
    }

    /// Enriched partitions held by this session.
    pub fn enriched_partitions(&self) -> &BTreeMap<PartitionKey, Vec<EnrichedTrip>> {
        &self.enriched
    }

    /// Makes sure the clean partition for `key` is registered, loading it
    /// from the store if needed. Returns `false` when it does not exist.
    pub fn ensure_clean(&mut self, key: PartitionKey) -> Result<bool> {
        if self.clean.contains_key(&key) {
            return Ok(true);
        }
        match self.store.read_clean(key)? {
            Some(rows) => {
                debug!(partition = %key, rows = rows.len(), "Clean partition loaded");
                self.clean.insert(key, rows);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Same as [`ensure_clean`](Self::ensure_clean) for enriched partitions.
    pub fn ensure_enriched(&mut self, key: PartitionKey) -> Result<bool> {
        if self.enriched.contains_key(&key) {
            return Ok(true);
        }
        match self.store.read_enriched(key)? {
            Some(rows) => {
                debug!(partition = %key, rows = rows.len(), "Enriched partition loaded");
                self.enriched.insert(key, rows);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!(
            clean_partitions = self.clean.len(),
            enriched_partitions = self.enriched.len(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Session closed"
        );
    }
}

/// Runs `f` inside a fresh session that is released when `f` returns.
pub fn with_session<T>(config: PipelineConfig, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
    let mut session = Session::open(config);
    f(&mut session)
}
