//! Error types for the emissions pipeline.
//!
//! Missing partitions are not errors; they are collected in
//! [`RunSummary`](crate::pipeline::RunSummary). Everything here aborts the
//! run it occurs in.

use std::path::PathBuf;
use thiserror::Error;

use crate::consolidate::ViewScope;
use crate::trip::{CabType, PartitionKey};

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("emission factor table not found at {path:?}")]
    MissingEmissionFactors { path: PathBuf },

    #[error("no emission factor row for cab type '{cab}'")]
    NoFactorForCab { cab: CabType },

    #[error("emission factor for cab type '{cab}' is ambiguous ({rows} distinct values)")]
    AmbiguousFactor { cab: CabType, rows: usize },

    #[error("artifact '{artifact}' is missing expected columns: {missing:?}")]
    SchemaMismatch {
        artifact: String,
        missing: Vec<String>,
    },

    #[error("invalid record in '{artifact}' at row {row}: {message}")]
    InvalidRecord {
        artifact: String,
        row: u64,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stage '{stage}' failed for {key}: {source}")]
    Stage {
        stage: &'static str,
        key: PartitionKey,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("stage '{stage}' failed for view {view}: {source}")]
    View {
        stage: &'static str,
        view: ViewScope,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("stage '{stage}' failed: {source}")]
    StageSetup {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("IO error at path {path:?}: {source}")]
    IoWithPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Attaches the stage name and partition key to a fatal error.
    pub fn in_stage(self, stage: &'static str, key: PartitionKey) -> Self {
        PipelineError::Stage {
            stage,
            key,
            source: Box::new(self),
        }
    }

    /// Attaches the stage name and view to a fatal error.
    pub fn in_view(self, stage: &'static str, view: ViewScope) -> Self {
        PipelineError::View {
            stage,
            view,
            source: Box::new(self),
        }
    }

    /// Attaches the stage name to a fatal error not tied to one partition.
    pub fn in_setup(self, stage: &'static str) -> Self {
        PipelineError::StageSetup {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, unwrapping any stage context.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. }
            | PipelineError::View { source, .. }
            | PipelineError::StageSetup { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::IoWithPath {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_in_message() {
        let key = PartitionKey::new(CabType::Green, 2019);
        let err = PipelineError::NoFactorForCab { cab: CabType::Green }.in_stage("transform", key);
        let msg = err.to_string();

        assert!(msg.contains("transform"));
        assert!(msg.contains("green/2019"));
        assert!(msg.contains("no emission factor"));
    }

    #[test]
    fn test_root_unwraps_nested_context() {
        let key = PartitionKey::new(CabType::Yellow, 2024);
        let err = PipelineError::InvalidConfig("x".into())
            .in_stage("clean", key)
            .in_stage("run", key);

        assert!(matches!(err.root(), PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_view_and_setup_context() {
        let err = PipelineError::InvalidConfig("x".into()).in_view("clean", ViewScope::AllCabs);
        assert!(err.to_string().contains("view all"));
        assert!(matches!(err.root(), PipelineError::InvalidConfig(_)));

        let err = PipelineError::MissingEmissionFactors {
            path: PathBuf::from("data/vehicle_emissions.csv"),
        }
        .in_setup("transform");
        assert!(err.to_string().starts_with("stage 'transform' failed"));
        assert!(matches!(err.root(), PipelineError::MissingEmissionFactors { .. }));
    }
}
