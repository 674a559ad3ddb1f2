//! Output formatting and persistence for analysis summaries.
//!
//! Supports pretty-printing and JSON files for the reporting layer.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analysis::CabSummary;
use crate::error::{PipelineError, Result};

/// Logs a summary using Rust's debug pretty-print format.
pub fn print_pretty(summary: &CabSummary) {
    debug!("{:#?}", summary);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty JSON to `path`, replacing any previous file.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body).map_err(|e| PipelineError::io(path, e))?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes a summary to `<output_dir>/summary_<name>.json`.
pub fn write_summary(output_dir: &Path, summary: &CabSummary) -> Result<PathBuf> {
    let path = output_dir.join(format!("summary_{}.json", summary.name()));
    write_json(&path, summary)?;
    info!(path = %path.display(), "Summary written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::{ViewScope, consolidate};
    use crate::trip::{CabType, PartitionKey};
    use crate::trip::fixtures::{enriched_at, ts};
    use std::collections::BTreeMap;
    use std::env;

    fn sample_summary() -> CabSummary {
        let parts = BTreeMap::from([(
            PartitionKey::new(CabType::Green, 2020),
            vec![enriched_at(ts(2020, 5, 5, 5, 5, 5), 1.5)],
        )]);
        let view = consolidate(&parts, ViewScope::Cab(CabType::Green)).unwrap();
        CabSummary::from_view(&view, Some(2020))
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_summary());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_summary()).unwrap();
    }

    #[test]
    fn test_write_summary_creates_file() {
        let dir = env::temp_dir().join("taxi_emissions_test_output");
        let _ = fs::remove_dir_all(&dir); // clean up any prior run

        let path = write_summary(&dir, &sample_summary()).unwrap();

        assert_eq!(path.file_name().unwrap(), "summary_green_2020.json");
        let content = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["trips"], 1);
        assert_eq!(parsed["monthly_totals"].as_array().unwrap().len(), 12);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_json_replaces_file() {
        let dir = env::temp_dir().join("taxi_emissions_test_output_replace");
        let path = dir.join("value.json");

        write_json(&path, &vec![1, 2, 3]).unwrap();
        write_json(&path, &vec![4]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().replace(char::is_whitespace, ""), "[4]");
        fs::remove_dir_all(&dir).unwrap();
    }
}
