use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};
use crate::trip::{CabType, PartitionKey};

pub const DEFAULT_YEARS: RangeInclusive<i32> = 2015..=2024;
pub const EMISSION_FACTORS_FILE: &str = "vehicle_emissions.csv";

/// Where the pipeline reads and writes, and which partitions it covers.
///
/// Environment variables (a `.env` file is honoured by the binary):
///
/// | Variable          | Default          |
/// |-------------------|------------------|
/// | `TAXI_DATA_DIR`   | `data`           |
/// | `TAXI_OUTPUT_DIR` | `outputs`        |
/// | `TAXI_YEARS`      | `2015-2024`      |
/// | `TAXI_CABS`       | `yellow,green`   |
/// | `TAXI_EMISSIONS`  | `<data>/vehicle_emissions.csv` |
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub years: RangeInclusive<i32>,
    pub cabs: Vec<CabType>,
    pub emission_factors: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            emission_factors: data_dir.join(EMISSION_FACTORS_FILE),
            data_dir,
            output_dir: PathBuf::from("outputs"),
            years: DEFAULT_YEARS,
            cabs: CabType::ALL.to_vec(),
        }
    }

    /// Builds a config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("TAXI_DATA_DIR") {
            Some(dir) => Self::with_data_dir(dir),
            None => Self::default(),
        };
        if let Some(dir) = lookup("TAXI_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(years) = lookup("TAXI_YEARS") {
            config.years = parse_years(&years)?;
        }
        if let Some(cabs) = lookup("TAXI_CABS") {
            config.cabs = parse_cabs(&cabs)?;
        }
        if let Some(path) = lookup("TAXI_EMISSIONS") {
            config.emission_factors = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Every configured partition, grouped by cab then ordered by year.
    pub fn partitions(&self) -> Vec<PartitionKey> {
        let mut cabs = self.cabs.clone();
        cabs.sort();
        cabs.dedup();
        cabs.into_iter()
            .flat_map(|cab| self.years.clone().map(move |year| PartitionKey::new(cab, year)))
            .collect()
    }
}

/// Parses `2015-2024` or a single year `2024`.
pub fn parse_years(s: &str) -> Result<RangeInclusive<i32>> {
    let bad = || PipelineError::InvalidConfig(format!("invalid year range '{s}'"));
    let (start, end) = match s.trim().split_once('-') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (s.trim(), s.trim()),
    };
    let start: i32 = start.parse().map_err(|_| bad())?;
    let end: i32 = end.parse().map_err(|_| bad())?;
    if start > end {
        return Err(bad());
    }
    Ok(start..=end)
}

/// Parses a comma-separated cab list such as `yellow,green`.
pub fn parse_cabs(s: &str) -> Result<Vec<CabType>> {
    let cabs = s
        .split(',')
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.parse::<CabType>().map_err(PipelineError::InvalidConfig))
        .collect::<Result<Vec<_>>>()?;
    if cabs.is_empty() {
        return Err(PipelineError::InvalidConfig("no cab types configured".into()));
    }
    Ok(cabs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.years, 2015..=2024);
        assert_eq!(config.cabs, vec![CabType::Yellow, CabType::Green]);
        assert_eq!(
            config.emission_factors,
            PathBuf::from("data/vehicle_emissions.csv")
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TAXI_DATA_DIR", "/srv/taxi"),
            ("TAXI_YEARS", "2019-2020"),
            ("TAXI_CABS", "green"),
        ]);
        let config =
            PipelineConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/taxi"));
        assert_eq!(
            config.emission_factors,
            PathBuf::from("/srv/taxi/vehicle_emissions.csv")
        );
        assert_eq!(
            config.partitions(),
            vec![
                PartitionKey::new(CabType::Green, 2019),
                PartitionKey::new(CabType::Green, 2020),
            ]
        );
    }

    #[test]
    fn test_parse_years() {
        assert_eq!(parse_years("2024").unwrap(), 2024..=2024);
        assert_eq!(parse_years(" 2015 - 2017 ").unwrap(), 2015..=2017);
        assert!(parse_years("2020-2019").is_err());
        assert!(parse_years("twenty").is_err());
    }

    #[test]
    fn test_parse_cabs() {
        assert_eq!(
            parse_cabs("green, yellow").unwrap(),
            vec![CabType::Green, CabType::Yellow]
        );
        assert!(parse_cabs("").is_err());
        assert!(parse_cabs("yellow,fhv").is_err());
    }

    #[test]
    fn test_partitions_are_cab_major() {
        let mut config = PipelineConfig::default();
        config.years = 2023..=2024;
        config.cabs = vec![CabType::Green, CabType::Yellow, CabType::Green];

        assert_eq!(
            config.partitions(),
            vec![
                PartitionKey::new(CabType::Yellow, 2023),
                PartitionKey::new(CabType::Yellow, 2024),
                PartitionKey::new(CabType::Green, 2023),
                PartitionKey::new(CabType::Green, 2024),
            ]
        );
    }
}
