//! On-disk artifact store.
//!
//! Every artifact is a CSV file addressed by an [`ArtifactKey`]:
//! `<root>/<stage>/cab_type=<cab|all>/year=<yyyy|all>.csv`. Raw partitions may
//! also be gzip-compressed (`.csv.gz`).

use flate2::read::GzDecoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::consolidate::ViewScope;
use crate::error::{PipelineError, Result};
use crate::schema::{CLEAN_COLUMNS, Column, ENRICHED_COLUMNS, RAW_COLUMNS, column_index, verify_headers};
use crate::trip::{CabType, CleanTrip, EnrichedTrip, PartitionKey, RawTrip, timestamp};

/// Pipeline stage that produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Raw,
    Clean,
    Enriched,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Clean => "clean",
            Stage::Enriched => "enriched",
        }
    }

    fn columns(&self) -> &'static [Column] {
        match self {
            Stage::Raw => RAW_COLUMNS,
            Stage::Clean => CLEAN_COLUMNS,
            Stage::Enriched => ENRICHED_COLUMNS,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable name of a stored artifact: one partition, or a consolidated view
/// when `year` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub stage: Stage,
    pub scope: ViewScope,
    pub year: Option<i32>,
}

impl ArtifactKey {
    pub fn partition(stage: Stage, key: PartitionKey) -> Self {
        Self {
            stage,
            scope: ViewScope::Cab(key.cab),
            year: Some(key.year),
        }
    }

    pub fn view(stage: Stage, scope: ViewScope) -> Self {
        Self {
            stage,
            scope,
            year: None,
        }
    }

    fn relative_path(&self) -> PathBuf {
        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "all".to_string());
        PathBuf::from(self.stage.as_str())
            .join(format!("cab_type={}", self.scope))
            .join(format!("year={year}.csv"))
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(y) => write!(f, "{}:{}/{}", self.stage, self.scope, y),
            None => write!(f, "{}:{}/all", self.stage, self.scope),
        }
    }
}

/// Reads and writes artifacts below a root directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// The file backing `key`, if it exists. Raw artifacts fall back to a
    /// gzip-compressed sibling.
    pub fn locate(&self, key: &ArtifactKey) -> Option<PathBuf> {
        let plain = self.path(key);
        if plain.is_file() {
            return Some(plain);
        }
        if key.stage == Stage::Raw {
            let gz = plain.with_extension("csv.gz");
            if gz.is_file() {
                return Some(gz);
            }
        }
        None
    }

    fn open(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let reader: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(csv::Reader::from_reader(reader))
    }

    /// Reads a typed artifact, checking its header first. `Ok(None)` when it
    /// does not exist.
    pub fn read<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<Vec<T>>> {
        let Some(path) = self.locate(key) else {
            return Ok(None);
        };
        let artifact = key.to_string();
        let mut rdr = Self::open(&path)?;
        let headers = rdr.headers()?.clone();
        verify_headers(&artifact, &headers, key.stage.columns())?;
        // Field names are matched exactly when deserializing.
        rdr.set_headers(headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect());

        let mut rows = Vec::new();
        for (i, result) in rdr.deserialize().enumerate() {
            let row: T = result.map_err(|e| PipelineError::InvalidRecord {
                artifact: artifact.clone(),
                row: i as u64 + 1,
                message: e.to_string(),
            })?;
            rows.push(row);
        }

        debug!(artifact = %artifact, path = %path.display(), rows = rows.len(), "Artifact read");
        Ok(Some(rows))
    }

    pub fn read_clean(&self, key: PartitionKey) -> Result<Option<Vec<CleanTrip>>> {
        self.read(&ArtifactKey::partition(Stage::Clean, key))
    }

    pub fn read_enriched(&self, key: PartitionKey) -> Result<Option<Vec<EnrichedTrip>>> {
        self.read(&ArtifactKey::partition(Stage::Enriched, key))
    }

    /// Reads a raw partition, accepting the source's own column names. A
    /// missing or empty `cab_type` is taken from the partition key.
    pub fn read_raw(&self, key: PartitionKey) -> Result<Option<Vec<RawTrip>>> {
        let akey = ArtifactKey::partition(Stage::Raw, key);
        let Some(path) = self.locate(&akey) else {
            return Ok(None);
        };
        let artifact = akey.to_string();
        let mut rdr = Self::open(&path)?;
        let headers = rdr.headers()?.clone();
        verify_headers(&artifact, &headers, RAW_COLUMNS)?;

        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| column_index(&headers, n))
                .unwrap_or_default()
        };
        let cols = RawColumns {
            cab_type: column_index(&headers, "cab_type"),
            vendor_id: find(RAW_COLUMNS[0]),
            pickup: find(RAW_COLUMNS[1]),
            dropoff: find(RAW_COLUMNS[2]),
            passenger_count: find(RAW_COLUMNS[3]),
            trip_distance: find(RAW_COLUMNS[4]),
        };

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let trip = cols.parse(&record, key.cab).map_err(|message| PipelineError::InvalidRecord {
                artifact: artifact.clone(),
                row: i as u64 + 1,
                message,
            })?;
            rows.push(trip);
        }

        debug!(artifact = %artifact, path = %path.display(), rows = rows.len(), "Raw partition read");
        Ok(Some(rows))
    }

    /// Replaces the artifact at `key` with `rows`.
    ///
    /// The header is always written, so an empty artifact is still readable.
    /// Rows go to a temporary sibling that is renamed over the target.
    pub fn write<'a, T, I>(&self, key: &ArtifactKey, rows: I) -> Result<PathBuf>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let path = self.path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        }
        let tmp = path.with_extension("csv.tmp");

        let written = Self::write_rows(&tmp, key, rows).and_then(|count| {
            fs::rename(&tmp, &path).map_err(|e| PipelineError::io(&path, e))?;
            Ok(count)
        });
        let count = match written {
            Ok(count) => count,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        debug!(artifact = %key, path = %path.display(), rows = count, "Artifact written");
        Ok(path)
    }

    fn write_rows<'a, T: Serialize + 'a>(
        tmp: &Path,
        key: &ArtifactKey,
        rows: impl IntoIterator<Item = &'a T>,
    ) -> Result<usize> {
        let file = File::create(tmp).map_err(|e| PipelineError::io(tmp, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(key.stage.columns().iter().map(|names| names[0]))?;
        let mut count = 0;
        for row in rows {
            writer.serialize(row)?;
            count += 1;
        }
        writer.flush().map_err(|e| PipelineError::io(tmp, e))?;
        Ok(count)
    }

    /// Deletes the artifact at `key` if present.
    pub fn remove(&self, key: &ArtifactKey) -> Result<()> {
        let path = self.path(key);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| PipelineError::io(&path, e))?;
            debug!(artifact = %key, "Artifact removed");
        }
        Ok(())
    }
}

struct RawColumns {
    cab_type: Option<usize>,
    vendor_id: usize,
    pickup: usize,
    dropoff: usize,
    passenger_count: usize,
    trip_distance: usize,
}

impl RawColumns {
    fn parse(&self, record: &csv::StringRecord, partition_cab: CabType) -> std::result::Result<RawTrip, String> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let cab_type = match self.cab_type.map(field).filter(|s| !s.is_empty()) {
            Some(s) => {
                let cab: CabType = s.parse()?;
                if cab != partition_cab {
                    return Err(format!("cab_type '{cab}' in a {partition_cab} partition"));
                }
                cab
            }
            None => partition_cab,
        };

        let pickup_raw = field(self.pickup);
        let dropoff_raw = field(self.dropoff);
        let distance_raw = field(self.trip_distance);

        Ok(RawTrip {
            cab_type,
            vendor_id: parse_count(field(self.vendor_id), "vendor_id")?,
            pickup_datetime: timestamp::parse(pickup_raw)
                .ok_or_else(|| format!("invalid pickup_datetime '{pickup_raw}'"))?,
            dropoff_datetime: timestamp::parse(dropoff_raw)
                .ok_or_else(|| format!("invalid dropoff_datetime '{dropoff_raw}'"))?,
            passenger_count: parse_count(field(self.passenger_count), "passenger_count")?,
            trip_distance: distance_raw
                .parse::<f64>()
                .map_err(|_| format!("invalid trip_distance '{distance_raw}'"))?,
        })
    }
}

/// Parses an optional non-negative integer. Integral floats such as `"1.0"`
/// are accepted; empty text is null.
fn parse_count<T: TryFrom<i64>>(s: &str, column: &str) -> std::result::Result<Option<T>, String> {
    if s.is_empty() {
        return Ok(None);
    }
    let value = s
        .parse::<i64>()
        .ok()
        .or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
        .filter(|v| *v >= 0)
        .ok_or_else(|| format!("invalid {column} '{s}'"))?;
    T::try_from(value)
        .map(Some)
        .map_err(|_| format!("{column} '{s}' out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::fixtures::{clean_at, ts};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::io::Write;

    fn temp_store(name: &str) -> Store {
        let root = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&root); // clean up any prior run
        Store::new(root)
    }

    fn write_raw(store: &Store, key: PartitionKey, body: &str) -> PathBuf {
        let path = store.path(&ArtifactKey::partition(Stage::Raw, key));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_artifact_paths() {
        let store = Store::new("/data");
        let key = PartitionKey::new(CabType::Green, 2019);

        assert_eq!(
            store.path(&ArtifactKey::partition(Stage::Clean, key)),
            PathBuf::from("/data/clean/cab_type=green/year=2019.csv")
        );
        assert_eq!(
            store.path(&ArtifactKey::view(Stage::Enriched, ViewScope::AllCabs)),
            PathBuf::from("/data/enriched/cab_type=all/year=all.csv")
        );
        assert_eq!(
            ArtifactKey::view(Stage::Clean, ViewScope::Cab(CabType::Yellow)).to_string(),
            "clean:yellow/all"
        );
    }

    #[test]
    fn test_missing_partition_is_none() {
        let store = temp_store("taxi_emissions_test_store_missing");
        let key = PartitionKey::new(CabType::Yellow, 2015);

        assert!(store.read_raw(key).unwrap().is_none());
        assert!(store.read_clean(key).unwrap().is_none());
    }

    #[test]
    fn test_read_raw_with_source_column_names() {
        let store = temp_store("taxi_emissions_test_store_raw_alias");
        let key = PartitionKey::new(CabType::Yellow, 2024);
        write_raw(
            &store,
            key,
            "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,fare_amount\n\
             2,2024-01-01 00:57:55,2024-01-01 01:17:43,1.0,1.72,17.7\n\
             1,2024-01-01T00:03:00,2024-01-01T00:09:36,,1.8,10.0\n",
        );

        let rows = store.read_raw(key).unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cab_type, CabType::Yellow);
        assert_eq!(rows[0].vendor_id, Some(2));
        assert_eq!(rows[0].passenger_count, Some(1));
        assert_eq!(rows[0].duration(), chrono::TimeDelta::seconds(19 * 60 + 48));
        assert_eq!(rows[1].passenger_count, None);
    }

    #[test]
    fn test_read_raw_gzip() {
        let store = temp_store("taxi_emissions_test_store_raw_gz");
        let key = PartitionKey::new(CabType::Green, 2016);
        let plain = store.path(&ArtifactKey::partition(Stage::Raw, key));
        fs::create_dir_all(plain.parent().unwrap()).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(
                b"cab_type,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,trip_distance\n\
                  green,2,2016-05-01 10:00:00,2016-05-01 10:20:00,1,3.5\n",
            )
            .unwrap();
        fs::write(plain.with_extension("csv.gz"), encoder.finish().unwrap()).unwrap();

        let rows = store.read_raw(key).unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trip_distance, 3.5);
    }

    #[test]
    fn test_read_raw_rejects_foreign_cab_rows() {
        let store = temp_store("taxi_emissions_test_store_raw_foreign");
        let key = PartitionKey::new(CabType::Green, 2020);
        write_raw(
            &store,
            key,
            "cab_type,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,trip_distance\n\
             yellow,1,2020-01-01 10:00:00,2020-01-01 10:20:00,1,3.5\n",
        );

        let err = store.read_raw(key).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRecord { row: 1, .. }));
    }

    #[test]
    fn test_read_raw_missing_column_is_schema_error() {
        let store = temp_store("taxi_emissions_test_store_raw_schema");
        let key = PartitionKey::new(CabType::Yellow, 2017);
        write_raw(&store, key, "vendor_id,pickup_datetime,dropoff_datetime,trip_distance\n");

        let err = store.read_raw(key).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing, .. } => {
                assert_eq!(missing, vec!["passenger_count".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_then_read_clean_partition() {
        let store = temp_store("taxi_emissions_test_store_clean");
        let key = PartitionKey::new(CabType::Yellow, 2024);
        let trips = vec![
            clean_at(ts(2024, 2, 29, 23, 45, 0), 4.25),
            clean_at(ts(2024, 3, 1, 0, 5, 0), 0.6),
        ];

        store.write(&ArtifactKey::partition(Stage::Clean, key), &trips).unwrap();
        let back = store.read_clean(key).unwrap().unwrap();

        assert_eq!(back, trips);
    }

    #[test]
    fn test_empty_artifact_keeps_header() {
        let store = temp_store("taxi_emissions_test_store_empty");
        let key = PartitionKey::new(CabType::Green, 2021);
        let akey = ArtifactKey::partition(Stage::Enriched, key);

        let path = store.write(&akey, &Vec::<EnrichedTrip>::new()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cab_type,vendor_id,pickup_datetime"));
        assert!(content.trim_end().ends_with("year_month"));

        let back = store.read_enriched(key).unwrap().unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_enriched_header_names_derived_columns() {
        let store = temp_store("taxi_emissions_test_store_enriched_header");
        let akey = ArtifactKey::partition(Stage::Enriched, PartitionKey::new(CabType::Yellow, 2024));

        let path = store.write(&akey, &Vec::<EnrichedTrip>::new()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let written: Vec<&str> = content.trim_end().split(',').collect();
        let expected: Vec<&str> = ENRICHED_COLUMNS.iter().map(|c| c[0]).collect();

        assert_eq!(written, expected);
        assert_eq!(&written[6..8], &["trip_co2_kg", "avg_speed_mph"]);
    }

    #[test]
    fn test_write_replaces_whole_artifact() {
        let store = temp_store("taxi_emissions_test_store_replace");
        let key = PartitionKey::new(CabType::Yellow, 2022);
        let akey = ArtifactKey::partition(Stage::Clean, key);
        let pickup = ts(2022, 7, 4, 9, 0, 0);

        store
            .write(&akey, &[clean_at(pickup, 1.0), clean_at(pickup, 2.0)])
            .unwrap();
        store.write(&akey, &[clean_at(pickup, 3.0)]).unwrap();

        let back = store.read_clean(key).unwrap().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].trip_distance, 3.0);
    }

    #[test]
    fn test_enriched_artifact_missing_derived_column() {
        let store = temp_store("taxi_emissions_test_store_enriched_schema");
        let key = PartitionKey::new(CabType::Yellow, 2023);
        let path = store.path(&ArtifactKey::partition(Stage::Enriched, key));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "cab_type,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,trip_distance,trip_co2_kg\n",
        )
        .unwrap();

        let err = store.read_enriched(key).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_typed_artifact_headers_ignore_case() {
        let store = temp_store("taxi_emissions_test_store_header_case");
        let key = PartitionKey::new(CabType::Yellow, 2024);
        let path = store.path(&ArtifactKey::partition(Stage::Clean, key));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "Cab_Type,Vendor_ID,Pickup_Datetime,Dropoff_Datetime,Passenger_Count,Trip_Distance\n\
             yellow,2,2024-01-01 00:00:00,2024-01-01 00:10:00,1,2.5\n",
        )
        .unwrap();

        let rows = store.read_clean(key).unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cab_type, CabType::Yellow);
        assert_eq!(rows[0].trip_distance, 2.5);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let store = temp_store("taxi_emissions_test_store_failed_write");
        let akey = ArtifactKey::partition(Stage::Clean, PartitionKey::new(CabType::Green, 2020));
        // Occupy the target with a non-empty directory so the rename fails.
        let target = store.path(&akey);
        fs::create_dir_all(target.join("blocker")).unwrap();

        let err = store.write(&akey, &[clean_at(ts(2020, 1, 1, 0, 0, 0), 1.0)]);

        assert!(matches!(err, Err(PipelineError::IoWithPath { .. })));
        assert!(!target.with_extension("csv.tmp").exists());
        fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_remove_view() {
        let store = temp_store("taxi_emissions_test_store_remove");
        let akey = ArtifactKey::view(Stage::Clean, ViewScope::AllCabs);
        store.write(&akey, &Vec::<CleanTrip>::new()).unwrap();

        store.remove(&akey).unwrap();
        assert!(store.locate(&akey).is_none());
        store.remove(&akey).unwrap();
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count::<u32>("", "x"), Ok(None));
        assert_eq!(parse_count::<u32>("3", "x"), Ok(Some(3)));
        assert_eq!(parse_count::<u32>("2.0", "x"), Ok(Some(2)));
        assert!(parse_count::<u32>("1.5", "x").is_err());
        assert!(parse_count::<u32>("-1", "x").is_err());
        assert!(parse_count::<u32>("abc", "x").is_err());
    }
}
