//! Append-only CSV history of measured iterations.
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::ProbeError;
use super::record::IterationRecord;

pub const STORE_HEADER: [&str; 10] = [
    "Speed Test Server",
    "Speed Test IP Server",
    "Country",
    "Download Speed (Mbps)",
    "Upload Speed (Mbps)",
    "Ping (ms)",
    "Server ISP",
    "User ISP",
    "Connection Method",
    "Test Duration (s)",
];

/// One persisted row. Route hops are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    #[serde(rename = "Speed Test Server")]
    pub server: String,
    #[serde(rename = "Speed Test IP Server")]
    pub server_host: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Download Speed (Mbps)")]
    pub download_mbps: f64,
    #[serde(rename = "Upload Speed (Mbps)")]
    pub upload_mbps: f64,
    #[serde(rename = "Ping (ms)")]
    pub latency_ms: f64,
    #[serde(rename = "Server ISP")]
    pub server_isp: String,
    #[serde(rename = "User ISP")]
    pub user_isp: String,
    #[serde(rename = "Connection Method")]
    pub connection_method: String,
    #[serde(rename = "Test Duration (s)")]
    pub duration_secs: f64,
}

impl From<&IterationRecord> for StoreRow {
    fn from(record: &IterationRecord) -> Self {
        Self {
            server: record.server_name.clone(),
            server_host: record.server_host.clone(),
            country: record.country.clone(),
            download_mbps: record.download_mbps,
            upload_mbps: record.upload_mbps,
            latency_ms: record.latency_ms,
            server_isp: record.server_isp.clone(),
            user_isp: record.user_isp.to_string(),
            connection_method: record.connection_method.to_string(),
            duration_secs: record.duration_secs,
        }
    }
}

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row per record, writing the header first when the store is new or empty.
    /// Returns the number of rows written.
    pub fn append(&self, records: &[IterationRecord]) -> Result<usize, ProbeError> {
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            debug!(path = ?self.path, "Writing store header.");
            writer.write_record(STORE_HEADER)?;
        }
        for record in records {
            writer.serialize(StoreRow::from(record))?;
        }
        writer.flush()?;

        info!(path = ?self.path, rows = records.len(), "Appended results to store.");
        Ok(records.len())
    }

    /// Reads every stored row, across all previous runs.
    pub fn load(&self) -> Result<Vec<StoreRow>, ProbeError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<StoreRow>, csv::Error>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe_modules::record::{ConnectionMethod, RouteTrace, UserIsp};

    fn record(download_mbps: f64) -> IterationRecord {
        IterationRecord {
            server_name: "Zurich".to_string(),
            server_host: "speed.example.ch".to_string(),
            country: "Switzerland".to_string(),
            download_mbps,
            upload_mbps: 18.123456789,
            latency_ms: 9.871,
            server_isp: "Example, Inc.".to_string(),
            user_isp: UserIsp::Unknown,
            connection_method: ConnectionMethod::Ethernet,
            duration_secs: 27.000123,
            route: RouteTrace::Hops(vec![" 1  gateway".to_string()]),
        }
    }

    fn header_count(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|line| line.starts_with("Speed Test Server,"))
            .count()
    }

    #[test]
    fn test_new_store_gets_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("speedtestdata.csv"));

        assert_eq!(store.append(&[record(50.0), record(51.0)]).unwrap(), 2);
        assert_eq!(store.append(&[record(52.0)]).unwrap(), 1);

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with(
            "Speed Test Server,Speed Test IP Server,Country,Download Speed (Mbps),\
             Upload Speed (Mbps),Ping (ms),Server ISP,User ISP,Connection Method,Test Duration (s)\n"
        ));
        assert_eq!(header_count(store.path()), 1);
        assert_eq!(content.lines().count(), 4);
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[test]
    fn test_empty_run_still_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("speedtestdata.csv"));

        assert_eq!(store.append(&[]).unwrap(), 0);
        assert_eq!(header_count(store.path()), 1);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_existing_rows_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speedtestdata.csv");
        let existing = format!(
            "{}\nOld,old.example,Nowhere,1.5,0.5,120.0,Old ISP,Unknown ISP,Wi-Fi,40.2\n",
            STORE_HEADER.join(",")
        );
        fs::write(&path, &existing).unwrap();
        let store = CsvStore::new(&path);

        store.append(&[record(75.0)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&existing));
        assert_eq!(header_count(&path), 1);
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].server, "Old");
        assert_eq!(rows[1].server, "Zurich");
    }

    #[test]
    fn test_numeric_fields_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("speedtestdata.csv"));
        let original = record(93.456789012345);

        store.append(std::slice::from_ref(&original)).unwrap();
        let rows = store.load().unwrap();

        assert_eq!(rows, vec![StoreRow::from(&original)]);
        assert_eq!(rows[0].download_mbps, original.download_mbps);
        assert_eq!(rows[0].upload_mbps, original.upload_mbps);
        assert_eq!(rows[0].latency_ms, original.latency_ms);
        assert_eq!(rows[0].duration_secs, original.duration_secs);
        assert_eq!(rows[0].server_isp, "Example, Inc.");
        assert_eq!(rows[0].user_isp, "Unknown ISP");
    }
}
