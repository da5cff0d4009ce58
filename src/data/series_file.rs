use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result, ensure};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::CandleSeries;

pub const SERIES_FILE_VERSION: f64 = 1.0;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct SeriesCollection {
    pub name: String, // e.g. "Binance spot snapshot"
    pub series_data: Vec<CandleSeries>,
}

impl SeriesCollection {
    pub fn unique_pair_names(&self) -> Vec<String> {
        self.series_data
            .iter()
            .map(|s| s.pair_interval.name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every series at `interval_ms`, in file order.
    pub fn at_interval(&self, interval_ms: i64) -> Vec<CandleSeries> {
        self.series_data
            .iter()
            .filter(|s| s.pair_interval.interval_ms == interval_ms)
            .cloned()
            .collect()
    }
}

/// On-disk wrapper. `.json` files are JSON, anything else is bincode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeriesFile {
    pub version: f64,
    pub timestamp_ms: i64,
    pub data: SeriesCollection,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl SeriesFile {
    pub fn new(data: SeriesCollection) -> Self {
        Self {
            version: SERIES_FILE_VERSION,
            timestamp_ms: Utc::now().timestamp_millis(),
            data,
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).context(format!("Failed to open series file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let loaded: SeriesFile = if is_json(path) {
            serde_json::from_reader(reader)
                .context(format!("Failed to parse JSON series file: {}", path.display()))?
        } else {
            bincode::deserialize_from(reader)
                .context(format!("Failed to deserialize series file: {}", path.display()))?
        };
        ensure!(
            loaded.version <= SERIES_FILE_VERSION,
            "{}: series file version {} is newer than supported {}",
            path.display(),
            loaded.version,
            SERIES_FILE_VERSION
        );

        #[cfg(debug_assertions)]
        if crate::config::debug::PRINT_CONFIG_SERDE {
            log::info!(
                "Loaded {} series ({}) from {}",
                loaded.data.series_data.len(),
                loaded.data.name,
                path.display()
            );
        }

        Ok(loaded)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = File::create(path).context(format!("Failed to create file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        if is_json(path) {
            serde_json::to_writer(writer, self)
                .context(format!("Failed to write JSON series file: {}", path.display()))
        } else {
            bincode::serialize_into(writer, self)
                .context(format!("Failed to serialize series file to: {}", path.display()))
        }
    }
}
