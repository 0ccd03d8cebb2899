use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::data::timeseries::TimeSeriesCollection;

/// Read a JSON-encoded collection and check every series before handing it on.
pub fn load_collection(path: &Path) -> Result<TimeSeriesCollection> {
    let file = File::open(path).context(format!("Failed to open data file: {:?}", path))?;
    let reader = BufReader::new(file);
    let collection: TimeSeriesCollection = serde_json::from_reader(reader)
        .context(format!("Failed to deserialize data file: {:?}", path))?;
    collection
        .validate()
        .with_context(|| format!("Invalid series in {:?}", path))?;
    log::info!(
        "Loaded {} series from {}",
        collection.series_data.len(),
        path.display()
    );
    Ok(collection)
}

pub fn save_collection(collection: &TimeSeriesCollection, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    let file = File::create(path).context(format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, collection)
        .context(format!("Failed to serialize data to: {}", path.display()))
}
