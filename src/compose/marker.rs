use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FRONTMATTER_DELIMITER, NOTE_EXTENSION};
use crate::error::PipelineError;
use crate::model::{Coordinate, MarkerCollision, PhotoRecord};

/// Subfolder of the trip folder holding marker notes.
pub const MARKER_DIR: &str = "markers";

/// Marker file name: the raw coordinate pair at six decimals.
pub fn marker_file_name(raw: Coordinate) -> String {
    format!("{:.6},{:.6}.{NOTE_EXTENSION}", raw.latitude, raw.longitude)
}

/// Render the marker note for a converted photo.
///
/// `location` is what the map plugin reads; `gn` carries the same AMap pair
/// under the provider's own key.
pub fn render_marker(raw: Coordinate, converted: Coordinate, record: &PhotoRecord) -> String {
    format!(
        "{FRONTMATTER_DELIMITER}\n\
         mapmarker: default\n\
         date: {date}\n\
         device: {device}\n\
         gps: [{raw_lat:.6},{raw_long:.6}]\n\
         gn: [{lat:.6},{long:.6}]\n\
         location: [{lat:.6},{long:.6}]\n\
         {FRONTMATTER_DELIMITER}\n\
         ![[{file}]]\n",
        date = record.taken_at,
        device = record.device,
        raw_lat = raw.latitude,
        raw_long = raw.longitude,
        lat = converted.latitude,
        long = converted.longitude,
        file = record.file_name,
    )
}

/// Marker files written in one run, and photos that lost their marker to an
/// earlier photo with the same printed coordinates.
#[derive(Debug, Default)]
pub struct MarkerOutcome {
    pub written: Vec<PathBuf>,
    pub collisions: Vec<MarkerCollision>,
}

/// Write one marker per valid, converted photo under `<trip_dir>/markers`.
///
/// Photos are handled in order; when two map to the same file name the first
/// keeps it and the later one is reported instead of overwriting it.
pub fn write_markers<'a>(
    trip_dir: &Path,
    photos: impl IntoIterator<Item = &'a PhotoRecord>,
) -> Result<MarkerOutcome, PipelineError> {
    let dir = trip_dir.join(MARKER_DIR);
    fs::create_dir_all(&dir).map_err(|e| PipelineError::output(&dir, e))?;

    let mut owners: HashMap<String, &'a str> = HashMap::new();
    let mut outcome = MarkerOutcome::default();

    for record in photos {
        let (Some(raw), Some(converted)) = (record.raw, record.converted) else {
            log::warn!("Skipping marker for {}: no converted coordinate", record.file_name);
            continue;
        };
        let name = marker_file_name(raw);
        let path = dir.join(&name);

        if let Some(kept) = owners.get(&name) {
            log::warn!(
                "Marker {name} already belongs to {kept}; not writing it for {}",
                record.file_name
            );
            outcome.collisions.push(MarkerCollision {
                file_name: record.file_name.clone(),
                marker: path,
                kept: kept.to_string(),
            });
            continue;
        }

        fs::write(&path, render_marker(raw, converted, record))
            .map_err(|e| PipelineError::output(&path, e))?;
        owners.insert(name, record.file_name.as_str());
        outcome.written.push(path);
    }

    log::info!("Wrote {} marker(s) to {}", outcome.written.len(), dir.display());
    Ok(outcome)
}
