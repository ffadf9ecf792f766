//! Photo discovery and classification.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{InvalidReason, PipelineError};
use crate::exif::{MetadataReader, TAG_MODEL};
use crate::model::{PhotoRecord, PhotoStatus};

/// Collect every regular file under `dir` whose extension matches `extension`
/// (case-insensitive), sorted by path.
///
/// Any error while walking the tree is fatal: a trip built from half a
/// directory would silently drop photos.
pub fn collect_photos(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let mut photos = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|source| PipelineError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let p = entry.path();
        if entry.file_type().is_file() && has_extension(p, extension) {
            photos.push(p.to_path_buf());
        }
    }

    photos.sort();
    Ok(photos)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Build the record for one photo. Never fails: unusable photos come back
/// with an invalid status.
pub fn classify(path: &Path, reader: &dyn MetadataReader) -> PhotoRecord {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let data = match reader.read(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Unreadable metadata in {}: {e}", path.display());
            return PhotoRecord::invalid(path.to_path_buf(), file_name, InvalidReason::UnreadableMetadata);
        }
    };

    let raw = match data.lat_long() {
        Some(c) if c.latitude == 0.0 && c.longitude == 0.0 => None,
        Some(c) if c.latitude.is_finite() && c.longitude.is_finite() => Some(c),
        _ => None,
    };
    let Some(raw) = raw else {
        log::warn!("No location data in {}", path.display());
        return PhotoRecord::invalid(path.to_path_buf(), file_name, InvalidReason::NoLocation);
    };

    PhotoRecord {
        path: path.to_path_buf(),
        file_name,
        raw: Some(raw),
        converted: None,
        taken_at: data.date_time().unwrap_or_default(),
        device: data
            .tag(TAG_MODEL)
            .map(|m| m.trim().trim_matches('"').trim().to_string())
            .unwrap_or_default(),
        status: PhotoStatus::Valid,
    }
}

/// Walk `dir` and classify every candidate photo, in path order.
pub fn scan(
    dir: &Path,
    extension: &str,
    reader: &dyn MetadataReader,
) -> Result<Vec<PhotoRecord>, PipelineError> {
    let paths = collect_photos(dir, extension)?;
    log::info!("Found {} candidate photo(s) in {}", paths.len(), dir.display());
    Ok(paths.iter().map(|p| classify(p, reader)).collect())
}
