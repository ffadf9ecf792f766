//! Per-run data: photo records, the request-scoped accumulator and the final report.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::InvalidReason;

/// A latitude/longitude pair in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Whether a photo takes part in the trip.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoStatus {
    Valid,
    Invalid(InvalidReason),
}

/// One discovered candidate photo.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub raw: Option<Coordinate>,
    /// Set only when `raw` is set and conversion succeeded.
    pub converted: Option<Coordinate>,
    /// `YYYY-MM-DD HH:MM:SS`, empty when unreadable.
    pub taken_at: String,
    pub device: String,
    pub status: PhotoStatus,
}

impl PhotoRecord {
    pub fn invalid(path: PathBuf, file_name: String, reason: InvalidReason) -> Self {
        Self {
            path,
            file_name,
            raw: None,
            converted: None,
            taken_at: String::new(),
            device: String::new(),
            status: PhotoStatus::Invalid(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == PhotoStatus::Valid
    }

    pub(crate) fn mark_invalid(&mut self, reason: InvalidReason) {
        self.converted = None;
        self.status = PhotoStatus::Invalid(reason);
    }
}

/// Accumulator owned by exactly one pipeline run.
///
/// Every discovered photo lives in `photos` with a status, so valid and
/// invalid photos always partition the discovered set.
#[derive(Debug, Default)]
pub struct TripAccumulator {
    pub photos: Vec<PhotoRecord>,
}

impl TripAccumulator {
    pub fn new(photos: Vec<PhotoRecord>) -> Self {
        Self { photos }
    }

    pub fn valid(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.photos.iter().filter(|p| p.is_valid())
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Indices and raw coordinates of valid photos still waiting for conversion.
    pub fn pending_conversion(&self) -> Vec<(usize, Coordinate)> {
        self.photos
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_valid() && p.converted.is_none())
            .filter_map(|(i, p)| p.raw.map(|raw| (i, raw)))
            .collect()
    }

    pub fn converted(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.valid().filter_map(|p| p.converted)
    }

    pub fn invalid_photos(&self) -> Vec<InvalidPhoto> {
        self.photos
            .iter()
            .filter_map(|p| match &p.status {
                PhotoStatus::Invalid(reason) => Some(InvalidPhoto {
                    file_name: p.file_name.clone(),
                    reason: reason.to_string(),
                }),
                PhotoStatus::Valid => None,
            })
            .collect()
    }
}

/// Mean of all converted coordinates; the initial map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CenterPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidPhoto {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveFailure {
    pub file_name: String,
    pub reason: String,
}

/// Two photos mapped to the same marker file. The first one keeps it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerCollision {
    pub file_name: String,
    pub marker: PathBuf,
    pub kept: String,
}

/// Where photos were archived, and whether that was the requested location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArchiveTarget {
    Configured { path: PathBuf },
    Fallback { path: PathBuf, requested: Option<PathBuf> },
}

impl ArchiveTarget {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Configured { path } | Self::Fallback { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedArtifacts {
    pub note: Option<PathBuf>,
    pub markers: Vec<PathBuf>,
    pub archived: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub archive_target: Option<ArchiveTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub valid_count: usize,
    pub center: Option<CenterPoint>,
    pub invalid_photos: Vec<InvalidPhoto>,
    pub archive_failures: Vec<ArchiveFailure>,
    pub marker_collisions: Vec<MarkerCollision>,
    pub artifacts: GeneratedArtifacts,
}

impl RunReport {
    /// File names of photos that could not be placed on the map.
    pub fn invalid_file_names(&self) -> Vec<&str> {
        self.invalid_photos.iter().map(|p| p.file_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(name: &str, raw: Coordinate) -> PhotoRecord {
        PhotoRecord {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            raw: Some(raw),
            converted: None,
            taken_at: String::new(),
            device: String::new(),
            status: PhotoStatus::Valid,
        }
    }

    #[test]
    fn pending_conversion_keeps_record_indices() {
        let acc = TripAccumulator::new(vec![
            valid("a.jpg", Coordinate::new(30.0, 120.0)),
            PhotoRecord::invalid("b.jpg".into(), "b.jpg".into(), InvalidReason::NoLocation),
            valid("c.jpg", Coordinate::new(31.0, 121.0)),
        ]);
        let pending = acc.pending_conversion();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].0, 0);
        assert_eq!(pending[1].0, 2);
    }

    #[test]
    fn mark_invalid_drops_converted_coordinate() {
        let mut record = valid("a.jpg", Coordinate::new(30.0, 120.0));
        record.converted = Some(Coordinate::new(30.1, 120.1));
        record.mark_invalid(InvalidReason::ConversionFailed("timeout".into()));
        assert!(!record.is_valid());
        assert!(record.converted.is_none());
    }

    #[test]
    fn invalid_photos_keep_discovery_order() {
        let acc = TripAccumulator::new(vec![
            PhotoRecord::invalid("z.jpg".into(), "z.jpg".into(), InvalidReason::UnreadableMetadata),
            valid("m.jpg", Coordinate::new(1.0, 1.0)),
            PhotoRecord::invalid("a.jpg".into(), "a.jpg".into(), InvalidReason::NoLocation),
        ]);
        let invalid = acc.invalid_photos();
        assert_eq!(invalid[0].file_name, "z.jpg");
        assert_eq!(invalid[0].reason, "unreadable metadata");
        assert_eq!(invalid[1].reason, "no location data");
        assert_eq!(acc.valid_count(), 1);
    }
}
