use chrono::{DateTime, NaiveDateTime};
use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, LatLng, MediaParser, MediaSource};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ExifError;
use crate::model::Coordinate;

pub const TAG_MAKE: &str = "Make";
pub const TAG_MODEL: &str = "Model";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metadata decoded from one photo.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    /// Capture time as stored in the file, not yet normalized.
    pub date_time: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl ExifData {
    /// GPS position, if both halves are present.
    pub fn lat_long(&self) -> Option<Coordinate> {
        match (self.gps_latitude, self.gps_longitude) {
            (Some(lat), Some(long)) => Some(Coordinate::new(lat, long)),
            _ => None,
        }
    }

    /// Capture time as `YYYY-MM-DD HH:MM:SS`.
    pub fn date_time(&self) -> Option<String> {
        self.date_time.as_deref().and_then(normalize_timestamp)
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Source of per-photo metadata.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ExifData, ExifError>;
}

/// Reads EXIF with `nom-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NomExifReader;

impl MetadataReader for NomExifReader {
    fn read(&self, path: &Path) -> Result<ExifData, ExifError> {
        read_exif(path)
    }
}

/// Read GPS, capture time and device tags from an image file.
pub fn read_exif(path: &Path) -> Result<ExifData, ExifError> {
    std::fs::metadata(path).map_err(ExifError::Open)?;

    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).map_err(|e| ExifError::Parse(e.to_string()))?;

    let iter: ExifIter = parser.parse(ms).map_err(|e| {
        log::debug!("No EXIF data found in {}: {e}", path.display());
        ExifError::Parse(e.to_string())
    })?;

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let mut data = ExifData::default();

    if let Some(gps) = gps_info {
        data.gps_latitude = latlng_to_decimal(&gps.latitude, gps.latitude_ref);
        data.gps_longitude = latlng_to_decimal(&gps.longitude, gps.longitude_ref);
    }

    data.date_time = exif
        .get(ExifTag::DateTimeOriginal)
        .or_else(|| exif.get(ExifTag::ModifyDate))
        .and_then(entry_to_string);

    for (name, tag) in [(TAG_MAKE, ExifTag::Make), (TAG_MODEL, ExifTag::Model)] {
        if let Some(value) = exif.get(tag).and_then(entry_to_string) {
            data.tags.insert(name.to_string(), value);
        }
    }

    Ok(data)
}

/// Bring the timestamp shapes EXIF libraries hand out to `YYYY-MM-DD HH:MM:SS`.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"');
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().format(TIMESTAMP_FORMAT).to_string());
    }
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> Option<f64> {
    let part = |num: u32, den: u32| if den == 0 { None } else { Some(num as f64 / den as f64) };
    let degrees = part(latlng.0.0, latlng.0.1)?;
    let minutes = part(latlng.1.0, latlng.1.1)?;
    let seconds = part(latlng.2.0, latlng.2.1)?;

    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;

    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }

    Some(coord)
}
