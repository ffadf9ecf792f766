//! Optional copy/transcode of the trip's photos, and removal of the originals.

use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;
use crate::model::{ArchiveFailure, ArchiveTarget, PhotoRecord};

/// Subfolder of the trip folder used when no usable archive path is configured.
pub const FALLBACK_DIR: &str = "pictures";

/// Quality at which photos are copied byte for byte.
pub const LOSSLESS_QUALITY: u8 = 100;

/// What to do with the photos after the notes are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    pub enabled: bool,
    /// Preferred archive directory. Falls back to `<trip>/pictures` when
    /// missing or not writable.
    pub path: Option<PathBuf>,
    /// 1–100. 100 copies the file untouched; lower values re-encode.
    pub quality: u8,
    /// Remove originals that were archived successfully.
    pub delete_originals: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            quality: LOSSLESS_QUALITY,
            delete_originals: false,
        }
    }
}

/// One photo that now exists in the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedPhoto {
    pub source: PathBuf,
    pub file_name: String,
    pub archived: PathBuf,
}

#[derive(Debug, Default)]
pub struct ArchiveOutcome {
    pub target: Option<ArchiveTarget>,
    pub archived: Vec<ArchivedPhoto>,
    pub failures: Vec<ArchiveFailure>,
}

/// A directory counts as writable only if a file can be created in it.
fn is_writable_dir(path: &Path) -> bool {
    if !fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false) {
        return false;
    }
    let check_file = path.join(format!(".tripnote-write-check-{}", std::process::id()));
    match fs::OpenOptions::new().write(true).create_new(true).open(&check_file) {
        Ok(file) => {
            drop(file);
            if let Err(e) = fs::remove_file(&check_file) {
                log::warn!("Could not remove {}: {e}", check_file.display());
            }
            true
        }
        Err(e) => {
            log::debug!("{} is not writable: {e}", path.display());
            false
        }
    }
}

/// Pick the archive directory: the requested one if usable, otherwise
/// `<trip_dir>/pictures`, created on demand.
pub fn resolve_target(requested: Option<&Path>, trip_dir: &Path) -> Result<ArchiveTarget, ArchiveError> {
    if let Some(path) = requested.filter(|p| !p.as_os_str().is_empty()) {
        if is_writable_dir(path) {
            log::info!("Archiving photos to {}", path.display());
            return Ok(ArchiveTarget::Configured {
                path: path.to_path_buf(),
            });
        }
        log::warn!(
            "Archive path {} is missing or not writable, falling back to {}",
            path.display(),
            trip_dir.join(FALLBACK_DIR).display()
        );
    }

    let fallback = trip_dir.join(FALLBACK_DIR);
    fs::create_dir_all(&fallback).map_err(ArchiveError::Target)?;
    log::info!("Archiving photos to {}", fallback.display());
    Ok(ArchiveTarget::Fallback {
        path: fallback,
        requested: requested.map(Path::to_path_buf),
    })
}

/// Archive one photo into `target_dir`, keeping its file name.
pub fn archive_photo(
    source: &Path,
    file_name: &str,
    target_dir: &Path,
    quality: u8,
) -> Result<PathBuf, ArchiveError> {
    let dest = target_dir.join(file_name);
    if let (Ok(a), Ok(b)) = (fs::canonicalize(source), fs::canonicalize(&dest)) {
        if a == b {
            return Err(ArchiveError::SameFile);
        }
    }

    if quality >= LOSSLESS_QUALITY {
        fs::copy(source, &dest).map_err(ArchiveError::Copy)?;
        return Ok(dest);
    }

    if let Err(e) = transcode(source, &dest, quality) {
        // Don't leave a half-written file behind.
        let _ = fs::remove_file(&dest);
        return Err(e);
    }
    Ok(dest)
}

fn transcode(source: &Path, dest: &Path, quality: u8) -> Result<(), ArchiveError> {
    let format = ImageFormat::from_path(source)?;
    let img = image::open(source)?;

    match format {
        ImageFormat::Jpeg => {
            let file = File::create(dest).map_err(ArchiveError::Copy)?;
            let mut writer = BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(&img.to_rgb8())?;
            writer.flush().map_err(ArchiveError::Copy)?;
        }
        // Only JPEG takes a quality setting; other formats are re-saved as is.
        other => img.save_with_format(dest, other)?,
    }
    Ok(())
}

/// Archive every valid photo in `photos`. A failure on one photo is recorded
/// and the rest carry on.
pub fn archive_photos(photos: &[PhotoRecord], options: &ArchiveOptions, trip_dir: &Path) -> ArchiveOutcome {
    let mut outcome = ArchiveOutcome::default();
    let valid: Vec<&PhotoRecord> = photos.iter().filter(|p| p.is_valid()).collect();

    let target = match resolve_target(options.path.as_deref(), trip_dir) {
        Ok(target) => target,
        Err(e) => {
            log::warn!("Cannot archive photos: {e}");
            outcome.failures = valid
                .iter()
                .map(|p| ArchiveFailure {
                    file_name: p.file_name.clone(),
                    reason: e.to_string(),
                })
                .collect();
            return outcome;
        }
    };

    // Photos from different subfolders may share a name; the first one keeps it.
    let mut claimed: HashSet<String> = HashSet::new();

    for photo in valid {
        if !claimed.insert(photo.file_name.to_lowercase()) {
            let e = ArchiveError::NameTaken(photo.file_name.clone());
            log::warn!("Not archiving {}: {e}", photo.path.display());
            outcome.failures.push(ArchiveFailure {
                file_name: photo.file_name.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        match archive_photo(&photo.path, &photo.file_name, target.path(), options.quality) {
            Ok(archived) => outcome.archived.push(ArchivedPhoto {
                source: photo.path.clone(),
                file_name: photo.file_name.clone(),
                archived,
            }),
            Err(e) => {
                log::warn!("Failed to archive {}: {e}", photo.file_name);
                outcome.failures.push(ArchiveFailure {
                    file_name: photo.file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Archived {} photo(s), {} failed",
        outcome.archived.len(),
        outcome.failures.len()
    );
    outcome.target = Some(target);
    outcome
}

/// Remove the originals of successfully archived photos.
pub fn delete_originals(archived: &[ArchivedPhoto]) -> (Vec<PathBuf>, Vec<ArchiveFailure>) {
    let mut deleted = Vec::new();
    let mut failures = Vec::new();

    for photo in archived {
        match fs::remove_file(&photo.source) {
            Ok(()) => {
                log::debug!("Deleted original {}", photo.source.display());
                deleted.push(photo.source.clone());
            }
            Err(e) => {
                let e = ArchiveError::Delete(e);
                log::warn!("Failed to delete {}: {e}", photo.source.display());
                failures.push(ArchiveFailure {
                    file_name: photo.file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (deleted, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;
    use crate::model::{Coordinate, PhotoStatus};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn make_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 128]));
        img.save(path).unwrap();
    }

    fn valid(path: PathBuf) -> PhotoRecord {
        PhotoRecord {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            raw: Some(Coordinate::new(30.0, 120.0)),
            converted: Some(Coordinate::new(30.1, 120.1)),
            taken_at: String::new(),
            device: String::new(),
            status: PhotoStatus::Valid,
        }
    }

    #[test]
    fn quality_100_copies_bytes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        make_jpeg(&src, 40, 30);
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let dest = archive_photo(&src, "a.jpg", &out, 100).unwrap();
        assert_eq!(fs::read(&src).unwrap(), fs::read(&dest).unwrap());
    }

    #[test]
    fn lower_quality_reencodes_same_dimensions() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        make_jpeg(&src, 64, 48);
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let dest = archive_photo(&src, "a.jpg", &out, 80).unwrap();
        assert_eq!(image::image_dimensions(&dest).unwrap(), (64, 48));
    }

    #[test]
    fn corrupt_photo_fails_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("bad.jpg");
        fs::write(&src, b"not an image").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        assert!(archive_photo(&src, "bad.jpg", &out, 80).is_err());
        assert!(!out.join("bad.jpg").exists());
    }

    #[test]
    fn archiving_onto_itself_is_refused() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        make_jpeg(&src, 8, 8);
        let before = fs::read(&src).unwrap();

        assert!(matches!(
            archive_photo(&src, "a.jpg", dir.path(), 100),
            Err(ArchiveError::SameFile)
        ));
        assert_eq!(fs::read(&src).unwrap(), before);
    }

    #[test]
    fn configured_target_is_used_when_present() {
        let dir = TempDir::new().unwrap();
        let configured = dir.path().join("archive");
        fs::create_dir(&configured).unwrap();

        let target = resolve_target(Some(&configured), &dir.path().join("trip")).unwrap();
        assert_eq!(target, ArchiveTarget::Configured { path: configured });
    }

    #[test]
    fn missing_target_falls_back_to_pictures() {
        let dir = TempDir::new().unwrap();
        let trip = dir.path().join("trip");
        let missing = dir.path().join("nowhere");

        let target = resolve_target(Some(&missing), &trip).unwrap();
        assert_eq!(
            target,
            ArchiveTarget::Fallback {
                path: trip.join(FALLBACK_DIR),
                requested: Some(missing),
            }
        );
        assert!(trip.join(FALLBACK_DIR).is_dir());
    }

    #[test]
    fn no_configured_target_falls_back() {
        let dir = TempDir::new().unwrap();
        let target = resolve_target(None, dir.path()).unwrap();
        assert!(matches!(target, ArchiveTarget::Fallback { requested: None, .. }));
    }

    #[test]
    fn one_failure_does_not_block_the_rest() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        make_jpeg(&input.join("a.jpg"), 16, 16);
        fs::write(input.join("b.jpg"), b"garbage").unwrap();
        make_jpeg(&input.join("c.jpg"), 16, 16);
        make_jpeg(&input.join("skip.jpg"), 16, 16);

        let mut skipped = valid(input.join("skip.jpg"));
        skipped.mark_invalid(InvalidReason::NoLocation);
        let photos = vec![
            valid(input.join("a.jpg")),
            valid(input.join("b.jpg")),
            valid(input.join("c.jpg")),
            skipped,
        ];
        let options = ArchiveOptions {
            enabled: true,
            quality: 70,
            ..Default::default()
        };

        let outcome = archive_photos(&photos, &options, &dir.path().join("trip"));
        let names: Vec<_> = outcome.archived.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "c.jpg"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].file_name, "b.jpg");
        assert!(!dir.path().join("trip").join(FALLBACK_DIR).join("skip.jpg").exists());
    }

    #[test]
    fn same_name_from_another_folder_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let day1 = dir.path().join("day1");
        let day2 = dir.path().join("day2");
        fs::create_dir(&day1).unwrap();
        fs::create_dir(&day2).unwrap();
        fs::write(day1.join("IMG_0001.jpg"), b"DAY ONE").unwrap();
        fs::write(day2.join("IMG_0001.jpg"), b"DAY TWO").unwrap();

        let photos = vec![valid(day1.join("IMG_0001.jpg")), valid(day2.join("IMG_0001.jpg"))];
        let options = ArchiveOptions {
            enabled: true,
            ..Default::default()
        };
        let trip = dir.path().join("trip");
        let outcome = archive_photos(&photos, &options, &trip);

        assert_eq!(outcome.archived.len(), 1);
        assert_eq!(outcome.archived[0].source, day1.join("IMG_0001.jpg"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].file_name, "IMG_0001.jpg");
        assert_eq!(fs::read(trip.join(FALLBACK_DIR).join("IMG_0001.jpg")).unwrap(), b"DAY ONE");

        // Only the archived source is eligible for deletion.
        let (deleted, _) = delete_originals(&outcome.archived);
        assert_eq!(deleted, vec![day1.join("IMG_0001.jpg")]);
        assert_eq!(fs::read(day2.join("IMG_0001.jpg")).unwrap(), b"DAY TWO");
    }

    #[test]
    fn writable_check_needs_a_real_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        assert!(is_writable_dir(dir.path()));
        assert!(!is_writable_dir(&file));
        assert!(!is_writable_dir(&dir.path().join("missing")));
        // The check leaves nothing behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_as_configured_target_falls_back() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("archive");
        fs::write(&not_a_dir, b"x").unwrap();

        let target = resolve_target(Some(&not_a_dir), &dir.path().join("trip")).unwrap();
        assert!(matches!(target, ArchiveTarget::Fallback { .. }));
    }

    #[test]
    fn delete_only_touches_archived_sources() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("kept.jpg");
        let gone = dir.path().join("gone.jpg");
        fs::write(&kept, b"x").unwrap();
        fs::write(&gone, b"x").unwrap();

        let archived = vec![ArchivedPhoto {
            source: gone.clone(),
            file_name: "gone.jpg".into(),
            archived: dir.path().join("archive").join("gone.jpg"),
        }];
        let (deleted, failures) = delete_originals(&archived);

        assert_eq!(deleted, vec![gone.clone()]);
        assert!(failures.is_empty());
        assert!(!gone.exists());
        assert!(kept.exists());
    }
}
