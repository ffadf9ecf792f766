//! Raw GPS → map provider coordinate conversion.
//!
//! [`CoordinateService`] is one conversion backend; [`AmapService`] talks to the
//! AMap (Gaode) REST API. [`convert_all`] fans conversions out over a bounded
//! pool and writes each result back to the record it came from.

mod amap;

pub use amap::{AmapService, DEFAULT_ENDPOINT, parse_locations};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{ConvertError, InvalidReason};
use crate::model::{Coordinate, TripAccumulator};

/// Raised by the caller to stop issuing new conversion requests.
pub type CancellationToken = Arc<AtomicBool>;

/// Checks if the cancellation token has been triggered.
#[inline]
pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(Ordering::SeqCst)
}

/// A coordinate conversion backend.
///
/// # Example
///
/// ```rust,no_run
/// use tripnote::geocode::{AmapService, CoordinateService};
/// use tripnote::model::Coordinate;
///
/// # async fn example() -> Result<(), tripnote::error::ConvertError> {
/// let service = AmapService::new("your-amap-key".into());
/// let converted = service.convert(Coordinate::new(30.2741, 120.1551)).await?;
/// println!("{converted:?}");
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait CoordinateService: Send + Sync {
    /// The display name of this service (e.g., "AMap").
    fn name(&self) -> &str;
    /// Convert one satellite (WGS-84) coordinate into the provider's system.
    async fn convert(&self, raw: Coordinate) -> Result<Coordinate, ConvertError>;
}

/// Counts from one [`convert_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Convert every valid, not yet converted photo in `acc`.
///
/// At most `concurrency` requests are in flight. Each task carries the index of
/// its record, so results land in their own slot regardless of completion
/// order. A failed conversion marks only that photo invalid.
///
/// When `cancel` is raised no new requests are issued; requests already in
/// flight are awaited and photos never sent stay unconverted.
pub async fn convert_all(
    acc: &mut TripAccumulator,
    service: Arc<dyn CoordinateService>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> ConversionSummary {
    let pending = acc.pending_conversion();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut slots: Vec<Option<Result<Coordinate, ConvertError>>> =
        (0..acc.photos.len()).map(|_| None).collect();
    let mut tasks = JoinSet::new();
    let mut summary = ConversionSummary::default();

    log::info!(
        "Converting {} coordinate(s) via {} ({} at a time)",
        pending.len(),
        service.name(),
        concurrency.max(1)
    );

    for &(index, raw) in &pending {
        if is_cancelled(cancel) {
            summary.cancelled = true;
            break;
        }
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        // Cancellation may have been raised while waiting for a free slot.
        if is_cancelled(cancel) {
            summary.cancelled = true;
            break;
        }
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            let result = service.convert(raw).await;
            drop(permit);
            (index, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => log::warn!("Conversion task failed: {e}"),
        }
    }

    for &(index, _) in &pending {
        let record = &mut acc.photos[index];
        match slots[index].take() {
            Some(Ok(converted)) => {
                record.converted = Some(converted);
                summary.converted += 1;
            }
            Some(Err(e)) => {
                log::warn!("Coordinate conversion failed for {}: {e}", record.file_name);
                record.mark_invalid(InvalidReason::ConversionFailed(e.to_string()));
                summary.failed += 1;
            }
            None if summary.cancelled => {}
            None => {
                record.mark_invalid(InvalidReason::ConversionFailed(ConvertError::Aborted.to_string()));
                summary.failed += 1;
            }
        }
    }

    summary
}
