use crate::error::PipelineError;
use crate::model::{CenterPoint, Coordinate};

/// Arithmetic mean of `coords`. An empty input has no center.
pub fn compute_center(coords: impl IntoIterator<Item = Coordinate>) -> Result<CenterPoint, PipelineError> {
    let (count, lat_sum, long_sum) = coords
        .into_iter()
        .fold((0usize, 0.0f64, 0.0f64), |(n, lat, long), c| {
            (n + 1, lat + c.latitude, long + c.longitude)
        });

    if count == 0 {
        return Err(PipelineError::NoValidPhotos);
    }

    Ok(CenterPoint {
        latitude: lat_sum / count as f64,
        longitude: long_sum / count as f64,
    })
}
