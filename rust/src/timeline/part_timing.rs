//! Duration of a part, derived from its timeline objects.

use crate::models::Part;

use super::resolver::ResolutionError;

/// Compute the resolved duration of a part.
///
/// The duration is the latest end of any timeline object's enable window,
/// measured from the start of the part. A part without timeline objects has
/// zero duration. Malformed windows are rejected rather than clamped.
pub fn part_timing(part: &Part) -> Result<i64, ResolutionError> {
    let mut duration = 0i64;

    for (index, obj) in part.timeline.iter().enumerate() {
        let enable = obj.enable;
        if enable.duration < 0 {
            return Err(ResolutionError::NegativeDuration {
                part_id: part.id.clone(),
                index,
            });
        }
        if enable.start < 0 {
            return Err(ResolutionError::NegativeStart {
                part_id: part.id.clone(),
                index,
            });
        }
        let end = enable
            .start
            .checked_add(enable.duration)
            .ok_or_else(|| ResolutionError::WindowOverflow {
                part_id: part.id.clone(),
                index,
            })?;
        duration = duration.max(end);
    }

    Ok(duration)
}
