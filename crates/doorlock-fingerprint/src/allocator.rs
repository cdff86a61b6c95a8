//! Template position allocation.

use crate::correlator::{CommandCorrelator, CorrelatorError};
use doorlock_bus::MessageBus;
use doorlock_core::FingerprintId;
use doorlock_core::constants::DEFAULT_MAX_FINGERPRINT_POSITION;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Errors from position allocation and enrollment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// The sensor did not report its enrolled positions.
    #[error("Enrolled positions unavailable: {0}")]
    ListUnavailable(#[source] CorrelatorError),

    /// Every position in `1..=max` is taken.
    #[error("No free fingerprint position (1..={max} all enrolled)")]
    Exhausted { max: u32 },

    /// A free position was found but enrolling it failed.
    #[error("Enrollment failed: {0}")]
    Enroll(#[source] CorrelatorError),
}

/// Smallest position in `1..=max` that is not in `enrolled`.
///
/// # Examples
///
/// ```
/// use doorlock_core::FingerprintId;
/// use doorlock_fingerprint::smallest_free_position;
/// use std::collections::BTreeSet;
///
/// let enrolled: BTreeSet<_> = [2, 3, 5].into_iter().map(FingerprintId::new).collect();
/// assert_eq!(smallest_free_position(&enrolled, 127), Some(FingerprintId::new(1)));
/// ```
pub fn smallest_free_position(enrolled: &BTreeSet<FingerprintId>, max: u32) -> Option<FingerprintId> {
    (1..=max)
        .map(FingerprintId::new)
        .find(|position| !enrolled.contains(position))
}

/// Picks free template positions using the sensor's own list.
#[derive(Debug, Clone)]
pub struct PositionAllocator<B> {
    correlator: CommandCorrelator<B>,
    max_position: u32,
}

impl<B: MessageBus> PositionAllocator<B> {
    pub fn new(correlator: CommandCorrelator<B>) -> Self {
        Self::with_max_position(correlator, DEFAULT_MAX_FINGERPRINT_POSITION)
    }

    pub fn with_max_position(correlator: CommandCorrelator<B>, max_position: u32) -> Self {
        Self {
            correlator,
            max_position,
        }
    }

    pub fn max_position(&self) -> u32 {
        self.max_position
    }

    /// Query the sensor and return the smallest free position.
    ///
    /// # Errors
    ///
    /// `ListUnavailable` if the list request fails or times out, `Exhausted`
    /// if the sensor is full.
    pub async fn allocate(&self) -> Result<FingerprintId, AllocationError> {
        let enrolled = self.correlator.send_list().await.map_err(|e| {
            warn!("Cannot allocate position: {}", e);
            AllocationError::ListUnavailable(e)
        })?;

        smallest_free_position(&enrolled, self.max_position).ok_or_else(|| {
            warn!(max = self.max_position, "Fingerprint storage full");
            AllocationError::Exhausted {
                max: self.max_position,
            }
        })
    }

    /// Allocate a position and enroll a new template there.
    pub async fn enroll_next(&self) -> Result<FingerprintId, AllocationError> {
        let position = self.allocate().await?;
        info!(%position, "Starting enrollment");

        self.correlator
            .send_enroll(position)
            .await
            .map_err(AllocationError::Enroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set(values: &[u32]) -> BTreeSet<FingerprintId> {
        values.iter().copied().map(FingerprintId::new).collect()
    }

    #[rstest]
    #[case(&[], 127, Some(1))]
    #[case(&[2, 3, 5], 127, Some(1))]
    #[case(&[1, 2, 3], 127, Some(4))]
    #[case(&[1, 3], 127, Some(2))]
    #[case(&[1, 2], 2, None)]
    #[case(&[200], 127, Some(1))]
    #[case(&[], 0, None)]
    fn test_smallest_free_position(
        #[case] enrolled: &[u32],
        #[case] max: u32,
        #[case] expected: Option<u32>,
    ) {
        assert_eq!(
            smallest_free_position(&set(enrolled), max),
            expected.map(FingerprintId::new)
        );
    }

    #[test]
    fn test_full_range_is_exhausted() {
        let full: BTreeSet<_> = (1..=127).map(FingerprintId::new).collect();
        assert_eq!(smallest_free_position(&full, 127), None);
    }

    #[test]
    fn test_exhausted_display() {
        assert_eq!(
            AllocationError::Exhausted { max: 127 }.to_string(),
            "No free fingerprint position (1..=127 all enrolled)"
        );
    }
}
