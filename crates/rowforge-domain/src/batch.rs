//! Batch partitioning
//!
//! A dataset of `N` rows with batch size `B` is split into `ceil(N / B)`
//! contiguous batches. Batch `i` covers rows `[i * B, min((i + 1) * B, N))`.

use crate::error::DomainError;
use std::ops::Range;

/// Deterministic partition of a table into fixed-size batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    total_rows: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Create a plan; the batch size must be positive
    pub fn new(total_rows: usize, batch_size: usize) -> Result<Self, DomainError> {
        if batch_size == 0 {
            return Err(DomainError::InvalidBatchSize);
        }
        Ok(Self {
            total_rows,
            batch_size,
        })
    }

    /// Total rows covered by the plan
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Rows per batch (the last batch may be smaller)
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches
    pub fn batch_count(&self) -> usize {
        self.total_rows.div_ceil(self.batch_size)
    }

    /// Row range of a batch, `None` past the last batch
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.batch_count() {
            return None;
        }
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.total_rows);
        Some(start..end)
    }

    /// Processed-row count snapped to a batch boundary
    ///
    /// Counts are clamped to the total; anything that is neither the total
    /// nor a multiple of the batch size is rounded down, so the partially
    /// covered batch is processed again.
    pub fn aligned(&self, processed_rows: usize) -> usize {
        let clamped = processed_rows.min(self.total_rows);
        if clamped == self.total_rows {
            clamped
        } else {
            clamped - clamped % self.batch_size
        }
    }

    /// Batch index from which a run with `processed_rows` done resumes
    pub fn resume_index(&self, processed_rows: usize) -> usize {
        let aligned = self.aligned(processed_rows);
        if aligned == self.total_rows {
            self.batch_count()
        } else {
            aligned / self.batch_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_batch_size_rejected() {
        assert_eq!(BatchPlan::new(10, 0), Err(DomainError::InvalidBatchSize));
    }

    #[test]
    fn test_final_batch_smaller() {
        let plan = BatchPlan::new(25, 10).unwrap();
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.range(0), Some(0..10));
        assert_eq!(plan.range(2), Some(20..25));
        assert_eq!(plan.range(3), None);
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        let plan = BatchPlan::new(0, 10).unwrap();
        assert_eq!(plan.batch_count(), 0);
        assert_eq!(plan.resume_index(0), 0);
    }

    #[test]
    fn test_resume_after_two_checkpoints() {
        let plan = BatchPlan::new(25, 10).unwrap();
        assert_eq!(plan.resume_index(20), 2);
        assert_eq!(plan.resume_index(25), 3);
    }

    #[test]
    fn test_unaligned_count_rounds_down() {
        let plan = BatchPlan::new(25, 10).unwrap();
        assert_eq!(plan.aligned(17), 10);
        assert_eq!(plan.resume_index(17), 1);
        assert_eq!(plan.aligned(99), 25);
    }

    proptest! {
        #[test]
        fn prop_batches_tile_the_table(total in 0usize..2_000, size in 1usize..64) {
            let plan = BatchPlan::new(total, size).unwrap();
            prop_assert_eq!(plan.batch_count(), (total + size - 1) / size);

            let mut processed = 0;
            for index in 0..plan.batch_count() {
                let range = plan.range(index).unwrap();
                prop_assert_eq!(range.start, processed);
                prop_assert!(range.end > range.start);
                prop_assert!(range.end - range.start <= size);
                processed = range.end;
            }
            prop_assert_eq!(processed, total);
        }

        #[test]
        fn prop_resume_starts_at_first_unprocessed_batch(
            total in 1usize..2_000,
            size in 1usize..64,
            done in 0usize..64,
        ) {
            let plan = BatchPlan::new(total, size).unwrap();
            let done = done.min(plan.batch_count());
            let processed = plan.range(done).map(|r| r.start).unwrap_or(total);
            prop_assert_eq!(plan.resume_index(processed), done);
        }
    }
}
