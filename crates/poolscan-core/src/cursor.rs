//! Scan cursor: tracks the last fully processed block.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::BlockRange;

/// The poll worker's position in the chain.
///
/// The cursor knows:
/// - Which block was last fully processed (`None` until first seeded)
/// - The next range to scan for a given chain head
///
/// It only moves forward, and only through [`Cursor::advance`] after a whole
/// range has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    last_processed: Option<u64>,
}

impl Cursor {
    /// An uninitialized cursor; the first range it yields is `[head, head]`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor that treats `block` as already processed.
    pub fn resume_after(block: u64) -> Self {
        Self {
            last_processed: Some(block),
        }
    }

    /// Last fully processed block, if any.
    pub fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    /// Returns the range to scan given the current chain head.
    ///
    /// An uninitialized cursor is seeded to `head - 1` first, so startup never
    /// backfills. Returns `None` when there is no new block past the cursor.
    pub fn next_range(&mut self, head: u64) -> Option<BlockRange> {
        let last = *self
            .last_processed
            .get_or_insert_with(|| head.saturating_sub(1));
        BlockRange::new(last.checked_add(1)?, head)
    }

    /// Advance the cursor to `to` after the range ending there was processed.
    pub fn advance(&mut self, to: u64) -> Result<(), ScanError> {
        if let Some(current) = self.last_processed {
            if to < current {
                return Err(ScanError::CursorRegression {
                    current,
                    requested: to,
                });
            }
        }
        self.last_processed = Some(to);
        Ok(())
    }
}
