//! Table construction options.

use crate::TableError;

/// How the allocation cursor picks the next handle number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// Probe upward from the cursor, wrapping at the end of the space, until
    /// an absent number is found. Released numbers are only reused when the
    /// cursor comes back around to them.
    #[default]
    LinearProbe,
    /// Reissue released numbers most-recent-first, minting fresh numbers only
    /// when none are waiting. Allocation never probes.
    FreeList,
}

/// Options for [`HandleTable::with_config`](crate::HandleTable::with_config).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TableConfig {
    /// Lowest handle number issued. The cursor starts here.
    pub first: u64,
    /// Highest handle number issued (inclusive). The cursor wraps back to
    /// `first` after it.
    pub last: u64,
    /// Cursor strategy.
    pub strategy: Strategy,
    /// Number of entries to reserve space for up front.
    pub initial_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            first: 0,
            last: u64::MAX,
            strategy: Strategy::default(),
            initial_capacity: 0,
        }
    }
}

impl TableConfig {
    /// Default configuration: the full `u64` space, linear probing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict issued handles to `first..=last`.
    #[must_use]
    pub fn with_space(mut self, first: u64, last: u64) -> Self {
        self.first = first;
        self.last = last;
        self
    }

    /// Select the cursor strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reserve room for `capacity` entries.
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Check the handle space is non-empty.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.first > self.last {
            return Err(TableError::InvalidConfig {
                first: self.first,
                last: self.last,
            });
        }
        Ok(())
    }

    /// Number of handles in the space, saturated at `u64::MAX`.
    pub fn capacity(&self) -> u64 {
        (self.last - self.first).saturating_add(1)
    }
}
