//! Error types.
//!
//! An invalid handle is an ordinary outcome, not a fault: reads return
//! `None`, wipes are no-ops, and only writes report [`TableError::Absent`].

use crate::Handle;
use thiserror::Error;

/// Errors reported by a handle table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// The handle was never issued or has been wiped.
    #[error("handle {0} is not live")]
    Absent(Handle),
    /// Every number in the handle space is live.
    #[error("handle space exhausted: all {capacity} handles are live")]
    Exhausted {
        /// Number of handles in the space, saturated at `u64::MAX`.
        capacity: u64,
    },
    /// The configured handle space is empty.
    #[error("invalid handle space: first handle {first} is above last handle {last}")]
    InvalidConfig {
        /// Configured lower bound.
        first: u64,
        /// Configured upper bound.
        last: u64,
    },
    /// A global table was initialised twice.
    #[error("global handle table is already initialised")]
    AlreadyInitialized,
    /// A global table was used before initialisation.
    #[error("global handle table is not initialised")]
    Uninitialized,
}

/// A value the table refused to take, handed back to the caller.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejected<V> {
    error: TableError,
    value: V,
}

impl<V> Rejected<V> {
    pub(crate) fn new(error: TableError, value: V) -> Self {
        Self { error, value }
    }

    /// Why the value was refused.
    pub fn error(&self) -> &TableError {
        &self.error
    }

    /// Recover the refused value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Split into the error and the refused value.
    pub fn into_parts(self) -> (TableError, V) {
        (self.error, self.value)
    }
}
