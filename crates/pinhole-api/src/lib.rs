#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Public interface for pinhole handle tables.
//!
//! Construct a [`HandleTable`] and pass it to whatever needs it. When a
//! process-wide table is unavoidable (a C callback with no user-data
//! pointer, say), declare a [`GlobalTable`] static and initialise it once.

mod global;

pub use global::GlobalTable;
pub use pinhole_core::{
    Handle, HandleGuard, HandleTable, Rejected, Strategy, TableConfig, TableError, TableStats,
};
