#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core components of the pinhole handle table.
//!
//! A [`HandleTable`] keeps values in-process and gives out small integer
//! [`Handle`]s that can cross an FFI or RPC boundary in their place.

mod config;
mod cursor;
mod error;
mod guard;
mod handle;
mod table;

pub use config::{Strategy, TableConfig};
pub use error::{Rejected, TableError};
pub use guard::HandleGuard;
pub use handle::Handle;
pub use table::{HandleTable, TableStats};
