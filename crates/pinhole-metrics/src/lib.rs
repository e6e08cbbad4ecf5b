#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Metrics instrumentation for pinhole handle tables.

/// Counter metrics.
pub mod counter;
/// Histogram metrics.
pub mod histogram;

pub use counter::Counter;
pub use histogram::{Histogram, HistogramSnapshot};
