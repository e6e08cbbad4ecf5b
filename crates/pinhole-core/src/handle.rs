//! Opaque integer handle standing in for a stored value.
//!
//! Handles are the only thing that leaves the table: they can be copied,
//! compared, and passed across an FFI or RPC boundary as a plain `u64`.
//! A handle is unique only among currently live entries; once wiped the
//! same number may be issued again for an unrelated value.

use core::fmt;

/// Opaque reference to a value held by a [`HandleTable`](crate::HandleTable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Handle(pub(crate) u64);

impl Handle {
    /// Rebuild a handle from its raw integer form.
    ///
    /// Any integer is accepted; dereferencing a number the table never issued
    /// simply yields nothing.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw integer form, suitable for crossing a foreign boundary.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
