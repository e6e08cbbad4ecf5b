//! Explicitly initialised process-wide table.

use std::sync::OnceLock;

use pinhole_core::{HandleTable, TableConfig, TableError};
use tracing::debug;

/// A [`HandleTable`] that can live in a `static`.
///
/// There is no implicit default: the table does not exist until
/// [`init`](Self::init) succeeds, and `init` succeeds at most once.
///
/// ```
/// use pinhole_api::{GlobalTable, TableConfig};
///
/// static CALLBACKS: GlobalTable<String> = GlobalTable::new();
///
/// CALLBACKS.init(TableConfig::new()).unwrap();
/// let table = CALLBACKS.table().unwrap();
/// let h = table.allocate(String::from("on_ready"));
/// assert_eq!(table.get(h).as_deref(), Some("on_ready"));
/// ```
#[derive(Debug)]
pub struct GlobalTable<V> {
    cell: OnceLock<HandleTable<V>>,
}

impl<V> GlobalTable<V> {
    /// An uninitialised slot.
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Build the table from `config`.
    ///
    /// Fails with [`TableError::AlreadyInitialized`] on every call after the
    /// first success, and with [`TableError::InvalidConfig`] for an empty
    /// handle space (in which case a later `init` may still succeed).
    pub fn init(&self, config: TableConfig) -> Result<&HandleTable<V>, TableError> {
        if self.cell.get().is_some() {
            return Err(TableError::AlreadyInitialized);
        }
        let table = HandleTable::with_config(config)?;
        // Another thread may have won the race since the check above.
        self.cell
            .set(table)
            .map_err(|_| TableError::AlreadyInitialized)?;
        debug!("global handle table initialised");
        self.table()
    }

    /// The table, if initialised.
    pub fn get(&self) -> Option<&HandleTable<V>> {
        self.cell.get()
    }

    /// The table, or [`TableError::Uninitialized`].
    pub fn table(&self) -> Result<&HandleTable<V>, TableError> {
        self.cell.get().ok_or(TableError::Uninitialized)
    }

    /// Whether [`init`](Self::init) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<V> Default for GlobalTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
