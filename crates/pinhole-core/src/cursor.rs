//! Allocation cursor.
//!
//! The cursor decides which handle number a new entry receives. It never
//! inspects the live set itself; the table passes a liveness predicate so the
//! cursor can be driven while the write lock is held.
//!
//! Two strategies are available:
//!
//! ```text
//! LinearProbe: next -> next+1 -> ... -> last -> first -> ...   (first absent wins)
//! FreeList:    [released LIFO] -> fresh next -> linear fallback
//! ```
//!
//! Unlike a slab, the handle space may span all of `u64`, so the free list is
//! filled lazily from releases instead of being seeded with every index.

use crate::config::{Strategy, TableConfig};

/// Result of a successful claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Claim {
    /// The absent number handed out.
    pub(crate) raw: u64,
    /// Live numbers skipped before finding `raw`.
    pub(crate) probes: u64,
    /// The search passed `last` and restarted at `first`.
    pub(crate) wrapped: bool,
}

/// Allocation cursor over the inclusive space `first..=last`.
#[derive(Debug)]
pub(crate) struct Cursor {
    first: u64,
    last: u64,
    /// Next candidate for linear probing, or next fresh number for the free list.
    next: u64,
    /// Released numbers awaiting reuse. `None` under linear probing.
    free_list: Option<Vec<u64>>,
    /// Every number in the space has been minted at least once.
    minted_all: bool,
}

impl Cursor {
    /// Create a cursor positioned at the start of the configured space.
    pub(crate) fn new(config: &TableConfig) -> Self {
        let free_list = match config.strategy {
            Strategy::LinearProbe => None,
            Strategy::FreeList => Some(Vec::new()),
        };
        Self {
            first: config.first,
            last: config.last,
            next: config.first,
            free_list,
            minted_all: false,
        }
    }

    /// Size of the space minus one; avoids overflow for the full `u64` range.
    fn span(&self) -> u64 {
        self.last - self.first
    }

    fn step(&self, raw: u64) -> u64 {
        if raw == self.last { self.first } else { raw + 1 }
    }

    /// Find a number for which `is_live` is false.
    ///
    /// `live` is the current number of live entries; `None` means all of
    /// them are taken.
    pub(crate) fn claim(&mut self, live: usize, is_live: impl Fn(u64) -> bool) -> Option<Claim> {
        if live as u64 > self.span() {
            return None;
        }
        if self.free_list.is_some() {
            if let Some(claim) = self.claim_recycled(&is_live) {
                return Some(claim);
            }
        }
        Some(self.probe(&is_live))
    }

    /// Free-list path: pop a released number, else mint a fresh one.
    fn claim_recycled(&mut self, is_live: &impl Fn(u64) -> bool) -> Option<Claim> {
        let mut probes = 0;
        if let Some(free) = self.free_list.as_mut() {
            while let Some(raw) = free.pop() {
                if !is_live(raw) {
                    return Some(Claim { raw, probes, wrapped: false });
                }
                probes += 1;
            }
        }
        while !self.minted_all {
            let raw = self.next;
            if raw == self.last {
                self.minted_all = true;
            } else {
                self.next = raw + 1;
            }
            if !is_live(raw) {
                return Some(Claim { raw, probes, wrapped: false });
            }
            probes += 1;
        }
        None
    }

    /// Linear probe from `next`, wrapping at `last`. Terminates because the
    /// caller has checked that at least one number is absent.
    fn probe(&mut self, is_live: &impl Fn(u64) -> bool) -> Claim {
        let mut raw = self.next;
        let mut probes = 0;
        let mut wrapped = false;
        while is_live(raw) {
            wrapped |= raw == self.last;
            raw = self.step(raw);
            probes += 1;
        }
        if self.free_list.is_none() {
            self.next = self.step(raw);
        }
        Claim { raw, probes, wrapped }
    }

    /// Record that `raw` left the live set.
    pub(crate) fn released(&mut self, raw: u64) {
        if let Some(free) = self.free_list.as_mut() {
            free.push(raw);
        }
    }
}
