use core::sync::atomic::AtomicU64;

use crate::err::Error;
use crate::mcas::{self, CasEntry};
use crate::sync::{AtomicUsize, Ordering};
use crate::word::is_reserved_value;

/// Issues each new [Cell] a unique position in the global acquisition order.
///
/// Kept on the plain `core` atomic even in model-checked builds: the counter only
/// hands out identifiers and takes no part in the protocol being checked.
static NEXT_ORDER_ID: AtomicU64 = AtomicU64::new(0);

/// A single word of shared memory which can participate in multi-word CAS
/// operations.
///
/// The stored word is a plain `usize` whose two most significant bits are reserved
/// for in-flight operation markers; see [is_reserved_value]. Every access to a cell
/// that ever takes part in an [mcas](crate::mcas()) batch must go through
/// [Cell::load], [Cell::store], [Cell::compare_and_set], or [mcas](crate::mcas())
/// itself, so that markers left by stalled threads are helped to completion instead
/// of being observed raw.
///
/// Each cell carries an immutable [order id](Cell::order_id) drawn from a global
/// counter. Batches acquire their cells in ascending order-id order, which keeps
/// two overlapping operations from helping each other in a cycle.
#[derive(Debug)]
pub struct Cell {
    value: AtomicUsize,
    order_id: u64,
}

impl Cell {
    /// Creates a cell holding `initial_value`.
    pub fn new(initial_value: usize) -> Self {
        debug_assert!(
            !is_reserved_value(initial_value),
            "initial value {initial_value:#x} collides with descriptor marker bits",
        );
        Self {
            value: AtomicUsize::new(initial_value),
            order_id: NEXT_ORDER_ID.fetch_add(1, core::sync::atomic::Ordering::Relaxed),
        }
    }

    /// The cell's position in the global acquisition order. Stable for the cell's
    /// lifetime.
    pub fn order_id(&self) -> u64 {
        self.order_id
    }

    /// Returns the cell's current logical value.
    ///
    /// If the cell holds a marker for an in-flight operation, that operation is
    /// driven to completion first; the returned word is always a user value.
    pub fn load(&self) -> usize {
        mcas::read(self)
    }

    /// Unconditionally replaces the cell's value, retrying through any concurrent
    /// multi-word operations until the store takes effect.
    pub fn store(&self, value: usize) -> Result<(), Error> {
        if is_reserved_value(value) {
            return Err(Error::ReservedValueBits(value));
        }
        loop {
            let current = self.load();
            match self.compare_and_set(current, value) {
                Ok(()) => return Ok(()),
                Err(Error::ValueWasNotExpectedValue) => continue,
                Err(error) => return Err(error),
            }
        }
    }

    /// Replaces `expected` with `new`, as a one-entry [mcas](crate::mcas()) batch.
    pub fn compare_and_set(&self, expected: usize, new: usize) -> Result<(), Error> {
        mcas::mcas(&[CasEntry::new(self, expected, new)])
    }

    /// Raw load of the stored word. Higher layers interpret descriptor tags; the
    /// cell itself does not.
    pub(crate) fn read_word(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }

    /// Raw single-word CAS on the stored word.
    pub(crate) fn cas_word(&self, expected: usize, new: usize) -> Result<usize, usize> {
        self.value
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}
