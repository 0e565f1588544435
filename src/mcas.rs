//! Multi-word compare-and-swap.
//!
//! An [mcas] batch updates N cells as one atomic step through a shared
//! [McasDescriptor]. The protocol has two phases. The acquire phase walks the
//! entries in ascending cell order and installs the descriptor into each cell with
//! a [conditional CAS](crate::ccas), so a cell is only claimed while the operation
//! is still undecided. The decide CAS then transitions the descriptor's status
//! word from undecided to succeeded or failed; that single transition is the
//! operation's linearization point. Finally the patch phase replaces the
//! descriptor in every cell with the new value on success or the original value on
//! failure.
//!
//! Any thread that stumbles on a published descriptor helps the operation to
//! completion before retrying its own work, so a stalled or abandoned operation
//! never wedges the cells it touched. Because every batch acquires in ascending
//! order-id order, chains of helping cannot form a cycle.

use crossbeam_epoch::{self as epoch, Guard};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::ccas::{ccas, ccas_read};
use crate::cell::Cell;
use crate::err::Error;
use crate::status::Status;
use crate::sync::{AtomicUsize, Ordering};
use crate::word::{
    is_mcas_descriptor, is_reserved_value, tag_mcas_descriptor, untag_mcas_descriptor,
};

/// One conditional update in a multi-word batch: replace `expected` with `new` in
/// `cell`.
#[derive(Clone, Copy, Debug)]
pub struct CasEntry<'a> {
    cell: &'a Cell,
    expected: usize,
    new: usize,
}

impl<'a> CasEntry<'a> {
    /// Describes the update of `cell` from `expected` to `new`.
    ///
    /// `expected` and `new` can be any `usize` whose two most significant bits are
    /// clear; see [is_reserved_value].
    pub fn new(cell: &'a Cell, expected: usize, new: usize) -> Self {
        Self {
            cell,
            expected,
            new,
        }
    }
}

/// The shared record of one in-flight multi-word operation.
///
/// Entries are sorted by cell order before the descriptor is published and never
/// change afterwards; the status word is the only field written once the
/// descriptor is reachable from a cell.
pub(crate) struct McasDescriptor {
    status: AtomicUsize,
    entries: Vec<UpdateEntry>,
}

#[derive(Debug)]
struct UpdateEntry {
    cell: *const Cell,
    expected: usize,
    new: usize,
}

impl McasDescriptor {
    fn status_word(&self) -> usize {
        self.status.load(Ordering::SeqCst)
    }
}

impl core::fmt::Debug for McasDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("McasDescriptor")
            .field("status", &Status::try_from(self.status_word()))
            .field("entries", &self.entries)
            .finish()
    }
}

/// Atomically applies every update in `entries`, or none of them.
///
/// Each entry's cell must currently hold its expected value for the batch to
/// commit. On `Ok(())` every cell holds its new value. On
/// [Error::ValueWasNotExpectedValue] at least one cell held something else at the
/// decision point and no cell's visible value changed. Entries may be passed in
/// any order; acquisition always proceeds in ascending [order id](Cell::order_id)
/// order. A cell may appear at most once per batch.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(entries = entries.len())))]
pub fn mcas(entries: &[CasEntry<'_>]) -> Result<(), Error> {
    for entry in entries {
        if is_reserved_value(entry.expected) {
            return Err(Error::ReservedValueBits(entry.expected));
        }
        if is_reserved_value(entry.new) {
            return Err(Error::ReservedValueBits(entry.new));
        }
    }
    // An empty batch has nothing to decide.
    if entries.is_empty() {
        return Ok(());
    }

    let mut sorted = entries.to_vec();
    sorted.sort_unstable_by_key(|entry| entry.cell.order_id());
    if sorted
        .windows(2)
        .any(|pair| pair[0].cell.order_id() == pair[1].cell.order_id())
    {
        return Err(Error::DuplicateCell);
    }

    let updates = sorted
        .iter()
        .map(|entry| UpdateEntry {
            cell: entry.cell,
            expected: entry.expected,
            new: entry.new,
        })
        .collect();

    let guard = epoch::pin();
    let descriptor = Box::into_raw(Box::new(McasDescriptor {
        status: AtomicUsize::new(Status::Undecided.word()),
        entries: updates,
    }));
    let descriptor_word = tag_mcas_descriptor(descriptor);

    let succeeded = unsafe { help(descriptor_word, &guard) };

    // Every cell has been patched, so no new observer can reach the descriptor; a
    // helper already holding it is inside its own pinned epoch.
    unsafe {
        guard.defer_unchecked(move || drop(Box::from_raw(descriptor)));
    }

    if succeeded {
        Ok(())
    } else {
        Err(Error::ValueWasNotExpectedValue)
    }
}

/// Drives the operation behind `descriptor_word` to completion and reports whether
/// it succeeded.
///
/// The outcome is the same whether this runs in the originating thread or in a
/// thread that found the descriptor in a cell: the first decide CAS fixes it, and
/// everything after the decision is idempotent.
///
/// # Safety
///
/// `descriptor_word` must carry the MCAS tag and have been created by [mcas] in
/// this process, read while `guard` was already pinned. Every cell named by the
/// descriptor must still be alive.
pub(crate) unsafe fn help(descriptor_word: usize, guard: &Guard) -> bool {
    let descriptor = &*untag_mcas_descriptor(descriptor_word);

    if descriptor.status_word() == Status::Undecided.word() {
        let decision = acquire(descriptor, descriptor_word, guard);
        // The single commit point. The first transition wins; a failure here means
        // another thread already decided, and the loser adopts that decision below.
        let _ = descriptor.status.compare_exchange(
            Status::Undecided.word(),
            decision.word(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    let succeeded = descriptor.status_word() == Status::Succeeded.word();
    patch(descriptor, descriptor_word, succeeded);
    succeeded
}

/// Acquire phase: installs the descriptor into every cell, in ascending order.
///
/// Returns the decision this thread will propose: [Status::Succeeded] when every
/// cell was acquired, [Status::Failed] when a cell's value ruled the batch out or
/// another thread already decided the operation. A losing proposal is harmless;
/// the decide CAS in [help] rejects it.
unsafe fn acquire(descriptor: &McasDescriptor, descriptor_word: usize, guard: &Guard) -> Status {
    'entries: for update in &descriptor.entries {
        let cell = &*update.cell;
        loop {
            ccas(cell, update.expected, descriptor_word, &descriptor.status, guard);
            let observed = ccas_read(cell, guard);

            if observed == descriptor_word {
                // The cell is ours, whether our install landed or a helper's did.
                continue 'entries;
            }
            if observed == update.expected {
                if descriptor.status_word() == Status::Undecided.word() {
                    // Our install was resolved back to the expected value after
                    // the helper's condition check. The operation is still open,
                    // so claim the cell again.
                    continue;
                }
                // A helper already decided this operation.
                return Status::Failed;
            }
            if is_mcas_descriptor(observed) {
                // The cell belongs to another in-flight batch. Finish that batch,
                // then retry; ascending acquisition order keeps this acyclic.
                help(observed, guard);
                continue;
            }
            // A genuine mismatch.
            return Status::Failed;
        }
    }
    Status::Succeeded
}

/// Patch phase: replaces the descriptor in every cell with the decided value.
///
/// Each patch CAS may fail; that means another thread already patched that cell.
/// At most one CAS per cell mutates it, so repeated patching is safe.
unsafe fn patch(descriptor: &McasDescriptor, descriptor_word: usize, succeeded: bool) {
    for update in &descriptor.entries {
        let value = if succeeded {
            update.new
        } else {
            update.expected
        };
        let _ = (*update.cell).cas_word(descriptor_word, value);
    }
}

/// The logical value of `cell`, never a descriptor.
///
/// Observed conditional installs are resolved and observed multi-word operations
/// helped to completion until a user value remains. Each iteration strictly
/// advances some operation toward resolution, so the loop terminates under
/// contention.
pub(crate) fn read(cell: &Cell) -> usize {
    let guard = epoch::pin();
    loop {
        let word = ccas_read(cell, &guard);
        if !is_mcas_descriptor(word) {
            return word;
        }
        unsafe {
            help(word, &guard);
        }
    }
}
