//! Conditional compare-and-swap.
//!
//! The building block of the acquire phase. A conditional CAS installs a value into
//! a single cell only if the owning operation's status word still reads
//! [Status::Undecided] at the moment the installation is resolved, and restores the
//! old value otherwise. The condition is checked at resolution rather than at
//! publication: between the two, another thread may already have driven the owning
//! operation to a decision, and the resolution must respect that decision even when
//! the original invoker is descheduled.
//!
//! A published [CcasDescriptor] can be resolved by any thread, so a cell never
//! stays stuck on one: helping is a bounded step (one condition load and one CAS).

use crossbeam_epoch::Guard;

use crate::cell::Cell;
use crate::status::Status;
use crate::sync::{AtomicUsize, Ordering};
use crate::word::{is_ccas_descriptor, tag_ccas_descriptor, untag_ccas_descriptor};

/// A request to replace `expected` with `new` in `cell`, conditional on the owning
/// operation's status word still being [Status::Undecided] at resolution time.
///
/// Immutable once published. Reachable from at most one cell (`cell` itself) at a
/// time; removed by the single resolution CAS that replaces it with either `new`
/// or `expected`.
#[derive(Debug)]
pub(crate) struct CcasDescriptor {
    cell: *const Cell,
    expected: usize,
    /// In practice a tagged multi-word descriptor word, but nothing here depends
    /// on that.
    new: usize,
    /// Status word of the owning multi-word operation.
    condition: *const AtomicUsize,
}

/// Attempts to replace `expected` with `new` in `cell`, conditional on `condition`
/// reading [Status::Undecided] when the installation resolves.
///
/// On return the cell holds, with respect to this request, either `expected` or
/// `new`, never this call's descriptor. The call backs off without acting when it
/// observes a conflicting user value or a multi-word descriptor; the caller
/// re-reads the cell and decides what to do.
pub(crate) fn ccas(cell: &Cell, expected: usize, new: usize, condition: &AtomicUsize, guard: &Guard) {
    let descriptor = Box::into_raw(Box::new(CcasDescriptor {
        cell,
        expected,
        new,
        condition,
    }));
    let descriptor_word = tag_ccas_descriptor(descriptor);

    loop {
        match cell.cas_word(expected, descriptor_word) {
            Ok(_) => {
                unsafe { ccas_help(descriptor_word, guard) };
                break;
            }
            Err(observed) if is_ccas_descriptor(observed) => {
                // Another thread's install is in the way. Resolve it, then retry.
                unsafe { ccas_help(observed, guard) };
            }
            Err(_) => break,
        }
    }

    // The descriptor is unlinked from the cell, or was never published. A helper
    // that read the word before the resolution may still be dereferencing it, so
    // destruction waits out the current epoch.
    unsafe {
        guard.defer_unchecked(move || drop(Box::from_raw(descriptor)));
    }
}

/// Resolves a published descriptor: installs `new` if the owning operation is
/// still undecided, `expected` otherwise.
///
/// Exactly one resolution CAS succeeds, whether issued by the originator or a
/// helper; every later one fails because the cell no longer holds the descriptor.
/// Bounded: one condition load and one CAS, no loop.
///
/// # Safety
///
/// `descriptor_word` must carry the CCAS tag and have been read from a cell while
/// `guard` was already pinned, so the descriptor and its target cell are still
/// alive.
pub(crate) unsafe fn ccas_help(descriptor_word: usize, _guard: &Guard) {
    let descriptor = &*untag_ccas_descriptor(descriptor_word);
    let undecided =
        (*descriptor.condition).load(Ordering::SeqCst) == Status::Undecided.word();
    let resolved = if undecided {
        descriptor.new
    } else {
        descriptor.expected
    };
    let _ = (*descriptor.cell).cas_word(descriptor_word, resolved);
}

/// The logical contents of `cell`, skipping over transient conditional installs.
///
/// If the current word is a [CcasDescriptor], it is helped to completion and the
/// cell re-read; the returned word is a user value or a multi-word descriptor.
pub(crate) fn ccas_read(cell: &Cell, guard: &Guard) -> usize {
    loop {
        let word = cell.read_word();
        if !is_ccas_descriptor(word) {
            return word;
        }
        unsafe { ccas_help(word, guard) };
    }
}
