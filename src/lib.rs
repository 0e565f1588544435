//! # MCAS
//!
//! A lock-free multi-word compare-and-swap library. It atomically updates any
//! number of independent [Cell]s, each conditioned on an expected prior value,
//! with the semantics of one virtual CAS that installs all new values or none.
//! Because it is built on single-width compare-and-swap only, it is lock-free on
//! every mainstream platform.
//!
//! # Usage
//! ## Example
//! ```edition2021
//! use mcas::{mcas, CasEntry, Cell};
//!
//! let a = Cell::new(1);
//! let b = Cell::new(2);
//!
//! // two threads race to update both cells
//! let (first, second) = std::thread::scope(|scope| {
//!     let first = scope.spawn(|| {
//!         mcas(&[CasEntry::new(&a, 1, 7), CasEntry::new(&b, 2, 8)])
//!     });
//!     let second = scope.spawn(|| {
//!         mcas(&[CasEntry::new(&a, 1, 3), CasEntry::new(&b, 2, 4)])
//!     });
//!     (first.join().unwrap(), second.join().unwrap())
//! });
//!
//! // exactly one of the two batches took effect
//! assert!(first.is_ok() ^ second.is_ok());
//! assert!(matches!((a.load(), b.load()), (7, 8) | (3, 4)));
//! ```
//!
//! ## Details
//! Create [Cell]s to hold the words you want to update together. A batch is a
//! slice of [CasEntry] triples, one per cell, passed to [mcas()]; the call returns
//! `Ok(())` when every cell held its expected value and all new values were
//! installed, and [Error::ValueWasNotExpectedValue] when any cell disagreed, in
//! which case no visible value changed. [Cell::load], [Cell::store], and
//! [Cell::compare_and_set] are the single-cell conveniences built on the same
//! machinery.
//!
//! While a batch is in flight its cells hold a marker pointing at the operation's
//! shared descriptor. Any thread that encounters a marker, readers included,
//! helps the operation to completion before continuing, so a preempted or
//! abandoned operation cannot wedge its cells. Descriptors are reclaimed through
//! [crossbeam_epoch] once no thread can reach them.
//!
//! # Limitations
//! ## The top two bits of a value are reserved
//! A cell distinguishes user values from in-flight operation markers by the two
//! most significant bits of the stored word, so user values must leave those bits
//! clear. [is_reserved_value] reports whether a value is usable. On 64-bit
//! platforms this leaves 62 value bits, enough for canonical user-space pointers
//! and for counters.
//!
//! ## Cells must outlive their observers
//! A cell taking part in a batch must stay alive until every thread that might
//! still help that batch has moved on. Keeping cells in a shared structure that
//! is torn down only after worker threads join, as in the example above,
//! satisfies this.
//!
//! ## One entry per cell
//! A cell may appear at most once in a batch; duplicates are rejected with
//! [Error::DuplicateCell].
#![warn(missing_debug_implementations, missing_docs)]

mod ccas;
mod cell;
mod err;
mod mcas;
mod status;
mod sync;
mod word;

pub use cell::Cell;
pub use err::Error;
pub use mcas::{mcas, CasEntry};
pub use word::is_reserved_value;
