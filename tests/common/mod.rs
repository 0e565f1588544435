use mcas::{mcas, CasEntry, Cell, Error};

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::Arc;
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::Arc;
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::Arc;
        pub(crate) use std::thread;
    }
}

/// Races `num_threads` threads, each trying to move every cell of a shared pool
/// from 0 to its own token in one batch. The pool starts all-zero, so exactly one
/// batch can commit; the rest must observe a mismatch and leave no trace.
pub(crate) fn contended_batch_test(num_threads: usize, num_cells: usize) {
    let cells: Arc<Vec<Cell>> = Arc::new((0..num_cells).map(|_| Cell::new(0)).collect());

    let handles: Vec<thread::JoinHandle<Result<(), Error>>> = (1..=num_threads)
        .map(|token| {
            let cells = cells.clone();
            thread::spawn(move || {
                let entries: Vec<CasEntry> = cells
                    .iter()
                    .map(|cell| CasEntry::new(cell, 0, token))
                    .collect();
                mcas(&entries)
            })
        })
        .collect();

    let outcomes: Vec<Result<(), Error>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("a thread panicked"))
        .collect();

    for outcome in &outcomes {
        assert!(matches!(
            outcome,
            Ok(()) | Err(Error::ValueWasNotExpectedValue)
        ));
    }
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        (1..=num_threads).any(|token| cells.iter().all(|cell| cell.load() == token)),
        "the pool does not reflect any single winning batch"
    );
}
