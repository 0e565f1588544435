#![cfg(not(any(loom, feature = "shuttle")))]

mod common;

use std::sync::Arc;
use std::thread;

use mcas::{is_reserved_value, mcas, CasEntry, Cell, Error};
use rand::Rng;

#[test]
fn contended_batches_have_one_winner() {
    common::contended_batch_test(8, 4);
}

#[test]
fn disjoint_batches_all_commit() {
    let cells: Vec<Cell> = (1..=4usize).map(Cell::new).collect();

    thread::scope(|scope| {
        let left = scope.spawn(|| {
            mcas(&[
                CasEntry::new(&cells[0], 1, 5),
                CasEntry::new(&cells[1], 2, 6),
            ])
        });
        let right = scope.spawn(|| {
            mcas(&[
                CasEntry::new(&cells[2], 3, 7),
                CasEntry::new(&cells[3], 4, 8),
            ])
        });
        assert!(left.join().unwrap().is_ok());
        assert!(right.join().unwrap().is_ok());
    });

    let values: Vec<usize> = cells.iter().map(Cell::load).collect();
    assert_eq!(values, [5, 6, 7, 8]);
}

/// Threads hammer a shared pool with randomized batches of width 1 to 4, where
/// every entry adds a small delta to the value it observed. A batch either lands
/// wholly or not at all, so the pool's final sum must equal exactly the deltas
/// declared by committed batches, and no load may ever surface a raw marker.
#[test]
fn randomized_batches_preserve_declared_deltas() {
    const THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 2_000;
    const CELLS: usize = 16;
    const MAX_WIDTH: usize = 4;

    let cells: Arc<Vec<Cell>> = Arc::new((0..CELLS).map(|_| Cell::new(0)).collect());

    let handles: Vec<thread::JoinHandle<usize>> = (0..THREADS)
        .map(|_| {
            let cells = Arc::clone(&cells);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut committed_delta = 0usize;

                for _ in 0..OPS_PER_THREAD {
                    let width = rng.gen_range(1..=MAX_WIDTH);
                    let picked = rand::seq::index::sample(&mut rng, CELLS, width);

                    let mut batch_delta = 0usize;
                    let entries: Vec<CasEntry> = picked
                        .iter()
                        .map(|index| {
                            let cell = &cells[index];
                            let observed = cell.load();
                            assert!(
                                !is_reserved_value(observed),
                                "load surfaced a raw marker: {observed:#x}"
                            );
                            let delta = rng.gen_range(1..=5);
                            batch_delta += delta;
                            CasEntry::new(cell, observed, observed + delta)
                        })
                        .collect();

                    match mcas(&entries) {
                        Ok(()) => committed_delta += batch_delta,
                        Err(Error::ValueWasNotExpectedValue) => {}
                        Err(error) => panic!("unexpected batch error: {error}"),
                    }
                }
                committed_delta
            })
        })
        .collect();

    let declared: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("a thread panicked"))
        .sum();
    let total: usize = cells.iter().map(Cell::load).sum();
    assert_eq!(total, declared);
}
