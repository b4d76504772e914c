//! Bounded fan-out over scoped threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Apply `f` to every item with at most `workers` threads and return the
/// results in item order.
///
/// Workers pull the next index from a shared counter, so a slow item does not
/// hold back the rest of its stripe. A panic in `f` propagates to the caller
/// when the scope joins.
pub(crate) fn map_indexed<T, R, F>(workers: usize, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let workers = workers.min(items.len());
    if workers <= 1 {
        return items.iter().enumerate().map(|(i, item)| f(i, item)).collect();
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let (next, f) = (&next, &f);
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };
                if tx.send((index, f(index, item))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<(usize, R)> = rx.into_iter().collect();
    results.sort_unstable_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sequential_and_parallel_agree() {
        let items: Vec<u64> = (0..37).collect();
        let square = |_: usize, x: &u64| x * x;
        let sequential = map_indexed(1, &items, square);
        let parallel = map_indexed(4, &items, square);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn order_survives_uneven_work() {
        let items: Vec<u64> = (0..8).rev().collect();
        let out = map_indexed(3, &items, |index, x| {
            thread::sleep(Duration::from_millis(*x));
            (index, *x)
        });
        let expected: Vec<(usize, u64)> = items.iter().copied().enumerate().collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn concurrency_is_bounded() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items = vec![(); 12];
        map_indexed(3, &items, |_, _| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn empty_input() {
        let items: Vec<u8> = Vec::new();
        assert!(map_indexed(8, &items, |_, x| *x).is_empty());
    }
}
