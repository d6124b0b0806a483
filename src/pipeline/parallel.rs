use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

/// Process items on up to `jobs` scoped threads, returning results in input order.
///
/// Work is taken in batches of `2 * jobs` so at most that many items are in flight.
pub fn process_parallel_with<T, R, F>(items: Vec<T>, jobs: usize, process: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let worker_count = jobs.max(1);
    let in_flight_limit = worker_count.saturating_mul(2).max(1);
    let mut ordered = Vec::with_capacity(items.len());
    let mut indexed = items.into_iter().enumerate();

    loop {
        let Some(first) = indexed.next() else {
            break;
        };

        let mut batch = Vec::with_capacity(in_flight_limit);
        batch.push(first);
        for _ in 1..in_flight_limit {
            if let Some(next) = indexed.next() {
                batch.push(next);
            } else {
                break;
            }
        }

        if worker_count == 1 {
            for (_index, item) in batch {
                ordered.push(process(item));
            }
            continue;
        }

        let (result_tx, result_rx) = mpsc::channel::<(usize, R)>();
        thread::scope(|scope| {
            for (index, item) in batch {
                let result_tx = result_tx.clone();
                let process = &process;
                scope.spawn(move || {
                    let processed = process(item);
                    let _ = result_tx.send((index, processed));
                });
            }
        });
        drop(result_tx);

        let mut pending = BTreeMap::new();
        for (index, result) in result_rx {
            pending.insert(index, result);
        }
        ordered.extend(pending.into_values());
    }

    ordered
}

/// Default worker count: available parallelism, or 1 when unknown.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
}
