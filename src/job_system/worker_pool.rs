use std::sync::Mutex;

use crossbeam::channel;

/// Runs `work` over `inputs` on `workers` scoped threads and returns the
/// outputs in input order. `on_progress(done, total)` is called under the
/// progress lock after each item finishes.
pub fn run_ordered<T, R, F, P>(inputs: Vec<T>, workers: usize, work: F, on_progress: P) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
    P: Fn(usize, usize) + Sync,
{
    let total = inputs.len();
    let (task_tx, task_rx) = channel::unbounded::<(usize, T)>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, R)>();

    for task in inputs.into_iter().enumerate() {
        // Receiver is alive until the end of this function.
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let done = Mutex::new(0usize);

    std::thread::scope(|s| {
        for _ in 0..workers.clamp(1, total.max(1)) {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            let work = &work;
            let on_progress = &on_progress;
            let done = &done;

            s.spawn(move || {
                while let Ok((index, item)) = rx.recv() {
                    let result = work(item);

                    if let Ok(mut count) = done.lock() {
                        *count += 1;
                        on_progress(*count, total);
                    }

                    let _ = tx.send((index, result));
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (index, result) in result_rx.iter() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn preserves_input_order() {
        let out = run_ordered((0..64).collect(), 4, |x: u32| x * x, |_, _| {});
        assert_eq!(out, (0..64).map(|x| x * x).collect::<Vec<_>>());
    }

    #[test]
    fn reports_every_item() {
        let calls = AtomicUsize::new(0);
        let last = AtomicUsize::new(0);

        run_ordered(vec![(); 10], 3, |_| (), |done, total| {
            assert_eq!(total, 10);
            calls.fetch_add(1, Ordering::SeqCst);
            last.fetch_max(done, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(last.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn empty_input_is_fine() {
        let out: Vec<u8> = run_ordered(Vec::<u8>::new(), 8, |x| x, |_, _| {});
        assert!(out.is_empty());
    }
}
