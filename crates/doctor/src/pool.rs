use std::collections::VecDeque;
use std::sync::{mpsc, Mutex};

/// Apply `work` to every item on at most `limit` threads (at least one).
///
/// Output order matches input order regardless of completion order.
pub fn run_bounded<T, R, F>(items: Vec<T>, limit: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    run_bounded_with(items, limit, work, |_, _| {})
}

/// Like [`run_bounded`], calling `on_result(index, &result)` on the caller's
/// thread as each item completes, in completion order.
pub fn run_bounded_with<T, R, F, C>(items: Vec<T>, limit: usize, work: F, mut on_result: C) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
    C: FnMut(usize, &R),
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = limit.max(1).min(total);
    let queue: Mutex<VecDeque<(usize, T)>> = Mutex::new(items.into_iter().enumerate().collect());
    let (tx, rx) = mpsc::channel::<(usize, R)>();
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let work = &work;
            scope.spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut guard) => guard.pop_front(),
                    Err(poisoned) => poisoned.into_inner().pop_front(),
                };
                let Some((idx, item)) = next else {
                    break;
                };
                if tx.send((idx, work(item))).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (idx, result) in rx {
            on_result(idx, &result);
            slots[idx] = Some(result);
        }
    });

    slots.into_iter().flatten().collect()
}
