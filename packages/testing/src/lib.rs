#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests, examples and benchmarks in this workspace.

use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

/// How long a watched test may run before it is considered hung.
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Same, under Miri, where thread synchronization is dramatically slower.
const WATCHDOG_TIMEOUT_MIRI: Duration = Duration::from_secs(60);

/// Runs `test_fn` on a separate thread and panics if it does not finish in time.
///
/// Lock-based code that deadlocks would otherwise hang the test binary forever. A panic
/// inside `test_fn` is propagated to the caller unchanged.
///
/// Setting the `MUTATION_TESTING` environment variable to `1` disables the watchdog so that
/// mutation testing tools can observe a hang as a hang.
///
/// # Panics
///
/// Panics if `test_fn` panics or exceeds the timeout.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let value = with_watchdog(|| 2 + 2);
/// assert_eq!(value, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let timeout = if cfg!(miri) {
        WATCHDOG_TIMEOUT_MIRI
    } else {
        WATCHDOG_TIMEOUT
    };

    let (tx, rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let result = test_fn();
        // The receiver is gone if we already timed out, nothing to report in that case.
        drop(tx.send(result));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            worker.join().expect("watched thread completed but failed to join");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("watched test did not complete within {timeout:?}");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match worker.join() {
            Ok(()) => panic!("watched thread exited without producing a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// Runs `work` on `thread_count` threads that all start at the same moment, returning
/// the results in thread index order.
///
/// The threads wait on a shared barrier before calling `work`, which maximizes the overlap
/// between them and therefore the contention on whatever they share.
///
/// # Panics
///
/// Panics if any of the threads panics.
///
/// # Example
///
/// ```rust
/// use testing::run_on_threads;
///
/// let results = run_on_threads(4, |index| index * 10);
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
pub fn run_on_threads<F, R>(thread_count: usize, work: F) -> Vec<R>
where
    F: Fn(usize) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let work = Arc::new(work);
    let barrier = Arc::new(Barrier::new(thread_count));

    let handles = (0..thread_count)
        .map(|index| {
            let work = Arc::clone(&work);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                work(index)
            })
        })
        .collect::<Vec<_>>();

    handles
        .into_iter()
        .map(|handle| match handle.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        })
        .collect()
}
