//! Scheduler lifecycle and primitive behaviour under every backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use numkern::scheduler::{hardware_concurrency, split_range};
use numkern::{Backend, KernelError, Scheduler};

fn exclusive() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn test_second_instance_is_configuration_error() {
    let _guard = exclusive();
    let scheduler = Scheduler::new(Backend::WorkStealing, 2).unwrap();
    for backend in Backend::ALL {
        let err = Scheduler::new(backend, 1).unwrap_err();
        assert!(matches!(err, KernelError::ConfigurationError { .. }));
        assert!(err.is_fatal());
    }
    // The failed attempts leave the live instance untouched.
    assert!(Scheduler::is_active());
    assert_eq!(scheduler.threads(), 2);
}

#[test]
fn test_construct_drop_construct() {
    let _guard = exclusive();
    for backend in Backend::ALL {
        let scheduler = Scheduler::new(backend, 2).unwrap();
        assert_eq!(scheduler.backend(), backend);
        drop(scheduler);
        assert!(!Scheduler::is_active());
    }
    let again = Scheduler::new(Backend::Threads, 0).unwrap();
    assert_eq!(again.threads(), hardware_concurrency());
}

#[test]
fn test_thread_count_changes_restart_once() {
    let _guard = exclusive();
    let mut scheduler = Scheduler::new(Backend::WorkStealing, 1).unwrap();
    scheduler.set_thread_count(4).unwrap();
    scheduler.set_thread_count(4).unwrap();
    assert_eq!(scheduler.threads(), 4);
    assert_eq!(scheduler.activations(), 2);

    // The resized pool is usable.
    let total = scheduler.parallel_reduce(0..1000, 0u64, |r| r.map(|i| i as u64).sum(), |a, b| a + b);
    assert_eq!(total, 499_500);
}

#[test]
fn test_serial_ignores_thread_count() {
    let _guard = exclusive();
    let mut scheduler = Scheduler::new(Backend::Serial, 16).unwrap();
    assert_eq!(scheduler.threads(), 1);
    scheduler.set_thread_count(8).unwrap();
    assert_eq!(scheduler.threads(), 1);
    assert_eq!(scheduler.activations(), 1);
}

#[test]
fn test_primitives_agree_across_backends() {
    let _guard = exclusive();
    let n = 10_007;
    let mut sums = Vec::new();

    for backend in Backend::ALL {
        let scheduler = Scheduler::new(backend, 4).unwrap();

        let via_for = AtomicU64::new(0);
        scheduler.parallel_for(0..n, |i| {
            via_for.fetch_add((i * i) as u64, Ordering::Relaxed);
        });

        let via_reduce = scheduler.parallel_reduce(
            0..n,
            0u64,
            |r| r.map(|i| (i * i) as u64).sum(),
            |a, b| a + b,
        );

        let mut squares = vec![0u64; n];
        scheduler
            .parallel_chunks_mut(&mut squares, 100, |chunk, out| {
                for (offset, value) in out.iter_mut().enumerate() {
                    let i = chunk * 100 + offset;
                    *value = (i * i) as u64;
                }
                Ok(())
            })
            .unwrap();

        let via_chunks: u64 = squares.iter().sum();
        assert_eq!(via_for.into_inner(), via_reduce, "backend {backend}");
        assert_eq!(via_reduce, via_chunks, "backend {backend}");
        sums.push(via_reduce);
    }
    assert!(sums.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_float_reduction_within_reassociation() {
    let _guard = exclusive();
    let values: Vec<f64> = (0..5000).map(|i| 1.0 / (1.0 + i as f64)).collect();
    let serial: f64 = values.iter().sum();

    for backend in Backend::ALL {
        let scheduler = Scheduler::new(backend, 3).unwrap();
        let total = scheduler.parallel_reduce(
            0..values.len(),
            0.0,
            |r| values[r].iter().sum::<f64>(),
            |a, b| a + b,
        );
        assert!((total - serial).abs() <= 1e-12 * serial, "backend {backend}");
    }
}

#[test]
fn test_split_range_covers_input() {
    for parts in 1..10 {
        let pieces = split_range(5..42, parts);
        assert_eq!(pieces.len(), parts);
        assert_eq!(pieces.first().map(|r| r.start), Some(5));
        assert_eq!(pieces.last().map(|r| r.end), Some(42));
        assert!(pieces.windows(2).all(|w| w[0].end == w[1].start));
        let (min, max) = pieces
            .iter()
            .fold((usize::MAX, 0), |(lo, hi), r| (lo.min(r.len()), hi.max(r.len())));
        assert!(max - min <= 1);
    }
}
