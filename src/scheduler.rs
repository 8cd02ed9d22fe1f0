//! Concurrency backend scheduler.
//!
//! One [`Scheduler`] may be live per process. It owns the chosen backend's
//! resources (a rayon pool for [`Backend::Directive`] and
//! [`Backend::WorkStealing`]) and offers three
//! data-parallel primitives over index ranges and mutable slices that every
//! algorithm uses instead of touching threads directly.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{configuration_error, parameter_error, KernelError, Result};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Concurrency backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Everything runs on the calling thread.
    Serial,
    /// Scoped OS threads, one per contiguous partition.
    Threads,
    /// A dedicated rayon pool of exactly the requested size, with one
    /// contiguous partition per thread, like a static-schedule loop directive.
    Directive,
    /// A dedicated rayon pool with dynamic work stealing.
    WorkStealing,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Serial,
        Backend::Threads,
        Backend::Directive,
        Backend::WorkStealing,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Backend::Serial => "serial",
            Backend::Threads => "threads",
            Backend::Directive => "directive",
            Backend::WorkStealing => "work-stealing",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" | "none" => Ok(Backend::Serial),
            "threads" | "thread" | "native" | "std" => Ok(Backend::Threads),
            "directive" | "openmp" | "omp" => Ok(Backend::Directive),
            "work-stealing" | "workstealing" | "tasks" | "rayon" | "tbb" => {
                Ok(Backend::WorkStealing)
            }
            _ => Err(parameter_error(format!("unknown concurrency backend `{s}`"))),
        }
    }
}

/// Number of hardware threads, falling back to rayon's view of the machine
/// and finally to one.
pub fn hardware_concurrency() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(_) => rayon::current_num_threads().max(1),
    }
}

/// Splits `range` into at most `parts` contiguous, non-empty pieces whose
/// lengths differ by at most one. Earlier pieces are the longer ones.
pub fn split_range(range: Range<usize>, parts: usize) -> Vec<Range<usize>> {
    let len = range.len();
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let extra = len % parts;

    let mut start = range.start;
    (0..parts)
        .map(|part| {
            let size = base + usize::from(part < extra);
            let piece = start..start + size;
            start += size;
            piece
        })
        .collect()
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("numkern-worker-{i}"))
        .build()
        .map_err(|e| configuration_error(format!("cannot start work-stealing pool: {e}")))
}

/// Process-wide handle on the active concurrency backend.
///
/// Dropping the handle tears the backend down and allows a new one to be
/// created.
pub struct Scheduler {
    backend: Backend,
    threads: usize,
    pool: Option<ThreadPool>,
    activations: usize,
}

impl Scheduler {
    /// Starts `backend` with `threads` workers; zero means one per hardware
    /// thread. The serial backend always reports one thread.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`](crate::KernelError::ConfigurationError) if
    /// another scheduler is live or the backend fails to start.
    pub fn new(backend: Backend, threads: usize) -> Result<Self> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(configuration_error(
                "a scheduler is already active; drop it before creating another",
            ));
        }

        let threads = match backend {
            Backend::Serial => 1,
            _ if threads == 0 => hardware_concurrency(),
            _ => threads,
        };

        let pool = match backend {
            Backend::Directive | Backend::WorkStealing => match build_pool(threads) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    ACTIVE.store(false, Ordering::Release);
                    return Err(e);
                }
            },
            _ => None,
        };

        log::info!("scheduler started: backend={backend}, threads={threads}");
        Ok(Scheduler {
            backend,
            threads,
            pool,
            activations: 1,
        })
    }

    /// Whether a scheduler is live anywhere in the process.
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// How many times the backend's worker resources have been started.
    pub fn activations(&self) -> usize {
        self.activations
    }

    /// Changes the worker count. Zero means one per hardware thread.
    ///
    /// Setting the current count is a no-op. Pool-backed backends
    /// (directive and work-stealing) are restarted with the new size; the
    /// serial backend ignores the request.
    pub fn set_thread_count(&mut self, threads: usize) -> Result<()> {
        if self.backend == Backend::Serial {
            return Ok(());
        }
        let threads = if threads == 0 {
            hardware_concurrency()
        } else {
            threads
        };
        if threads == self.threads {
            return Ok(());
        }

        if self.pool.is_some() {
            // Replacing the pool joins the old workers.
            self.pool = Some(build_pool(threads)?);
            self.activations += 1;
        }
        log::info!(
            "scheduler resized: backend={}, threads {} -> {threads}",
            self.backend,
            self.threads
        );
        self.threads = threads;
        Ok(())
    }

    /// Length of each partition when `len` items are spread over the
    /// workers.
    pub fn partition_len(&self, len: usize) -> usize {
        len.div_ceil(self.threads).max(1)
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Calls `body(i)` once for every `i` in `range`, in no particular
    /// order. Returns after every call has finished.
    pub fn parallel_for<F>(&self, range: Range<usize>, body: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        if range.is_empty() {
            return;
        }
        match self.backend {
            Backend::Serial => range.for_each(body),
            Backend::Threads => {
                let parts = split_range(range, self.threads);
                if parts.len() == 1 {
                    return parts.into_iter().flatten().for_each(body);
                }
                let body = &body;
                thread::scope(|s| {
                    for part in parts {
                        s.spawn(move || part.for_each(body));
                    }
                });
            }
            Backend::Directive => {
                let min_len = self.partition_len(range.len());
                self.install(|| range.into_par_iter().with_min_len(min_len).for_each(&body));
            }
            Backend::WorkStealing => {
                self.install(|| range.into_par_iter().for_each(&body));
            }
        }
    }

    /// Splits `range` into contiguous pieces, maps each with `body`, and
    /// folds the partial results into `identity` with `combine`.
    ///
    /// Partials are combined in range order, so `combine` only has to be
    /// associative. `identity` must be neutral for `combine`; backends may
    /// fold it in more than once. An empty range returns `identity`.
    pub fn parallel_reduce<R, B, C>(&self, range: Range<usize>, identity: R, body: B, combine: C) -> R
    where
        R: Clone + Send + Sync,
        B: Fn(Range<usize>) -> R + Sync + Send,
        C: Fn(R, R) -> R + Sync + Send,
    {
        if range.is_empty() {
            return identity;
        }
        match self.backend {
            Backend::Serial => combine(identity, body(range)),
            Backend::Threads => {
                let parts = split_range(range, self.threads);
                let body = &body;
                let partials: Vec<R> = thread::scope(|s| {
                    let handles: Vec<_> = parts
                        .into_iter()
                        .map(|part| s.spawn(move || body(part)))
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                        .collect()
                });
                partials.into_iter().fold(identity, &combine)
            }
            Backend::Directive => {
                let parts = split_range(range, self.threads);
                self.install(|| {
                    parts
                        .into_par_iter()
                        .map(&body)
                        .reduce(|| identity.clone(), &combine)
                })
            }
            Backend::WorkStealing => {
                // Over-partition so idle workers have something to steal.
                let parts = split_range(range, self.threads * 4);
                self.install(|| {
                    parts
                        .into_par_iter()
                        .map(&body)
                        .reduce(|| identity.clone(), &combine)
                })
            }
        }
    }

    /// Calls `body(index, chunk)` for every `chunk_len`-sized chunk of
    /// `data` (the last one may be shorter). Chunks are disjoint, so each
    /// call has exclusive access to its part of the slice.
    ///
    /// Every chunk is attempted unless a worker stops early on error; the
    /// first error observed is returned.
    pub fn parallel_chunks_mut<T, F>(&self, data: &mut [T], chunk_len: usize, body: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut [T]) -> Result<()> + Sync + Send,
    {
        let chunk_len = chunk_len.max(1);
        match self.backend {
            Backend::Serial => data
                .chunks_mut(chunk_len)
                .enumerate()
                .try_for_each(|(i, chunk)| body(i, chunk)),
            Backend::Threads => {
                let mut chunks: Vec<(usize, &mut [T])> =
                    data.chunks_mut(chunk_len).enumerate().collect();
                if chunks.is_empty() {
                    return Ok(());
                }
                let per_worker = chunks.len().div_ceil(self.threads);
                let body = &body;
                thread::scope(|s| {
                    let handles: Vec<_> = chunks
                        .chunks_mut(per_worker)
                        .map(|group| {
                            s.spawn(move || {
                                group
                                    .iter_mut()
                                    .try_for_each(|entry| body(entry.0, &mut *entry.1))
                            })
                        })
                        .collect();

                    let mut outcome = Ok(());
                    for handle in handles {
                        let result = handle
                            .join()
                            .unwrap_or_else(|e| std::panic::resume_unwind(e));
                        if outcome.is_ok() {
                            outcome = result;
                        }
                    }
                    outcome
                })
            }
            Backend::Directive => {
                let min_len = self.partition_len(data.len().div_ceil(chunk_len));
                self.install(|| {
                    data.par_chunks_mut(chunk_len)
                        .enumerate()
                        .with_min_len(min_len)
                        .try_for_each(|(i, chunk)| body(i, chunk))
                })
            }
            Backend::WorkStealing => self.install(|| {
                data.par_chunks_mut(chunk_len)
                    .enumerate()
                    .try_for_each(|(i, chunk)| body(i, chunk))
            }),
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("backend", &self.backend)
            .field("threads", &self.threads)
            .field("activations", &self.activations)
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Join the pool's workers before releasing the slot.
        drop(self.pool.take());
        log::info!("scheduler stopped: backend={}", self.backend);
        ACTIVE.store(false, Ordering::Release);
    }
}

/// Serialises unit tests that need the process-wide scheduler slot.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
