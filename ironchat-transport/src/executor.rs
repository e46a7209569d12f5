//! Multi-threaded reactor.
//!
//! Every asynchronous completion (accept, read, write) of the server and the
//! client is dispatched on one [`Executor`]: a pool of worker threads
//! draining a shared Tokio runtime. Callbacks of distinct connections may run
//! concurrently on different workers.
//!
//! The runtime stays alive for as long as the `Executor` value does, even
//! with nothing in flight. Long-running loops observe
//! [`Executor::shutdown_token`] as their keep-alive marker and wind down once
//! it is cancelled.

use crate::error::TransportError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::{EnterGuard, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Name given to every executor thread.
pub const WORKER_THREAD_NAME: &str = "ironchat-worker";

/// Pool of worker threads draining a shared asynchronous operation queue.
pub struct Executor {
    runtime: Runtime,
    shutdown: CancellationToken,
    worker_threads: usize,
    live_threads: Arc<AtomicUsize>,
}

impl Executor {
    /// Starts an executor with `worker_threads` workers.
    ///
    /// # Errors
    /// Returns `TransportError` if `worker_threads` is zero or the runtime
    /// cannot be built.
    pub fn start(worker_threads: usize) -> Result<Self, TransportError> {
        if worker_threads == 0 {
            return Err(TransportError::executor(
                "worker thread count must be at least 1",
            ));
        }

        let live_threads = Arc::new(AtomicUsize::new(0));
        let started = Arc::clone(&live_threads);
        let stopped = Arc::clone(&live_threads);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(WORKER_THREAD_NAME)
            .enable_all()
            .on_thread_start(move || {
                let live = started.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::trace!(live, "executor thread started");
            })
            .on_thread_stop(move || {
                let live = stopped.fetch_sub(1, Ordering::SeqCst) - 1;
                tracing::trace!(live, "executor thread stopped");
            })
            .build()?;

        tracing::debug!("Executor started with {} worker threads", worker_threads);

        Ok(Self {
            runtime,
            shutdown: CancellationToken::new(),
            worker_threads,
            live_threads,
        })
    }

    /// Spawns a future onto the worker pool.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Runs a future to completion on the calling thread, with the worker
    /// pool available to anything it spawns.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Enters the runtime context, so that transport objects can register
    /// with the reactor from synchronous code.
    pub fn enter(&self) -> EnterGuard<'_> {
        self.runtime.enter()
    }

    /// Returns a handle to the runtime.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Returns the keep-alive marker. It is cancelled when `stop` begins.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns the configured number of worker threads.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Returns the number of executor threads currently alive, blocking-pool
    /// threads included.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.live_threads.load(Ordering::SeqCst)
    }

    /// Returns a counter tracking live executor threads that outlives the executor.
    #[must_use]
    pub fn live_threads_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_threads)
    }

    /// Signals shutdown and joins every worker thread.
    ///
    /// Tasks still pending are dropped, which closes any transport they own.
    /// Waits at most `grace` for threads to exit.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous context.
    pub fn stop(self, grace: Duration) {
        self.shutdown.cancel();
        self.runtime.shutdown_timeout(grace);
        tracing::debug!(
            live = self.live_threads.load(Ordering::SeqCst),
            "Executor stopped"
        );
    }

    /// Signals shutdown without waiting for the workers.
    ///
    /// Safe to call from within an asynchronous context.
    pub fn stop_background(self) {
        self.shutdown.cancel();
        self.runtime.shutdown_background();
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("worker_threads", &self.worker_threads)
            .field("live_threads", &self.live_threads())
            .field("stopping", &self.shutdown.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn test_zero_workers_rejected() {
        let err = Executor::start(0).unwrap_err();
        assert!(matches!(err, TransportError::Executor { .. }));
    }

    #[test]
    fn test_spawn_and_block_on() {
        let executor = Executor::start(2).unwrap();
        let handle = executor.spawn(async { 40 + 2 });

        assert_eq!(executor.block_on(handle).unwrap(), 42);
        assert_eq!(executor.worker_threads(), 2);
        executor.stop(Duration::from_secs(5));
    }

    #[test]
    fn test_tasks_run_on_named_workers() {
        let executor = Executor::start(3).unwrap();
        let names = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let names = Arc::clone(&names);
                executor.spawn(async move {
                    let name = std::thread::current().name().map(str::to_owned);
                    names.lock().unwrap().insert(name);
                })
            })
            .collect();
        for handle in handles {
            executor.block_on(handle).unwrap();
        }

        let names = names.lock().unwrap();
        assert!(
            names
                .iter()
                .all(|n| n.as_deref() == Some(WORKER_THREAD_NAME))
        );
        drop(names);
        executor.stop(Duration::from_secs(5));
    }

    #[test]
    fn test_stop_cancels_token_and_joins_threads() {
        let executor = Executor::start(2).unwrap();
        let token = executor.shutdown_token();
        let counter = executor.live_threads_counter();

        let waiter = executor.spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        assert!(!token.is_cancelled());

        executor.stop(Duration::from_secs(5));
        assert!(token.is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        drop(waiter);
    }

    #[test]
    fn test_idle_executor_keeps_running() {
        let executor = Executor::start(1).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // Nothing was in flight, yet new work still runs
        let handle = executor.spawn(async { "still alive" });
        assert_eq!(executor.block_on(handle).unwrap(), "still alive");
        executor.stop(Duration::from_secs(5));
    }

    #[test]
    fn test_enter_allows_reactor_registration() {
        let executor = Executor::start(1).unwrap();
        {
            let _guard = executor.enter();
            let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            std_listener.set_nonblocking(true).unwrap();
            assert!(tokio::net::TcpListener::from_std(std_listener).is_ok());
        }
        executor.stop(Duration::from_secs(5));
    }
}
