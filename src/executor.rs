//! Background execution context.
//!
//! Every subscriber and publish call runs inside a current-thread tokio
//! runtime driven by one dedicated OS thread. Callers stay synchronous: they
//! either [`spawn`](BackgroundExecutor::spawn) work and walk away, or
//! [`run`](BackgroundExecutor::run) it and block on a handoff channel until
//! the result comes back.

use std::future::Future;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

const THREAD_NAME: &str = "yakapi-executor";

/// Errors produced while starting or using the background executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The tokio runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The executor thread could not be spawned.
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The executor stopped before the operation completed.
    #[error("executor stopped")]
    Stopped,
}

/// Dedicated thread running a cooperative task scheduler.
///
/// Dropping the executor shuts the runtime down: every task still running on
/// it is cancelled at its next suspension point.
#[derive(Debug)]
pub struct BackgroundExecutor {
    handle: Handle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundExecutor {
    /// Builds the runtime and starts the thread that drives it.
    pub fn start() -> Result<Self, ExecutorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutorError::Runtime)?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!(event = "executor_started");
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                drop(runtime);
                debug!(event = "executor_stopped");
            })
            .map_err(ExecutorError::Spawn)?;

        Ok(Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Runtime handle for code that needs to spawn onto the executor directly.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a task on the executor without waiting for it.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Runs `future` on the executor and blocks the calling thread until it
    /// completes.
    ///
    /// Must not be called from a task running on this executor: the calling
    /// thread is the one that would have to make progress.
    pub fn run<F, T>(&self, future: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        self.handle.spawn(async move {
            let _ = result_tx.send(future.await);
        });
        result_rx.recv().map_err(|_| ExecutorError::Stopped)
    }

    /// Stops the runtime and waits for the executor thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            let _ = thread.join();
        }
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}
