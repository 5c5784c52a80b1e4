//! The shared worker pool for CPU-bound occlusion tasks.
//!
//! A thin wrapper over a bounded rayon pool: tasks enter a FIFO queue, the
//! submitter keeps a [`TaskHandle`] and awaits it, and dropping the pool
//! joins the workers once queued tasks have run out.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{ArmorViewError, Result};

pub struct WorkerPool {
    inner: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("armor-worker-{i}"))
            // A panicking task must not take the pool down with it; the
            // submitter learns about the abort through its dropped handle.
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%message, "worker task panicked");
            })
            .build()
            .map_err(|e| ArmorViewError::Worker(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn workers(&self) -> usize {
        self.inner.current_num_threads()
    }

    /// Queues a task and hands back a handle resolving to its result.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.inner.spawn_fifo(move || {
            let _ = sender.send(task());
        });
        TaskHandle { receiver }
    }
}

pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.map_err(|_| ArmorViewError::Worker("task aborted before completing".into()))
        })
    }
}
