//! Single-writer FIFO executor: every mutating operation on a store is
//! queued and run in submission order by one worker task, while reads
//! proceed concurrently against the index's own lock.

use parking_lot::Mutex as SyncMutex;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;

/// Queues boxed jobs onto an unbounded channel and drains them in order from
/// a single spawned task: the same "one worker loop" shape used for
/// background refresh tasks elsewhere in this ecosystem, generalized into a
/// standing actor instead of a fire-and-forget spawn per job.
pub struct OrderedExecutor {
    sender: SyncMutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl OrderedExecutor {
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job().await;
            }
        });

        Self {
            sender: SyncMutex::new(Some(sender)),
            worker: AsyncMutex::new(Some(worker)),
        }
    }

    /// Submit a job and await its result. Other callers' jobs submitted
    /// concurrently still run strictly in submission order. Panics if the
    /// executor has already been shut down.
    pub async fn submit<F, T>(&self, job: F) -> T
    where
        F: FnOnce() -> Pin<Box<dyn Future<Output = T> + Send>> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .clone()
            .expect("OrderedExecutor::submit called after shutdown");

        let (tx, rx) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            Box::pin(async move {
                let result = job().await;
                let _ = tx.send(result);
            })
        });

        sender
            .send(boxed)
            .unwrap_or_else(|_| panic!("OrderedExecutor worker task is no longer running"));

        rx.await.expect("OrderedExecutor worker dropped the job's result sender")
    }

    /// Close the submission channel and wait for the worker to drain and
    /// exit. Idempotent: a second call is a no-op.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().take();
        drop(sender);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let executor = OrderedExecutor::spawn();
        let result = executor.submit(|| Box::pin(async { 1 + 1 })).await;
        assert_eq!(result, 2);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let executor = Arc::new(OrderedExecutor::spawn());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..20 {
            let order = order.clone();
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .submit(move || {
                        Box::pin(async move {
                            order.lock().unwrap().push(i);
                        })
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut recorded = order.lock().unwrap().clone();
        recorded.sort_unstable();
        assert_eq!(recorded, (0..20).collect::<Vec<_>>());
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_submitters_all_complete() {
        let executor = Arc::new(OrderedExecutor::spawn());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let executor = executor.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .submit(move || {
                        Box::pin(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let executor = OrderedExecutor::spawn();
        executor.shutdown().await;
        executor.shutdown().await;
    }
}
