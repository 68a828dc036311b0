use std::{
    collections::VecDeque,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use rocket::{
    futures::{FutureExt, future::BoxFuture},
    tokio::{
        self,
        sync::{
            Notify,
            mpsc::{self, UnboundedReceiver, UnboundedSender},
            oneshot,
        },
    },
};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("inference queue is full")]
    Full,
    #[error("inference queue is closed")]
    Closed,
}

/// Returns `None` when whoever enqueued the job is no longer waiting for it.
type Job = Box<dyn FnOnce() -> Option<BoxFuture<'static, ()>> + Send>;

struct QueueInner {
    capacity: usize,
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
    started: AtomicBool,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded FIFO of inference jobs drained by a single worker task.
///
/// Exactly one job runs at a time, so model loading and generation never
/// overlap. Jobs are skipped when their caller has already gone away.
#[derive(Clone)]
pub struct InferenceQueue {
    inner: Arc<QueueInner>,
}

impl InferenceQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                capacity: capacity.max(1),
                jobs: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Jobs waiting to run; the one currently running is not counted.
    pub fn depth(&self) -> usize {
        lock(&self.inner.jobs).len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Spawn the worker on the current tokio runtime. Later calls are no-ops.
    pub fn start_worker(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(worker_loop(inner));
        info!(capacity = self.inner.capacity, "inference queue worker started");
    }

    /// Stop accepting work and drop everything still queued.
    pub fn shutdown(&self) {
        let dropped = {
            let mut jobs = lock(&self.inner.jobs);
            self.inner.closed.store(true, Ordering::SeqCst);
            let count = jobs.len();
            jobs.clear();
            count
        };
        self.inner.notify.notify_one();
        info!(dropped, "inference queue worker stopped");
    }

    /// Queue `task` and wait for its result.
    pub async fn enqueue<T, F, Fut>(&self, task: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            if tx.is_closed() {
                return None;
            }
            Some(
                async move {
                    let output = task().await;
                    let _ = tx.send(output);
                }
                .boxed(),
            )
        });
        self.push(job)?;
        rx.await.map_err(|_| QueueError::Closed)
    }

    /// Queue `task` and return the channel it will feed once it runs.
    ///
    /// The task receives the sending half; dropping the receiver before the
    /// job starts skips it, and afterwards makes every `send` fail.
    pub fn enqueue_stream<T, F, Fut>(&self, task: F) -> Result<UnboundedReceiver<T>, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(UnboundedSender<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let job: Job = Box::new(move || {
            if tx.is_closed() {
                return None;
            }
            Some(task(tx).boxed())
        });
        self.push(job)?;
        Ok(rx)
    }

    fn push(&self, job: Job) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        {
            let mut jobs = lock(&self.inner.jobs);
            // `shutdown` flips the flag under this lock.
            if self.is_closed() {
                return Err(QueueError::Closed);
            }
            if jobs.len() >= self.inner.capacity {
                return Err(QueueError::Full);
            }
            jobs.push_back(job);
            debug!(depth = jobs.len(), "job enqueued");
        }
        self.inner.notify.notify_one();
        Ok(())
    }
}

async fn worker_loop(inner: Arc<QueueInner>) {
    loop {
        if inner.closed.load(Ordering::SeqCst) {
            break;
        }
        let next = lock(&inner.jobs).pop_front();
        let Some(job) = next else {
            inner.notify.notified().await;
            continue;
        };
        let Some(run) = job() else {
            debug!("skipping job whose caller went away");
            continue;
        };
        if AssertUnwindSafe(run).catch_unwind().await.is_err() {
            error!("inference job panicked");
        }
    }
}
