//! OCR worker pool
//!
//! A fixed set of workers, each owning one engine, consuming jobs from a
//! shared bounded queue. Every submitted job resolves to a [`PageResult`]
//! tagged with its page number; engine errors, panics and timeouts degrade
//! that page only.
//!
//! # Lifecycle
//!
//! Engines are created up front by [`OcrWorkerPool::initialize`].
//! [`OcrWorkerPool::shutdown`] closes the queue, lets in-flight jobs drain
//! and waits for every worker to terminate its engine. Dropping the pool
//! without calling `shutdown` (e.g. when the owning future is cancelled)
//! still closes the queue; workers then finish their current job, skip
//! queued jobs nobody is waiting for, and terminate their engines in the
//! background. Values handed to [`OcrWorkerPool::retain_until_retired`]
//! are released only after the last worker has retired, on both paths.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::engine::{OcrEngine, OcrEngineFactory};
use super::types::{OcrJob, PageResult};

/// Job with its completion channel
struct QueuedJob {
    job: OcrJob,
    reply: oneshot::Sender<PageResult>,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<QueuedJob>>>;

/// Bounded pool of OCR workers
pub struct OcrWorkerPool {
    queue: Option<mpsc::Sender<QueuedJob>>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
    /// Dropped once every worker has retired
    retained: Vec<Box<dyn Send + Sync>>,
}

impl OcrWorkerPool {
    /// Start `worker_count` workers (at least one), each with its own engine
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(
        worker_count: usize,
        factory: &dyn OcrEngineFactory,
        job_timeout: Duration,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::channel(worker_count * 2);
        let receiver: SharedQueue = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let engine = factory.create(worker_id);
                tokio::spawn(run_worker(worker_id, engine, receiver.clone(), job_timeout))
            })
            .collect();

        tracing::debug!("OCR worker pool started with {} workers", worker_count);

        Self {
            queue: Some(sender),
            workers,
            worker_count,
            retained: Vec::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.queue.is_none()
    }

    /// Keep `value` alive until the last worker has retired
    ///
    /// Used for resources the jobs read from, such as the directory holding
    /// page images.
    pub fn retain_until_retired<T: Send + Sync + 'static>(&mut self, value: T) {
        self.retained.push(Box::new(value));
    }

    /// Run one job and wait for its result
    pub async fn submit(&self, job: OcrJob) -> PageResult {
        let page_number = job.page_number;

        let Some(queue) = &self.queue else {
            tracing::warn!("OCR pool already shut down, page {} not processed", page_number);
            return PageResult::failed(page_number);
        };

        let (reply, result) = oneshot::channel();
        if queue.send(QueuedJob { job, reply }).await.is_err() {
            tracing::warn!("OCR queue closed, page {} not processed", page_number);
            return PageResult::failed(page_number);
        }

        result.await.unwrap_or_else(|_| {
            tracing::warn!("OCR worker dropped page {} without a result", page_number);
            PageResult::failed(page_number)
        })
    }

    /// Run all jobs concurrently across the workers
    ///
    /// Results come back in submission order; each carries its page number.
    pub async fn submit_all(&self, jobs: Vec<OcrJob>) -> Vec<PageResult> {
        join_all(jobs.into_iter().map(|job| self.submit(job))).await
    }

    /// Close the queue and wait for every worker to release its engine
    ///
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&mut self) {
        let Some(queue) = self.queue.take() else {
            return;
        };
        drop(queue);

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if let Err(e) = handle.await {
                tracing::warn!("OCR worker {} ended abnormally: {}", worker_id, e);
            }
        }

        self.retained.clear();
        tracing::debug!("OCR worker pool shut down ({} workers)", self.worker_count);
    }
}

impl Drop for OcrWorkerPool {
    fn drop(&mut self) {
        if self.queue.take().is_none() {
            return;
        }
        tracing::debug!("OCR worker pool dropped without shutdown, workers will drain");

        let workers = std::mem::take(&mut self.workers);
        let retained = std::mem::take(&mut self.retained);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    for handle in workers {
                        let _ = handle.await;
                    }
                    drop(retained);
                });
            }
            // Workers died with their runtime
            Err(_) => drop(retained),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    engine: Box<dyn OcrEngine>,
    queue: SharedQueue,
    job_timeout: Duration,
) {
    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };

        let Some(QueuedJob { job, reply }) = next else {
            break;
        };

        if reply.is_closed() {
            tracing::debug!("Skipping page {}: caller went away", job.page_number);
            continue;
        }

        let result = recognize_page(engine.as_ref(), &job, job_timeout).await;
        let _ = reply.send(result);
    }

    engine.terminate().await;
    tracing::debug!("OCR worker {} ({}) retired", worker_id, engine.name());
}

async fn recognize_page(engine: &dyn OcrEngine, job: &OcrJob, job_timeout: Duration) -> PageResult {
    let page_number = job.page_number;
    let attempt = AssertUnwindSafe(engine.recognize(&job.image)).catch_unwind();

    match timeout(job_timeout, attempt).await {
        Ok(Ok(Ok(text))) => {
            tracing::debug!("Page {}: extracted {} chars", page_number, text.len());
            PageResult::succeeded(page_number, text)
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!("Page {}: OCR failed: {}", page_number, e);
            PageResult::failed(page_number)
        }
        Ok(Err(_)) => {
            tracing::warn!("Page {}: OCR engine panicked", page_number);
            PageResult::failed(page_number)
        }
        Err(_) => {
            tracing::warn!(
                "Page {}: OCR timed out after {:?}",
                page_number,
                job_timeout
            );
            PageResult::failed(page_number)
        }
    }
}
