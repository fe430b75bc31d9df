//! Worker queue that performs preload requests.
//!
//! - Bounded worker pool (1-4 threads) fetching and decoding images
//! - Duplicate URLs already pending or cached are skipped
//! - Failures are logged and reported in the result, never raised
//! - Uses flume between the caller and the workers

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use flume::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use super::cache::{DecodedImage, ImageCache, DEFAULT_MAX_MEMORY_MB};
use super::source::{decode_image, ImageSource};

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 4;

/// Maximum number of pending requests in the queue.
const MAX_QUEUE_SIZE: usize = 256;

/// Why a request was issued. Ordered by issue precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreloadStage {
    Critical,
    NextBatch,
    Scroll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadRequest {
    pub url: String,
    /// Position of the artwork in the gallery.
    pub index: usize,
    pub stage: PreloadStage,
}

impl PreloadRequest {
    pub fn new(url: impl Into<String>, index: usize, stage: PreloadStage) -> Self {
        Self {
            url: url.into(),
            index,
            stage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreloadResult {
    pub url: String,
    pub index: usize,
    pub stage: PreloadStage,
    pub width: u32,
    pub height: u32,
    /// Time from dequeue to decoded.
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl PreloadResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Anything that accepts preload requests.
pub trait PreloadSink {
    /// Returns false when the request was dropped or deduplicated.
    fn submit(&self, request: PreloadRequest) -> bool;
}

impl<T: PreloadSink + ?Sized> PreloadSink for &T {
    fn submit(&self, request: PreloadRequest) -> bool {
        (**self).submit(request)
    }
}

impl<T: PreloadSink + ?Sized> PreloadSink for Box<T> {
    fn submit(&self, request: PreloadRequest) -> bool {
        (**self).submit(request)
    }
}

impl<T: PreloadSink + ?Sized> PreloadSink for Rc<T> {
    fn submit(&self, request: PreloadRequest) -> bool {
        (**self).submit(request)
    }
}

impl<T: PreloadSink + ?Sized> PreloadSink for Arc<T> {
    fn submit(&self, request: PreloadRequest) -> bool {
        (**self).submit(request)
    }
}

pub struct PreloadQueue {
    request_tx: Sender<PreloadRequest>,
    result_rx: Receiver<PreloadResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
    /// URLs submitted and not yet finished.
    pending: Arc<RwLock<HashSet<String>>>,
    cache: ImageCache,
}

impl PreloadQueue {
    /// Create a queue with its own cache of the default size.
    pub fn new(workers: usize, source: Arc<dyn ImageSource>) -> Result<Self> {
        Self::with_cache(workers, source, ImageCache::new(DEFAULT_MAX_MEMORY_MB))
    }

    pub fn with_cache(workers: usize, source: Arc<dyn ImageSource>, cache: ImageCache) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));
        let active_workers = Arc::new(AtomicUsize::new(0));
        let pending = Arc::new(RwLock::new(HashSet::new()));

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let worker = Worker {
                id: worker_id,
                rx: request_rx.clone(),
                tx: result_tx.clone(),
                shutdown: Arc::clone(&shutdown),
                active: Arc::clone(&active_workers),
                pending: Arc::clone(&pending),
                cache: cache.clone(),
                source: Arc::clone(&source),
            };
            let handle = thread::Builder::new()
                .name(format!("preload-worker-{worker_id}"))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }

        debug!(num_workers, "Started preload worker queue");

        Ok(Self {
            request_tx,
            result_rx,
            workers: handles,
            shutdown,
            active_workers,
            pending,
            cache,
        })
    }

    /// Submit a request. Returns false if the queue is full or the URL is pending or cached.
    pub fn request(&self, req: PreloadRequest) -> bool {
        if self.shutdown.load(Ordering::Relaxed) {
            return false;
        }
        if self.cache.contains(&req.url) {
            trace!(url = %req.url, "Image already cached");
            return false;
        }
        if !self.pending.write().insert(req.url.clone()) {
            trace!(url = %req.url, "Request already pending");
            return false;
        }

        match self.request_tx.try_send(req) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(req)) => {
                warn!(url = %req.url, "Preload queue full, dropping request");
                self.pending.write().remove(&req.url);
                false
            }
            Err(flume::TrySendError::Disconnected(req)) => {
                error!("Preload queue disconnected");
                self.pending.write().remove(&req.url);
                false
            }
        }
    }

    pub fn request_batch(&self, requests: Vec<PreloadRequest>) -> usize {
        requests.into_iter().filter(|req| self.request(req.clone())).count()
    }

    /// Drain completed results without blocking.
    pub fn poll_results(&self) -> Vec<PreloadResult> {
        self.result_rx.try_iter().collect()
    }

    /// Block until every pending request has finished or `timeout` passes.
    /// Returns all results received meanwhile.
    pub fn wait_idle(&self, timeout: Duration) -> Vec<PreloadResult> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::new();
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.result_rx.recv_timeout(remaining.min(Duration::from_millis(20))) {
                Ok(result) => results.push(result),
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            }
        }
        results.extend(self.result_rx.try_iter());
        results
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.read().is_empty() || self.active_worker_count() > 0
    }

    /// Forget pending URLs so they may be resubmitted.
    ///
    /// Requests already handed to workers still complete.
    pub fn cancel_all(&self) {
        self.pending.write().clear();
        debug!("Cancelled all pending preload requests");
    }

    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Shutting down preload queue");
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Preload queue shutdown complete");
    }
}

impl PreloadSink for PreloadQueue {
    fn submit(&self, request: PreloadRequest) -> bool {
        self.request(request)
    }
}

impl Drop for PreloadQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    id: usize,
    rx: Receiver<PreloadRequest>,
    tx: Sender<PreloadResult>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    pending: Arc<RwLock<HashSet<String>>>,
    cache: ImageCache,
    source: Arc<dyn ImageSource>,
}

impl Worker {
    fn run(self) {
        debug!(worker_id = self.id, "Preload worker started");

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match self.rx.recv_timeout(Duration::from_millis(100)) {
                Ok(req) => {
                    self.active.fetch_add(1, Ordering::Relaxed);
                    let result = self.process(&req);
                    self.pending.write().remove(&req.url);
                    if let Err(e) = self.tx.send(result) {
                        trace!(worker_id = self.id, error = ?e, "Result receiver gone");
                    }
                    self.active.fetch_sub(1, Ordering::Relaxed);
                }
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(worker_id = self.id, "Preload worker stopped");
    }

    fn process(&self, req: &PreloadRequest) -> PreloadResult {
        trace!(url = %req.url, stage = ?req.stage, "Processing preload request");
        let started = Instant::now();

        let outcome = self
            .source
            .fetch(&req.url)
            .and_then(|bytes| decode_image(&bytes))
            .map(|img| DecodedImage::new(img.to_rgba8()));

        match outcome {
            Ok(decoded) => {
                let (width, height) = (decoded.width, decoded.height);
                self.cache.insert(&req.url, decoded);
                PreloadResult {
                    url: req.url.clone(),
                    index: req.index,
                    stage: req.stage,
                    width,
                    height,
                    elapsed: started.elapsed(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(url = %req.url, error = ?e, "Image preload failed");
                PreloadResult {
                    url: req.url.clone(),
                    index: req.index,
                    stage: req.stage,
                    width: 0,
                    height: 0,
                    elapsed: started.elapsed(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Builder for [`PreloadQueue`].
pub struct PreloadQueueBuilder {
    workers: usize,
    max_memory_mb: usize,
    cache: Option<ImageCache>,
}

impl PreloadQueueBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            cache: None,
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    /// Share an existing cache instead of creating one.
    pub fn cache(mut self, cache: ImageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self, source: Arc<dyn ImageSource>) -> Result<PreloadQueue> {
        let cache = self
            .cache
            .unwrap_or_else(|| ImageCache::new(self.max_memory_mb));
        PreloadQueue::with_cache(self.workers, source, cache)
    }
}

impl Default for PreloadQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preload::source::png_bytes;
    use anyhow::bail;

    struct MemorySource;

    impl ImageSource for MemorySource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if url.contains("broken") {
                bail!("connection reset");
            }
            Ok(png_bytes(8, 4))
        }
    }

    fn queue() -> PreloadQueue {
        PreloadQueueBuilder::new().workers(2).build(Arc::new(MemorySource)).unwrap()
    }

    #[test]
    fn test_stage_ordering() {
        assert!(PreloadStage::Critical < PreloadStage::NextBatch);
        assert!(PreloadStage::NextBatch < PreloadStage::Scroll);
    }

    #[test]
    fn test_requests_decode_into_cache() {
        let queue = queue();
        let submitted = queue.request_batch(vec![
            PreloadRequest::new("/a.png", 0, PreloadStage::Critical),
            PreloadRequest::new("/b.png", 1, PreloadStage::Critical),
        ]);
        assert_eq!(submitted, 2);

        let results = queue.wait_idle(Duration::from_secs(5));
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(PreloadResult::is_ok));
        assert_eq!(queue.cache().get("/a.png").map(|i| (i.width, i.height)), Some((8, 4)));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_and_cached_requests_are_skipped() {
        let queue = queue();
        assert!(queue.request(PreloadRequest::new("/a.png", 0, PreloadStage::Critical)));
        queue.wait_idle(Duration::from_secs(5));

        assert!(!queue.request(PreloadRequest::new("/a.png", 0, PreloadStage::Scroll)));
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let queue = queue();
        assert!(queue.request(PreloadRequest::new("/broken.png", 3, PreloadStage::NextBatch)));

        let results = queue.wait_idle(Duration::from_secs(5));
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_ok());
        assert_eq!(results[0].index, 3);
        assert!(!queue.cache().contains("/broken.png"));

        // A failed URL may be retried.
        assert!(queue.request(PreloadRequest::new("/broken.png", 3, PreloadStage::Scroll)));
    }

    #[test]
    fn test_shutdown_rejects_new_requests() {
        let mut queue = queue();
        queue.shutdown();
        assert!(!queue.request(PreloadRequest::new("/late.png", 0, PreloadStage::Scroll)));
    }
}
