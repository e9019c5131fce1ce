//! Ordered hand-off from change notifications to a single serial worker
//!
//! Producers (watcher callbacks, the startup sweep) push raw paths through a
//! cloneable [`PipelineHandle`]. One dedicated thread pops them in FIFO
//! order and runs the processor on each, end to end, before taking the
//! next. Shutdown closes the queue to new paths and then waits for every
//! path that was already accepted to be processed.

use crate::engine::{Organizer, Outcome, ProcessingStats};
use crate::error::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SendError, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace};

/// Work run by the pipeline worker for each queued path
pub trait ItemProcessor: Send + 'static {
    fn process(&mut self, path: &Path) -> Result<Outcome>;
}

impl ItemProcessor for Organizer {
    fn process(&mut self, path: &Path) -> Result<Outcome> {
        Organizer::process(self, path)
    }
}

enum QueueSender {
    Unbounded(Sender<PathBuf>),
    Bounded(SyncSender<PathBuf>),
}

impl QueueSender {
    fn send(&self, path: PathBuf) -> std::result::Result<(), SendError<PathBuf>> {
        match self {
            QueueSender::Unbounded(tx) => tx.send(path),
            QueueSender::Bounded(tx) => tx.send(path),
        }
    }
}

/// Producer side of the pipeline; cheap to clone and share across threads
#[derive(Clone)]
pub struct PipelineHandle {
    sender: Arc<Mutex<Option<QueueSender>>>,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

impl PipelineHandle {
    fn lock(&self) -> MutexGuard<'_, Option<QueueSender>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a path for processing
    ///
    /// Fails once shutdown has begun. A path accepted here is always
    /// processed before shutdown completes. With a bounded queue this
    /// blocks while the queue is full.
    pub fn enqueue(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let guard = self.lock();
        let sender = guard.as_ref().ok_or(Error::PipelineClosed)?;
        trace!(?path, "Queued path");
        sender.send(path).map_err(|_| Error::PipelineClosed)
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().is_some()
    }

    /// Stop accepting new paths; queued paths are still processed
    fn close(&self) {
        self.lock().take();
    }
}

/// A running pipeline: the queue plus its worker thread
#[derive(Debug)]
pub struct Pipeline {
    handle: PipelineHandle,
    worker: JoinHandle<()>,
    stats: Arc<ProcessingStats>,
}

impl Pipeline {
    /// Spawn the worker thread
    ///
    /// `capacity` bounds the queue; `None` gives an unbounded queue whose
    /// producers never block.
    pub fn start<P: ItemProcessor>(processor: P, capacity: Option<usize>) -> Result<Self> {
        let (sender, receiver) = match capacity {
            Some(bound) => {
                let (tx, rx) = mpsc::sync_channel(bound);
                (QueueSender::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (QueueSender::Unbounded(tx), rx)
            }
        };

        let stats = Arc::new(ProcessingStats::new());
        let worker_stats = Arc::clone(&stats);
        let worker = thread::Builder::new()
            .name("organizer-worker".into())
            .spawn(move || run_worker(processor, receiver, worker_stats))?;

        debug!(?capacity, "Pipeline started");

        Ok(Self {
            handle: PipelineHandle {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            worker,
            stats,
        })
    }

    /// A producer handle for this pipeline
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Stop accepting paths, drain everything already queued, and stop the worker
    pub fn shutdown(self) -> ProcessingStats {
        info!("Shutting down pipeline, draining queued items");
        self.handle.close();

        if self.worker.join().is_err() {
            error!("Pipeline worker terminated abnormally");
        }

        let stats = (*self.stats).clone();
        info!("{}", stats.summary());
        stats
    }
}

fn run_worker<P: ItemProcessor>(
    mut processor: P,
    receiver: Receiver<PathBuf>,
    stats: Arc<ProcessingStats>,
) {
    // Ends once the queue is closed and empty
    for path in receiver {
        let result = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&path)));

        match result {
            Ok(Ok(outcome)) => {
                trace!(?path, ?outcome, "Processed item");
                stats.record(&outcome);
            }
            Ok(Err(e)) => {
                error!(?path, error = %e, "Failed to process file");
                stats.record_failure();
            }
            Err(payload) => {
                error!(?path, reason = panic_message(&*payload), "Processing panicked");
                stats.record_failure();
            }
        }
    }

    debug!("Pipeline worker drained");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
