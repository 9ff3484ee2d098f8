//! # Ingestion Queue
//!
//! Strict FIFO drained by a single worker task. A job is fully processed,
//! storage commit included, before the next one is dequeued. Failures are
//! forwarded to the node handle and never retried.

use crate::domain::entities::{short_hex, Block};
use crate::domain::errors::BlockServiceError;
use crate::domain::value_objects::BlockOutcome;
use crate::service::processor::ChainProcessor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type JobResult = Result<BlockOutcome, BlockServiceError>;

/// Work item for the ingestion worker.
#[derive(Debug)]
pub(crate) enum Job {
    /// A block from push delivery or sync fetch.
    Block(Block),
    /// Verify the tip against the header chain, unwinding if needed.
    CheckTip,
}

struct QueuedJob {
    job: Job,
    done: Option<oneshot::Sender<JobResult>>,
    pending: PendingGuard,
}

/// Counts a job as pending until the job is dropped, even if the worker
/// dies with it.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(pending: &Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self(pending.clone())
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Producer side of the ingestion queue.
#[derive(Clone)]
pub struct IngestionQueue {
    sender: mpsc::UnboundedSender<QueuedJob>,
    pending: Arc<AtomicUsize>,
}

impl IngestionQueue {
    /// Spawn the worker draining into `processor`.
    pub(crate) fn spawn(processor: Arc<ChainProcessor>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(processor, receiver));
        (Self { sender, pending }, worker)
    }

    /// Append a block; the outcome is only logged.
    pub fn enqueue(&self, block: Block) {
        let hash = block.hash();
        if self.submit(Job::Block(block), None).is_err() {
            warn!("[qc-02] queue closed, dropping block {}", short_hex(&hash));
        }
    }

    /// Append a block and wait for its outcome.
    pub async fn process(&self, block: Block) -> JobResult {
        self.submit_and_wait(Job::Block(block)).await
    }

    /// Queue a tip check behind every block already queued.
    pub async fn check_tip(&self) -> JobResult {
        self.submit_and_wait(Job::CheckTip).await
    }

    /// Jobs queued or in flight.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// True when nothing is queued or in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Poll until the queue length reaches zero.
    ///
    /// Jobs enqueued after this returns are not covered.
    pub async fn wait_until_drained(&self, poll: Duration) {
        while !self.is_empty() {
            tokio::time::sleep(poll).await;
        }
    }

    async fn submit_and_wait(&self, job: Job) -> JobResult {
        let (done, result) = oneshot::channel();
        self.submit(job, Some(done))?;
        result.await.map_err(|_| BlockServiceError::QueueClosed)?
    }

    fn submit(
        &self,
        job: Job,
        done: Option<oneshot::Sender<JobResult>>,
    ) -> Result<(), BlockServiceError> {
        let queued = QueuedJob {
            job,
            done,
            pending: PendingGuard::new(&self.pending),
        };
        if self.sender.send(queued).is_err() {
            return Err(BlockServiceError::QueueClosed);
        }
        Ok(())
    }
}

async fn run_worker(
    processor: Arc<ChainProcessor>,
    mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
) {
    info!("[qc-02] Block ingestion worker started");

    while let Some(QueuedJob {
        job,
        done,
        pending,
    }) = receiver.recv().await
    {
        let result = processor.handle(job).await;

        match &result {
            Ok(outcome) => debug!(?outcome, "[qc-02] block event completed"),
            Err(e) => processor.node.handle_error(e),
        }

        drop(pending);
        if let Some(done) = done {
            let _ = done.send(result);
        }
    }

    info!("[qc-02] Ingestion queue closed, exiting");
}
