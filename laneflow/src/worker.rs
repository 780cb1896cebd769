//! Per-partition sequential dispatch.
//!
//! Each partition gets one worker task fed by its own bounded queue. A worker
//! handles its messages strictly one at a time in delivery order, deciding
//! acknowledge or reject before taking the next one. Workers for different
//! partitions run in parallel and share nothing but the handler.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::LaneflowError;
use crate::handler::{Delivery, InboundMessage, MessageHandler};

/// Delivery decision for one message, reported back to the transport.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// Partition of the message.
    pub partition: i32,
    /// Offset of the message.
    pub offset: i64,
    /// Acknowledge or reject.
    pub delivery: Delivery,
}

struct PartitionWorker {
    queue: mpsc::Sender<InboundMessage>,
    handle: JoinHandle<()>,
}

/// Routes inbound messages to one sequential worker per partition.
pub struct PartitionDispatcher {
    handler: Arc<MessageHandler>,
    queue_depth: usize,
    workers: HashMap<i32, PartitionWorker>,
    reports: mpsc::UnboundedSender<DeliveryReport>,
}

impl std::fmt::Debug for PartitionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionDispatcher")
            .field("queue_depth", &self.queue_depth)
            .field("partitions", &self.partitions())
            .finish_non_exhaustive()
    }
}

impl PartitionDispatcher {
    /// Creates a dispatcher and the receiver its delivery reports go to.
    ///
    /// `queue_depth` bounds each partition's queue and is raised to 1 if zero.
    #[must_use]
    pub fn new(
        handler: Arc<MessageHandler>,
        queue_depth: usize,
    ) -> (Self, mpsc::UnboundedReceiver<DeliveryReport>) {
        let (reports, reports_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            handler,
            queue_depth: queue_depth.max(1),
            workers: HashMap::new(),
            reports,
        };
        (dispatcher, reports_rx)
    }

    /// Returns the partitions that currently have a worker, sorted.
    #[must_use]
    pub fn partitions(&self) -> Vec<i32> {
        let mut partitions: Vec<i32> = self.workers.keys().copied().collect();
        partitions.sort_unstable();
        partitions
    }

    /// Queues a message on its partition's worker, starting the worker on
    /// first use. Waits while the queue is full.
    ///
    /// If the worker has stopped, the message is not queued and the worker is
    /// forgotten, so the next dispatch for the partition starts a fresh one.
    pub async fn dispatch(&mut self, message: InboundMessage) -> Result<(), LaneflowError> {
        let partition = message.partition;
        let offset = message.offset;
        let worker = self
            .workers
            .entry(partition)
            .or_insert_with(|| spawn_worker(partition, self.queue_depth, &self.handler, &self.reports));

        if worker.queue.send(message).await.is_ok() {
            return Ok(());
        }

        self.workers.remove(&partition);
        warn!(partition, offset, "Partition worker has stopped, message not queued");
        Err(LaneflowError::DispatcherClosed(format!(
            "worker for partition {partition} has stopped"
        )))
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        let handles: Vec<_> = self
            .workers
            .into_iter()
            .map(|(partition, worker)| {
                drop(worker.queue);
                (partition, worker.handle)
            })
            .collect();

        let partitions: Vec<i32> = handles.iter().map(|(p, _)| *p).collect();
        let results =
            futures::future::join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        for (partition, result) in partitions.into_iter().zip(results) {
            if let Err(e) = result {
                warn!(partition, error = %e, "Partition worker did not stop cleanly");
            }
        }
    }
}

fn spawn_worker(
    partition: i32,
    queue_depth: usize,
    handler: &Arc<MessageHandler>,
    reports: &mpsc::UnboundedSender<DeliveryReport>,
) -> PartitionWorker {
    let (queue, rx) = mpsc::channel(queue_depth);
    let handle = tokio::spawn(run_partition(
        partition,
        Arc::clone(handler),
        rx,
        reports.clone(),
    ));
    PartitionWorker { queue, handle }
}

async fn run_partition(
    partition: i32,
    handler: Arc<MessageHandler>,
    mut queue: mpsc::Receiver<InboundMessage>,
    reports: mpsc::UnboundedSender<DeliveryReport>,
) {
    debug!(partition, "Partition worker started");

    while let Some(message) = queue.recv().await {
        let offset = message.offset;
        let delivery = handler.on_message(&message).await;

        if reports
            .send(DeliveryReport {
                partition,
                offset,
                delivery,
            })
            .is_err()
        {
            warn!(partition, offset, "Delivery report receiver dropped, stopping worker");
            break;
        }
    }

    debug!(partition, "Partition worker stopped");
}
