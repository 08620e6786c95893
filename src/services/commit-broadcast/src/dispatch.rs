//! Background dispatch of broadcast jobs
//!
//! Accepted deliveries are pushed onto a bounded queue and handled by a fixed
//! pool of workers. Each job runs summarize, generate and publish; failures
//! end up in the logs and the `failed` counter, never back at the sender.

use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::{BroadcastError, BroadcastResult};
use crate::mode::PublishProfile;
use crate::models::PushEvent;
use crate::publishing::{ChannelPublisher, PostGenerator};
use crate::webhook::summary::summarize;

/// One accepted delivery waiting to be broadcast
#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub delivery_id: String,
    pub tenant_id: Option<Uuid>,
    pub event: PushEvent,
    pub profile: PublishProfile,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full")]
    QueueFull,
    #[error("dispatch queue is closed")]
    QueueClosed,
}

#[derive(Debug, Default)]
struct DispatchStats {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub enqueued: u64,
    pub rejected: u64,
    pub published: u64,
    pub failed: u64,
}

/// Cloneable producer side of the queue
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<BroadcastJob>,
    stats: Arc<DispatchStats>,
}

impl DispatchHandle {
    /// Queue a job without waiting for capacity.
    pub fn enqueue(&self, job: BroadcastJob) -> Result<(), DispatchError> {
        match self.sender.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(DispatchError::QueueClosed)
            }
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            published: self.stats.published.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

/// Shared pieces every worker needs
#[derive(Clone)]
struct Pipeline {
    generator: Arc<dyn PostGenerator>,
    publisher: Arc<dyn ChannelPublisher>,
    step_timeout: Duration,
}

pub struct Dispatcher {
    handle: DispatchHandle,
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Spawn the worker pool.
    pub fn start(
        config: &DispatchConfig,
        generator: Arc<dyn PostGenerator>,
        publisher: Arc<dyn ChannelPublisher>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(DispatchStats::default());
        let shutdown = CancellationToken::new();
        let pipeline = Pipeline {
            generator,
            publisher,
            step_timeout: Duration::from_secs(config.step_timeout_seconds),
        };

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    pipeline.clone(),
                    stats.clone(),
                    shutdown.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            queue_capacity = config.queue_capacity,
            "Dispatch workers started"
        );

        Self {
            handle: DispatchHandle { sender, stats },
            workers,
            shutdown,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Stop accepting jobs, finish everything already queued, join the workers.
    pub async fn shutdown(self) -> DispatchSnapshot {
        info!("Draining dispatch queue");
        self.shutdown.cancel();

        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!(error = %e, "Dispatch worker panicked");
            }
        }

        let snapshot = self.handle.snapshot();
        info!(
            published = snapshot.published,
            failed = snapshot.failed,
            "Dispatch workers stopped"
        );
        snapshot
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<BroadcastJob>>>,
    pipeline: Pipeline,
    stats: Arc<DispatchStats>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            if shutdown.is_cancelled() {
                receiver.close();
                receiver.recv().await
            } else {
                tokio::select! {
                    biased;
                    job = receiver.recv() => job,
                    _ = shutdown.cancelled() => {
                        receiver.close();
                        receiver.recv().await
                    }
                }
            }
        };

        let Some(job) = next else {
            break;
        };

        let span = tracing::info_span!(
            "broadcast",
            worker_id,
            delivery_id = %job.delivery_id,
            tenant_id = tracing::field::Empty,
            repository = %job.event.repository.name,
            commit_count = job.event.commits.len(),
        );
        if let Some(tenant_id) = job.tenant_id {
            span.record("tenant_id", tracing::field::display(tenant_id));
        }

        async {
            match process_job(&job, &pipeline).await {
                Ok(()) => {
                    stats.published.fetch_add(1, Ordering::Relaxed);
                    info!("Post published");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Broadcast failed");
                }
            }
        }
        .instrument(span)
        .await;
    }
}

/// Summarize, generate and publish one job.
async fn process_job(job: &BroadcastJob, pipeline: &Pipeline) -> BroadcastResult<()> {
    let summary = summarize(&job.event, job.profile.max_commits);
    let seconds = pipeline.step_timeout.as_secs();

    let post = tokio::time::timeout(
        pipeline.step_timeout,
        pipeline
            .generator
            .generate(&summary, &job.event.repository.name, &job.profile),
    )
    .await
    .map_err(|_| BroadcastError::timeout("post generation", seconds))??;

    tokio::time::timeout(
        pipeline.step_timeout,
        pipeline.publisher.publish(
            &job.profile.telegram_bot_token,
            &job.profile.telegram_channel_id,
            &post,
        ),
    )
    .await
    .map_err(|_| BroadcastError::timeout("channel publish", seconds))??;

    Ok(())
}
