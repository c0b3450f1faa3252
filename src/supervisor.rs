//! Background task lifecycle: a group of actors started together and stopped
//! together through a cooperative request/acknowledge handshake.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Create a connected stop handle / stop signal pair.
#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (requests, receiver) = mpsc::channel(1);
    (StopHandle { requests }, StopSignal { requests: receiver })
}

/// Requester side of the stop handshake.
#[derive(Debug, Clone)]
pub struct StopHandle {
    requests: mpsc::Sender<oneshot::Sender<()>>,
}

impl StopHandle {
    /// Ask the owning loop to stop and wait until it acknowledges.
    ///
    /// Returns immediately if the loop has already gone away.
    pub async fn request_stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.requests.send(ack_tx).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

/// Loop side of the stop handshake.
#[derive(Debug)]
pub struct StopSignal {
    requests: mpsc::Receiver<oneshot::Sender<()>>,
}

impl StopSignal {
    /// Wait for the next stop request. Cancel-safe.
    ///
    /// Returns `None` once every [`StopHandle`] has been dropped.
    pub async fn requested(&mut self) -> Option<StopAck> {
        self.requests.recv().await.map(|ack| StopAck { ack })
    }
}

/// Pending acknowledgement for one stop request.
#[derive(Debug)]
pub struct StopAck {
    ack: oneshot::Sender<()>,
}

impl StopAck {
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// A long-running unit of background work.
#[async_trait]
pub trait Actor: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run until a stop request arrives through [`Actor::stop_handle`].
    async fn run(&mut self) -> anyhow::Result<()>;

    fn stop_handle(&self) -> StopHandle;
}

/// Actors registered during configuration, run together on the tokio runtime.
#[derive(Default)]
pub struct TaskGroup {
    actors: Vec<Box<dyn Actor>>,
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.actors.iter().map(|actor| actor.name()).collect();
        f.debug_struct("TaskGroup").field("actors", &names).finish()
    }
}

impl TaskGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<A: Actor>(&mut self, actor: A) {
        tracing::debug!(actor = actor.name(), "Registered background task");
        self.actors.push(Box::new(actor));
    }

    /// Move every actor of `other` into this group.
    pub fn merge(&mut self, other: TaskGroup) {
        self.actors.extend(other.actors);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Spawn every actor, then wait for `shutdown` or for the first actor to
    /// exit. Every actor is asked to stop exactly once before this returns.
    ///
    /// The first actor failure (error or panic) is returned.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut tasks = JoinSet::new();
        let mut stoppers = Vec::with_capacity(self.actors.len());

        for mut actor in self.actors {
            let name = actor.name();
            stoppers.push((name, actor.stop_handle()));
            tasks.spawn(async move { (name, actor.run().await) });
        }

        tracing::info!(tasks = stoppers.len(), "Task group started");

        let mut first_error = None;
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::debug!("Task group shutdown requested");
            }
            Some(joined) = tasks.join_next() => {
                record_exit(joined, &mut first_error);
            }
        }

        for (name, stopper) in stoppers {
            stopper.request_stop().await;
            tracing::debug!(actor = name, "Background task stopped");
        }

        while let Some(joined) = tasks.join_next().await {
            record_exit(joined, &mut first_error);
        }

        tracing::info!("Task group stopped");
        first_error.map_or(Ok(()), Err)
    }
}

fn record_exit(
    joined: Result<(&'static str, anyhow::Result<()>), JoinError>,
    first_error: &mut Option<anyhow::Error>,
) {
    let err = match joined {
        Ok((_, Ok(()))) => return,
        Ok((name, Err(err))) => err.context(format!("background task {name} failed")),
        Err(err) => anyhow::anyhow!("background task aborted: {err}"),
    };

    tracing::warn!(error = %err, "Background task exited with an error");
    first_error.get_or_insert(err);
}
