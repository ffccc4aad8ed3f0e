// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::model::EngineSection;
use crate::errors::Result;
use crate::types::ProjectId;
use crate::workflow::{recompute, status, EngineContext};

use super::core::DispatchCore;
use super::{DispatchCommand, DispatchEvent, JobRequest, ProjectJob};

/// Messages accepted by the dispatcher loop.
#[derive(Debug)]
enum DispatchMessage {
    Request(JobRequest),
    WaitIdle(oneshot::Sender<()>),
    Shutdown,
}

enum Incoming {
    Finished(ProjectId),
    Message(Option<DispatchMessage>),
}

/// Cheap, cloneable handle used by callers to enqueue background work.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchMessage>,
}

impl DispatchHandle {
    /// Enqueue a job request without waiting.
    ///
    /// When the channel is full the request is dropped with a warning; the
    /// next request for the project re-reads current state and catches up.
    /// Returns whether the request was accepted.
    pub fn request(&self, req: JobRequest) -> bool {
        let project = req.project;
        match self.tx.try_send(DispatchMessage::Request(req)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(project = %project, "dispatcher queue is full; dropping background request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(project = %project, "dispatcher has stopped; dropping background request");
                false
            }
        }
    }

    /// Resolve once no job is running or pending.
    pub async fn wait_idle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DispatchMessage::WaitIdle(tx))
            .await
            .map_err(|_| anyhow!("dispatcher has stopped"))?;
        rx.await.map_err(|_| anyhow!("dispatcher stopped before becoming idle"))?;
        Ok(())
    }

    /// Ask the dispatcher to finish outstanding jobs and stop.
    pub async fn shutdown(&self) {
        if self.tx.send(DispatchMessage::Shutdown).await.is_err() {
            debug!("dispatcher already stopped");
        }
    }
}

/// Runs recompute and status-refresh jobs in the background.
///
/// This is an IO shell around [`DispatchCore`], which holds the scheduling
/// semantics. This struct reads requests from the channel, spawns the jobs
/// the core asks for and feeds their completion back into the core.
pub struct Dispatcher {
    core: DispatchCore,
    rx: mpsc::Receiver<DispatchMessage>,
    done_tx: mpsc::Sender<ProjectId>,
    done_rx: mpsc::Receiver<ProjectId>,
    ctx: EngineContext,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("core", &self.core)
            .field("idle_waiters", &self.idle_waiters.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(ctx: EngineContext, engine: EngineSection) -> (Self, DispatchHandle) {
        let (tx, rx) = mpsc::channel(engine.channel_capacity.max(1));
        // Every running job reports completion exactly once, so this channel
        // never holds more than `max_concurrent_jobs` messages.
        let (done_tx, done_rx) = mpsc::channel(engine.max_concurrent_jobs.max(1));
        let dispatcher = Self {
            core: DispatchCore::new(engine.max_concurrent_jobs),
            rx,
            done_tx,
            done_rx,
            ctx,
            idle_waiters: Vec::new(),
        };
        (dispatcher, DispatchHandle { tx })
    }

    /// Create a dispatcher and run it on the current Tokio runtime.
    pub fn spawn(ctx: EngineContext, engine: EngineSection) -> (DispatchHandle, JoinHandle<()>) {
        let (dispatcher, handle) = Self::new(ctx, engine);
        let join = tokio::spawn(dispatcher.run());
        (handle, join)
    }

    /// Main loop.
    ///
    /// Runs until shutdown is requested (or every handle is dropped) and all
    /// outstanding jobs have finished.
    pub async fn run(mut self) {
        info!("workflow dispatcher started");
        let mut requests_open = true;

        loop {
            let incoming = tokio::select! {
                biased;
                Some(project) = self.done_rx.recv() => Incoming::Finished(project),
                msg = self.rx.recv(), if requests_open => Incoming::Message(msg),
            };

            let event = match incoming {
                Incoming::Finished(project) => DispatchEvent::JobFinished { project },
                Incoming::Message(Some(DispatchMessage::Request(req))) => {
                    DispatchEvent::Requested(req)
                }
                Incoming::Message(Some(DispatchMessage::WaitIdle(waiter))) => {
                    self.idle_waiters.push(waiter);
                    self.answer_idle_waiters();
                    continue;
                }
                Incoming::Message(Some(DispatchMessage::Shutdown)) => {
                    DispatchEvent::ShutdownRequested
                }
                Incoming::Message(None) => {
                    requests_open = false;
                    DispatchEvent::ShutdownRequested
                }
            };

            debug!(?event, "dispatcher received event");
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command);
            }
            self.answer_idle_waiters();

            if !step.keep_running {
                break;
            }
        }

        self.answer_idle_waiters();
        info!("workflow dispatcher stopped");
    }

    fn execute_command(&mut self, command: DispatchCommand) {
        match command {
            DispatchCommand::Start(job) => self.spawn_job(job),
        }
    }

    fn spawn_job(&self, job: ProjectJob) {
        let project = job.project;
        let ctx = self.ctx.clone();
        let done = self.done_tx.clone();
        debug!(project = %project, triggers = job.triggers.len(), "starting project job");

        tokio::spawn(async move {
            let outcome = tokio::spawn(async move { run_job(&ctx, &job).await }).await;
            if let Err(err) = outcome {
                warn!(project = %project, error = %err, "project job aborted");
            }
            // The dispatcher is the only receiver and outlives its jobs.
            let _ = done.send(project).await;
        });
    }

    fn answer_idle_waiters(&mut self) {
        if !self.core.is_idle() || self.idle_waiters.is_empty() {
            return;
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Recompute then refresh status. Failures are logged and dropped: the
/// caller's request has long returned and the next trigger retries.
async fn run_job(ctx: &EngineContext, job: &ProjectJob) {
    if job.recompute {
        if let Err(err) = recompute::recompute(ctx, job.project, job.trigger_code(), Utc::now()).await {
            warn!(project = %job.project, error = %err, "recompute failed");
        }
    }

    if job.refresh_status {
        if let Err(err) = status::refresh_status(ctx, job.project, job.actor, Utc::now()) {
            warn!(project = %job.project, error = %err, "status refresh failed; keeping stored status");
        }
    }
}
