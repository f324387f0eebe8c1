//! Supervisor actor owning the bounded worker pool.
//!
//! The supervisor keeps a FIFO backlog of job tickets, one per queued
//! analysis. Idle workers ask for work; the supervisor pops a ticket and
//! claims that job's oldest pending analysis through the queue manager.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use ractor::{
    Actor, ActorId, ActorProcessingErr, ActorRef, MessagingErr, RpcReplyPort, SupervisionEvent,
};
use screening_core::JobId;
use ulid::Ulid;

use crate::EventSender;
use crate::messages::{PoolStatus, SupervisorMessage, WorkerMessage};
use crate::orchestrator::AnalysisOrchestrator;
use crate::queue_manager::QueueManager;
use crate::worker_actor::{AnalysisWorker, WorkerArgs};

/// Supervisor actor arguments.
pub struct SupervisorArgs {
    pub queue: QueueManager,
    pub orchestrator: AnalysisOrchestrator,
    pub event_tx: EventSender,
    pub workers: usize,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    queue: QueueManager,
    orchestrator: AnalysisOrchestrator,
    event_tx: EventSender,
    poll_interval: Duration,
    /// Job tickets waiting for a worker, oldest first.
    backlog: VecDeque<JobId>,
    /// Live workers by actor id.
    workers: HashMap<ActorId, (String, ActorRef<WorkerMessage>)>,
    /// Workers currently running an analysis.
    busy: HashSet<String>,
    drain_waiters: Vec<RpcReplyPort<()>>,
    draining: bool,
    stopping: bool,
    /// Worker counter for unique IDs.
    worker_counter: u64,
}

impl SupervisorState {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            workers: self.workers.len(),
            busy: self.busy.len(),
            backlog: self.backlog.len(),
            draining: self.draining || self.stopping,
        }
    }

    /// Whether a drain or shutdown has nothing left to wait for.
    ///
    /// A pool without workers cannot make progress on its backlog.
    fn is_settled(&self) -> bool {
        self.busy.is_empty()
            && (self.stopping || self.backlog.is_empty() || self.workers.is_empty())
    }
}

async fn spawn_worker(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState,
) -> Result<(), ActorProcessingErr> {
    let worker_id = state.next_worker_id();
    let args = WorkerArgs {
        worker_id: worker_id.clone(),
        supervisor: myself.clone(),
        orchestrator: state.orchestrator.clone(),
        event_tx: state.event_tx.clone(),
        poll_interval: state.poll_interval,
    };

    let (worker, _handle) = Actor::spawn_linked(None, AnalysisWorker, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state.workers.insert(worker.get_id(), (worker_id, worker));
    Ok(())
}

/// Stop the pool once a drain or shutdown has settled.
fn finish_if_settled(myself: &ActorRef<SupervisorMessage>, state: &mut SupervisorState) {
    if !(state.draining || state.stopping) || !state.is_settled() {
        return;
    }

    tracing::info!("Worker pool settled, stopping {} workers", state.workers.len());
    for (_, worker) in state.workers.values() {
        let _ = worker.send_message(WorkerMessage::Shutdown);
    }
    for waiter in state.drain_waiters.drain(..) {
        let _ = waiter.send(());
    }
    myself.stop(None);
}

/// Supervisor actor that manages the analysis workers.
pub struct AnalysisSupervisor;

impl Actor for AnalysisSupervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting analysis supervisor with {} workers", args.workers);

        let tickets = args.queue.recover().await?;
        if !tickets.is_empty() {
            tracing::info!("Recovered {} queued analyses", tickets.len());
        }

        let mut state = SupervisorState {
            queue: args.queue,
            orchestrator: args.orchestrator,
            event_tx: args.event_tx,
            poll_interval: args.poll_interval,
            backlog: tickets.into(),
            workers: HashMap::new(),
            busy: HashSet::new(),
            drain_waiters: Vec::new(),
            draining: false,
            stopping: false,
            worker_counter: 0,
        };

        for _ in 0..args.workers {
            spawn_worker(&myself, &mut state).await?;
        }

        // Start periodic tick
        let myself_clone = myself.clone();
        let tick_interval = args.tick_interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::WorkAvailable { job_id } => {
                if !state.stopping {
                    state.backlog.push_back(job_id);
                }
            }

            SupervisorMessage::RequestWork { worker_id, reply } => {
                if state.stopping {
                    let _ = reply.send(None);
                    return Ok(());
                }

                // Tickets can be stale when an analysis was removed or
                // already claimed; skip until one yields work.
                while let Some(job_id) = state.backlog.pop_front() {
                    match state.queue.dequeue(job_id, &worker_id).await {
                        Ok(Some(record)) => {
                            match reply.send(Some(record)) {
                                Ok(()) => {
                                    state.busy.insert(worker_id);
                                }
                                Err(unsent) => {
                                    tracing::warn!(
                                        "Worker {} went away before taking work",
                                        worker_id
                                    );
                                    if let MessagingErr::SendErr(Some(record)) = unsent
                                        && let Err(e) = state.queue.unclaim(&record).await
                                    {
                                        tracing::warn!(
                                            "Could not release analysis {}: {}",
                                            record.id,
                                            e
                                        );
                                    }
                                    state.backlog.push_front(job_id);
                                }
                            }
                            return Ok(());
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!("Dequeue for job {} failed: {}", job_id, e);
                            break;
                        }
                    }
                }

                let _ = reply.send(None);
                finish_if_settled(&myself, state);
            }

            SupervisorMessage::WorkFinished {
                worker_id,
                analysis_id,
            } => {
                tracing::debug!("Worker {} released analysis {}", worker_id, analysis_id);
                state.busy.remove(&worker_id);
                finish_if_settled(&myself, state);
            }

            SupervisorMessage::GetPoolStatus { reply } => {
                let _ = reply.send(state.status());
            }

            SupervisorMessage::Drain { reply } => {
                tracing::info!("Draining worker pool ({} tickets left)", state.backlog.len());
                state.draining = true;
                state.drain_waiters.push(reply);
                finish_if_settled(&myself, state);
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                state.stopping = true;
                state.backlog.clear();
                finish_if_settled(&myself, state);
            }

            SupervisorMessage::Tick => {
                if state.backlog.is_empty() && !state.stopping {
                    match state.queue.pending_tickets().await {
                        Ok(tickets) if !tickets.is_empty() => {
                            tracing::info!("Tick found {} queued analyses without tickets", tickets.len());
                            state.backlog.extend(tickets);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("Backlog reconciliation failed: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                if let Some((worker_id, _)) = state.workers.remove(&cell.get_id()) {
                    tracing::debug!("Worker {} terminated: {:?}", worker_id, reason);
                    state.busy.remove(&worker_id);
                }
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                if let Some((worker_id, _)) = state.workers.remove(&cell.get_id()) {
                    tracing::warn!("Worker {} failed: {}", worker_id, error);
                    state.busy.remove(&worker_id);
                    if !(state.draining || state.stopping) {
                        spawn_worker(&myself, state).await?;
                    }
                    finish_if_settled(&myself, state);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Start the supervisor and its worker pool.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let name = format!("analysis-supervisor-{}", Ulid::new());
    Actor::spawn(Some(name), AnalysisSupervisor, args).await
}
