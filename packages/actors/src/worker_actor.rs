//! Worker actor for running analyses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use screening_core::AnalysisEvent;

use crate::EventSender;
use crate::messages::{SupervisorMessage, WorkerMessage};
use crate::orchestrator::AnalysisOrchestrator;

/// How long a worker waits for the supervisor to hand out work.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// State for the worker actor.
pub struct WorkerActorState {
    pub worker_id: String,
    supervisor: ActorRef<SupervisorMessage>,
    orchestrator: AnalysisOrchestrator,
    event_tx: EventSender,
    /// Shared with the heartbeat task so it stays quiet while busy.
    busy: Arc<AtomicBool>,
    running: bool,
}

impl WorkerActorState {
    /// Check if the worker is idle.
    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub supervisor: ActorRef<SupervisorMessage>,
    pub orchestrator: AnalysisOrchestrator,
    pub event_tx: EventSender,
    pub poll_interval: Duration,
}

/// Worker actor that pulls analyses from the supervisor one at a time.
pub struct AnalysisWorker;

impl Actor for AnalysisWorker {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        let busy = Arc::new(AtomicBool::new(false));

        // Start the work loop
        let myself_clone = myself.clone();
        let busy_flag = busy.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if busy_flag.load(Ordering::SeqCst) {
                    continue;
                }
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        let _ = args.event_tx.send(AnalysisEvent::WorkerConnected {
            worker_id: args.worker_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            supervisor: args.supervisor,
            orchestrator: args.orchestrator,
            event_tx: args.event_tx,
            busy,
            running: true,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!("Worker stopped: {}", state.worker_id);
        let _ = state.event_tx.send(AnalysisEvent::WorkerDisconnected {
            worker_id: state.worker_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
                return Ok(());
            }

            WorkerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }

                if !state.is_idle() {
                    return Ok(());
                }

                let result = ractor::rpc::call(
                    &state.supervisor,
                    |reply| SupervisorMessage::RequestWork {
                        worker_id: state.worker_id.clone(),
                        reply,
                    },
                    Some(REQUEST_TIMEOUT),
                )
                .await;

                // A stopped supervisor means the pool is going away.
                let record = match result {
                    Ok(ractor::rpc::CallResult::Success(Some(record))) => record,
                    Ok(_) => return Ok(()),
                    Err(_) => {
                        state.running = false;
                        myself.stop(None);
                        return Ok(());
                    }
                };

                state.busy.store(true, Ordering::SeqCst);
                let analysis_id = record.id;
                let done = state.orchestrator.process(record).await;
                state.busy.store(false, Ordering::SeqCst);

                tracing::debug!(
                    "Worker {} finished analysis {} as {}",
                    state.worker_id,
                    analysis_id,
                    done.status
                );

                if state
                    .supervisor
                    .send_message(SupervisorMessage::WorkFinished {
                        worker_id: state.worker_id.clone(),
                        analysis_id,
                    })
                    .is_err()
                {
                    state.running = false;
                    myself.stop(None);
                }
            }
        }

        Ok(())
    }
}
