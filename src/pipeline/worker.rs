use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::{FrameSource, HandDetector, RoundSettings, run_round};
use crate::{
    model_download::ModelDownloadEvent,
    round::opponent_move,
    types::RoundResult,
};

pub enum WorkerRequest {
    Round { id: u64 },
    Flip,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Loading(ModelDownloadEvent),
    Ready,
    SetupFailed(String),
    RoundFinished {
        id: u64,
        result: anyhow::Result<RoundResult>,
    },
    Flipped(anyhow::Result<()>),
}

/// Everything a round needs once start-up has finished.
pub struct WorkerParts {
    pub detector: Box<dyn HandDetector>,
    pub source: Box<dyn FrameSource>,
}

/// Spawns the inference worker.
///
/// `setup` runs on the worker thread (model download, session creation, camera open)
/// and reports progress through the callback; its failure is reported once as
/// `SetupFailed` and the worker exits without retrying.
pub fn start_worker<L>(
    setup: L,
    settings: RoundSettings,
    request_rx: Receiver<WorkerRequest>,
    event_tx: Sender<WorkerEvent>,
) -> thread::JoinHandle<()>
where
    L: FnOnce(&mut dyn FnMut(ModelDownloadEvent)) -> anyhow::Result<WorkerParts> + Send + 'static,
{
    thread::spawn(move || {
        let progress_tx = event_tx.clone();
        let mut on_progress = |evt: ModelDownloadEvent| {
            let _ = progress_tx.send(WorkerEvent::Loading(evt));
        };

        let parts = match setup(&mut on_progress) {
            Ok(parts) => parts,
            Err(err) => {
                log::error!("failed to prepare round worker: {err:?}");
                let _ = event_tx.send(WorkerEvent::SetupFailed(format!("{err:#}")));
                return;
            }
        };

        log::info!("round worker ready");
        if event_tx.send(WorkerEvent::Ready).is_err() {
            return;
        }

        run_worker_loop(parts, &settings, request_rx, event_tx);
    })
}

fn run_worker_loop(
    mut parts: WorkerParts,
    settings: &RoundSettings,
    request_rx: Receiver<WorkerRequest>,
    event_tx: Sender<WorkerEvent>,
) {
    // Requests are served strictly one at a time.
    while let Ok(request) = request_rx.recv() {
        let event = match request {
            WorkerRequest::Round { id } => {
                let result = parts.source.capture().and_then(|frame| {
                    run_round(id, &frame, settings, &mut parts.detector, opponent_move)
                });
                if let Err(err) = &result {
                    log::warn!("round {id} failed: {err:?}");
                }
                WorkerEvent::RoundFinished { id, result }
            }
            WorkerRequest::Flip => WorkerEvent::Flipped(parts.source.flip()),
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }
    log::debug!("round worker stopped");
}
