use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, never, select, tick, unbounded};

use crate::{
    config::GameConfig,
    console::{self, Command},
    controller::GameController,
    model_download::{ModelDownloadEvent, ModelKind, ensure_model_ready},
    pipeline::{
        FrameSource, OrtHandDetector, WorkerEvent, WorkerRequest, load_frame, run_round,
        start_worker, worker::WorkerParts,
    },
    round::opponent_move,
};

fn load_detector(
    config: &GameConfig,
    on_progress: &mut dyn FnMut(ModelDownloadEvent),
) -> Result<OrtHandDetector> {
    let palm_path = config.palm_detector_model_path();
    let handpose_path = config.handpose_estimator_model_path();

    ensure_model_ready(ModelKind::PalmDetector, &palm_path, &mut *on_progress)?;
    ensure_model_ready(ModelKind::HandposeEstimator, &handpose_path, &mut *on_progress)?;

    let detector = OrtHandDetector::new(&handpose_path, &palm_path, config.max_hands)?;
    log::info!(
        "hand detector ready using {} and palm detector {}",
        handpose_path.display(),
        palm_path.display()
    );
    Ok(detector)
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(config: &GameConfig) -> Result<Box<dyn FrameSource>> {
    let camera = crate::pipeline::CameraCapture::open(config.camera_index)?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(_config: &GameConfig) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "built without camera support; pass image files to play from photos"
    ))
}

/// Interactive session: camera, countdown and console commands.
pub fn run_interactive(config: GameConfig) -> Result<()> {
    let mut controller = GameController::new(config.countdown_from);
    controller.begin_loading();

    let (request_tx, request_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let worker_config = config.clone();
    let _worker = start_worker(
        move |on_progress| {
            let detector = load_detector(&worker_config, on_progress)?;
            let source = open_camera(&worker_config)?;
            Ok(WorkerParts {
                detector: Box::new(detector),
                source,
            })
        },
        config.round_settings(),
        request_rx,
        event_tx,
    );

    let (command_tx, command_rx) = unbounded();
    let _stdin = console::spawn_stdin_reader(command_tx);

    println!("{}", console::HELP);
    let mut command_rx = command_rx;
    let mut event_rx = event_rx;
    let mut ticker: Receiver<Instant> = never();
    let mut last_display = None;

    loop {
        select! {
            recv(command_rx) -> cmd => match cmd {
                Ok(Command::Play) => match controller.request_round() {
                    Ok(_) => ticker = tick(config.tick_interval()),
                    Err(rejected) => println!("{rejected}"),
                },
                Ok(Command::Flip) => {
                    log::info!("switching camera from {:?}", controller.display().facing);
                    if request_tx.send(WorkerRequest::Flip).is_err() {
                        log::warn!("round worker is gone, flip not applied");
                    }
                }
                Ok(Command::Cancel) => {
                    if controller.cancel_round() {
                        ticker = never();
                    }
                }
                Ok(Command::Quit) => break,
                Err(_) => command_rx = never(),
            },
            recv(event_rx) -> evt => match evt {
                Ok(WorkerEvent::Loading(progress)) => controller.loading_progress(progress.fraction()),
                Ok(WorkerEvent::Ready) => controller.model_ready(),
                Ok(WorkerEvent::SetupFailed(reason)) => controller.model_failed(reason),
                Ok(WorkerEvent::RoundFinished { id, result }) => {
                    controller.on_round_finished(id, result);
                }
                Ok(WorkerEvent::Flipped(result)) => {
                    controller.on_camera_flipped(result);
                }
                Err(_) => event_rx = never(),
            },
            recv(ticker) -> _ => {
                if let Some(capture) = controller.on_tick() {
                    ticker = never();
                    let round_id = capture.round_id;
                    if request_tx.send(WorkerRequest::Round { id: round_id }).is_err() {
                        controller.on_round_finished(round_id, Err(anyhow!("round worker stopped")));
                    }
                }
            },
        }

        let display = controller.display();
        if last_display.as_ref() != Some(&display) {
            println!("{}", console::render(&display));
            last_display = Some(display);
        }
    }

    Ok(())
}

/// Plays one round per image file, no camera needed.
pub fn run_still_images(config: GameConfig, paths: &[PathBuf]) -> Result<()> {
    let mut detector = load_detector(&config, &mut |_evt| {})?;
    let settings = config.round_settings();

    println!("playing {} round(s) from image files", paths.len());
    for (idx, path) in paths.iter().enumerate() {
        let outcome = load_frame(path).and_then(|frame| {
            run_round(idx as u64 + 1, &frame, &settings, &mut detector, opponent_move)
                .with_context(|| format!("failed to play round on {}", path.display()))
        });
        match outcome {
            Ok(result) => println!("{} -> {}", path.display(), result.display_text()),
            Err(err) => println!("{} -> error: {err:#}", path.display()),
        }
    }

    Ok(())
}
