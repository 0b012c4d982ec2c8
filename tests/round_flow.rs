use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::unbounded;
use rps_gesture::{
    GameController, Gesture, LandmarkSet, RoundOutcome, RoundResult,
    model_download::ModelDownloadEvent,
    pipeline::{
        FrameSource, HandDetector, RoundSettings, WorkerEvent, WorkerRequest, run_round,
        start_worker, worker::WorkerParts,
    },
    types::{Frame, INDEX_TIP, MIDDLE_TIP, NUM_LANDMARKS, PINKY_TIP, RING_TIP},
};

const PALM: [f32; 3] = [150.0, 200.0, 0.0];

fn hand(distances: [f32; 4]) -> LandmarkSet {
    let mut points = vec![PALM; NUM_LANDMARKS];
    for (d, idx) in distances.iter().zip([INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP]) {
        points[idx] = [PALM[0], PALM[1] - d, PALM[2]];
    }
    LandmarkSet::from_points(&points).unwrap()
}

fn capture(width: u32, height: u32) -> Frame {
    Frame::new(vec![200u8; (width * height * 4) as usize], width, height)
}

struct FixedDetector {
    hands: Vec<LandmarkSet>,
    seen_sizes: Vec<(u32, u32)>,
}

impl FixedDetector {
    fn new(hands: Vec<LandmarkSet>) -> Self {
        Self {
            hands,
            seen_sizes: Vec::new(),
        }
    }
}

impl HandDetector for FixedDetector {
    fn estimate_hands(&mut self, image: &Frame) -> Result<Vec<LandmarkSet>> {
        self.seen_sizes.push((image.width, image.height));
        Ok(self.hands.clone())
    }
}

struct BrokenDetector;

impl HandDetector for BrokenDetector {
    fn estimate_hands(&mut self, _image: &Frame) -> Result<Vec<LandmarkSet>> {
        Err(anyhow!("inference backend crashed"))
    }
}

struct StaticCamera {
    flips: usize,
}

impl FrameSource for StaticCamera {
    fn capture(&mut self) -> Result<Frame> {
        Ok(capture(640, 480))
    }

    fn flip(&mut self) -> Result<()> {
        self.flips += 1;
        Ok(())
    }
}

#[test]
fn closed_fist_beats_scissors() {
    let mut detector = FixedDetector::new(vec![hand([90.0, 20.0, 15.0, 10.0])]);
    let result = run_round(
        1,
        &capture(640, 480),
        &RoundSettings::default(),
        &mut detector,
        || Gesture::Scissors,
    )
    .unwrap();

    assert_eq!(
        result,
        RoundResult::Played {
            player: Gesture::Rock,
            opponent: Gesture::Scissors,
            outcome: RoundOutcome::Win,
        }
    );
    assert_eq!(result.player_symbol(), "✊");
    assert_eq!(result.opponent_symbol(), "✌️");
    assert_eq!(result.message(), "You Win 🎉");
    assert_eq!(detector.seen_sizes, vec![(300, 225)]);
}

#[test]
fn empty_detection_is_no_hand() {
    let mut detector = FixedDetector::new(Vec::new());
    let mut opponent_drawn = false;
    let result = run_round(
        2,
        &capture(320, 240),
        &RoundSettings::default(),
        &mut detector,
        || {
            opponent_drawn = true;
            Gesture::Rock
        },
    )
    .unwrap();

    assert_eq!(result, RoundResult::NoHand);
    assert_eq!(result.message(), "No hand detected");
    assert!(!opponent_drawn);
}

#[test]
fn ambiguous_hand_is_unrecognized() {
    let mut detector = FixedDetector::new(vec![hand([120.0, 130.0, 110.0, 30.0])]);
    let result = run_round(
        3,
        &capture(300, 300),
        &RoundSettings::default(),
        &mut detector,
        || Gesture::Paper,
    )
    .unwrap();

    assert_eq!(result.message(), "Can't recognize your move!");
    assert_eq!(result.player_symbol(), "❓");
}

#[test]
fn only_first_hand_counts() {
    let mut detector = FixedDetector::new(vec![
        hand([120.0, 130.0, 110.0, 90.0]),
        hand([10.0, 10.0, 10.0, 10.0]),
    ]);
    let result = run_round(
        4,
        &capture(300, 200),
        &RoundSettings::default(),
        &mut detector,
        || Gesture::Rock,
    )
    .unwrap();

    assert_eq!(
        result,
        RoundResult::Played {
            player: Gesture::Paper,
            opponent: Gesture::Rock,
            outcome: RoundOutcome::Win,
        }
    );
}

#[test]
fn detector_failure_propagates() {
    let err = run_round(
        5,
        &capture(300, 200),
        &RoundSettings::default(),
        &mut BrokenDetector,
        || Gesture::Rock,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("inference backend crashed"));
}

#[test]
fn snapshot_is_written_when_configured() {
    let dir = std::env::temp_dir().join(format!("rps-gesture-snaps-{}", std::process::id()));
    let settings = RoundSettings {
        snapshot_dir: Some(dir.clone()),
        ..RoundSettings::default()
    };
    let mut detector = FixedDetector::new(vec![hand([90.0, 95.0, 15.0, 10.0])]);
    run_round(9, &capture(600, 400), &settings, &mut detector, || Gesture::Paper).unwrap();

    let snapshot = dir.join("round-9.jpg");
    assert!(snapshot.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn worker_drives_controller_through_a_round() {
    let (request_tx, request_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let handle = start_worker(
        |on_progress: &mut dyn FnMut(ModelDownloadEvent)| {
            on_progress(ModelDownloadEvent::Started {
                model: rps_gesture::model_download::ModelKind::PalmDetector,
                total: None,
            });
            Ok(WorkerParts {
                detector: Box::new(FixedDetector::new(vec![hand([
                    120.0, 130.0, 110.0, 90.0,
                ])])),
                source: Box::new(StaticCamera { flips: 0 }),
            })
        },
        RoundSettings::default(),
        request_rx,
        event_tx,
    );

    let timeout = Duration::from_secs(10);
    let mut controller = GameController::new(1);
    controller.begin_loading();

    loop {
        match event_rx.recv_timeout(timeout).unwrap() {
            WorkerEvent::Loading(evt) => controller.loading_progress(evt.fraction()),
            WorkerEvent::Ready => {
                controller.model_ready();
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    controller.request_round().unwrap();
    let capture = controller.on_tick().expect("one-step countdown fires");
    request_tx
        .send(WorkerRequest::Round {
            id: capture.round_id,
        })
        .unwrap();

    match event_rx.recv_timeout(timeout).unwrap() {
        WorkerEvent::RoundFinished { id, result } => {
            assert!(controller.on_round_finished(id, result));
        }
        other => panic!("unexpected event {other:?}"),
    }
    let display = controller.display();
    assert_eq!(display.player_symbol, "✋");
    assert_ne!(display.opponent_symbol, "❓");
    assert!(display.play_enabled);

    request_tx.send(WorkerRequest::Flip).unwrap();
    assert!(matches!(
        event_rx.recv_timeout(timeout).unwrap(),
        WorkerEvent::Flipped(Ok(()))
    ));

    drop(request_tx);
    handle.join().unwrap();
}

#[test]
fn worker_setup_failure_is_reported_once() {
    let (_request_tx, request_rx) = unbounded::<WorkerRequest>();
    let (event_tx, event_rx) = unbounded();
    let handle = start_worker(
        |_on_progress: &mut dyn FnMut(ModelDownloadEvent)| -> Result<WorkerParts> {
            Err(anyhow!("model download refused"))
        },
        RoundSettings::default(),
        request_rx,
        event_tx,
    );
    handle.join().unwrap();

    let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
    assert_eq!(events.len(), 1);
    let WorkerEvent::SetupFailed(reason) = &events[0] else {
        panic!("expected setup failure, got {:?}", events[0]);
    };

    let mut controller = GameController::new(3);
    controller.begin_loading();
    controller.model_failed(reason.clone());
    assert_eq!(controller.display().button_label, "Model unavailable");
    assert!(controller.display().message.contains("model download refused"));
}

struct StuckCamera;

impl FrameSource for StuckCamera {
    fn capture(&mut self) -> Result<Frame> {
        Ok(capture(640, 480))
    }

    fn flip(&mut self) -> Result<()> {
        Err(anyhow!("second camera is busy"))
    }
}

#[test]
fn failed_flip_keeps_camera_and_rounds_working() {
    let (request_tx, request_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let handle = start_worker(
        |_on_progress: &mut dyn FnMut(ModelDownloadEvent)| {
            Ok(WorkerParts {
                detector: Box::new(FixedDetector::new(vec![hand([90.0, 20.0, 15.0, 10.0])])),
                source: Box::new(StuckCamera),
            })
        },
        RoundSettings::default(),
        request_rx,
        event_tx,
    );

    let timeout = Duration::from_secs(10);
    let mut controller = GameController::new(1);
    controller.begin_loading();
    assert!(matches!(event_rx.recv_timeout(timeout).unwrap(), WorkerEvent::Ready));
    controller.model_ready();
    let facing = controller.display().facing;

    request_tx.send(WorkerRequest::Flip).unwrap();
    let WorkerEvent::Flipped(result) = event_rx.recv_timeout(timeout).unwrap() else {
        panic!("expected a flip answer");
    };
    assert!(result.is_err());
    assert_eq!(controller.on_camera_flipped(result), facing);
    assert!(controller.display().message.contains("second camera is busy"));

    controller.request_round().unwrap();
    let capture = controller.on_tick().expect("one-step countdown fires");
    request_tx
        .send(WorkerRequest::Round {
            id: capture.round_id,
        })
        .unwrap();
    let WorkerEvent::RoundFinished { id, result } = event_rx.recv_timeout(timeout).unwrap() else {
        panic!("expected a round result");
    };
    assert!(controller.on_round_finished(id, result));
    assert_eq!(controller.display().player_symbol, "✊");

    drop(request_tx);
    handle.join().unwrap();
}
