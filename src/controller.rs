use thiserror::Error;

use crate::{
    countdown::{Countdown, CountdownEvent, CountdownState},
    types::{Gesture, RoundResult},
};

pub const WAITING_MESSAGE: &str = "Waiting...";

#[derive(Clone, Debug, PartialEq)]
pub enum ModelState {
    Uninitialized,
    Loading { progress: Option<f32> },
    Ready,
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundRejected {
    #[error("model is still loading")]
    ModelNotReady,
    #[error("model unavailable: {0}")]
    ModelFailed(String),
    #[error("a round is already in progress")]
    Busy,
}

/// Handed to the capture side when the countdown reaches zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub round_id: u64,
}

/// Everything the front-end shows.
#[derive(Clone, Debug, PartialEq)]
pub struct Display {
    pub player_symbol: &'static str,
    pub opponent_symbol: &'static str,
    pub message: String,
    pub button_label: &'static str,
    pub play_enabled: bool,
    pub countdown: Option<String>,
    pub facing: CameraFacing,
}

/// Application state for one session.
///
/// Owns the model lifecycle, the pre-capture countdown and the single-round gate.
/// Every transition happens on the thread that owns the controller.
#[derive(Debug)]
pub struct GameController {
    model: ModelState,
    countdown: Countdown,
    in_flight: Option<u64>,
    next_round_id: u64,
    facing: CameraFacing,
    player_symbol: &'static str,
    opponent_symbol: &'static str,
    message: String,
}

impl GameController {
    pub fn new(countdown_from: u8) -> Self {
        Self {
            model: ModelState::Uninitialized,
            countdown: Countdown::new(countdown_from),
            in_flight: None,
            next_round_id: 1,
            facing: CameraFacing::Front,
            player_symbol: Gesture::Unknown.symbol(),
            opponent_symbol: Gesture::Unknown.symbol(),
            message: WAITING_MESSAGE.to_string(),
        }
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn begin_loading(&mut self) {
        if self.model == ModelState::Uninitialized {
            self.model = ModelState::Loading { progress: None };
        }
    }

    pub fn loading_progress(&mut self, progress: Option<f32>) {
        if let ModelState::Loading { progress: current } = &mut self.model {
            if progress.is_some() {
                *current = progress;
            }
        }
    }

    pub fn model_ready(&mut self) {
        if matches!(self.model, ModelState::Loading { .. }) {
            log::info!("model ready");
            self.model = ModelState::Ready;
        }
    }

    pub fn model_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("model unavailable: {reason}");
        self.message = format!("Model failed to load: {reason}");
        self.model = ModelState::Failed(reason);
        self.countdown.cancel();
        self.in_flight = None;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.countdown.state() != CountdownState::Idle
    }

    pub fn can_play(&self) -> bool {
        self.model == ModelState::Ready && !self.is_busy()
    }

    pub fn request_round(&mut self) -> Result<u8, RoundRejected> {
        match &self.model {
            ModelState::Ready => {}
            ModelState::Failed(reason) => return Err(RoundRejected::ModelFailed(reason.clone())),
            ModelState::Uninitialized | ModelState::Loading { .. } => {
                return Err(RoundRejected::ModelNotReady);
            }
        }
        if self.in_flight.is_some() {
            return Err(RoundRejected::Busy);
        }
        self.countdown.start().map_err(|_| RoundRejected::Busy)
    }

    /// Advances the countdown; returns the capture to perform when it hits zero.
    pub fn on_tick(&mut self) -> Option<CaptureRequest> {
        match self.countdown.tick() {
            CountdownEvent::Fire => {
                let round_id = self.next_round_id;
                self.next_round_id += 1;
                self.in_flight = Some(round_id);
                Some(CaptureRequest { round_id })
            }
            CountdownEvent::Counted(_) | CountdownEvent::Ignored => None,
        }
    }

    /// Cancels a countdown that has not fired yet. Returns whether anything was cancelled.
    pub fn cancel_round(&mut self) -> bool {
        match self.countdown.state() {
            CountdownState::Counting(_) => {
                self.countdown.cancel();
                true
            }
            CountdownState::Idle | CountdownState::Capturing => false,
        }
    }

    /// Applies a finished round. Results for anything but the in-flight round are dropped.
    pub fn on_round_finished(&mut self, round_id: u64, result: anyhow::Result<RoundResult>) -> bool {
        if self.in_flight != Some(round_id) {
            log::warn!("discarding stale result for round {round_id}");
            return false;
        }
        self.in_flight = None;
        self.countdown.finish();

        match result {
            Ok(result) => {
                self.player_symbol = result.player_symbol();
                self.opponent_symbol = result.opponent_symbol();
                self.message = result.message().to_string();
            }
            Err(err) => {
                self.player_symbol = Gesture::Unknown.symbol();
                self.opponent_symbol = Gesture::Unknown.symbol();
                self.message = format!("Round failed: {err:#}");
            }
        }
        true
    }

    /// Applies the worker's answer to a flip request; facing only changes once the camera did.
    pub fn on_camera_flipped(&mut self, result: anyhow::Result<()>) -> CameraFacing {
        match result {
            Ok(()) => self.facing = self.facing.flipped(),
            Err(err) => {
                log::warn!("camera flip failed: {err:?}");
                self.message = format!("Flip camera failed: {err:#}");
            }
        }
        self.facing
    }

    pub fn display(&self) -> Display {
        let button_label = match self.model {
            ModelState::Ready => "Play Round",
            ModelState::Failed(_) => "Model unavailable",
            ModelState::Uninitialized | ModelState::Loading { .. } => "Loading Model...",
        };

        Display {
            player_symbol: self.player_symbol,
            opponent_symbol: self.opponent_symbol,
            message: self.message.clone(),
            button_label,
            play_enabled: self.can_play(),
            countdown: self
                .countdown
                .remaining()
                .map(|n| format!("Get Ready... {n}")),
            facing: self.facing,
        }
    }
}
