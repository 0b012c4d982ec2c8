use std::time::Instant;

use thiserror::Error;

pub const NUM_LANDMARKS: usize = 21;

pub const PALM_BASE: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// (x, y, z): x,y in working-image pixels, z relative depth (smaller = closer).
pub type Landmark = [f32; 3];

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("expected {NUM_LANDMARKS} hand landmarks, got {0}")]
    WrongCount(usize),
}

/// The 21 landmarks of one detected hand, in detector order.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn from_points(points: &[Landmark]) -> Result<Self, LandmarkError> {
        let points: [Landmark; NUM_LANDMARKS] = points
            .try_into()
            .map_err(|_| LandmarkError::WrongCount(points.len()))?;
        Ok(Self { points })
    }

    pub fn point(&self, idx: usize) -> Landmark {
        self.points[idx]
    }

    pub fn palm_base(&self) -> Landmark {
        self.points[PALM_BASE]
    }

    /// Planar projection used for drawing.
    pub fn projected(&self) -> Vec<(f32, f32)> {
        self.points.iter().map(|[x, y, _z]| (*x, *y)).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    Rock,
    Paper,
    Scissors,
    Unknown,
}

impl Gesture {
    pub const PLAYABLE: [Gesture; 3] = [Gesture::Rock, Gesture::Paper, Gesture::Scissors];

    pub fn symbol(&self) -> &'static str {
        match self {
            Gesture::Rock => "✊",
            Gesture::Paper => "✋",
            Gesture::Scissors => "✌️",
            Gesture::Unknown => "❓",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Gesture::Rock => "rock",
            Gesture::Paper => "paper",
            Gesture::Scissors => "scissors",
            Gesture::Unknown => "unknown",
        }
    }

    pub fn is_playable(&self) -> bool {
        !matches!(self, Gesture::Unknown)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    Win,
    Lose,
    Draw,
    Unrecognized,
}

impl RoundOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RoundOutcome::Win => "You Win 🎉",
            RoundOutcome::Lose => "You Lose 😞",
            RoundOutcome::Draw => "Draw 🤝",
            RoundOutcome::Unrecognized => "Can't recognize your move!",
        }
    }
}

pub const NO_HAND_MESSAGE: &str = "No hand detected";

#[derive(Clone, Debug, PartialEq)]
pub enum RoundResult {
    NoHand,
    Played {
        player: Gesture,
        opponent: Gesture,
        outcome: RoundOutcome,
    },
}

impl RoundResult {
    pub fn player_symbol(&self) -> &'static str {
        match self {
            RoundResult::NoHand => Gesture::Unknown.symbol(),
            RoundResult::Played { player, .. } => player.symbol(),
        }
    }

    pub fn opponent_symbol(&self) -> &'static str {
        match self {
            RoundResult::NoHand => Gesture::Unknown.symbol(),
            RoundResult::Played { opponent, .. } => opponent.symbol(),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RoundResult::NoHand => NO_HAND_MESSAGE,
            RoundResult::Played { outcome, .. } => outcome.message(),
        }
    }

    pub fn display_text(&self) -> String {
        format!(
            "Your Move: {} | AI Move: {} | {}",
            self.player_symbol(),
            self.opponent_symbol(),
            self.message()
        )
    }
}
