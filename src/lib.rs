//! Rock-paper-scissors against the computer, played with a hand in front of a camera.
//!
//! One photo per round goes through a fixed resize/JPEG step, a MediaPipe palm and
//! handpose model pair produces 21 landmarks, and a small geometric heuristic turns
//! them into a move.

pub mod app;
pub mod config;
pub mod console;
pub mod controller;
pub mod countdown;
pub mod gesture;
pub mod model_download;
pub mod pipeline;
pub mod round;
pub mod types;

pub use controller::GameController;
pub use gesture::classify;
pub use round::{opponent_move, resolve};
pub use types::{Gesture, LandmarkSet, RoundOutcome, RoundResult};
