use std::{path::PathBuf, time::Duration};

use clap::{Parser, builder::RangedU64ValueParser};

use crate::{
    countdown::DEFAULT_COUNTDOWN_FROM,
    pipeline::{ImagePrepSettings, RoundSettings},
};

/// Resize target before detection. `gesture::EXTENDED_DISTANCE` is tuned against it.
pub const DEFAULT_WORKING_WIDTH: u32 = 300;
pub const DEFAULT_JPEG_QUALITY: u8 = 50;
const DEFAULT_TICK_MS: u64 = 1_000;

/// Game settings, from command-line flags or their `RPS_*` environment variables.
#[derive(Parser, Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Directory holding the palm and handpose ONNX models
    #[arg(long, env = "RPS_MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Width the photo is resized to before detection
    #[arg(long, env = "RPS_WORKING_WIDTH", default_value_t = DEFAULT_WORKING_WIDTH,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub working_width: u32,

    /// JPEG quality of the re-encoded working image
    #[arg(long, env = "RPS_JPEG_QUALITY", default_value_t = DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Countdown start before each capture
    #[arg(long = "countdown", env = "RPS_COUNTDOWN", default_value_t = DEFAULT_COUNTDOWN_FROM,
          value_parser = clap::value_parser!(u8).range(1..))]
    pub countdown_from: u8,

    /// Milliseconds per countdown step
    #[arg(long, env = "RPS_TICK_MS", default_value_t = DEFAULT_TICK_MS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    #[arg(long, env = "RPS_CAMERA_INDEX", default_value_t = 0)]
    pub camera_index: u32,

    /// Hands tracked per photo; only the first one is played
    #[arg(long, env = "RPS_MAX_HANDS", default_value_t = 1,
          value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_hands: usize,

    /// Save every round's working image with the detected skeleton here
    #[arg(long, env = "RPS_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            working_width: DEFAULT_WORKING_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            countdown_from: DEFAULT_COUNTDOWN_FROM,
            tick_ms: DEFAULT_TICK_MS,
            camera_index: 0,
            max_hands: 1,
            snapshot_dir: None,
        }
    }
}

impl GameConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn round_settings(&self) -> RoundSettings {
        RoundSettings {
            image: ImagePrepSettings {
                working_width: self.working_width,
                jpeg_quality: self.jpeg_quality,
            },
            snapshot_dir: self.snapshot_dir.clone(),
        }
    }

    pub fn palm_detector_model_path(&self) -> PathBuf {
        self.model_dir
            .join(crate::model_download::PALM_DETECTOR_MODEL_FILENAME)
    }

    pub fn handpose_estimator_model_path(&self) -> PathBuf {
        self.model_dir
            .join(crate::model_download::HANDPOSE_ESTIMATOR_MODEL_FILENAME)
    }
}
