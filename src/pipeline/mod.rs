#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod image_prep;
pub mod recognizer;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;
pub mod round;
pub mod skeleton;
pub mod worker;

use crate::types::Frame;

/// Something that can take a photo on request.
pub trait FrameSource: Send {
    fn capture(&mut self) -> anyhow::Result<Frame>;

    /// Switches between front and back cameras. Has no effect on classification.
    fn flip(&mut self) -> anyhow::Result<()>;
}

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraCapture, CameraDevice, available_cameras};
pub use image_prep::{ImagePrepSettings, load_frame, prepare_for_inference};
pub use recognizer::{HandDetector, OrtHandDetector};
pub use round::{RoundSettings, run_round};
pub use worker::{WorkerEvent, WorkerRequest, start_worker};
