pub mod common;
mod ort;
pub mod palm;

use crate::types::{Frame, LandmarkSet};

pub use self::ort::OrtHandDetector;

/// Finds hands in a decoded working image.
///
/// Each detected hand is returned as its 21 landmarks in image pixel space. An empty
/// vector means no hand was found, which callers report separately from an
/// unrecognised gesture.
pub trait HandDetector: Send {
    fn estimate_hands(&mut self, image: &Frame) -> anyhow::Result<Vec<LandmarkSet>>;
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn estimate_hands(&mut self, image: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        (**self).estimate_hands(image)
    }
}
