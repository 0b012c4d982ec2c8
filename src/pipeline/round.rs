use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{
    image_prep::{ImagePrepSettings, prepare_for_inference},
    recognizer::HandDetector,
    skeleton::write_snapshot,
};
use crate::{
    gesture::classify,
    round::resolve,
    types::{Frame, Gesture, RoundResult},
};

#[derive(Clone, Debug, Default)]
pub struct RoundSettings {
    pub image: ImagePrepSettings,
    /// Where annotated working images go, if anywhere.
    pub snapshot_dir: Option<PathBuf>,
}

/// Plays one round on a captured frame.
///
/// The decoded working image lives only until the detector returns; the first hand's
/// landmarks are classified and resolved against `pick_opponent`.
pub fn run_round<D, F>(
    round_id: u64,
    frame: &Frame,
    settings: &RoundSettings,
    detector: &mut D,
    pick_opponent: F,
) -> Result<RoundResult>
where
    D: HandDetector + ?Sized,
    F: FnOnce() -> Gesture,
{
    let image = prepare_for_inference(frame, &settings.image)
        .context("failed to prepare capture for inference")?;

    let hands = detector.estimate_hands(&image);

    if let (Ok(hands), Some(dir)) = (&hands, settings.snapshot_dir.as_ref()) {
        let path = dir.join(format!("round-{round_id}.jpg"));
        if let Err(err) = write_snapshot(&image, hands, &path) {
            log::warn!("failed to save round snapshot: {err:?}");
        }
    }

    drop(image);
    log::trace!("released inference image for round {round_id}");

    let hands = hands.context("hand landmark detection failed")?;
    let Some(hand) = hands.first() else {
        log::info!("round {round_id}: no hand detected");
        return Ok(RoundResult::NoHand);
    };

    let player = classify(hand);
    let opponent = pick_opponent();
    let outcome = resolve(player, opponent);
    log::info!(
        "round {round_id}: {} vs {} -> {:?}",
        player.display_name(),
        opponent.display_name(),
        outcome
    );

    Ok(RoundResult::Played {
        player,
        opponent,
        outcome,
    })
}
