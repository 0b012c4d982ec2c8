use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rps_gesture::{app, config::GameConfig};

/// Rock-paper-scissors against the computer, played with your hand in front of a camera
#[derive(Parser, Debug)]
#[command(name = "rps-gesture", version)]
struct Args {
    #[command(flatten)]
    config: GameConfig,

    /// Photos to play one round each instead of using the camera
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::debug!("starting with {:?}", args.config);

    if args.images.is_empty() {
        app::run_interactive(args.config)
    } else {
        app::run_still_images(args.config, &args.images)
    }
}
