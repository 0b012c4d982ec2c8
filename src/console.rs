use std::{
    io::{self, BufRead},
    thread,
};

use crossbeam_channel::Sender;

use crate::controller::{CameraFacing, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Play,
    Flip,
    Cancel,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "p" | "play" => Some(Command::Play),
            "f" | "flip" => Some(Command::Flip),
            "c" | "cancel" => Some(Command::Cancel),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "[Enter/p] Play Round  [f] Flip Camera  [c] Cancel  [q] Quit";

/// Reads commands from stdin on a background thread. EOF counts as quit.
pub fn spawn_stdin_reader(command_tx: Sender<Command>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log::warn!("failed to read command: {err}");
                    break;
                }
            };
            match Command::parse(&line) {
                Some(cmd) => {
                    if command_tx.send(cmd).is_err() {
                        return;
                    }
                }
                None => println!("unknown command {:?}. {HELP}", line.trim()),
            }
        }
        let _ = command_tx.send(Command::Quit);
    })
}

pub fn render(display: &Display) -> String {
    if let Some(countdown) = &display.countdown {
        return countdown.clone();
    }

    let facing = match display.facing {
        CameraFacing::Front => "front",
        CameraFacing::Back => "back",
    };
    let action = if display.play_enabled {
        format!("[{}]", display.button_label)
    } else {
        format!("({})", display.button_label)
    };

    format!(
        "Your Move: {} | AI Move: {} | {} | {action} camera: {facing}",
        display.player_symbol, display.opponent_symbol, display.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> Display {
        Display {
            player_symbol: "✊",
            opponent_symbol: "✌️",
            message: "You Win 🎉".to_string(),
            button_label: "Play Round",
            play_enabled: true,
            countdown: None,
            facing: CameraFacing::Front,
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(""), Some(Command::Play));
        assert_eq!(Command::parse("  PLAY "), Some(Command::Play));
        assert_eq!(Command::parse("f"), Some(Command::Flip));
        assert_eq!(Command::parse("cancel"), Some(Command::Cancel));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("dance"), None);
    }

    #[test]
    fn renders_round_line() {
        assert_eq!(
            render(&display()),
            "Your Move: ✊ | AI Move: ✌️ | You Win 🎉 | [Play Round] camera: front"
        );
    }

    #[test]
    fn countdown_replaces_round_line() {
        let mut d = display();
        d.countdown = Some("Get Ready... 2".to_string());
        assert_eq!(render(&d), "Get Ready... 2");
    }
}
