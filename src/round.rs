use rand::Rng;

use crate::types::{Gesture, RoundOutcome};

pub fn resolve(player: Gesture, opponent: Gesture) -> RoundOutcome {
    if player == Gesture::Unknown {
        return RoundOutcome::Unrecognized;
    }
    if player == opponent {
        return RoundOutcome::Draw;
    }

    match (player, opponent) {
        (Gesture::Rock, Gesture::Scissors)
        | (Gesture::Scissors, Gesture::Paper)
        | (Gesture::Paper, Gesture::Rock) => RoundOutcome::Win,
        _ => RoundOutcome::Lose,
    }
}

pub fn opponent_move() -> Gesture {
    opponent_move_with(&mut rand::thread_rng())
}

pub fn opponent_move_with<R: Rng + ?Sized>(rng: &mut R) -> Gesture {
    Gesture::PLAYABLE[rng.gen_range(0..Gesture::PLAYABLE.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn resolves_standard_pairs() {
        assert_eq!(resolve(Gesture::Rock, Gesture::Scissors), RoundOutcome::Win);
        assert_eq!(resolve(Gesture::Scissors, Gesture::Paper), RoundOutcome::Win);
        assert_eq!(resolve(Gesture::Paper, Gesture::Rock), RoundOutcome::Win);

        assert_eq!(resolve(Gesture::Scissors, Gesture::Rock), RoundOutcome::Lose);
        assert_eq!(resolve(Gesture::Paper, Gesture::Scissors), RoundOutcome::Lose);
        assert_eq!(resolve(Gesture::Rock, Gesture::Paper), RoundOutcome::Lose);

        for g in Gesture::PLAYABLE {
            assert_eq!(resolve(g, g), RoundOutcome::Draw);
        }
    }

    #[test]
    fn unknown_player_is_unrecognized() {
        for opponent in [
            Gesture::Rock,
            Gesture::Paper,
            Gesture::Scissors,
            Gesture::Unknown,
        ] {
            assert_eq!(
                resolve(Gesture::Unknown, opponent),
                RoundOutcome::Unrecognized
            );
        }
    }

    #[test]
    fn opponent_moves_are_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            let g = opponent_move_with(&mut rng);
            let idx = Gesture::PLAYABLE
                .iter()
                .position(|p| *p == g)
                .expect("opponent must be playable");
            counts[idx] += 1;
        }
        for count in counts {
            assert!((3_000..=3_700).contains(&count), "skewed counts {counts:?}");
        }
    }

    #[test]
    fn thread_rng_never_returns_unknown() {
        for _ in 0..200 {
            assert!(opponent_move().is_playable());
        }
    }
}
