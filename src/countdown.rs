use thiserror::Error;

pub const DEFAULT_COUNTDOWN_FROM: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Counting(u8),
    Capturing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    Ignored,
    Counted(u8),
    Fire,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("countdown already running ({0:?})")]
pub struct CountdownBusy(pub CountdownState);

/// Pre-capture countdown driven by external one-second ticks.
#[derive(Clone, Debug)]
pub struct Countdown {
    from: u8,
    state: CountdownState,
}

impl Countdown {
    pub fn new(from: u8) -> Self {
        Self {
            from: from.max(1),
            state: CountdownState::Idle,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn remaining(&self) -> Option<u8> {
        match self.state {
            CountdownState::Counting(n) => Some(n),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Result<u8, CountdownBusy> {
        if self.state != CountdownState::Idle {
            return Err(CountdownBusy(self.state));
        }
        self.state = CountdownState::Counting(self.from);
        Ok(self.from)
    }

    pub fn tick(&mut self) -> CountdownEvent {
        match self.state {
            CountdownState::Counting(n) if n > 1 => {
                self.state = CountdownState::Counting(n - 1);
                CountdownEvent::Counted(n - 1)
            }
            CountdownState::Counting(_) => {
                self.state = CountdownState::Capturing;
                CountdownEvent::Fire
            }
            CountdownState::Idle | CountdownState::Capturing => CountdownEvent::Ignored,
        }
    }

    pub fn cancel(&mut self) {
        self.state = CountdownState::Idle;
    }

    pub fn finish(&mut self) {
        if self.state == CountdownState::Capturing {
            self.state = CountdownState::Idle;
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_FROM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_then_fires_once() {
        let mut countdown = Countdown::default();
        assert_eq!(countdown.start(), Ok(3));
        assert_eq!(countdown.tick(), CountdownEvent::Counted(2));
        assert_eq!(countdown.tick(), CountdownEvent::Counted(1));
        assert_eq!(countdown.tick(), CountdownEvent::Fire);
        assert_eq!(countdown.state(), CountdownState::Capturing);
        assert_eq!(countdown.tick(), CountdownEvent::Ignored);

        countdown.finish();
        assert_eq!(countdown.state(), CountdownState::Idle);
    }

    #[test]
    fn start_is_rejected_while_running() {
        let mut countdown = Countdown::default();
        countdown.start().unwrap();
        assert_eq!(
            countdown.start(),
            Err(CountdownBusy(CountdownState::Counting(3)))
        );
        countdown.tick();
        countdown.tick();
        countdown.tick();
        assert!(countdown.start().is_err());
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut countdown = Countdown::default();
        countdown.start().unwrap();
        countdown.tick();
        countdown.cancel();
        assert_eq!(countdown.state(), CountdownState::Idle);
        assert_eq!(countdown.tick(), CountdownEvent::Ignored);
        assert_eq!(countdown.remaining(), None);
    }

    #[test]
    fn single_step_countdown_fires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert_eq!(countdown.start(), Ok(1));
        assert_eq!(countdown.tick(), CountdownEvent::Fire);
    }
}
