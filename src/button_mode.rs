//! Button activation modes.
//!
//! Each [`ButtonMapping`](crate::binding::ButtonMapping) gets a [`ButtonState`]
//! that the poll loop advances once per tick with the combined physical state
//! and the elapsed time since the previous tick. Timers are delta-time driven,
//! so there is nothing to cancel outside of normal transitions.
//!
//! | Mode | Rising edge | While held | Release |
//! |---|---|---|---|
//! | `Normal` | on | on | off |
//! | `Toggle` | flip latch | latch | latch |
//! | `Pulse` | (re)start pulse timer | on until timer expires | unchanged |
//! | `HoldToActivate` | start hold timer | on once timer reaches threshold | off, timer cancelled |

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a physical button drives its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ButtonMode {
    #[default]
    Normal,
    Toggle,
    Pulse,
    HoldToActivate,
}

/// Durations consumed by the timed modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTimings {
    pub pulse: Duration,
    pub hold: Duration,
}

impl ModeTimings {
    pub fn from_ms(pulse_ms: u32, hold_ms: u32) -> Self {
        Self {
            pulse: Duration::from_millis(pulse_ms as u64),
            hold: Duration::from_millis(hold_ms as u64),
        }
    }
}

/// Runtime state of one button mapping. Starts idle with output `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonState {
    prev_pressed: bool,
    latched: bool,
    /// Time since the current pulse started; `None` when not pulsing.
    pulse_elapsed: Option<Duration>,
    /// Time the button has been held in hold mode; `None` when not held.
    hold_elapsed: Option<Duration>,
    output: bool,
}

impl ButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current output.
    pub fn output(&self) -> bool {
        self.output
    }

    /// Toggle latch (only meaningful in `Toggle` mode).
    pub fn latched(&self) -> bool {
        self.latched
    }

    pub fn is_pulsing(&self) -> bool {
        self.pulse_elapsed.is_some()
    }

    /// Back to idle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance one tick. Returns the new output.
    pub fn tick(
        &mut self,
        mode: ButtonMode,
        pressed: bool,
        dt: Duration,
        timings: ModeTimings,
    ) -> bool {
        let rising = pressed && !self.prev_pressed;
        self.prev_pressed = pressed;

        self.output = match mode {
            ButtonMode::Normal => pressed,
            ButtonMode::Toggle => {
                if rising {
                    self.latched = !self.latched;
                }
                self.latched
            }
            ButtonMode::Pulse => {
                // A rising edge mid-pulse restarts the timer.
                let elapsed = if rising {
                    Some(Duration::ZERO)
                } else {
                    self.pulse_elapsed.map(|e| e + dt)
                };
                self.pulse_elapsed = elapsed.filter(|e| *e < timings.pulse);
                self.pulse_elapsed.is_some()
            }
            ButtonMode::HoldToActivate => {
                if !pressed {
                    self.hold_elapsed = None;
                    false
                } else {
                    let held = if rising {
                        Duration::ZERO
                    } else {
                        self.hold_elapsed.map_or(Duration::ZERO, |e| e + dt)
                    };
                    self.hold_elapsed = Some(held);
                    held >= timings.hold
                }
            }
        };

        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    fn timings() -> ModeTimings {
        ModeTimings::from_ms(200, 500)
    }

    /// Run a press sequence, one entry per tick, and collect outputs.
    fn run(mode: ButtonMode, presses: &[bool]) -> Vec<bool> {
        let mut state = ButtonState::new();
        presses
            .iter()
            .map(|&p| state.tick(mode, p, TICK, timings()))
            .collect()
    }

    #[test]
    fn test_normal_follows_input() {
        let input = [false, true, true, false, true];
        assert_eq!(run(ButtonMode::Normal, &input), input.to_vec());
    }

    #[test]
    fn test_toggle_flips_on_rising_edge() {
        let out = run(ButtonMode::Toggle, &[true, true, false, false, true, false]);
        assert_eq!(out, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn test_toggle_idle_never_changes_latch() {
        let mut state = ButtonState::new();
        state.tick(ButtonMode::Toggle, true, TICK, timings());
        state.tick(ButtonMode::Toggle, false, TICK, timings());
        assert!(state.latched());
        for _ in 0..100 {
            state.tick(ButtonMode::Toggle, false, TICK, timings());
            assert!(state.latched());
        }
    }

    #[test]
    fn test_pulse_duration() {
        // 200 ms pulse at 50 ms ticks: edge tick (t=0) plus t=50,100,150.
        let mut presses = vec![true, true, true, true, true, true];
        presses.extend([false; 6]);
        let out = run(ButtonMode::Pulse, &presses);
        assert_eq!(&out[..4], &[true; 4]);
        assert!(out[4..].iter().all(|o| !o));
    }

    #[test]
    fn test_pulse_fires_after_short_tap() {
        let out = run(ButtonMode::Pulse, &[true, false, false, false, false, false]);
        assert_eq!(out, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn test_pulse_retrigger_restarts() {
        // Re-press at t=100 restarts: on until t=300.
        let out = run(
            ButtonMode::Pulse,
            &[true, false, true, false, false, false, false, false],
        );
        assert_eq!(out, vec![true, true, true, true, true, true, false, false]);
    }

    #[test]
    fn test_hold_released_early_never_fires() {
        // Held t=0..400, released at t=400.
        let mut presses = vec![true; 9];
        presses.push(false);
        let out = run(ButtonMode::HoldToActivate, &presses);
        assert!(out.iter().all(|o| !o));
    }

    #[test]
    fn test_hold_fires_once_past_threshold() {
        let mut presses = vec![true; 14];
        presses.push(false);
        let out = run(ButtonMode::HoldToActivate, &presses);
        // t=500 is the 11th tick
        assert!(out[..10].iter().all(|o| !o));
        assert!(out[10..14].iter().all(|o| *o));
        assert!(!out[14]);

        let rises = out.windows(2).filter(|w| !w[0] && w[1]).count();
        assert_eq!(rises, 1);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut state = ButtonState::new();
        state.tick(ButtonMode::Toggle, true, TICK, timings());
        state.reset();
        assert_eq!(state, ButtonState::default());
        assert!(!state.output());
    }
}
