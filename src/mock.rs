//! Recording register layer for hardware-free testing.
//!
//! [`MockRegisters`] implements [`PwmRegisters`] by appending every primitive
//! write to an ordered log and mirroring the resulting register state per
//! slice, so tests can assert both *what* ended up in the registers and *how
//! many* writes it took to get there (the glitch-avoidance policy is a claim
//! about write counts, not end states).

use crate::registers::{Channel, PIN_COUNT, PwmRegisters, SLICE_COUNT};

/// One recorded register write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Write {
    /// GPIO routed to its PWM function.
    AssignPin {
        /// GPIO number.
        pin: u8,
    },
    /// Clock divider written.
    Divider {
        /// Slice index.
        slice: u8,
        /// Integer part.
        div_int: u8,
        /// Fractional part in sixteenths.
        div_frac: u8,
    },
    /// Counter wrap value written.
    Wrap {
        /// Slice index.
        slice: u8,
        /// Wrap value.
        top: u16,
    },
    /// Counting mode written.
    PhaseCorrect {
        /// Slice index.
        slice: u8,
        /// Up-then-down when true.
        phase_correct: bool,
    },
    /// Output polarity written.
    Polarity {
        /// Slice index.
        slice: u8,
        /// Channel A inverted.
        invert_a: bool,
        /// Channel B inverted.
        invert_b: bool,
    },
    /// Duty compare register written.
    Level {
        /// Slice index.
        slice: u8,
        /// Which compare register.
        channel: Channel,
        /// Compare value.
        level: u16,
    },
    /// Enable bit written.
    Enabled {
        /// Slice index.
        slice: u8,
        /// New enable state.
        enabled: bool,
    },
    /// Counter reset to zero (the glitch-producing write).
    CounterReset {
        /// Slice index.
        slice: u8,
    },
}

/// Mirror of one slice's register state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MockSlice {
    /// Counter wrap value.
    pub top: u16,
    /// Integer divider part.
    pub div_int: u8,
    /// Fractional divider part in sixteenths.
    pub div_frac: u8,
    /// Up-then-down counting.
    pub phase_correct: bool,
    /// Channel A output inverted.
    pub invert_a: bool,
    /// Channel B output inverted.
    pub invert_b: bool,
    /// Channel A compare value.
    pub level_a: u16,
    /// Channel B compare value.
    pub level_b: u16,
    /// Output enable bit.
    pub enabled: bool,
}

/// A [`PwmRegisters`] test double recording every write.
#[derive(Clone, Debug, Default)]
pub struct MockRegisters {
    /// Every primitive write, in order.
    pub log: Vec<Write>,
    /// Resulting register state per slice.
    pub slices: [MockSlice; SLICE_COUNT],
    /// Which GPIOs were routed to PWM.
    pub assigned: [bool; PIN_COUNT],
}

impl MockRegisters {
    /// An empty recorder: all slices at reset state, no writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded writes.
    #[must_use]
    pub fn total_writes(&self) -> usize {
        self.log.len()
    }

    /// Number of counter resets a slice has seen (each one is a potential
    /// output glitch).
    #[must_use]
    pub fn counter_resets(&self, slice: u8) -> usize {
        self.log
            .iter()
            .filter(|w| matches!(w, Write::CounterReset { slice: s } if *s == slice))
            .count()
    }

    /// Number of wrap-register writes a slice has seen.
    #[must_use]
    pub fn wrap_writes(&self, slice: u8) -> usize {
        self.log
            .iter()
            .filter(|w| matches!(w, Write::Wrap { slice: s, .. } if *s == slice))
            .count()
    }

    /// Number of compare writes a channel has seen.
    #[must_use]
    pub fn level_writes(&self, slice: u8, channel: Channel) -> usize {
        self.log
            .iter()
            .filter(
                |w| matches!(w, Write::Level { slice: s, channel: c, .. } if *s == slice && *c == channel),
            )
            .count()
    }
}

impl PwmRegisters for MockRegisters {
    fn assign_pin(&mut self, pin: u8) {
        self.log.push(Write::AssignPin { pin });
        if let Some(assigned) = self.assigned.get_mut(usize::from(pin)) {
            *assigned = true;
        }
    }

    fn set_divider(&mut self, slice: u8, div_int: u8, div_frac: u8) {
        self.log.push(Write::Divider {
            slice,
            div_int,
            div_frac,
        });
        self.slices[usize::from(slice)].div_int = div_int;
        self.slices[usize::from(slice)].div_frac = div_frac;
    }

    fn set_wrap(&mut self, slice: u8, top: u16) {
        self.log.push(Write::Wrap { slice, top });
        self.slices[usize::from(slice)].top = top;
    }

    fn set_phase_correct(&mut self, slice: u8, phase_correct: bool) {
        self.log.push(Write::PhaseCorrect {
            slice,
            phase_correct,
        });
        self.slices[usize::from(slice)].phase_correct = phase_correct;
    }

    fn set_output_polarity(&mut self, slice: u8, invert_a: bool, invert_b: bool) {
        self.log.push(Write::Polarity {
            slice,
            invert_a,
            invert_b,
        });
        self.slices[usize::from(slice)].invert_a = invert_a;
        self.slices[usize::from(slice)].invert_b = invert_b;
    }

    fn set_channel_level(&mut self, slice: u8, channel: Channel, level: u16) {
        self.log.push(Write::Level {
            slice,
            channel,
            level,
        });
        match channel {
            Channel::A => self.slices[usize::from(slice)].level_a = level,
            Channel::B => self.slices[usize::from(slice)].level_b = level,
        }
    }

    fn set_enabled(&mut self, slice: u8, enabled: bool) {
        self.log.push(Write::Enabled { slice, enabled });
        self.slices[usize::from(slice)].enabled = enabled;
    }

    fn reset_counter(&mut self, slice: u8) {
        self.log.push(Write::CounterReset { slice });
    }
}

#[cfg(test)]
mod tests {
    use super::{MockRegisters, Write};
    use crate::registers::{Channel, PwmRegisters, SliceConfig};

    #[test]
    fn init_decomposes_into_primitives() {
        let mut mock = MockRegisters::new();
        let config = SliceConfig {
            top: 999,
            div_int: 4,
            div_frac: 8,
            phase_correct: true,
            invert_a: false,
            invert_b: true,
        };
        mock.init(3, &config, true);

        assert_eq!(mock.counter_resets(3), 1);
        assert_eq!(mock.wrap_writes(3), 1);
        assert_eq!(mock.slices[3].top, 999);
        assert_eq!(mock.slices[3].div_int, 4);
        assert_eq!(mock.slices[3].div_frac, 8);
        assert!(mock.slices[3].phase_correct);
        assert!(mock.slices[3].invert_b);
        assert!(mock.slices[3].enabled);
        // Disable precedes the counter reset, enable comes last.
        assert_eq!(mock.log.first(), Some(&Write::Enabled { slice: 3, enabled: false }));
        assert_eq!(mock.log.last(), Some(&Write::Enabled { slice: 3, enabled: true }));
    }

    #[test]
    fn level_writes_are_counted_per_channel() {
        let mut mock = MockRegisters::new();
        mock.set_channel_level(0, Channel::A, 10);
        mock.set_channel_level(0, Channel::A, 20);
        mock.set_channel_level(0, Channel::B, 30);
        assert_eq!(mock.level_writes(0, Channel::A), 2);
        assert_eq!(mock.level_writes(0, Channel::B), 1);
        assert_eq!(mock.slices[0].level_a, 20);
    }
}
