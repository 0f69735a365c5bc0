//! The hardware register boundary for PWM slices.
//!
//! [`PwmRegisters`] names the primitive capabilities the controller is built
//! on: GPIO function selection, slice clock configuration, compare writes, and
//! the enable bit. The RP2040 implementation lives in [`crate::rp2040`]; a
//! recording test double lives in [`crate::mock`].

use crate::{Error, Result};

/// Number of PWM slices on the RP2040.
pub const SLICE_COUNT: usize = 8;

/// Number of user GPIOs on the RP2040 (GPIO 0..=29).
pub const PIN_COUNT: usize = 30;

// ============================================================================
// Pin mapping
// ============================================================================

/// One of the two outputs of a PWM slice.
///
/// Even GPIOs are channel A, odd GPIOs are channel B. Only the duty compare
/// value is per-channel; wrap, divider, and phase-correct are per-slice.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel A (even GPIO).
    A,
    /// Channel B (odd GPIO).
    B,
}

impl Channel {
    /// The other output of the same slice.
    #[must_use]
    pub const fn sibling(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Map a GPIO number to its PWM slice.
///
/// Each slice serves two GPIOs 16 apart as well (e.g. GPIO 0 and GPIO 16 are
/// both slice 0 channel A); the controller treats those as the same channel.
///
/// # Errors
///
/// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
pub const fn slice_of(pin: u8) -> Result<u8> {
    if (pin as usize) < PIN_COUNT {
        Ok((pin >> 1) & 0x7)
    } else {
        Err(Error::InvalidPinMapping)
    }
}

/// Map a GPIO number to channel A or B of its slice.
///
/// # Errors
///
/// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
pub const fn channel_of(pin: u8) -> Result<Channel> {
    if (pin as usize) >= PIN_COUNT {
        Err(Error::InvalidPinMapping)
    } else if pin & 1 == 0 {
        Ok(Channel::A)
    } else {
        Ok(Channel::B)
    }
}

// ============================================================================
// Slice configuration
// ============================================================================

/// Everything a slice shares between its two channels.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SliceConfig {
    /// 16-bit counter wrap value; the counter runs 0..=top.
    pub top: u16,
    /// Integer part of the clock divider (1..=255).
    pub div_int: u8,
    /// Fractional part of the clock divider in sixteenths (0..=15).
    pub div_frac: u8,
    /// Count up-then-down (triangle) instead of up-only (sawtooth).
    pub phase_correct: bool,
    /// Invert the channel A output.
    pub invert_a: bool,
    /// Invert the channel B output.
    pub invert_b: bool,
}

// ============================================================================
// PwmRegisters - the register-write boundary
// ============================================================================

/// Primitive register operations on PWM slices.
///
/// Implementations perform direct register writes with no validation; all
/// range and ownership checks happen in the controller before any of these
/// are called.
pub trait PwmRegisters {
    /// Route the GPIO to its PWM slice output (function select).
    fn assign_pin(&mut self, pin: u8);

    /// Set the slice clock divider.
    fn set_divider(&mut self, slice: u8, div_int: u8, div_frac: u8);

    /// Set the counter wrap value.
    fn set_wrap(&mut self, slice: u8, top: u16);

    /// Select up-then-down (true) or up-only (false) counting.
    fn set_phase_correct(&mut self, slice: u8, phase_correct: bool);

    /// Set the output polarity of both channels.
    fn set_output_polarity(&mut self, slice: u8, invert_a: bool, invert_b: bool);

    /// Write a channel's duty compare register.
    fn set_channel_level(&mut self, slice: u8, channel: Channel, level: u16);

    /// Set or clear the slice enable bit.
    fn set_enabled(&mut self, slice: u8, enabled: bool);

    /// Reset the slice counter to zero. This is the write that produces a
    /// visible output glitch, so it must only happen on a full reinit.
    fn reset_counter(&mut self, slice: u8);

    /// Full slice (re)initialization: disable, reset the counter, apply the
    /// shared configuration, and optionally start the counter running.
    fn init(&mut self, slice: u8, config: &SliceConfig, start: bool) {
        self.set_enabled(slice, false);
        self.reset_counter(slice);
        self.set_divider(slice, config.div_int, config.div_frac);
        self.set_wrap(slice, config.top);
        self.set_phase_correct(slice, config.phase_correct);
        self.set_output_polarity(slice, config.invert_a, config.invert_b);
        if start {
            self.set_enabled(slice, true);
        }
    }
}
