//! RP2040 register implementation of the [`PwmRegisters`] boundary.
//!
//! Direct writes through `embassy_rp::pac`: `IO_BANK0` for GPIO function
//! select, the `PWM` block's per-slice CSR/DIV/CTR/CC/TOP registers for
//! everything else. The system clock is read once from
//! [`embassy_rp::clocks::clk_sys_freq`] when constructing a controller via
//! [`PwmController::rp2040`].

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pac;

use crate::controller::PwmController;
use crate::registers::{Channel, PwmRegisters};

// PWM output is GPIO function 4 for all pads.
const PWM_FUNCSEL: u8 = 4;

/// The memory-mapped PWM block of the RP2040.
///
/// Zero-sized; all state lives in the hardware. Constructing more than one is
/// possible but pointless, since they alias the same registers — hold it
/// inside a single [`PwmController`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Rp2040Registers;

impl Rp2040Registers {
    /// Create the register backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PwmRegisters for Rp2040Registers {
    fn assign_pin(&mut self, pin: u8) {
        pac::IO_BANK0
            .gpio(usize::from(pin))
            .ctrl()
            .write(|w| w.set_funcsel(PWM_FUNCSEL));
    }

    fn set_divider(&mut self, slice: u8, div_int: u8, div_frac: u8) {
        pac::PWM.ch(usize::from(slice)).div().write(|w| {
            w.set_int(div_int);
            w.set_frac(div_frac);
        });
    }

    fn set_wrap(&mut self, slice: u8, top: u16) {
        pac::PWM
            .ch(usize::from(slice))
            .top()
            .write(|w| w.set_top(top));
    }

    fn set_phase_correct(&mut self, slice: u8, phase_correct: bool) {
        pac::PWM
            .ch(usize::from(slice))
            .csr()
            .modify(|w| w.set_ph_correct(phase_correct));
    }

    fn set_output_polarity(&mut self, slice: u8, invert_a: bool, invert_b: bool) {
        pac::PWM.ch(usize::from(slice)).csr().modify(|w| {
            w.set_a_inv(invert_a);
            w.set_b_inv(invert_b);
        });
    }

    fn set_channel_level(&mut self, slice: u8, channel: Channel, level: u16) {
        pac::PWM.ch(usize::from(slice)).cc().modify(|w| match channel {
            Channel::A => w.set_a(level),
            Channel::B => w.set_b(level),
        });
    }

    fn set_enabled(&mut self, slice: u8, enabled: bool) {
        pac::PWM
            .ch(usize::from(slice))
            .csr()
            .modify(|w| w.set_en(enabled));
    }

    fn reset_counter(&mut self, slice: u8) {
        pac::PWM
            .ch(usize::from(slice))
            .ctr()
            .write(|w| w.set_ctr(0));
    }
}

impl PwmController<Rp2040Registers> {
    /// A controller over the RP2040's PWM block, clocked at the current
    /// system clock.
    #[must_use]
    pub fn rp2040() -> Self {
        Self::new(Rp2040Registers::new(), clk_sys_freq())
    }
}
