//! The PWM channel controller.
//!
//! [`PwmController`] owns the per-slice shared-state table and the register
//! backend, and turns frequency/duty requests into register writes. The unit
//! of frequency ownership is the *slice* (wrap value, divider, phase-correct
//! mode); the unit of duty ownership is the *channel*. Configuring one channel
//! re-applies its sibling's stored duty cycle whenever the slice is retimed,
//! so a sibling keeps its intended duty cycle rather than its raw compare
//! value.
//!
//! Duty-only updates touch nothing but the compare register: reinitializing a
//! running slice resets its counter, which shows up as a brief incorrect
//! pulse on the output. A frequency change always reinitializes, and the
//! implied glitch is accepted since the waveform is changing anyway.

use crate::quantize::{self, DutyCycle, Quantization, SliceTiming};
use crate::registers::{
    Channel, PIN_COUNT, PwmRegisters, SLICE_COUNT, SliceConfig, channel_of, slice_of,
};
use crate::{Error, Result};

// ============================================================================
// Per-slice shared state
// ============================================================================

/// Duty-side state of one channel of a slice.
#[derive(Clone, Copy, Debug, Default)]
struct ChannelState {
    /// Whether this channel currently has an owner.
    active: bool,
    /// The GPIO that owns the channel (two GPIOs 16 apart alias one channel).
    pin: u8,
    /// Last compare value written. Also the redundant-write cache for the
    /// manual fast path.
    level: u16,
    /// The intended duty cycle, re-applied against a new top on retime.
    duty: DutyCycle,
}

/// Frequency-side state shared by both channels of a slice.
#[derive(Clone, Copy, Debug, Default)]
struct SliceState {
    /// Whether top/divider were programmed at least once.
    configured: bool,
    /// Whether the current configuration came from `configure_manual`,
    /// gating the manual-level fast paths.
    manual: bool,
    frequency_hz: f64,
    actual_hz: f64,
    top: u16,
    div_int: u8,
    div_frac: u8,
    phase_correct: bool,
    invert_a: bool,
    invert_b: bool,
    enabled: bool,
    a: ChannelState,
    b: ChannelState,
}

impl SliceState {
    const fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::A => &self.a,
            Channel::B => &self.b,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
        }
    }
}

// ============================================================================
// ChannelConfig - the per-pin cached view
// ============================================================================

/// The cached configuration of one logical PWM output.
///
/// Pure reads of controller state; no hardware access. After a failed call
/// these keep reflecting the last successful configuration.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pin: u8,
    slice: u8,
    channel: Channel,
    frequency_hz: f64,
    actual_hz: f64,
    duty: DutyCycle,
    level: u16,
    top: u16,
    div_int: u8,
    div_frac: u8,
    phase_correct: bool,
    enabled: bool,
}

impl ChannelConfig {
    /// The owning GPIO number.
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// The hardware slice this output belongs to.
    #[must_use]
    pub const fn slice(&self) -> u8 {
        self.slice
    }

    /// Channel A or B of the slice.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// The requested frequency in Hz.
    #[must_use]
    pub const fn frequency(&self) -> f64 {
        self.frequency_hz
    }

    /// The achieved frequency after integer rounding.
    #[must_use]
    pub const fn actual_frequency(&self) -> f64 {
        self.actual_hz
    }

    /// The channel's duty cycle.
    #[must_use]
    pub const fn duty_cycle(&self) -> DutyCycle {
        self.duty
    }

    /// The compare value realizing the duty cycle.
    #[must_use]
    pub const fn level(&self) -> u16 {
        self.level
    }

    /// The slice counter wrap value.
    #[must_use]
    pub const fn top(&self) -> u16 {
        self.top
    }

    /// The slice clock divider as a real number.
    #[must_use]
    pub fn divider(&self) -> f64 {
        f64::from(self.div_int) + f64::from(self.div_frac) / 16.0
    }

    /// The integer part of the slice clock divider.
    #[must_use]
    pub const fn divider_int(&self) -> u8 {
        self.div_int
    }

    /// Whether the slice counts up-then-down.
    #[must_use]
    pub const fn phase_correct(&self) -> bool {
        self.phase_correct
    }

    /// Whether the slice output is currently enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// PwmController
// ============================================================================

/// Owns the slice table and a register backend, and maps frequency/duty
/// requests onto the PWM hardware.
///
/// Single-threaded, synchronous, and non-blocking: every operation completes
/// by direct register writes. The controller performs no internal locking;
/// callers in a concurrent environment must serialize access themselves.
///
/// # Example
///
/// ```rust
/// use pwm_kit::mock::MockRegisters;
/// use pwm_kit::{DutyCycle, PwmController};
///
/// let mut pwm = PwmController::new(MockRegisters::new(), 125_000_000);
/// pwm.configure(25, 1_000.0, DutyCycle::from_percent(50.0), false)?;
///
/// let channel = pwm.channel(25).expect("just configured");
/// assert_eq!(channel.top(), 12_499);
/// assert_eq!(channel.level(), 6_250);
/// # Ok::<(), pwm_kit::Error>(())
/// ```
///
/// On hardware, construct it over [`Rp2040Registers`](crate::rp2040::Rp2040Registers)
/// instead of the mock; see the `demos/` directory.
pub struct PwmController<R: PwmRegisters> {
    regs: R,
    cpu_hz: u32,
    policy: Quantization,
    slices: [SliceState; SLICE_COUNT],
    channels: [Option<ChannelConfig>; PIN_COUNT],
}

impl<R: PwmRegisters> PwmController<R> {
    /// Create a controller with the default ([`Quantization::Tiered`]) policy.
    ///
    /// `cpu_hz` is the system clock feeding the PWM slices; it scales the
    /// frequency bounds and the quantization formula.
    #[must_use]
    pub fn new(regs: R, cpu_hz: u32) -> Self {
        Self::with_quantization(regs, cpu_hz, Quantization::default())
    }

    /// Create a controller with an explicit quantization policy.
    #[must_use]
    pub fn with_quantization(regs: R, cpu_hz: u32, policy: Quantization) -> Self {
        Self {
            regs,
            cpu_hz,
            policy,
            slices: [SliceState::default(); SLICE_COUNT],
            channels: [None; PIN_COUNT],
        }
    }

    /// The system clock the controller was constructed with, in Hz.
    #[must_use]
    pub const fn cpu_clock(&self) -> u32 {
        self.cpu_hz
    }

    /// The active quantization policy.
    #[must_use]
    pub const fn quantization(&self) -> Quantization {
        self.policy
    }

    /// The register backend, for inspection.
    #[must_use]
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Consume the controller and return the register backend.
    #[must_use]
    pub fn into_registers(self) -> R {
        self.regs
    }

    /// The cached configuration of a pin, if it was ever configured.
    #[must_use]
    pub fn channel(&self, pin: u8) -> Option<&ChannelConfig> {
        self.channels.get(usize::from(pin)).and_then(Option::as_ref)
    }

    // ------------------------------------------------------------------
    // Frequency/duty configuration
    // ------------------------------------------------------------------

    /// Drive `pin` at `freq_hz` with the given duty cycle.
    ///
    /// If the slice frequency changed, the slice is fully reinitialized and
    /// the sibling channel's duty cycle is re-applied against the new wrap
    /// value. If only the duty changed, a single compare write happens and
    /// the running counter is left alone. If nothing changed, no registers
    /// are written. The slice output is enabled on success.
    ///
    /// # Errors
    ///
    /// [`Error::FrequencyOutOfRange`] or [`Error::InvalidPinMapping`];
    /// rejections happen before any register write.
    pub fn configure(
        &mut self,
        pin: u8,
        freq_hz: f64,
        duty: DutyCycle,
        phase_correct: bool,
    ) -> Result<()> {
        let slice = slice_of(pin)?;
        let channel = channel_of(pin)?;
        let timing = quantize::quantize(self.cpu_hz, freq_hz, phase_correct, self.policy)?;

        let config = SliceConfig {
            top: timing.top,
            div_int: timing.div_int,
            div_frac: timing.div_frac,
            phase_correct,
            invert_a: false,
            invert_b: false,
        };

        let state = &self.slices[usize::from(slice)];
        let retime = !state.configured
            || state.manual
            || state.frequency_hz != freq_hz
            || state.phase_correct != phase_correct
            || state.invert_a
            || state.invert_b;

        if retime {
            self.retime_slice(slice, channel, pin, &config, freq_hz, timing, duty);
            info!(
                "pwm configure: pin {} slice {} retimed, top={} div={}",
                pin, slice, timing.top, timing.div_int
            );
        } else {
            self.update_duty(slice, channel, pin, duty);
        }

        for refreshed in [Channel::A, Channel::B] {
            self.refresh_channel_view(slice, refreshed);
        }
        Ok(())
    }

    /// Drive `pin` with the given period in microseconds.
    ///
    /// Convenience wrapper deriving `freq_hz = 1e6 / period_us` and
    /// delegating to [`configure`](Self::configure).
    ///
    /// # Errors
    ///
    /// Same as [`configure`](Self::configure).
    pub fn configure_by_period(
        &mut self,
        pin: u8,
        period_us: f64,
        duty: DutyCycle,
        phase_correct: bool,
    ) -> Result<()> {
        self.configure(pin, 1_000_000.0 / period_us, duty, phase_correct)
    }

    /// Drive two pins of one slice as a complementary (push-pull) pair.
    ///
    /// The pins must be the A and B channels of the same hardware slice, in
    /// either argument order. The A channel carries the duty cycle, the B
    /// channel the complement (`top - level`) with inverted polarity, and
    /// phase-correct mode is forced on. Suitable for half-bridge and
    /// stepper-style drive.
    ///
    /// # Errors
    ///
    /// [`Error::MismatchedPushPullPins`] if the pins do not share a slice or
    /// occupy the same channel; [`Error::FrequencyOutOfRange`] and
    /// [`Error::InvalidPinMapping`] as for [`configure`](Self::configure).
    /// Rejections happen before any register write.
    pub fn configure_push_pull(
        &mut self,
        pin_a: u8,
        pin_b: u8,
        freq_hz: f64,
        duty: DutyCycle,
    ) -> Result<()> {
        let slice = slice_of(pin_a)?;
        if slice_of(pin_b)? != slice || channel_of(pin_a)? == channel_of(pin_b)? {
            error!("push-pull pins {} and {} do not pair up", pin_a, pin_b);
            return Err(Error::MismatchedPushPullPins);
        }
        // Phase-correct is forced: complementary drive wants symmetric edges.
        let timing = quantize::quantize(self.cpu_hz, freq_hz, true, self.policy)?;

        // Roles follow the hardware channel, not the argument order.
        let (a_pin, b_pin) = match channel_of(pin_a)? {
            Channel::A => (pin_a, pin_b),
            Channel::B => (pin_b, pin_a),
        };
        let level_a = duty.level_for(timing.top);
        let level_b = timing.top - level_a;

        let state = &self.slices[usize::from(slice)];
        let retime = !state.configured
            || state.manual
            || state.frequency_hz != freq_hz
            || !state.phase_correct
            || state.invert_a
            || !state.invert_b;

        if retime {
            self.regs.assign_pin(a_pin);
            self.regs.assign_pin(b_pin);
            let config = SliceConfig {
                top: timing.top,
                div_int: timing.div_int,
                div_frac: timing.div_frac,
                phase_correct: true,
                invert_a: false,
                invert_b: true,
            };
            self.regs.init(slice, &config, true);
            self.regs.set_channel_level(slice, Channel::A, level_a);
            self.regs.set_channel_level(slice, Channel::B, level_b);
            info!(
                "pwm push-pull: pins {}/{} slice {} top={} levels {}/{}",
                a_pin, b_pin, slice, timing.top, level_a, level_b
            );
        } else {
            // Timing unchanged: route any newly owning pins (aliased GPIOs 16
            // apart can take over a running pair) and touch only the compare
            // registers.
            let takeover_a = !state.a.active || state.a.pin != a_pin;
            let takeover_b = !state.b.active || state.b.pin != b_pin;
            if takeover_a {
                self.regs.assign_pin(a_pin);
            }
            if takeover_b {
                self.regs.assign_pin(b_pin);
            }
            let state = &self.slices[usize::from(slice)];
            if takeover_a || state.a.level != level_a {
                self.regs.set_channel_level(slice, Channel::A, level_a);
            }
            if takeover_b || state.b.level != level_b {
                self.regs.set_channel_level(slice, Channel::B, level_b);
            }
        }

        let state = &mut self.slices[usize::from(slice)];
        state.configured = true;
        state.manual = false;
        state.frequency_hz = freq_hz;
        state.actual_hz = timing.actual_hz;
        state.top = timing.top;
        state.div_int = timing.div_int;
        state.div_frac = timing.div_frac;
        state.phase_correct = true;
        state.invert_a = false;
        state.invert_b = true;
        state.enabled = true;
        self.claim_channel(slice, Channel::A, a_pin, level_a, duty);
        self.claim_channel(slice, Channel::B, b_pin, level_b, duty.complement());

        self.refresh_channel_view(slice, Channel::A);
        self.refresh_channel_view(slice, Channel::B);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Manual mode
    // ------------------------------------------------------------------

    /// Program raw `top`/`divider`/compare values, bypassing quantization.
    ///
    /// The escape hatch for waveform synthesis where the caller computes
    /// timing externally. Marks the slice as manual-initialized, which gates
    /// [`set_manual_level`](Self::set_manual_level). `level` is clamped to
    /// `top`; a divider of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
    pub fn configure_manual(
        &mut self,
        pin: u8,
        top: u16,
        divider: u8,
        level: u16,
        phase_correct: bool,
    ) -> Result<()> {
        let slice = slice_of(pin)?;
        let channel = channel_of(pin)?;
        let div_int = divider.max(1);
        let level = level.min(top);

        let config = SliceConfig {
            top,
            div_int,
            div_frac: 0,
            phase_correct,
            invert_a: false,
            invert_b: false,
        };
        let sibling = channel.sibling();
        let sibling_state = *self.slices[usize::from(slice)].channel(sibling);

        self.regs.assign_pin(pin);
        self.regs.init(slice, &config, true);
        self.regs.set_channel_level(slice, channel, level);

        // Keep the sibling's intended duty across the top change.
        let sibling_level = sibling_state.duty.level_for(top);
        if sibling_state.active {
            self.regs.set_channel_level(slice, sibling, sibling_level);
        }

        let derived_hz = quantize::actual_hz(self.cpu_hz, top, div_int, 0, phase_correct);
        let state = &mut self.slices[usize::from(slice)];
        state.configured = true;
        state.manual = true;
        state.frequency_hz = derived_hz;
        state.actual_hz = derived_hz;
        state.top = top;
        state.div_int = div_int;
        state.div_frac = 0;
        state.phase_correct = phase_correct;
        state.invert_a = false;
        state.invert_b = false;
        state.enabled = true;
        self.claim_channel(slice, channel, pin, level, duty_of_level(level, top));
        if sibling_state.active {
            self.slices[usize::from(slice)].channel_mut(sibling).level = sibling_level;
            self.refresh_channel_view(slice, sibling);
        }

        self.refresh_channel_view(slice, channel);
        debug!("pwm manual: pin {} top={} div={} level={}", pin, top, div_int, level);
        Ok(())
    }

    /// Update the compare value of a manually configured slice.
    ///
    /// `level` is clamped to the slice's `top`. Writes nothing when the
    /// clamped level equals the last one written.
    ///
    /// # Errors
    ///
    /// [`Error::UninitializedManualSlice`] if the slice was never configured
    /// via [`configure_manual`](Self::configure_manual);
    /// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
    pub fn set_manual_level(&mut self, pin: u8, level: u16) -> Result<()> {
        let slice = slice_of(pin)?;
        let channel = channel_of(pin)?;
        let state = &self.slices[usize::from(slice)];
        if !state.manual {
            error!("set_manual_level on pin {} before configure_manual", pin);
            return Err(Error::UninitializedManualSlice);
        }
        let level = level.min(state.top);
        let top = state.top;
        let own = *state.channel(channel);

        if !own.active || own.pin != pin {
            self.regs.assign_pin(pin);
        }
        if !own.active || own.pin != pin || own.level != level {
            self.regs.set_channel_level(slice, channel, level);
        }

        self.claim_channel(slice, channel, pin, level, duty_of_level(level, top));
        self.refresh_channel_view(slice, channel);
        Ok(())
    }

    /// Minimal-latency compare write for tight timing loops.
    ///
    /// No validation and no bookkeeping beyond the cached previous level used
    /// to skip redundant writes. The caller is responsible for having set up
    /// the slice (via [`configure_manual`](Self::configure_manual)) and for
    /// keeping `level` within `top`; cached accessor views are not refreshed.
    pub fn set_manual_level_fast(&mut self, pin: u8, level: u16) {
        let slice = (pin >> 1) & 0x7;
        let channel = if pin & 1 == 0 { Channel::A } else { Channel::B };
        {
            let state = self.slices[usize::from(slice)].channel_mut(channel);
            if state.level == level {
                return;
            }
            state.level = level;
        }
        self.regs.set_channel_level(slice, channel, level);
    }

    // ------------------------------------------------------------------
    // Enable / disable
    // ------------------------------------------------------------------

    /// Enable the output of the slice serving `pin`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
    pub fn enable(&mut self, pin: u8) -> Result<()> {
        self.set_slice_enabled(slice_of(pin)?, true);
        Ok(())
    }

    /// Disable the output of the slice serving `pin`.
    ///
    /// Disable-only semantics: cached state survives and a later
    /// [`enable`](Self::enable) resumes the previous waveform.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPinMapping`] if `pin` is not a user GPIO.
    pub fn disable(&mut self, pin: u8) -> Result<()> {
        self.set_slice_enabled(slice_of(pin)?, false);
        Ok(())
    }

    fn set_slice_enabled(&mut self, slice: u8, enabled: bool) {
        if self.slices[usize::from(slice)].enabled == enabled {
            return;
        }
        self.regs.set_enabled(slice, enabled);
        self.slices[usize::from(slice)].enabled = enabled;
        for channel in [Channel::A, Channel::B] {
            if self.slices[usize::from(slice)].channel(channel).active {
                self.refresh_channel_view(slice, channel);
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Full reinitialization path: frequency (or mode) changed.
    #[expect(clippy::too_many_arguments, reason = "internal, all call-site derived")]
    fn retime_slice(
        &mut self,
        slice: u8,
        channel: Channel,
        pin: u8,
        config: &SliceConfig,
        freq_hz: f64,
        timing: SliceTiming,
        duty: DutyCycle,
    ) {
        let level = duty.level_for(timing.top);
        let sibling = channel.sibling();
        let sibling_state = *self.slices[usize::from(slice)].channel(sibling);

        self.regs.assign_pin(pin);
        self.regs.init(slice, config, true);
        self.regs.set_channel_level(slice, channel, level);

        // The sibling shares top/divider: re-apply its duty against the new
        // top, or it would keep a compare value meant for the old one.
        let sibling_level = sibling_state.duty.level_for(timing.top);
        if sibling_state.active {
            self.regs.set_channel_level(slice, sibling, sibling_level);
        }

        let state = &mut self.slices[usize::from(slice)];
        state.configured = true;
        state.manual = false;
        state.frequency_hz = freq_hz;
        state.actual_hz = timing.actual_hz;
        state.top = timing.top;
        state.div_int = timing.div_int;
        state.div_frac = timing.div_frac;
        state.phase_correct = config.phase_correct;
        state.invert_a = config.invert_a;
        state.invert_b = config.invert_b;
        state.enabled = true;
        self.claim_channel(slice, channel, pin, level, duty);
        if sibling_state.active {
            self.slices[usize::from(slice)].channel_mut(sibling).level = sibling_level;
            self.refresh_channel_view(slice, sibling);
        }
    }

    /// Duty-only path: timing unchanged, touch at most the compare register.
    fn update_duty(&mut self, slice: u8, channel: Channel, pin: u8, duty: DutyCycle) {
        let state = &self.slices[usize::from(slice)];
        let level = duty.level_for(state.top);
        let own = *state.channel(channel);
        let takeover = !own.active || own.pin != pin;

        if takeover {
            self.regs.assign_pin(pin);
        }
        if takeover || own.level != level {
            self.regs.set_channel_level(slice, channel, level);
        }
        if !self.slices[usize::from(slice)].enabled {
            self.regs.set_enabled(slice, true);
            self.slices[usize::from(slice)].enabled = true;
        }
        self.claim_channel(slice, channel, pin, level, duty);
    }

    /// Record channel ownership, evicting a stale aliased-pin view if the
    /// owning GPIO changed (e.g. GPIO 0 handing over to GPIO 16).
    fn claim_channel(&mut self, slice: u8, channel: Channel, pin: u8, level: u16, duty: DutyCycle) {
        let state = self.slices[usize::from(slice)].channel_mut(channel);
        if state.active && state.pin != pin {
            self.channels[usize::from(state.pin)] = None;
        }
        *state = ChannelState {
            active: true,
            pin,
            level,
            duty,
        };
    }

    /// Rebuild the per-pin accessor view from slice state.
    fn refresh_channel_view(&mut self, slice: u8, channel: Channel) {
        let state = &self.slices[usize::from(slice)];
        let own = state.channel(channel);
        if !own.active {
            return;
        }
        self.channels[usize::from(own.pin)] = Some(ChannelConfig {
            pin: own.pin,
            slice,
            channel,
            frequency_hz: state.frequency_hz,
            actual_hz: state.actual_hz,
            duty: own.duty,
            level: own.level,
            top: state.top,
            div_int: state.div_int,
            div_frac: state.div_frac,
            phase_correct: state.phase_correct,
            enabled: state.enabled,
        });
    }
}

/// Back-derive a duty cycle from a raw compare value (manual mode keeps the
/// sibling-reapply invariant working against raw levels too).
fn duty_of_level(level: u16, top: u16) -> DutyCycle {
    if top == 0 {
        return DutyCycle::FULL;
    }
    #[expect(clippy::cast_possible_truncation, reason = "quotient is <= 100_000")]
    let milli_percent = (u64::from(level) * 100_000 / u64::from(top)) as u32;
    DutyCycle::from_milli_percent(milli_percent)
}
