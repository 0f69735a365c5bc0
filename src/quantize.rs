//! Frequency-to-register quantization.
//!
//! The slice hardware produces `cpu_hz / ((top + 1) * divider)` where `top` is
//! a 16-bit wrap value and `divider` an 8.4 fixed-point clock prescaler. No
//! closed form hits an arbitrary target exactly, so this module offers two
//! policies: a fast banded divider ([`Quantization::Tiered`], the default) and
//! an exhaustive lattice search ([`Quantization::BestFit`]) for callers that
//! need minimum frequency error at odd targets.

use crate::{Error, Result};

/// The reference system clock the frequency bounds are specified against.
pub const REFERENCE_CLOCK_HZ: u32 = 125_000_000;

const MIN_FREQUENCY_AT_REFERENCE: f64 = 7.5;
const MAX_FREQUENCY_AT_REFERENCE: f64 = 62_500_000.0;

/// Maximum wrap value of the 16-bit slice counter.
pub const MAX_TOP: u16 = u16::MAX;

/// Lowest requestable frequency for the given system clock.
///
/// 7.5 Hz at the 125 MHz reference clock, scaled linearly: below this no
/// divider keeps `top` within 16 bits.
#[must_use]
pub fn min_frequency(cpu_hz: u32) -> f64 {
    MIN_FREQUENCY_AT_REFERENCE * clock_scale(cpu_hz)
}

/// Highest requestable frequency for the given system clock.
///
/// 62.5 MHz at the 125 MHz reference clock, scaled linearly.
#[must_use]
pub fn max_frequency(cpu_hz: u32) -> f64 {
    MAX_FREQUENCY_AT_REFERENCE * clock_scale(cpu_hz)
}

fn clock_scale(cpu_hz: u32) -> f64 {
    f64::from(cpu_hz) / f64::from(REFERENCE_CLOCK_HZ)
}

fn fabs(value: f64) -> f64 {
    if value < 0.0 { -value } else { value }
}

// ============================================================================
// Quantization policy
// ============================================================================

/// How to trade frequency accuracy against computation.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Quantization {
    /// One fixed integer divider per frequency band, `top` rounded to fit.
    /// Fast and small, but each band's single divider can leave a larger
    /// relative error at odd targets.
    #[default]
    Tiered,
    /// Greedy search over the full `(top, divider)` lattice, including the
    /// 4-bit fractional divider. Minimizes `|actual - requested|` at the cost
    /// of a bounded but much longer search.
    BestFit,
}

/// The register values that realize a quantized frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SliceTiming {
    /// Counter wrap value.
    pub top: u16,
    /// Integer part of the clock divider (1..=255).
    pub div_int: u8,
    /// Fractional part of the clock divider in sixteenths (0..=15; always 0
    /// for [`Quantization::Tiered`]).
    pub div_frac: u8,
    /// The frequency actually achieved after integer rounding.
    pub actual_hz: f64,
}

impl SliceTiming {
    /// The divider as a real number.
    #[must_use]
    pub fn divider(&self) -> f64 {
        f64::from(self.div_int) + f64::from(self.div_frac) / 16.0
    }
}

/// Quantize a target frequency into a wrap value and divider.
///
/// Phase-correct mode counts up then down, doubling the period for the same
/// `top`, so `top` is halved to keep the requested frequency.
///
/// # Errors
///
/// [`Error::FrequencyOutOfRange`] when `freq_hz` lies outside
/// [`min_frequency`]..=[`max_frequency`]; nothing else fails.
pub fn quantize(
    cpu_hz: u32,
    freq_hz: f64,
    phase_correct: bool,
    policy: Quantization,
) -> Result<SliceTiming> {
    if !(min_frequency(cpu_hz)..=max_frequency(cpu_hz)).contains(&freq_hz) {
        error!("frequency out of range for PWM quantization");
        return Err(Error::FrequencyOutOfRange);
    }

    let mut timing = match policy {
        Quantization::Tiered => tiered(cpu_hz, freq_hz)?,
        Quantization::BestFit => best_fit(cpu_hz, freq_hz),
    };

    if phase_correct {
        timing.top /= 2;
        timing.actual_hz = actual_hz(cpu_hz, timing.top, timing.div_int, timing.div_frac, true);
    }

    debug!(
        "quantize: top={} div={}.{} requested/actual differ by rounding",
        timing.top, timing.div_int, timing.div_frac
    );
    Ok(timing)
}

/// The frequency a slice produces for the given register values.
#[must_use]
pub fn actual_hz(cpu_hz: u32, top: u16, div_int: u8, div_frac: u8, phase_correct: bool) -> f64 {
    let divider = f64::from(div_int) + f64::from(div_frac) / 16.0;
    let mut period_cycles = (f64::from(top) + 1.0) * divider;
    if phase_correct {
        period_cycles *= 2.0;
    }
    f64::from(cpu_hz) / period_cycles
}

// ============================================================================
// Tiered policy
// ============================================================================

/// Select the divider by frequency band, then round `top` to fit.
///
/// Band thresholds are specified at the 125 MHz reference clock and scale
/// with the actual clock. Each band bottoms out with `top` near but within
/// the 16-bit limit.
fn tiered(cpu_hz: u32, freq_hz: f64) -> Result<SliceTiming> {
    let scale = clock_scale(cpu_hz);
    let div_int: u32 = if freq_hz > 2000.0 * scale {
        1
    } else if freq_hz >= 200.0 * scale {
        10
    } else if freq_hz >= 20.0 * scale {
        100
    } else if freq_hz >= 10.0 * scale {
        200
    } else if freq_hz >= min_frequency(cpu_hz) {
        255
    } else {
        // Too low for any divider to keep top within 16 bits.
        return Err(Error::FrequencyOutOfRange);
    };

    let top_plus_1 = (f64::from(cpu_hz) / (freq_hz * f64::from(div_int)) + 0.5) as u32;
    let top = top_plus_1.saturating_sub(1).min(u32::from(MAX_TOP)) as u16;
    #[expect(clippy::cast_possible_truncation, reason = "div_int is 1..=255")]
    let div_int = div_int as u8;

    Ok(SliceTiming {
        top,
        div_int,
        div_frac: 0,
        actual_hz: actual_hz(cpu_hz, top, div_int, 0, false),
    })
}

// ============================================================================
// Best-fit policy
// ============================================================================

const MAX_TOP_PLUS_1: u32 = 65_536;
// Divider space scaled by 16 so the fractional part stays integer.
const MIN_DIV_X16: u32 = 16;
const MAX_DIV_X16: u32 = 4_096;

/// Greedy two-level search for the `(top, divider)` pair with the smallest
/// absolute frequency error.
///
/// Sweeps `top + 1` downward from the largest value that can reach the target;
/// for each, sweeps the ×16 divider upward from just below the ideal value and
/// bails out of the inner sweep as soon as the error starts rising. The error
/// along the inner sweep is unimodal (the candidate frequency is monotone in
/// the divider), so the early exit never skips the inner optimum.
fn best_fit(cpu_hz: u32, freq_hz: f64) -> SliceTiming {
    // Work against cpu*16 so the scaled divider divides out exactly.
    let clock_x16 = f64::from(cpu_hz) * 16.0;

    let mut best_error = f64::MAX;
    let mut best_top_plus_1: u32 = 1;
    let mut best_div_x16: u32 = MIN_DIV_X16;

    let mut top_plus_1 = ((f64::from(cpu_hz) / freq_hz) as u32 + 2).min(MAX_TOP_PLUS_1);
    while top_plus_1 > 1 {
        let mut last_error = f64::MAX;

        // Start just below the ideal divider for this top.
        let ideal = (clock_x16 / freq_hz / f64::from(top_plus_1)) as i64;
        let mut div_x16 = ideal.saturating_sub(2).max(i64::from(MIN_DIV_X16)) as u32;

        while div_x16 < MAX_DIV_X16 {
            let candidate_hz = clock_x16 / (f64::from(div_x16) * f64::from(top_plus_1));
            let error = fabs(candidate_hz - freq_hz);

            // Error is rising; the rest of this sweep only gets worse.
            if error > last_error {
                break;
            }
            last_error = error;

            if error < best_error {
                best_error = error;
                best_top_plus_1 = top_plus_1;
                best_div_x16 = div_x16;
            }
            div_x16 += 1;
        }
        top_plus_1 -= 1;
    }

    #[expect(clippy::cast_possible_truncation, reason = "bounded by the lattice limits")]
    let (top, div_int, div_frac) = (
        (best_top_plus_1 - 1) as u16,
        (best_div_x16 / 16) as u8,
        (best_div_x16 % 16) as u8,
    );

    SliceTiming {
        top,
        div_int,
        div_frac,
        actual_hz: actual_hz(cpu_hz, top, div_int, div_frac, false),
    }
}

// ============================================================================
// DutyCycle
// ============================================================================

/// A duty cycle in thousandths of a percent (0..=100_000).
///
/// The integer scale keeps the duty-to-compare mapping free of floating point
/// on the hot path. Constructors clamp instead of failing.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycle(u32);

impl DutyCycle {
    /// Fully off.
    pub const ZERO: Self = Self(0);
    /// Fully on.
    pub const FULL: Self = Self(100_000);

    /// From thousandths of a percent, clamped to 0..=100_000.
    #[must_use]
    pub const fn from_milli_percent(milli_percent: u32) -> Self {
        if milli_percent > Self::FULL.0 {
            Self::FULL
        } else {
            Self(milli_percent)
        }
    }

    /// From percent, clamped to 0..=100.
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent <= 0.0 {
            return Self::ZERO;
        }
        Self::from_milli_percent((percent * 1000.0 + 0.5) as u32)
    }

    /// The raw thousandths-of-a-percent value.
    #[must_use]
    pub const fn milli_percent(self) -> u32 {
        self.0
    }

    /// The value as percent.
    #[must_use]
    pub fn percent(self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// The duty that fills the remainder of the period.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(Self::FULL.0 - self.0)
    }

    /// The compare level realizing this duty against a wrap value, rounded.
    #[must_use]
    pub const fn level_for(self, top: u16) -> u16 {
        let scaled = top as u64 * self.0 as u64;
        #[expect(clippy::cast_possible_truncation, reason = "result is <= top")]
        let level = ((scaled + Self::FULL.0 as u64 / 2) / Self::FULL.0 as u64) as u16;
        level
    }
}

#[cfg(test)]
mod tests {
    use super::DutyCycle;

    #[test]
    fn duty_clamps_and_rounds() {
        assert_eq!(DutyCycle::from_milli_percent(250_000), DutyCycle::FULL);
        assert_eq!(DutyCycle::from_percent(50.0).milli_percent(), 50_000);
        assert_eq!(DutyCycle::from_percent(-3.0), DutyCycle::ZERO);
        assert_eq!(DutyCycle::from_percent(50.0).level_for(12_499), 6_250);
        assert_eq!(DutyCycle::FULL.level_for(999), 999);
    }

    #[test]
    fn complement_is_exact_on_the_integer_scale() {
        let duty = DutyCycle::from_percent(25.0);
        assert_eq!(duty.complement().milli_percent(), 75_000);
        assert_eq!(duty.complement().complement(), duty);
    }
}
