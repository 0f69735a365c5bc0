#![allow(missing_docs)]
//! Host-level tests for the PWM channel controller against the recording
//! register layer.

use pwm_kit::mock::{MockRegisters, Write};
use pwm_kit::registers::Channel;
use pwm_kit::{DutyCycle, Error, PwmController, Quantization};

const CPU_HZ: u32 = 125_000_000;

fn controller() -> PwmController<MockRegisters> {
    PwmController::new(MockRegisters::new(), CPU_HZ)
}

fn pct(percent: f64) -> DutyCycle {
    DutyCycle::from_percent(percent)
}

#[test]
fn configure_programs_the_expected_registers() {
    let mut pwm = controller();
    // GPIO 25 is slice 4, channel B.
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");

    let mock = pwm.registers();
    assert!(mock.assigned[25]);
    assert_eq!(mock.slices[4].top, 12_499);
    assert_eq!(mock.slices[4].div_int, 10);
    assert_eq!(mock.slices[4].div_frac, 0);
    assert_eq!(mock.slices[4].level_b, 6_250);
    assert!(mock.slices[4].enabled);
    assert!(!mock.slices[4].phase_correct);

    let channel = pwm.channel(25).expect("configured");
    assert_eq!(channel.pin(), 25);
    assert_eq!(channel.slice(), 4);
    assert_eq!(channel.channel(), Channel::B);
    assert_eq!(channel.top(), 12_499);
    assert_eq!(channel.divider_int(), 10);
    assert_eq!(channel.level(), 6_250);
    assert!((channel.actual_frequency() - 1_000.0).abs() < 1e-9);
    assert!(channel.is_enabled());
}

#[test]
fn out_of_range_frequency_is_an_atomic_no_op() {
    let mut pwm = controller();
    assert_eq!(
        pwm.configure(25, 1.0, pct(50.0), false),
        Err(Error::FrequencyOutOfRange)
    );
    assert_eq!(
        pwm.configure(25, 100_000_000.0, pct(50.0), false),
        Err(Error::FrequencyOutOfRange)
    );
    assert_eq!(pwm.registers().total_writes(), 0);
    assert!(pwm.channel(25).is_none());
}

#[test]
fn rejected_call_keeps_the_previous_configuration_visible() {
    let mut pwm = controller();
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");
    let writes = pwm.registers().total_writes();

    assert_eq!(
        pwm.configure(25, 2.0, pct(10.0), false),
        Err(Error::FrequencyOutOfRange)
    );
    assert_eq!(pwm.registers().total_writes(), writes);
    let channel = pwm.channel(25).expect("still configured");
    assert!((channel.frequency() - 1_000.0).abs() < 1e-9);
    assert_eq!(channel.duty_cycle(), pct(50.0));
}

#[test]
fn invalid_pin_is_rejected_before_any_write() {
    let mut pwm = controller();
    assert_eq!(
        pwm.configure(30, 1_000.0, pct(50.0), false),
        Err(Error::InvalidPinMapping)
    );
    assert_eq!(pwm.enable(99), Err(Error::InvalidPinMapping));
    assert_eq!(pwm.registers().total_writes(), 0);
}

#[test]
fn identical_reconfigure_writes_nothing() {
    let mut pwm = controller();
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");
    let writes = pwm.registers().total_writes();

    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");
    assert_eq!(pwm.registers().total_writes(), writes);
}

#[test]
fn duty_only_update_touches_only_the_compare_register() {
    let mut pwm = controller();
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");
    let writes = pwm.registers().total_writes();

    pwm.configure(25, 1_000.0, pct(75.0), false).expect("in range");

    let mock = pwm.registers();
    // Exactly one write, and it is the compare register; the running counter
    // was never reset and the wrap value never rewritten.
    assert_eq!(mock.total_writes(), writes + 1);
    assert_eq!(
        mock.log.last(),
        Some(&Write::Level {
            slice: 4,
            channel: Channel::B,
            level: 9_374,
        })
    );
    assert_eq!(mock.counter_resets(4), 1);
    assert_eq!(mock.wrap_writes(4), 1);
    assert_eq!(pwm.channel(25).expect("configured").duty_cycle(), pct(75.0));
}

#[test]
fn frequency_change_reinitializes_the_slice() {
    let mut pwm = controller();
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");
    pwm.configure(25, 4_000.0, pct(50.0), false).expect("in range");

    let mock = pwm.registers();
    assert_eq!(mock.counter_resets(4), 2);
    assert_eq!(mock.slices[4].top, 31_249);
    assert_eq!(mock.slices[4].div_int, 1);
}

#[test]
fn sibling_channel_is_untouched_when_frequency_matches() {
    let mut pwm = controller();
    // GPIO 6/7 are channels A/B of slice 3.
    pwm.configure(6, 1_000.0, pct(25.0), false).expect("in range");
    let resets = pwm.registers().counter_resets(3);

    pwm.configure(7, 1_000.0, pct(50.0), false).expect("in range");
    let mock = pwm.registers();
    assert_eq!(mock.counter_resets(3), resets, "no reinit for a sibling join");
    assert_eq!(mock.slices[3].level_a, pct(25.0).level_for(12_499));
    assert_eq!(mock.slices[3].level_b, pct(50.0).level_for(12_499));
}

#[test]
fn retiming_reapplies_the_siblings_duty_cycle() {
    let mut pwm = controller();
    pwm.configure(6, 1_000.0, pct(25.0), false).expect("in range");
    pwm.configure(7, 1_000.0, pct(50.0), false).expect("in range");

    // Changing frequency through channel B changes it for channel A too; A's
    // compare value must track its duty cycle against the new top.
    pwm.configure(7, 4_000.0, pct(50.0), false).expect("in range");

    let mock = pwm.registers();
    let top = mock.slices[3].top;
    assert_eq!(top, 31_249);
    assert_eq!(mock.slices[3].level_a, pct(25.0).level_for(top));
    assert_eq!(mock.slices[3].level_b, pct(50.0).level_for(top));

    // The sibling's cached view was refreshed as well.
    let sibling = pwm.channel(6).expect("still configured");
    assert_eq!(sibling.top(), top);
    assert!((sibling.actual_frequency() - 4_000.0).abs() < 1.0);
    assert_eq!(sibling.duty_cycle(), pct(25.0));
}

#[test]
fn configure_by_period_derives_the_frequency() {
    let mut pwm = controller();
    // 1000 µs period = 1 kHz.
    pwm.configure_by_period(25, 1_000.0, pct(50.0), false)
        .expect("in range");
    assert_eq!(pwm.registers().slices[4].top, 12_499);
    assert_eq!(pwm.registers().slices[4].div_int, 10);

    // Nonsense periods fall out as out-of-range frequencies.
    assert_eq!(
        pwm.configure_by_period(25, 0.0, pct(50.0), false),
        Err(Error::FrequencyOutOfRange)
    );
}

#[test]
fn enable_and_disable_toggle_the_slice() {
    let mut pwm = controller();
    pwm.configure(25, 1_000.0, pct(50.0), false).expect("in range");

    pwm.disable(25).expect("valid pin");
    assert!(!pwm.registers().slices[4].enabled);
    assert!(!pwm.channel(25).expect("configured").is_enabled());

    // Idempotent: a second disable writes nothing.
    let writes = pwm.registers().total_writes();
    pwm.disable(25).expect("valid pin");
    assert_eq!(pwm.registers().total_writes(), writes);

    pwm.enable(25).expect("valid pin");
    assert!(pwm.registers().slices[4].enabled);
    assert!(pwm.channel(25).expect("configured").is_enabled());
}

#[test]
fn aliased_pin_takes_over_the_channel() {
    let mut pwm = controller();
    // GPIO 0 and GPIO 16 are both slice 0 channel A.
    pwm.configure(0, 1_000.0, pct(50.0), false).expect("in range");
    pwm.configure(16, 1_000.0, pct(30.0), false).expect("in range");

    assert!(pwm.channel(0).is_none(), "stale view evicted");
    let channel = pwm.channel(16).expect("configured");
    assert_eq!(channel.pin(), 16);
    assert_eq!(channel.duty_cycle(), pct(30.0));
    assert!(pwm.registers().assigned[16]);
}

#[test]
fn manual_level_requires_manual_configuration() {
    let mut pwm = controller();
    assert_eq!(pwm.set_manual_level(2, 100), Err(Error::UninitializedManualSlice));
    assert_eq!(pwm.registers().total_writes(), 0);

    // A frequency-configured slice is not manual-initialized either.
    pwm.configure(2, 1_000.0, pct(50.0), false).expect("in range");
    assert_eq!(pwm.set_manual_level(2, 100), Err(Error::UninitializedManualSlice));
}

#[test]
fn manual_configuration_and_level_clamping() {
    let mut pwm = controller();
    pwm.configure_manual(2, 999, 1, 500, false).expect("valid pin");

    let mock = pwm.registers();
    assert_eq!(mock.slices[1].top, 999);
    assert_eq!(mock.slices[1].div_int, 1);
    assert_eq!(mock.slices[1].level_a, 500);
    assert!(mock.slices[1].enabled);

    // Levels beyond top clamp to top.
    pwm.set_manual_level(2, 1_200).expect("manual slice");
    assert_eq!(pwm.registers().slices[1].level_a, 999);
    assert_eq!(pwm.channel(2).expect("configured").level(), 999);
}

#[test]
fn manual_level_skips_redundant_writes() {
    let mut pwm = controller();
    pwm.configure_manual(2, 999, 1, 500, false).expect("valid pin");
    let writes = pwm.registers().total_writes();

    pwm.set_manual_level(2, 500).expect("manual slice");
    assert_eq!(pwm.registers().total_writes(), writes, "same level, no write");

    pwm.set_manual_level(2, 600).expect("manual slice");
    assert_eq!(pwm.registers().total_writes(), writes + 1);
}

#[test]
fn manual_fast_path_writes_once_per_distinct_level() {
    let mut pwm = controller();
    pwm.configure_manual(2, 999, 1, 500, false).expect("valid pin");
    let writes = pwm.registers().total_writes();

    pwm.set_manual_level_fast(2, 700);
    pwm.set_manual_level_fast(2, 700);
    pwm.set_manual_level_fast(2, 700);

    let mock = pwm.registers();
    assert_eq!(mock.total_writes(), writes + 1);
    assert_eq!(mock.slices[1].level_a, 700);
}

#[test]
fn manual_takeover_by_aliased_pin_evicts_the_stale_view() {
    let mut pwm = controller();
    pwm.configure_manual(2, 999, 1, 500, false).expect("valid pin");

    // GPIO 18 aliases GPIO 2 (both are slice 1 channel A).
    pwm.set_manual_level(18, 600).expect("manual slice");
    assert!(pwm.registers().assigned[18]);
    assert!(pwm.channel(2).is_none(), "stale view evicted");
    assert_eq!(pwm.channel(18).expect("configured").level(), 600);

    // configure_manual on the alias hands the view back the same way.
    pwm.configure_manual(2, 999, 1, 250, false).expect("valid pin");
    assert!(pwm.channel(18).is_none());
    assert_eq!(pwm.channel(2).expect("configured").level(), 250);
}

#[test]
fn best_fit_policy_is_used_when_selected() {
    let mut pwm =
        PwmController::with_quantization(MockRegisters::new(), CPU_HZ, Quantization::BestFit);
    assert_eq!(pwm.quantization(), Quantization::BestFit);
    assert_eq!(pwm.cpu_clock(), CPU_HZ);

    // 1234.5 Hz sits badly in the tiered bands; best fit lands much closer.
    pwm.configure(25, 1_234.5, pct(50.0), false).expect("in range");
    let channel = pwm.channel(25).expect("configured");
    assert!(
        (channel.actual_frequency() - 1_234.5).abs() / 1_234.5 < 1e-4,
        "actual {}",
        channel.actual_frequency()
    );
}

#[test]
fn configure_sweep_succeeds_across_the_supported_range() {
    let mut freq = 7.5;
    while freq <= 62_500_000.0 {
        let mut pwm = controller();
        pwm.configure(25, freq, pct(50.0), false).expect("in range");
        let channel = pwm.channel(25).expect("configured");
        let step = channel.actual_frequency() / f64::from(channel.top().max(1));
        assert!(
            (channel.actual_frequency() - freq).abs() <= step,
            "freq {freq}: actual {}",
            channel.actual_frequency()
        );
        freq *= 2.03;
    }
}
