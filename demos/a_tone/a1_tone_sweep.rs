#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::convert::Infallible;
use embassy_executor::Spawner;
use embassy_time::Timer;
use pwm_kit::{DutyCycle, PwmController, Result};
use {defmt::info, defmt_rtt as _, panic_probe as _};

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(_spawner: Spawner) -> Result<Infallible> {
    let _p = embassy_rp::init(Default::default());
    let mut pwm = PwmController::rp2040();

    // Square wave on GPIO 15, e.g. into a piezo buzzer.
    const TONE_PIN: u8 = 15;

    // Chromatic-ish sweep: each octave in 12 steps.
    loop {
        let mut freq_hz = 220.0;
        while freq_hz < 3_520.0 {
            pwm.configure(TONE_PIN, freq_hz, DutyCycle::from_percent(50.0), false)?;
            if let Some(channel) = pwm.channel(TONE_PIN) {
                info!(
                    "tone: requested {} Hz, playing {} Hz",
                    freq_hz,
                    channel.actual_frequency()
                );
            }
            Timer::after_millis(120).await;
            freq_hz *= 1.059_463; // 2^(1/12)
        }
        pwm.disable(TONE_PIN)?;
        Timer::after_millis(500).await;
    }
}
