#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::convert::Infallible;
use embassy_executor::Spawner;
use embassy_time::Timer;
use pwm_kit::{DutyCycle, PwmController, Result};
use {defmt_rtt as _, panic_probe as _};

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(_spawner: Spawner) -> Result<Infallible> {
    let _p = embassy_rp::init(Default::default());
    let mut pwm = PwmController::rp2040();

    // The Pico's onboard LED sits on GPIO 25.
    const LED_PIN: u8 = 25;

    // 2 kHz is fast enough that the eye sees brightness, not flicker. Every
    // duty update below reuses this timing, so the slice counter is never
    // reset mid-fade.
    pwm.configure(LED_PIN, 2_000.0, DutyCycle::ZERO, false)?;

    loop {
        for milli_percent in (0..=100_000).step_by(500) {
            pwm.configure(
                LED_PIN,
                2_000.0,
                DutyCycle::from_milli_percent(milli_percent),
                false,
            )?;
            Timer::after_millis(5).await;
        }
        for milli_percent in (0..=100_000).rev().step_by(500) {
            pwm.configure(
                LED_PIN,
                2_000.0,
                DutyCycle::from_milli_percent(milli_percent),
                false,
            )?;
            Timer::after_millis(5).await;
        }
    }
}
