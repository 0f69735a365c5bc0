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

    // GPIO 6/7 are the A/B channels of slice 3: a valid push-pull pair for a
    // half-bridge gate driver.
    const HIGH_SIDE: u8 = 6;
    const LOW_SIDE: u8 = 7;

    pwm.configure_push_pull(HIGH_SIDE, LOW_SIDE, 20_000.0, DutyCycle::from_percent(50.0))?;
    if let Some(channel) = pwm.channel(HIGH_SIDE) {
        info!(
            "half-bridge: {} Hz, top {}",
            channel.actual_frequency(),
            channel.top()
        );
    }

    // Slowly shift the bridge duty back and forth around the midpoint. Each
    // step is a pair of compare writes; the frequency never changes, so the
    // outputs stay glitch-free.
    loop {
        for percent in (20..=80).chain((20..=80).rev()) {
            pwm.configure_push_pull(
                HIGH_SIDE,
                LOW_SIDE,
                20_000.0,
                DutyCycle::from_percent(f64::from(percent)),
            )?;
            Timer::after_millis(50).await;
        }
    }
}
