//! PWM slice control for the RP2040.
//!
//! Converts a requested frequency and duty cycle into the integer clock-divider
//! and counter-wrap pair the fixed-function PWM hardware accepts, and keeps the
//! per-slice shared state straight when both output channels of a slice are in
//! use. Supports plain single-channel output, complementary push-pull pairs,
//! and a manual mode for externally computed waveform timing.
//!
//! # Glossary
//!
//! - **Slice:** one of the RP2040's 8 PWM counters. Each slice drives two GPIO
//!   outputs and owns a single frequency (wrap value + clock divider). These
//!   "slices" are unrelated to Rust slices.
//! - **Channel:** one of the two outputs (A or B) of a slice. Only the duty
//!   compare value is per-channel; everything else is shared with the sibling.
//! - **Top:** the 16-bit counter wrap value. The counter runs 0..=top and
//!   wraps (or reverses, in phase-correct mode).
#![cfg_attr(not(feature = "host"), no_std)]

// Compile-time checks: a board must be selected unless testing with the host feature
#[cfg(all(not(feature = "pico1"), not(feature = "host")))]
compile_error!("Must enable the 'pico1' board feature (or 'host' for hardware-free testing)");

// Compile-time check: hardware builds need the ARM architecture feature
#[cfg(all(feature = "pico1", not(feature = "arm"), not(feature = "host")))]
compile_error!("Must enable the 'arm' architecture feature for RP2040 builds");

#[macro_use]
mod fmt;

pub mod controller;
mod error;
#[cfg(feature = "host")]
pub mod mock;
pub mod quantize;
pub mod registers;
#[cfg(feature = "pico1")]
pub mod rp2040;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
pub use crate::controller::PwmController;
pub use crate::quantize::{DutyCycle, Quantization};
