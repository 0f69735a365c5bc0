//! Error types for PWM configuration.
//!
//! Every rejection happens before any hardware mutation: a failed call leaves
//! both the slice registers and the cached channel state exactly as they were.

use derive_more::{Display, Error};

/// Result type alias using [`enum@Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by [`PwmController`](crate::PwmController) operations.
#[derive(Clone, Copy, Debug, Display, Error, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Requested frequency lies outside the range the slice hardware can
    /// reach with a 16-bit wrap value and an 8-bit integer divider.
    #[display("frequency outside the supported range")]
    FrequencyOutOfRange,

    /// The GPIO number does not map to channel A or B of any PWM slice.
    #[display("pin does not map to a PWM slice channel")]
    InvalidPinMapping,

    /// The two pins of a push-pull pair do not form the A/B channels of one
    /// hardware slice.
    #[display("push-pull pins do not share a PWM slice")]
    MismatchedPushPullPins,

    /// `set_manual_level` was called before `configure_manual` established a
    /// wrap value and divider for the slice.
    #[display("slice has no manual configuration")]
    UninitializedManualSlice,
}
