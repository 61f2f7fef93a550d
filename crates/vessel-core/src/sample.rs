//! Sample type abstraction for f32/f64 audio processing.
//!
//! Write DSP once against [`Sample`]; the bus views hand out channels of the
//! width the host negotiated.

use std::ops::{Add, Mul, Sub};

use crate::process::SampleSize;

/// Trait for audio sample types (f32, f64).
///
/// # Example
///
/// ```ignore
/// fn apply_gain<S: Sample>(channel: &mut [S], gain: f64) {
///     let gain = S::from_f64(gain);
///     for sample in channel {
///         *sample = *sample * gain;
///     }
/// }
/// ```
pub trait Sample:
    Copy
    + Default
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + PartialOrd
{
    /// Symbolic sample size this type corresponds to on the wire.
    const SAMPLE_SIZE: SampleSize;

    /// Zero value (0.0).
    const ZERO: Self;

    /// Unit value (1.0).
    const ONE: Self;

    /// Convert from f32.
    fn from_f32(value: f32) -> Self;

    /// Convert from f64.
    fn from_f64(value: f64) -> Self;

    /// Convert to f64.
    fn to_f64(self) -> f64;

    /// Absolute value.
    fn abs(self) -> Self;
}

impl Sample for f32 {
    const SAMPLE_SIZE: SampleSize = SampleSize::Float32;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline(always)]
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl Sample for f64 {
    const SAMPLE_SIZE: SampleSize = SampleSize::Float64;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value as f64
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline(always)]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}
