//! Host transport and timing information.
//!
//! The VST3 layer fills a [`Transport`] from the host's process context once
//! per block, honoring the host's validity flags. Fields the host did not
//! mark valid are `None`.

// =============================================================================
// FrameRate Enum
// =============================================================================

/// SMPTE frame rate for video synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FrameRate {
    /// 24 fps (film)
    #[default]
    Fps24 = 0,
    /// 25 fps (PAL video)
    Fps25 = 1,
    /// 29.97 fps non-drop
    Fps2997 = 2,
    /// 30 fps
    Fps30 = 3,
    /// 29.97 fps drop-frame
    Fps2997Drop = 4,
    /// 30 fps drop-frame
    Fps30Drop = 5,
    /// 50 fps
    Fps50 = 10,
    /// 59.94 fps
    Fps5994 = 11,
    /// 60 fps
    Fps60 = 12,
    /// 59.94 fps drop-frame
    Fps5994Drop = 13,
    /// 60 fps drop-frame
    Fps60Drop = 14,
}

impl FrameRate {
    /// Frames per second. Drop-frame rates return their non-integer value.
    #[inline]
    pub fn fps(&self) -> f64 {
        match self {
            Self::Fps24 => 24.0,
            Self::Fps25 => 25.0,
            Self::Fps2997 | Self::Fps2997Drop => 30000.0 / 1001.0,
            Self::Fps30 | Self::Fps30Drop => 30.0,
            Self::Fps50 => 50.0,
            Self::Fps5994 | Self::Fps5994Drop => 60000.0 / 1001.0,
            Self::Fps60 | Self::Fps60Drop => 60.0,
        }
    }

    #[inline]
    pub fn is_drop_frame(&self) -> bool {
        matches!(
            self,
            Self::Fps2997Drop | Self::Fps30Drop | Self::Fps5994Drop | Self::Fps60Drop
        )
    }

    /// Convert the host's (frames per second, drop flag) pair.
    ///
    /// Returns `None` for rates outside the supported set.
    #[inline]
    pub fn from_raw(fps: u32, is_drop: bool) -> Option<Self> {
        match fps {
            24 => Some(Self::Fps24),
            25 => Some(Self::Fps25),
            29 if is_drop => Some(Self::Fps2997Drop),
            29 => Some(Self::Fps2997),
            30 if is_drop => Some(Self::Fps30Drop),
            30 => Some(Self::Fps30),
            50 => Some(Self::Fps50),
            59 if is_drop => Some(Self::Fps5994Drop),
            59 => Some(Self::Fps5994),
            60 if is_drop => Some(Self::Fps60Drop),
            60 => Some(Self::Fps60),
            _ => None,
        }
    }
}

// =============================================================================
// Transport Struct
// =============================================================================

/// Host transport state for one block.
///
/// Playback flags are always valid; every timing field is optional because
/// hosts differ in what they report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transport {
    /// Tempo in BPM.
    pub tempo: Option<f64>,
    pub time_sig_numerator: Option<i32>,
    pub time_sig_denominator: Option<i32>,

    /// Project time in samples from the start of the timeline.
    pub project_time_samples: Option<i64>,
    /// Project time in quarter notes.
    pub project_time_beats: Option<f64>,
    /// Last bar start in quarter notes.
    pub bar_position_beats: Option<f64>,

    pub cycle_start_beats: Option<f64>,
    pub cycle_end_beats: Option<f64>,

    pub is_playing: bool,
    pub is_recording: bool,
    pub is_cycle_active: bool,

    /// System time in nanoseconds.
    pub system_time_ns: Option<i64>,
    /// Sample count that never jumps on loop or locate.
    pub continuous_time_samples: Option<i64>,
    /// Samples until the next 24 ppqn MIDI clock.
    pub samples_to_next_clock: Option<i32>,

    /// SMPTE offset in subframes (1/80 of a frame).
    pub smpte_offset_subframes: Option<i32>,
    pub frame_rate: Option<FrameRate>,
}

impl Transport {
    /// Time signature as (numerator, denominator) when both are known.
    #[inline]
    pub fn time_signature(&self) -> Option<(i32, i32)> {
        match (self.time_sig_numerator, self.time_sig_denominator) {
            (Some(num), Some(denom)) => Some((num, denom)),
            _ => None,
        }
    }

    /// Loop range in quarter notes when both ends are known.
    #[inline]
    pub fn cycle_range(&self) -> Option<(f64, f64)> {
        match (self.cycle_start_beats, self.cycle_end_beats) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.is_cycle_active && self.cycle_range().is_some()
    }

    /// SMPTE offset split into (frames, subframes), subframes in 0..80.
    #[inline]
    pub fn smpte_frames(&self) -> Option<(i32, i32)> {
        self.smpte_offset_subframes
            .map(|sf| (sf.div_euclid(80), sf.rem_euclid(80)))
    }

    /// Samples per quarter note at `sample_rate`, if the tempo is known.
    #[inline]
    pub fn samples_per_beat(&self, sample_rate: f64) -> Option<f64> {
        self.tempo
            .filter(|tempo| *tempo > 0.0)
            .map(|tempo| sample_rate * 60.0 / tempo)
    }
}
