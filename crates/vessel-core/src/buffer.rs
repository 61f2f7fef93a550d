//! Zero-copy audio bus views over host memory.
//!
//! [`AudioBusBuffers`] mirrors the host's per-bus record bit for bit; the
//! views in this module reinterpret host arrays of it without copying.
//!
//! # Aliasing
//!
//! Hosts may process in place, handing the same channel pointer to an input
//! and an output bus. Input views ([`AudioBus`]) borrow the enclosing
//! [`ProcessData`](crate::ProcessData) shared and output views
//! ([`AudioBusMut`]) borrow it exclusively, so the two never coexist. To read
//! the input while writing the output, copy it across first with
//! [`ProcessData::copy_input_to_output`](crate::ProcessData::copy_input_to_output)
//! and then work on the output in place.
//!
//! # Example
//!
//! ```ignore
//! fn process(&mut self, model: &Self::Model, data: &mut ProcessData) {
//!     data.copy_input_to_output::<f32>(0);
//!     let gain = model.gain() as f32;
//!     if let Some(mut out) = data.output_mut(0) {
//!         for channel in 0..out.num_channels() {
//!             if let Some(samples) = out.channel_mut::<f32>(channel) {
//!                 samples.iter_mut().for_each(|s| *s *= gain);
//!             }
//!         }
//!     }
//! }
//! ```

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;

use crate::process::SampleSize;
use crate::sample::Sample;

/// Peak level below which an output channel is reported silent.
///
/// About -77.6 dBFS.
pub const SILENCE_THRESHOLD: f64 = 0.000132184039;

// =============================================================================
// Raw Layout
// =============================================================================

/// Host layout of one audio bus.
///
/// `channel_buffers` points at `num_channels` channel pointers whose element
/// type (`f32` or `f64`) is given by the block's [`SampleSize`]. Bit `n` of
/// `silence_flags` marks channel `n` as silent.
#[repr(C)]
#[derive(Debug)]
pub struct AudioBusBuffers {
    pub num_channels: i32,
    pub silence_flags: u64,
    pub channel_buffers: *mut *mut c_void,
}

impl Default for AudioBusBuffers {
    fn default() -> Self {
        Self {
            num_channels: 0,
            silence_flags: 0,
            channel_buffers: ptr::null_mut(),
        }
    }
}

// =============================================================================
// AudioBuses
// =============================================================================

/// One direction's buses for one block.
#[derive(Clone, Copy)]
pub struct AudioBuses<'a> {
    buses: *mut AudioBusBuffers,
    count: usize,
    num_samples: usize,
    sample_size: SampleSize,
    _marker: PhantomData<&'a mut [AudioBusBuffers]>,
}

impl<'a> AudioBuses<'a> {
    /// An empty set of buses.
    pub const fn empty(sample_size: SampleSize) -> Self {
        Self {
            buses: ptr::null_mut(),
            count: 0,
            num_samples: 0,
            sample_size,
            _marker: PhantomData,
        }
    }

    /// Wrap a host array of bus records.
    ///
    /// A null `buses` or a negative `count` yields no buses.
    ///
    /// # Safety
    ///
    /// When non-null, `buses` must point at `count` records that stay valid
    /// for `'a`, and every non-null channel pointer must address at least
    /// `num_samples` samples of the width given by `sample_size`.
    pub unsafe fn from_raw(
        buses: *mut AudioBusBuffers,
        count: i32,
        num_samples: usize,
        sample_size: SampleSize,
    ) -> Self {
        let count = if buses.is_null() { 0 } else { count.max(0) as usize };
        Self {
            buses,
            count,
            num_samples,
            sample_size,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    #[inline]
    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    /// Raw record for `index`.
    #[inline]
    pub(crate) fn raw(&self, index: usize) -> Option<*mut AudioBusBuffers> {
        // Safety: index < count and the array holds count records (from_raw contract)
        (index < self.count).then(|| unsafe { self.buses.add(index) })
    }

    /// Read-only view of one bus.
    pub fn bus(&self, index: usize) -> Option<AudioBus<'_>> {
        self.raw(index).map(|raw| AudioBus {
            raw,
            num_samples: self.num_samples,
            sample_size: self.sample_size,
            _marker: PhantomData,
        })
    }

    /// Mutable view of one bus.
    pub fn bus_mut(&mut self, index: usize) -> Option<AudioBusMut<'_>> {
        self.raw(index).map(|raw| AudioBusMut {
            raw,
            num_samples: self.num_samples,
            sample_size: self.sample_size,
            _marker: PhantomData,
        })
    }
}

// =============================================================================
// Channel Access Helpers
// =============================================================================

/// Channel pointer for `channel` when the record, the width and the pointer
/// all check out.
///
/// # Safety
///
/// `raw` must point at a valid record.
#[inline]
unsafe fn channel_ptr<S: Sample>(
    raw: *const AudioBusBuffers,
    channel: usize,
    sample_size: SampleSize,
) -> Option<*mut S> {
    if S::SAMPLE_SIZE != sample_size {
        return None;
    }
    let record = &*raw;
    if channel >= record.num_channels.max(0) as usize || record.channel_buffers.is_null() {
        return None;
    }
    let data = *record.channel_buffers.add(channel);
    (!data.is_null()).then_some(data as *mut S)
}

#[inline]
fn channel_count(raw: *const AudioBusBuffers) -> usize {
    // Safety: views are only built over valid records
    unsafe { (*raw).num_channels.max(0) as usize }
}

// =============================================================================
// AudioBus
// =============================================================================

/// Read-only view of one bus.
pub struct AudioBus<'a> {
    raw: *mut AudioBusBuffers,
    num_samples: usize,
    sample_size: SampleSize,
    _marker: PhantomData<&'a AudioBusBuffers>,
}

impl<'a> AudioBus<'a> {
    #[inline]
    pub fn num_channels(&self) -> usize {
        channel_count(self.raw)
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Silence flags as set by the host.
    #[inline]
    pub fn silence_flags(&self) -> u64 {
        // Safety: raw is valid for 'a
        unsafe { (*self.raw).silence_flags }
    }

    #[inline]
    pub fn is_channel_silent(&self, channel: usize) -> bool {
        channel < 64 && self.silence_flags() & (1u64 << channel) != 0
    }

    /// Samples of one channel.
    ///
    /// `None` when the channel does not exist, the host passed no buffer, or
    /// `S` is not the negotiated sample width.
    #[inline]
    pub fn channel<S: Sample>(&self, channel: usize) -> Option<&'a [S]> {
        // Safety: from_raw guarantees num_samples valid samples behind each
        // non-null channel pointer for 'a
        unsafe {
            channel_ptr::<S>(self.raw, channel, self.sample_size)
                .map(|p| std::slice::from_raw_parts(p as *const S, self.num_samples))
        }
    }

    /// Peak absolute value of one channel, or `None` if it is unavailable.
    pub fn peak<S: Sample>(&self, channel: usize) -> Option<f64> {
        self.channel::<S>(channel)
            .map(|samples| samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs().to_f64())))
    }
}

// =============================================================================
// AudioBusMut
// =============================================================================

/// Mutable view of one bus.
pub struct AudioBusMut<'a> {
    raw: *mut AudioBusBuffers,
    num_samples: usize,
    sample_size: SampleSize,
    _marker: PhantomData<&'a mut AudioBusBuffers>,
}

impl<'a> AudioBusMut<'a> {
    #[inline]
    pub fn num_channels(&self) -> usize {
        channel_count(self.raw)
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    #[inline]
    pub fn silence_flags(&self) -> u64 {
        // Safety: raw is valid for 'a
        unsafe { (*self.raw).silence_flags }
    }

    #[inline]
    pub fn set_silence_flags(&mut self, flags: u64) {
        // Safety: raw is valid and exclusively borrowed for 'a
        unsafe { (*self.raw).silence_flags = flags }
    }

    /// Read access to one channel.
    #[inline]
    pub fn channel<S: Sample>(&self, channel: usize) -> Option<&[S]> {
        // Safety: see AudioBus::channel
        unsafe {
            channel_ptr::<S>(self.raw, channel, self.sample_size)
                .map(|p| std::slice::from_raw_parts(p as *const S, self.num_samples))
        }
    }

    /// Write access to one channel. Same `None` cases as [`AudioBus::channel`].
    #[inline]
    pub fn channel_mut<S: Sample>(&mut self, channel: usize) -> Option<&mut [S]> {
        // Safety: see AudioBus::channel; &mut self keeps the slice unique
        unsafe {
            channel_ptr::<S>(self.raw, channel, self.sample_size)
                .map(|p| std::slice::from_raw_parts_mut(p, self.num_samples))
        }
    }

    /// Fill one channel with zeros and mark it silent.
    pub fn clear_channel<S: Sample>(&mut self, channel: usize) {
        if let Some(samples) = self.channel_mut::<S>(channel) {
            samples.fill(S::ZERO);
            if channel < 64 {
                let flags = self.silence_flags() | (1u64 << channel);
                self.set_silence_flags(flags);
            }
        }
    }

    /// Fill every channel with zeros and mark the bus silent.
    pub fn clear<S: Sample>(&mut self) {
        for channel in 0..self.num_channels() {
            self.clear_channel::<S>(channel);
        }
    }

    /// Multiply every sample by `gain`.
    pub fn apply_gain<S: Sample>(&mut self, gain: S) {
        for channel in 0..self.num_channels() {
            if let Some(samples) = self.channel_mut::<S>(channel) {
                for sample in samples {
                    *sample = *sample * gain;
                }
            }
        }
    }

    /// Recompute the silence flags from the channel contents.
    ///
    /// A channel is silent when its peak is below [`SILENCE_THRESHOLD`].
    /// Channels the host passed no buffer for keep their flag.
    pub fn update_silence_flags<S: Sample>(&mut self) {
        let mut flags = self.silence_flags();
        for channel in 0..self.num_channels().min(64) {
            let Some(samples) = self.channel::<S>(channel) else {
                continue;
            };
            let silent = samples.iter().all(|s| s.abs().to_f64() < SILENCE_THRESHOLD);
            if silent {
                flags |= 1u64 << channel;
            } else {
                flags &= !(1u64 << channel);
            }
        }
        self.set_silence_flags(flags);
    }

    pub(crate) fn raw(&self) -> *mut AudioBusBuffers {
        self.raw
    }
}

/// Copy one bus into another, channel by channel, with memmove semantics.
///
/// Output channels without an input counterpart are cleared. Silence flags
/// follow the input.
///
/// # Safety
///
/// Both records must be valid bus records of a block with `num_samples`
/// samples of width `S`.
pub(crate) unsafe fn copy_bus<S: Sample>(
    input: *const AudioBusBuffers,
    output: &mut AudioBusMut<'_>,
    sample_size: SampleSize,
) {
    let n = output.num_samples();
    let in_channels = channel_count(input);
    let mut flags = 0u64;
    for channel in 0..output.num_channels() {
        let Some(dst) = channel_ptr::<S>(output.raw(), channel, sample_size) else {
            continue;
        };
        match channel_ptr::<S>(input, channel, sample_size).filter(|_| channel < in_channels) {
            Some(src) => {
                if src != dst {
                    ptr::copy(src as *const S, dst, n);
                }
                if channel < 64 && (*input).silence_flags & (1u64 << channel) != 0 {
                    flags |= 1u64 << channel;
                }
            }
            None => {
                std::slice::from_raw_parts_mut(dst, n).fill(S::ZERO);
                if channel < 64 {
                    flags |= 1u64 << channel;
                }
            }
        }
    }
    output.set_silence_flags(flags);
}


#[cfg(test)]
mod tests {
    use super::test_support::OwnedBus;
    use super::*;

    #[test]
    fn test_channel_access_checks_width() {
        let mut bus = OwnedBus::new(vec![vec![0.5f32; 4], vec![-0.25f32; 4]]);
        let buses = unsafe { AudioBuses::from_raw(&mut bus.record, 1, 4, SampleSize::Float32) };

        let view = buses.bus(0).unwrap();
        assert_eq!(view.num_channels(), 2);
        assert_eq!(view.channel::<f32>(1), Some(&[-0.25f32; 4][..]));
        assert!(view.channel::<f64>(0).is_none());
        assert!(view.channel::<f32>(2).is_none());
        assert!(buses.bus(1).is_none());
    }

    #[test]
    fn test_null_buses_are_empty() {
        let buses = unsafe { AudioBuses::from_raw(ptr::null_mut(), 3, 64, SampleSize::Float64) };
        assert!(buses.is_empty());
        assert!(buses.bus(0).is_none());
    }

    #[test]
    fn test_silence_flags_follow_content() {
        let mut bus = OwnedBus::new(vec![vec![0.0f64; 8], vec![0.0f64; 8]]);
        bus.channels[1][3] = 0.5;
        let mut buses = unsafe { AudioBuses::from_raw(&mut bus.record, 1, 8, SampleSize::Float64) };

        let mut out = buses.bus_mut(0).unwrap();
        out.set_silence_flags(0b10);
        out.update_silence_flags::<f64>();
        assert_eq!(out.silence_flags(), 0b01);
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let mut bus = OwnedBus::new(vec![vec![0.0001f32; 8]]);
        let mut buses = unsafe { AudioBuses::from_raw(&mut bus.record, 1, 8, SampleSize::Float32) };
        let mut out = buses.bus_mut(0).unwrap();
        out.update_silence_flags::<f32>();
        assert_eq!(out.silence_flags(), 1);
    }

    #[test]
    fn test_copy_bus_clears_extra_channels() {
        let input = OwnedBus::new(vec![vec![1.0f32; 4]]);
        let mut output = OwnedBus::new(vec![vec![9.0f32; 4], vec![9.0f32; 4]]);
        let mut outputs =
            unsafe { AudioBuses::from_raw(&mut output.record, 1, 4, SampleSize::Float32) };

        let mut out = outputs.bus_mut(0).unwrap();
        unsafe { copy_bus::<f32>(&input.record, &mut out, SampleSize::Float32) };
        assert_eq!(out.silence_flags(), 0b10);
        drop(out);

        assert_eq!(output.channels[0], vec![1.0; 4]);
        assert_eq!(output.channels[1], vec![0.0; 4]);
    }

    #[test]
    fn test_apply_gain() {
        let mut bus = OwnedBus::new(vec![vec![0.5f32; 4]]);
        let mut buses = unsafe { AudioBuses::from_raw(&mut bus.record, 1, 4, SampleSize::Float32) };
        buses.bus_mut(0).unwrap().apply_gain(2.0f32);
        assert_eq!(bus.channels[0], vec![1.0; 4]);
    }
}
