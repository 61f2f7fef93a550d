//! Process setup and the per-block process data view.

use crate::buffer::{copy_bus, AudioBus, AudioBusMut, AudioBuses};
use crate::changes::ParameterChanges;
use crate::events::EventList;
use crate::sample::Sample;
use crate::transport::Transport;

// =============================================================================
// Setup Types
// =============================================================================

/// Sample width negotiated with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum SampleSize {
    #[default]
    Float32 = 0,
    Float64 = 1,
}

impl SampleSize {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Float32),
            1 => Some(Self::Float64),
            _ => None,
        }
    }
}

/// Processing mode the host runs the plugin in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ProcessMode {
    #[default]
    Realtime = 0,
    Prefetch = 1,
    Offline = 2,
}

impl ProcessMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Realtime),
            1 => Some(Self::Prefetch),
            2 => Some(Self::Offline),
            _ => None,
        }
    }
}

/// Configuration declared by `setupProcessing`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSetup {
    pub mode: ProcessMode,
    pub sample_size: SampleSize,
    pub max_samples_per_block: usize,
    pub sample_rate: f64,
}

impl Default for ProcessSetup {
    fn default() -> Self {
        Self {
            mode: ProcessMode::Realtime,
            sample_size: SampleSize::Float32,
            max_samples_per_block: 1024,
            sample_rate: 44100.0,
        }
    }
}

// =============================================================================
// ProcessData
// =============================================================================

/// Everything one process call works on.
///
/// Every view borrows host memory for the duration of the call that produced
/// it. The lifetime `'a` ends when the call returns; nothing in here may be
/// stored past it.
pub struct ProcessData<'a> {
    pub mode: ProcessMode,
    pub sample_size: SampleSize,
    pub num_samples: usize,
    pub sample_rate: f64,
    pub transport: Transport,
    inputs: AudioBuses<'a>,
    outputs: AudioBuses<'a>,
    /// Parameter changes sent by the host for this block.
    pub input_changes: Option<ParameterChanges<'a>>,
    /// Parameter changes the plugin reports back to the host.
    pub output_changes: Option<ParameterChanges<'a>>,
    pub input_events: Option<EventList<'a>>,
    pub output_events: Option<EventList<'a>>,
}

impl<'a> ProcessData<'a> {
    /// Assemble a process view. Called by the format wrapper.
    pub fn new(
        setup: &ProcessSetup,
        num_samples: usize,
        inputs: AudioBuses<'a>,
        outputs: AudioBuses<'a>,
    ) -> Self {
        Self {
            mode: setup.mode,
            sample_size: setup.sample_size,
            num_samples,
            sample_rate: setup.sample_rate,
            transport: Transport::default(),
            inputs,
            outputs,
            input_changes: None,
            output_changes: None,
            input_events: None,
            output_events: None,
        }
    }

    #[inline]
    pub fn input_bus_count(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn output_bus_count(&self) -> usize {
        self.outputs.len()
    }

    /// Read-only view of an input bus.
    #[inline]
    pub fn input(&self, bus: usize) -> Option<AudioBus<'_>> {
        self.inputs.bus(bus)
    }

    /// Mutable view of an output bus.
    #[inline]
    pub fn output_mut(&mut self, bus: usize) -> Option<AudioBusMut<'_>> {
        self.outputs.bus_mut(bus)
    }

    /// Copy input bus `bus` onto output bus `bus`.
    ///
    /// Safe when the host hands the same memory to both. Output channels
    /// without an input counterpart are cleared. Does nothing when `S` is not
    /// the negotiated width or the output bus does not exist.
    pub fn copy_input_to_output<S: Sample>(&mut self, bus: usize) {
        let sample_size = self.sample_size;
        if S::SAMPLE_SIZE != sample_size {
            return;
        }
        let input = self.inputs.raw(bus);
        let Some(mut output) = self.outputs.bus_mut(bus) else {
            return;
        };
        match input {
            // Safety: both records come from host arrays valid for 'a
            Some(input) => unsafe { copy_bus::<S>(input, &mut output, sample_size) },
            None => output.clear::<S>(),
        }
    }

    /// Copy every input bus onto its output counterpart.
    pub fn copy_inputs_to_outputs<S: Sample>(&mut self) {
        for bus in 0..self.output_bus_count() {
            self.copy_input_to_output::<S>(bus);
        }
    }

    /// Clear every output bus.
    pub fn clear_outputs<S: Sample>(&mut self) {
        for bus in 0..self.output_bus_count() {
            if let Some(mut output) = self.outputs.bus_mut(bus) {
                output.clear::<S>();
            }
        }
    }

    /// Recompute silence flags of every output bus from its content.
    pub fn update_output_silence<S: Sample>(&mut self) {
        for bus in 0..self.output_bus_count() {
            if let Some(mut output) = self.outputs.bus_mut(bus) {
                output.update_silence_flags::<S>();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::test_support::OwnedBus;

    fn setup(sample_size: SampleSize) -> ProcessSetup {
        ProcessSetup {
            sample_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_raw_enums() {
        assert_eq!(SampleSize::from_raw(1), Some(SampleSize::Float64));
        assert_eq!(SampleSize::from_raw(2), None);
        assert_eq!(ProcessMode::from_raw(2), Some(ProcessMode::Offline));
    }

    #[test]
    fn test_copy_input_to_output() {
        let mut input = OwnedBus::new(vec![vec![0.5f32; 4], vec![0.25f32; 4]]);
        let mut output = OwnedBus::new(vec![vec![0.0f32; 4], vec![0.0f32; 4]]);
        let (inputs, outputs) = unsafe {
            (
                AudioBuses::from_raw(&mut input.record, 1, 4, SampleSize::Float32),
                AudioBuses::from_raw(&mut output.record, 1, 4, SampleSize::Float32),
            )
        };
        let mut data = ProcessData::new(&setup(SampleSize::Float32), 4, inputs, outputs);

        data.copy_input_to_output::<f32>(0);
        // Wrong width is ignored
        data.copy_input_to_output::<f64>(0);
        drop(data);

        assert_eq!(output.channels[0], vec![0.5; 4]);
        assert_eq!(output.channels[1], vec![0.25; 4]);
    }

    #[test]
    fn test_in_place_copy() {
        let mut bus = OwnedBus::new(vec![vec![0.75f64; 8]]);
        let record: *mut _ = &mut bus.record;
        let (inputs, outputs) = unsafe {
            (
                AudioBuses::from_raw(record, 1, 8, SampleSize::Float64),
                AudioBuses::from_raw(record, 1, 8, SampleSize::Float64),
            )
        };
        let mut data = ProcessData::new(&setup(SampleSize::Float64), 8, inputs, outputs);
        data.copy_inputs_to_outputs::<f64>();
        drop(data);

        assert_eq!(bus.channels[0], vec![0.75; 8]);
    }

    #[test]
    fn test_missing_input_clears_output() {
        let mut output = OwnedBus::new(vec![vec![1.0f32; 4]]);
        let outputs = unsafe { AudioBuses::from_raw(&mut output.record, 1, 4, SampleSize::Float32) };
        let mut data = ProcessData::new(
            &setup(SampleSize::Float32),
            4,
            AudioBuses::empty(SampleSize::Float32),
            outputs,
        );

        data.copy_inputs_to_outputs::<f32>();
        assert_eq!(data.output_mut(0).unwrap().silence_flags(), 1);
        drop(data);
        assert_eq!(output.channels[0], vec![0.0; 4]);
    }
}
