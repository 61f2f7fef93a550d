//! Plugin traits and the per-block processing pipeline.
//!
//! A plugin is split in two:
//!
//! - [`AudioModel`]: parameters, units and program lists. The format wrapper
//!   keeps two instances, one edited by the host's controller calls and one
//!   owned by the processor. The processor's model only changes through the
//!   parameter queues of each block and through state loads.
//! - [`Plugin`]: the DSP state, driven by [`process_block`].
//!
//! # Example
//!
//! ```ignore
//! #[derive(Default)]
//! pub struct Gain;
//!
//! pub struct GainModel { parameters: Parameters }
//!
//! impl AudioModel for GainModel {
//!     fn parameters(&self) -> &Parameters { &self.parameters }
//! }
//!
//! impl Plugin for Gain {
//!     type Model = GainModel;
//!
//!     fn create_model() -> GainModel { /* ... */ }
//!
//!     fn process(&mut self, model: &GainModel, data: &mut ProcessData) {
//!         let gain = model.parameters().by_id(GAIN).map_or(1.0, |p| p.plain());
//!         data.copy_input_to_output::<f32>(0);
//!         if let Some(mut out) = data.output_mut(0) {
//!             out.apply_gain(gain as f32);
//!         }
//!     }
//! }
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use crate::bus::BusInfo;
use crate::error::{PluginError, PluginResult};
use crate::events::Event;
use crate::host::{Host, MessageReader};
use crate::parameters::Parameters;
use crate::process::{ProcessData, ProcessSetup, SampleSize};
use crate::types::ProgramListId;
use crate::units::{ProgramList, Unit};

// =============================================================================
// AudioModel Trait
// =============================================================================

/// Parameters, units and program lists of a plugin.
///
/// Values live in atomics, so every method takes `&self` and the model can be
/// read from the audio thread while the host edits the controller copy.
pub trait AudioModel: Send + Sync + 'static {
    fn parameters(&self) -> &Parameters;

    /// Units besides the root unit.
    fn units(&self) -> &[Unit] {
        &[]
    }

    fn program_lists(&self) -> &[ProgramList] {
        &[]
    }

    /// Apply program `index` of list `list_id`.
    fn select_program(&self, list_id: ProgramListId, _index: i32) -> PluginResult<()> {
        Err(PluginError::UnknownProgramList(list_id))
    }

    /// Persist the model.
    fn save(&self, writer: &mut dyn Write) -> PluginResult<()> {
        self.parameters().save(writer)
    }

    /// Restore what [`save`](Self::save) wrote.
    fn load(&self, reader: &mut dyn Read) -> PluginResult<()> {
        self.parameters().load(reader)
    }

    /// Receive the host once the controller side is initialized, and
    /// `None` when it terminates. Only the controller model is connected.
    ///
    /// Keep the host in a [`HostSlot`](crate::HostSlot) to report edits
    /// with an [`EditGuard`](crate::EditGuard) or send messages later.
    fn connect(&self, _host: Option<Arc<dyn Host>>) {}

    /// A message from the connected peer. Answer `Ok(false)` for ids the
    /// model does not handle.
    fn notify(&self, _message: &dyn MessageReader) -> PluginResult<bool> {
        Ok(false)
    }
}

// =============================================================================
// Plugin Trait
// =============================================================================

/// The processing side of a plugin.
///
/// All methods except [`process`](Self::process) have defaults describing a
/// stereo effect with no event buses, no latency and no tail.
pub trait Plugin: Default + Send + 'static {
    type Model: AudioModel;

    /// Build a model with default values. Called once per model instance.
    fn create_model() -> Self::Model;

    // =========================================================================
    // Buses
    // =========================================================================

    fn audio_input_count(&self) -> usize {
        1
    }

    fn audio_output_count(&self) -> usize {
        1
    }

    fn audio_input_info(&self, index: usize) -> Option<BusInfo> {
        (index == 0).then(|| BusInfo::stereo("Input"))
    }

    fn audio_output_info(&self, index: usize) -> Option<BusInfo> {
        (index == 0).then(|| BusInfo::stereo("Output"))
    }

    fn event_input_count(&self) -> usize {
        0
    }

    fn event_output_count(&self) -> usize {
        0
    }

    fn event_input_info(&self, index: usize) -> Option<BusInfo> {
        (index < self.event_input_count()).then(|| BusInfo::events("Event In"))
    }

    fn event_output_info(&self, index: usize) -> Option<BusInfo> {
        (index < self.event_output_count()).then(|| BusInfo::events("Event Out"))
    }

    // =========================================================================
    // Setup and Lifecycle
    // =========================================================================

    fn can_process_sample_size(&self, sample_size: SampleSize) -> bool {
        matches!(sample_size, SampleSize::Float32 | SampleSize::Float64)
    }

    fn latency_samples(&self) -> u32 {
        0
    }

    fn tail_samples(&self) -> u32 {
        0
    }

    fn initialize(&mut self, _model: &Self::Model) -> PluginResult<()> {
        Ok(())
    }

    fn terminate(&mut self) {}

    /// Called from `setupProcessing`, before the first activation.
    fn setup_processing(&mut self, _setup: &ProcessSetup) -> PluginResult<()> {
        Ok(())
    }

    /// Reset DSP state here when `active` is true.
    fn set_active(&mut self, _active: bool) {}

    fn set_processing(&mut self, _processing: bool) {}

    // =========================================================================
    // Processing
    // =========================================================================

    /// Called once per block after the block's parameter changes were applied.
    fn parameters_changed(&mut self, _model: &Self::Model) {}

    /// Called for each input event, in host order, before the DSP.
    fn event(&mut self, _model: &Self::Model, _event: &Event<'_>) {}

    /// Render one block. Not called for empty blocks or while bypassed.
    fn process(&mut self, model: &Self::Model, data: &mut ProcessData<'_>);
}

// =============================================================================
// Pipeline
// =============================================================================

/// Run one block through a plugin.
///
/// 1. The last point of every input queue is written to the model.
/// 2. [`Plugin::parameters_changed`] runs if any value was written.
/// 3. Input events go to [`Plugin::event`].
/// 4. Blocks with zero samples stop here (parameter flush).
/// 5. With the bypass parameter on, inputs are copied to outputs;
///    otherwise [`Plugin::process`] renders the block.
/// 6. Output silence flags are recomputed from the rendered audio.
pub fn process_block<P: Plugin>(plugin: &mut P, model: &P::Model, data: &mut ProcessData<'_>) {
    if apply_input_changes(model.parameters(), data) {
        plugin.parameters_changed(model);
    }

    if let Some(events) = data.input_events {
        for event in events.iter() {
            plugin.event(model, &event);
        }
    }

    if data.num_samples == 0 {
        return;
    }

    let bypassed = model.parameters().bypass().is_some_and(|p| p.is_on());
    match (bypassed, data.sample_size) {
        (true, SampleSize::Float32) => data.copy_inputs_to_outputs::<f32>(),
        (true, SampleSize::Float64) => data.copy_inputs_to_outputs::<f64>(),
        (false, _) => plugin.process(model, data),
    }

    match data.sample_size {
        SampleSize::Float32 => data.update_output_silence::<f32>(),
        SampleSize::Float64 => data.update_output_silence::<f64>(),
    }
}

/// Write the last point of each input queue. Returns whether any known
/// parameter was written.
fn apply_input_changes(parameters: &Parameters, data: &ProcessData<'_>) -> bool {
    let Some(changes) = data.input_changes else {
        return false;
    };
    let mut changed = false;
    for queue in changes.iter() {
        if let Some((_, value)) = queue.last_point() {
            changed |= parameters.set_normalized(queue.parameter_id(), value).is_ok();
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::test_support::OwnedBus;
    use crate::buffer::AudioBuses;
    use crate::changes::test_support::{TestBackend, TestChanges};
    use crate::changes::ParameterChanges;
    use crate::events::test_support::{TestEventBackend, TestEvents};
    use crate::events::{EventKind, EventList};
    use crate::parameter::Parameter;

    const GAIN: u32 = 1;
    const BYPASS: u32 = 2;

    struct TestModel {
        parameters: Parameters,
    }

    impl AudioModel for TestModel {
        fn parameters(&self) -> &Parameters {
            &self.parameters
        }
    }

    #[derive(Default)]
    struct Doubler {
        processed: usize,
        recalcs: usize,
        events: Vec<i32>,
    }

    impl Plugin for Doubler {
        type Model = TestModel;

        fn create_model() -> TestModel {
            TestModel {
                parameters: Parameters::try_from_vec(vec![
                    Parameter::new(GAIN, "Gain").with_default(0.5),
                    Parameter::bypass(BYPASS),
                ])
                .unwrap(),
            }
        }

        fn parameters_changed(&mut self, _model: &TestModel) {
            self.recalcs += 1;
        }

        fn event(&mut self, _model: &TestModel, event: &Event<'_>) {
            self.events.push(event.sample_offset);
        }

        fn process(&mut self, model: &TestModel, data: &mut ProcessData<'_>) {
            self.processed += 1;
            let gain = model.parameters().normalized(GAIN).unwrap() * 2.0;
            data.copy_input_to_output::<f32>(0);
            if let Some(mut out) = data.output_mut(0) {
                out.apply_gain(gain as f32);
            }
        }
    }

    struct Rig {
        input: Box<OwnedBus<f32>>,
        output: Box<OwnedBus<f32>>,
        changes: TestChanges,
        events: TestEvents,
    }

    impl Rig {
        fn new(value: f32) -> Self {
            Self {
                input: OwnedBus::new(vec![vec![value; 4], vec![value; 4]]),
                output: OwnedBus::new(vec![vec![0.0; 4], vec![0.0; 4]]),
                changes: TestChanges::default(),
                events: TestEvents::default(),
            }
        }

        fn run(&mut self, plugin: &mut Doubler, model: &TestModel, num_samples: usize) {
            let setup = ProcessSetup::default();
            let (inputs, outputs) = unsafe {
                (
                    AudioBuses::from_raw(&mut self.input.record, 1, num_samples, SampleSize::Float32),
                    AudioBuses::from_raw(&mut self.output.record, 1, num_samples, SampleSize::Float32),
                )
            };
            let mut data = ProcessData::new(&setup, num_samples, inputs, outputs);
            data.input_changes =
                Some(unsafe { ParameterChanges::from_raw(&TestBackend, self.changes.handle()) });
            data.input_events =
                Some(unsafe { EventList::from_raw(&TestEventBackend, self.events.handle()) });
            process_block(plugin, model, &mut data);
        }
    }

    #[test]
    fn test_last_point_wins() {
        let model = Doubler::create_model();
        let mut plugin = Doubler::default();
        let mut rig = Rig::new(0.25);
        rig.changes = TestChanges::with_points(&[(GAIN, &[(0, 0.1), (2, 1.0)]), (99, &[(0, 0.3)])]);

        rig.run(&mut plugin, &model, 4);

        assert_eq!(model.parameters().normalized(GAIN).unwrap(), 1.0);
        assert_eq!(plugin.recalcs, 1);
        assert_eq!(plugin.processed, 1);
        assert_eq!(rig.output.channels[0], vec![0.5; 4]);
        assert_eq!(rig.output.record.silence_flags, 0);
    }

    #[test]
    fn test_empty_block_is_a_flush() {
        let model = Doubler::create_model();
        let mut plugin = Doubler::default();
        let mut rig = Rig::new(0.25);
        rig.changes = TestChanges::with_points(&[(GAIN, &[(0, 0.75)])]);
        rig.events.events.borrow_mut().push(Event::new(0, EventKind::Other { type_id: 7 }));

        rig.run(&mut plugin, &model, 0);

        assert_eq!(model.parameters().normalized(GAIN).unwrap(), 0.75);
        assert_eq!(plugin.events, vec![0]);
        assert_eq!(plugin.processed, 0);
    }

    #[test]
    fn test_bypass_copies_input() {
        let model = Doubler::create_model();
        let mut plugin = Doubler::default();
        let mut rig = Rig::new(0.25);
        rig.changes = TestChanges::with_points(&[(BYPASS, &[(0, 1.0)])]);

        rig.run(&mut plugin, &model, 4);

        assert_eq!(plugin.processed, 0);
        assert_eq!(rig.output.channels[1], vec![0.25; 4]);
    }

    #[test]
    fn test_silent_output_is_flagged() {
        let model = Doubler::create_model();
        let mut plugin = Doubler::default();
        let mut rig = Rig::new(0.0);

        rig.run(&mut plugin, &model, 4);

        assert_eq!(plugin.recalcs, 0);
        assert_eq!(rig.output.record.silence_flags, 0b11);
    }

    #[test]
    fn test_default_program_selection_fails() {
        let model = Doubler::create_model();
        assert!(matches!(
            model.select_program(4, 0),
            Err(PluginError::UnknownProgramList(4))
        ));
    }

    #[test]
    fn test_default_model_ignores_messages() {
        let model = Doubler::create_model();
        let message = crate::host::Message::new("meter").with_float("peak", 1.0);
        assert!(!model.notify(&message).unwrap());
        model.connect(None);
    }
}
