//! Vessel Gain - a stereo gain with factory presets.
//!
//! Shows the pieces a plugin provides:
//! 1. An [`AudioModel`] with parameters, one unit and a program list
//! 2. A [`Plugin`] that renders from the model
//! 3. `export_vst3!` for the module entry points
//!
//! The model also answers a `"gain"` message from a connected peer by
//! moving the gain and reporting the edit to the host.

use std::sync::Arc;

use vessel::prelude::*;

// =============================================================================
// Plugin Configuration
// =============================================================================

const COMPONENT_UID: vst3::Steinberg::TUID = vst3::uid(0x5A1F0C3E, 0x7B2D4E91, 0x8C6A3F10, 0xD4E2B957);

pub static CONFIG: PluginConfig = PluginConfig::new("Vessel Gain")
    .with_vendor("Vessel")
    .with_url("https://github.com/vessel-audio/vessel")
    .with_email("support@example.com")
    .with_version(env!("CARGO_PKG_VERSION"))
    .with_sub_categories("Fx|Tools");

pub static VST3_CONFIG: Vst3Config = Vst3Config::new(COMPONENT_UID);

// =============================================================================
// Model
// =============================================================================

pub const GAIN: ParamId = param_id("gain");
pub const BYPASS: ParamId = param_id("bypass");
pub const PRESET: ParamId = param_id("preset");

/// Message id and attribute carrying a new gain in dB.
pub const GAIN_MESSAGE: &str = "gain";
pub const GAIN_DB: &str = "db";

const GAIN_UNIT: UnitId = 1;
const PRESETS: ProgramListId = 1;

const PRESET_NAMES: &[&str] = &["Unity", "Quiet", "Boost"];
const PRESET_GAINS_DB: [f64; 3] = [0.0, -12.0, 6.0];

static UNITS: [Unit; 1] = [Unit::new(GAIN_UNIT, "Gain").with_program_list(PRESETS)];
static PROGRAM_LISTS: [ProgramList; 1] = [ProgramList::new(PRESETS, "Factory", PRESET_NAMES)];

fn parameters() -> PluginResult<Parameters> {
    Parameters::try_from_vec(vec![
        Parameter::range(GAIN, "Gain", -60.0, 12.0, 0.0)
            .with_units("dB")
            .with_precision(1)
            .with_unit(GAIN_UNIT),
        Parameter::bypass(BYPASS),
        Parameter::list(PRESET, "Preset", PRESET_NAMES, 0)
            .with_unit(GAIN_UNIT)
            .with_flags(ParameterFlags {
                is_list: true,
                is_program_change: true,
                ..ParameterFlags::default()
            }),
    ])
}

pub struct GainModel {
    parameters: Parameters,
    host: HostSlot,
}

impl GainModel {
    /// Gain as a linear multiplier.
    pub fn gain_linear(&self) -> f64 {
        let db = self.parameters.by_id(GAIN).map_or(0.0, |p| p.plain());
        10f64.powf(db / 20.0)
    }

    /// Move the gain to `db` and tell the host, as a knob drag would.
    pub fn set_gain_db(&self, db: f64) -> PluginResult<()> {
        let gain = self.parameters.by_id(GAIN).ok_or(PluginError::UnknownParameter(GAIN))?;
        let normalized = gain.set_normalized(gain.to_normalized(db));

        let Some(host) = self.host.get() else {
            return Ok(());
        };
        match EditGuard::begin(&*host, GAIN) {
            Ok(edit) => edit.perform(normalized)?,
            // No component handler yet: the value still changed locally.
            Err(e) if e.is_unsupported() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

impl AudioModel for GainModel {
    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn units(&self) -> &[Unit] {
        &UNITS
    }

    fn program_lists(&self) -> &[ProgramList] {
        &PROGRAM_LISTS
    }

    fn select_program(&self, list_id: ProgramListId, index: i32) -> PluginResult<()> {
        let db = usize::try_from(index)
            .ok()
            .filter(|_| list_id == PRESETS)
            .and_then(|i| PRESET_GAINS_DB.get(i))
            .ok_or(PluginError::UnknownProgramList(list_id))?;
        let gain = self.parameters.by_id(GAIN).ok_or(PluginError::UnknownParameter(GAIN))?;
        gain.set_normalized(gain.to_normalized(*db));
        Ok(())
    }

    fn connect(&self, host: Option<Arc<dyn Host>>) {
        self.host.set(host);
    }

    fn notify(&self, message: &dyn MessageReader) -> PluginResult<bool> {
        if message.id() != GAIN_MESSAGE {
            return Ok(false);
        }
        let db = message.float(GAIN_DB).ok_or_else(|| PluginError::message("gain message without db"))?;
        self.set_gain_db(db)?;
        Ok(true)
    }
}

// =============================================================================
// Plugin
// =============================================================================

#[derive(Default)]
pub struct Gain;

impl Gain {
    fn render<S: Sample>(model: &GainModel, data: &mut ProcessData<'_>) {
        let gain = S::from_f64(model.gain_linear());
        data.copy_inputs_to_outputs::<S>();
        for bus in 0..data.output_bus_count() {
            if let Some(mut out) = data.output_mut(bus) {
                out.apply_gain(gain);
            }
        }
    }
}

impl Plugin for Gain {
    type Model = GainModel;

    fn create_model() -> GainModel {
        GainModel {
            parameters: parameters().unwrap_or_default(),
            host: HostSlot::new(),
        }
    }

    fn process(&mut self, model: &GainModel, data: &mut ProcessData<'_>) {
        match data.sample_size {
            SampleSize::Float32 => Self::render::<f32>(model, data),
            SampleSize::Float64 => Self::render::<f64>(model, data),
        }
    }
}

// =============================================================================
// Exports
// =============================================================================

export_vst3!(CONFIG, VST3_CONFIG, Gain);
