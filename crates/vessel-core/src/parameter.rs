//! A single automatable parameter.
//!
//! The normalized value lives in an `AtomicU64` holding the `f64` bits, so
//! the controller and the processor can read and write it without locks.
//! Every write is clamped to `[0, 1]` first.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{ParamId, ParamValue, UnitId, ROOT_UNIT_ID};

/// Display precision used when none is given.
pub const DEFAULT_PRECISION: usize = 4;

/// Parameter behaviour flags reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterFlags {
    /// Host may record automation for this parameter.
    pub can_automate: bool,
    /// Host must not change the value.
    pub is_read_only: bool,
    /// Value wraps around at the ends of the range (e.g. phase).
    pub is_wrap_around: bool,
    /// Display as a list of labels.
    pub is_list: bool,
    /// Hide from generic editors.
    pub is_hidden: bool,
    /// Selects a program from a program list.
    pub is_program_change: bool,
    /// Bypass switch. At most one per plugin.
    pub is_bypass: bool,
}

impl Default for ParameterFlags {
    fn default() -> Self {
        Self {
            can_automate: true,
            is_read_only: false,
            is_wrap_around: false,
            is_list: false,
            is_hidden: false,
            is_program_change: false,
            is_bypass: false,
        }
    }
}

/// Static description of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub id: ParamId,
    pub title: &'static str,
    pub short_title: &'static str,
    pub units: &'static str,
    /// 0 = continuous, 1 = toggle, n > 1 = n + 1 discrete values.
    pub step_count: i32,
    pub default_normalized: ParamValue,
    pub unit_id: UnitId,
    pub flags: ParameterFlags,
}

/// How normalized values map to plain values and text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// Plain value equals the normalized value.
    Normalized,
    /// Linear mapping onto `[min, max]`, optionally stepped.
    Range { min: f64, max: f64 },
    /// Discrete labels; plain value is the label index.
    List(&'static [&'static str]),
}

/// An automatable parameter with an atomically stored normalized value.
#[derive(Debug)]
pub struct Parameter {
    info: ParameterInfo,
    kind: ParameterKind,
    precision: usize,
    value: AtomicU64,
}

impl Parameter {
    /// A continuous parameter whose plain value is its normalized value.
    pub fn new(id: ParamId, title: &'static str) -> Self {
        Self {
            info: ParameterInfo {
                id,
                title,
                short_title: title,
                units: "",
                step_count: 0,
                default_normalized: 0.0,
                unit_id: ROOT_UNIT_ID,
                flags: ParameterFlags::default(),
            },
            kind: ParameterKind::Normalized,
            precision: DEFAULT_PRECISION,
            value: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    /// A parameter mapped linearly onto `[min, max]`.
    ///
    /// `default_plain` is clamped into the range. If `max <= min` the range
    /// collapses to `min` and every normalized value maps to it.
    pub fn range(id: ParamId, title: &'static str, min: f64, max: f64, default_plain: f64) -> Self {
        let mut parameter = Self::new(id, title);
        parameter.kind = ParameterKind::Range { min, max };
        let default = parameter.to_normalized(default_plain);
        parameter.with_default(default)
    }

    /// A two-state switch displayed as "On"/"Off".
    pub fn toggle(id: ParamId, title: &'static str, default_on: bool) -> Self {
        let mut parameter = Self::new(id, title);
        parameter.info.step_count = 1;
        parameter.with_default(if default_on { 1.0 } else { 0.0 })
    }

    /// The bypass switch of a plugin.
    pub fn bypass(id: ParamId) -> Self {
        let mut parameter = Self::toggle(id, "Bypass", false);
        parameter.info.flags.is_bypass = true;
        parameter
    }

    /// A list of labels. The default is the label index.
    pub fn list(
        id: ParamId,
        title: &'static str,
        labels: &'static [&'static str],
        default_index: usize,
    ) -> Self {
        let mut parameter = Self::new(id, title);
        parameter.kind = ParameterKind::List(labels);
        parameter.info.step_count = labels.len().saturating_sub(1) as i32;
        parameter.info.flags.is_list = true;
        let default = parameter.to_normalized(default_index as f64);
        parameter.with_default(default)
    }

    /// Set the default normalized value and reset the current value to it.
    pub fn with_default(mut self, normalized: ParamValue) -> Self {
        let normalized = clamp_normalized(normalized);
        self.info.default_normalized = normalized;
        self.value = AtomicU64::new(normalized.to_bits());
        self
    }

    pub fn with_units(mut self, units: &'static str) -> Self {
        self.info.units = units;
        self
    }

    pub fn with_short_title(mut self, short_title: &'static str) -> Self {
        self.info.short_title = short_title;
        self
    }

    /// Make a range parameter discrete with `step_count + 1` values.
    pub fn with_step_count(mut self, step_count: i32) -> Self {
        self.info.step_count = step_count.max(0);
        self
    }

    pub fn with_flags(mut self, flags: ParameterFlags) -> Self {
        self.info.flags = flags;
        self
    }

    /// Place the parameter in a unit (parameter group).
    pub fn with_unit(mut self, unit_id: UnitId) -> Self {
        self.info.unit_id = unit_id;
        self
    }

    /// Number of decimals used when displaying continuous values.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    #[inline]
    pub fn id(&self) -> ParamId {
        self.info.id
    }

    #[inline]
    pub fn info(&self) -> &ParameterInfo {
        &self.info
    }

    #[inline]
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    #[inline]
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Current normalized value. Lock-free.
    #[inline]
    pub fn normalized(&self) -> ParamValue {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Store a normalized value, clamped to `[0, 1]`. Returns the stored value.
    #[inline]
    pub fn set_normalized(&self, value: ParamValue) -> ParamValue {
        let value = clamp_normalized(value);
        self.value.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    /// Restore the default value.
    pub fn reset(&self) {
        self.set_normalized(self.info.default_normalized);
    }

    /// Current plain value.
    #[inline]
    pub fn plain(&self) -> f64 {
        self.to_plain(self.normalized())
    }

    /// Whether a toggle or bypass parameter is currently on.
    #[inline]
    pub fn is_on(&self) -> bool {
        self.normalized() > 0.5
    }

    /// Map a normalized value to a plain value.
    pub fn to_plain(&self, normalized: ParamValue) -> f64 {
        let normalized = clamp_normalized(normalized);
        match self.kind {
            ParameterKind::Normalized => normalized,
            ParameterKind::Range { min, max } => {
                let steps = self.info.step_count;
                if steps > 1 {
                    let step = ((normalized * (steps + 1) as f64) as i32).min(steps);
                    min + step as f64
                } else {
                    min + normalized * (max - min).max(0.0)
                }
            }
            ParameterKind::List(labels) => {
                let last = labels.len().saturating_sub(1);
                (normalized * last as f64).round()
            }
        }
    }

    /// Map a plain value to a normalized value.
    pub fn to_normalized(&self, plain: f64) -> ParamValue {
        match self.kind {
            ParameterKind::Normalized => clamp_normalized(plain),
            ParameterKind::Range { min, max } => {
                if max <= min {
                    return 0.0;
                }
                let plain = plain.clamp(min, max);
                let steps = self.info.step_count;
                if steps > 1 {
                    clamp_normalized((plain - min).round() / steps as f64)
                } else {
                    (plain - min) / (max - min)
                }
            }
            ParameterKind::List(labels) => {
                let last = labels.len().saturating_sub(1);
                if last == 0 {
                    0.0
                } else {
                    clamp_normalized(plain.round() / last as f64)
                }
            }
        }
    }

    /// Format a normalized value for display.
    ///
    /// Toggles show "On"/"Off", lists show their label, stepped ranges show
    /// an integer, everything else shows the plain value with
    /// [`precision`](Self::precision) decimals.
    pub fn format(&self, normalized: ParamValue) -> String {
        let normalized = clamp_normalized(normalized);
        if self.info.step_count == 1 && !matches!(self.kind, ParameterKind::List(_)) {
            return if normalized > 0.5 { "On" } else { "Off" }.to_string();
        }

        match self.kind {
            ParameterKind::List(labels) => {
                let index = self.to_plain(normalized) as usize;
                labels.get(index).copied().unwrap_or_default().to_string()
            }
            ParameterKind::Range { .. } if self.info.step_count > 1 => {
                format!("{}", self.to_plain(normalized) as i64)
            }
            _ => format!("{:.prec$}", self.to_plain(normalized), prec = self.precision),
        }
    }

    /// Parse display text into a normalized value.
    ///
    /// Accepts what [`format`](Self::format) produces, with or without the
    /// units suffix. Returns `None` when the text is not a value.
    pub fn parse(&self, text: &str) -> Option<ParamValue> {
        let text = text.trim();
        if self.info.step_count == 1 && !matches!(self.kind, ParameterKind::List(_)) {
            return match text.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Some(1.0),
                "off" | "false" | "0" => Some(0.0),
                _ => None,
            };
        }

        if let ParameterKind::List(labels) = self.kind {
            if let Some(index) = labels.iter().position(|l| l.eq_ignore_ascii_case(text)) {
                return Some(self.to_normalized(index as f64));
            }
            let index: usize = text.parse().ok()?;
            return (index < labels.len()).then(|| self.to_normalized(index as f64));
        }

        let text = text
            .strip_suffix(self.info.units)
            .filter(|_| !self.info.units.is_empty())
            .unwrap_or(text)
            .trim();
        let plain: f64 = text.parse().ok()?;
        if !plain.is_finite() {
            return None;
        }
        Some(self.to_normalized(plain))
    }
}

#[inline]
fn clamp_normalized(value: ParamValue) -> ParamValue {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_normalized_clamps() {
        let p = Parameter::new(1, "Mix");

        assert_eq!(p.set_normalized(1.3), 1.0);
        assert_eq!(p.normalized(), 1.0);
        assert_eq!(p.format(p.normalized()), "1.0000");

        assert_eq!(p.set_normalized(-0.2), 0.0);
        assert_eq!(p.normalized(), 0.0);
        assert_eq!(p.format(p.normalized()), "0.0000");
    }

    #[test]
    fn test_nan_is_stored_as_zero() {
        let p = Parameter::new(1, "Mix").with_default(0.5);
        p.set_normalized(f64::NAN);
        assert_eq!(p.normalized(), 0.0);
    }

    #[test]
    fn test_precision() {
        let p = Parameter::new(1, "Mix").with_precision(2);
        assert_eq!(p.format(0.123456), "0.12");
    }

    #[test]
    fn test_range_mapping() {
        let p = Parameter::range(2, "Gain", -60.0, 12.0, 0.0).with_units("dB");

        let default = p.info().default_normalized;
        assert!((p.to_plain(default) - 0.0).abs() < 1e-9);
        assert_eq!(p.to_plain(0.0), -60.0);
        assert_eq!(p.to_plain(1.0), 12.0);
        assert_eq!(p.format(1.0), "12.0000");

        let parsed = p.parse("-24.0 dB").unwrap();
        assert!((p.to_plain(parsed) + 24.0).abs() < 1e-9);
        // Out-of-range text is clamped to the range
        assert_eq!(p.parse("100"), Some(1.0));
        assert_eq!(p.parse("loud"), None);
    }

    #[test]
    fn test_stepped_range() {
        let p = Parameter::range(3, "Voices", 1.0, 8.0, 4.0).with_step_count(7);
        assert_eq!(p.format(0.0), "1");
        assert_eq!(p.format(1.0), "8");
        let n = p.parse("5").unwrap();
        assert_eq!(p.to_plain(n), 5.0);
    }

    #[test]
    fn test_toggle() {
        let p = Parameter::toggle(4, "Enabled", true);
        assert!(p.is_on());
        assert_eq!(p.format(1.0), "On");
        assert_eq!(p.format(0.2), "Off");
        assert_eq!(p.parse("off"), Some(0.0));
        assert_eq!(p.parse("TRUE"), Some(1.0));
        assert_eq!(p.parse("maybe"), None);
    }

    #[test]
    fn test_bypass_flag() {
        let p = Parameter::bypass(5);
        assert!(p.info().flags.is_bypass);
        assert_eq!(p.info().step_count, 1);
        assert!(!p.is_on());
    }

    #[test]
    fn test_list() {
        static SHAPES: &[&str] = &["Sine", "Saw", "Square"];
        let p = Parameter::list(6, "Shape", SHAPES, 1);

        assert_eq!(p.info().step_count, 2);
        assert!(p.info().flags.is_list);
        assert_eq!(p.format(p.normalized()), "Saw");
        assert_eq!(p.format(1.0), "Square");
        assert_eq!(p.parse("square"), Some(1.0));
        assert_eq!(p.parse("0"), Some(0.0));
        assert_eq!(p.parse("7"), None);
    }

    #[test]
    fn test_reset() {
        let p = Parameter::new(7, "Mix").with_default(0.25);
        p.set_normalized(0.9);
        p.reset();
        assert_eq!(p.normalized(), 0.25);
    }
}
