//! An ordered, id-indexed collection of parameters.
//!
//! # State Format
//!
//! [`Parameters::save`] writes a little-endian `u32` count followed by one
//! `(u32 id, f64 normalized)` record per parameter. [`Parameters::load`]
//! ignores ids it does not know and clamps every value, so state saved by
//! other versions of a plugin loads cleanly.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{PluginError, PluginResult};
use crate::parameter::Parameter;
use crate::types::{ParamId, ParamValue};

/// Parameters in declaration order, indexed by id.
#[derive(Debug, Default)]
pub struct Parameters {
    parameters: Vec<Parameter>,
    index: HashMap<ParamId, usize>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, rejecting duplicate ids.
    pub fn try_from_vec(parameters: Vec<Parameter>) -> PluginResult<Self> {
        let mut collection = Self::new();
        for parameter in parameters {
            collection.add(parameter)?;
        }
        Ok(collection)
    }

    /// Append a parameter. Fails if the id is already taken.
    pub fn add(&mut self, parameter: Parameter) -> PluginResult<()> {
        let id = parameter.id();
        if self.index.contains_key(&id) {
            return Err(PluginError::DuplicateParameter(id));
        }
        self.index.insert(id, self.parameters.len());
        self.parameters.push(parameter);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameter at declaration index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    #[inline]
    pub fn by_id(&self, id: ParamId) -> Option<&Parameter> {
        self.index.get(&id).map(|&i| &self.parameters[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    /// The bypass parameter, if one is declared.
    pub fn bypass(&self) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.info().flags.is_bypass)
    }

    /// Set a normalized value by id. Returns the clamped stored value.
    pub fn set_normalized(&self, id: ParamId, value: ParamValue) -> PluginResult<ParamValue> {
        self.by_id(id)
            .map(|p| p.set_normalized(value))
            .ok_or(PluginError::UnknownParameter(id))
    }

    pub fn normalized(&self, id: ParamId) -> PluginResult<ParamValue> {
        self.by_id(id)
            .map(Parameter::normalized)
            .ok_or(PluginError::UnknownParameter(id))
    }

    /// Copy every value from another collection with the same ids.
    pub fn copy_values_from(&self, other: &Parameters) {
        for parameter in &self.parameters {
            if let Some(source) = other.by_id(parameter.id()) {
                parameter.set_normalized(source.normalized());
            }
        }
    }

    /// Write all values.
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> PluginResult<()> {
        writer.write_all(&(self.parameters.len() as u32).to_le_bytes())?;
        for parameter in &self.parameters {
            writer.write_all(&parameter.id().to_le_bytes())?;
            writer.write_all(&parameter.normalized().to_le_bytes())?;
        }
        Ok(())
    }

    /// Read values written by [`save`](Self::save).
    pub fn load<R: Read + ?Sized>(&self, reader: &mut R) -> PluginResult<()> {
        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let count = u32::from_le_bytes(word);

        let mut value = [0u8; 8];
        for _ in 0..count {
            reader.read_exact(&mut word)?;
            reader.read_exact(&mut value)?;
            if let Some(parameter) = self.by_id(u32::from_le_bytes(word)) {
                parameter.set_normalized(f64::from_le_bytes(value));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn collection() -> Parameters {
        Parameters::try_from_vec(vec![
            Parameter::range(1, "Gain", -60.0, 12.0, 0.0),
            Parameter::new(2, "Mix").with_default(1.0),
            Parameter::bypass(3),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let parameters = collection();
        assert_eq!(parameters.len(), 3);
        assert_eq!(parameters.by_id(2).unwrap().info().title, "Mix");
        assert_eq!(parameters.get(0).unwrap().id(), 1);
        assert!(parameters.by_id(9).is_none());
        assert_eq!(parameters.bypass().unwrap().id(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = Parameters::try_from_vec(vec![Parameter::new(1, "A"), Parameter::new(1, "B")]);
        assert!(matches!(result, Err(PluginError::DuplicateParameter(1))));
    }

    #[test]
    fn test_set_unknown() {
        let parameters = collection();
        assert!(matches!(
            parameters.set_normalized(77, 0.5),
            Err(PluginError::UnknownParameter(77))
        ));
        assert_eq!(parameters.set_normalized(2, 4.0).unwrap(), 1.0);
    }

    #[test]
    fn test_save_load() {
        let source = collection();
        source.set_normalized(1, 0.25).unwrap();
        source.set_normalized(3, 1.0).unwrap();

        let mut bytes = Vec::new();
        source.save(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 3 * 12);

        let target = collection();
        target.load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(target.normalized(1).unwrap(), 0.25);
        assert!(target.bypass().unwrap().is_on());
    }

    #[test]
    fn test_load_ignores_unknown_ids() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&99u32.to_le_bytes());
        bytes.extend_from_slice(&0.5f64.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&7.0f64.to_le_bytes());

        let parameters = collection();
        parameters.load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parameters.normalized(2).unwrap(), 1.0);
    }

    #[test]
    fn test_truncated_state_fails() {
        let parameters = collection();
        let result = parameters.load(&mut Cursor::new(vec![1, 0, 0, 0, 2]));
        assert!(matches!(result, Err(PluginError::State(_))));
    }
}
