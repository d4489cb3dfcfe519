//! Keyword arguments passed from configuration to computations.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::error::DiagError;

/// Name of the pressure-level argument that sounding computations receive.
pub const LEVEL_KWARG: &str = "level_hPa";

/// Configuration-supplied arguments with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kwargs(BTreeMap<String, Value>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`Kwargs::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn required(&self, name: &str) -> Result<&Value, DiagError> {
        self.0
            .get(name)
            .ok_or_else(|| DiagError::MissingArgument(name.to_string()))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, DiagError> {
        self.required(name)?
            .as_str()
            .ok_or_else(|| DiagError::invalid_argument(name, "expected a string"))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, DiagError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_str(name).map(Some),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, DiagError> {
        self.required(name)?
            .as_f64()
            .ok_or_else(|| DiagError::invalid_argument(name, "expected a number"))
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, DiagError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_f64(name).map(Some),
        }
    }

    /// Integer argument; whole-number floats such as `850.0` are accepted.
    pub fn get_i32(&self, name: &str) -> Result<i32, DiagError> {
        let value = self.required(name)?;
        if let Some(v) = value.as_i64() {
            return i32::try_from(v)
                .map_err(|_| DiagError::invalid_argument(name, format!("{} out of range", v)));
        }
        match value.as_f64() {
            Some(v) if v.fract() == 0.0 && v.abs() <= i32::MAX as f64 => Ok(v as i32),
            _ => Err(DiagError::invalid_argument(name, "expected an integer")),
        }
    }

    pub fn opt_i32(&self, name: &str) -> Result<Option<i32>, DiagError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_i32(name).map(Some),
        }
    }

    pub fn get_bool_or(&self, name: &str, default: bool) -> Result<bool, DiagError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| DiagError::invalid_argument(name, "expected true or false")),
        }
    }
}

impl FromIterator<(String, Value)> for Kwargs {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
