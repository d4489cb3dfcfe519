//! Unit converters and their registry.
//!
//! Converters are looked up by stable identifier from configuration. The
//! identifier `pass` means "store the value unchanged".

use std::collections::BTreeMap;

use crate::error::ConfigError;

/// A scalar unit conversion.
pub type UnitConverter = fn(f64) -> f64;

/// Configuration token for "no conversion".
pub const PASS: &str = "pass";

const MPS_TO_KT: f64 = 1.94384;
const KM_PER_NMI: f64 = 1.852;

pub fn mps_to_kt(value: f64) -> f64 {
    value * MPS_TO_KT
}

/// Knots scaled by 10, as the diagnostics file stores many winds.
pub fn mps_to_10kt(value: f64) -> f64 {
    mps_to_kt(value) * 10.0
}

pub fn kt_to_mps(value: f64) -> f64 {
    value / MPS_TO_KT
}

pub fn kelvin_to_celsius(value: f64) -> f64 {
    value - 273.15
}

pub fn kelvin_to_10celsius(value: f64) -> f64 {
    kelvin_to_celsius(value) * 10.0
}

pub fn pa_to_hpa(value: f64) -> f64 {
    value / 100.0
}

/// Meters to decameters.
pub fn m_to_dam(value: f64) -> f64 {
    value / 10.0
}

/// Per-second quantities (divergence, vorticity) in units of 1e-7 / s.
pub fn per_s_to_1e7_per_s(value: f64) -> f64 {
    value * 1e7
}

pub fn km_to_nmi(value: f64) -> f64 {
    value / KM_PER_NMI
}

/// Maps converter identifiers to functions.
#[derive(Debug, Clone, Default)]
pub struct UnitConverterRegistry {
    converters: BTreeMap<String, UnitConverter>,
}

impl UnitConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in converter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("mps_to_kt", mps_to_kt);
        registry.register("mps_to_10kt", mps_to_10kt);
        registry.register("kt_to_mps", kt_to_mps);
        registry.register("kelvin_to_celsius", kelvin_to_celsius);
        registry.register("kelvin_to_10celsius", kelvin_to_10celsius);
        registry.register("pa_to_hpa", pa_to_hpa);
        registry.register("m_to_dam", m_to_dam);
        registry.register("per_s_to_1e7_per_s", per_s_to_1e7_per_s);
        registry.register("km_to_nmi", km_to_nmi);
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, converter: UnitConverter) {
        self.converters.insert(id.into(), converter);
    }

    pub fn get(&self, id: &str) -> Option<UnitConverter> {
        self.converters.get(id.trim()).copied()
    }

    /// Resolve a configuration token for computation `name`.
    ///
    /// `pass` resolves to `None`; an unknown id is an error.
    pub fn resolve(&self, name: &str, token: &str) -> Result<Option<UnitConverter>, ConfigError> {
        if token.trim() == PASS {
            return Ok(None);
        }
        self.get(token)
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownConverter {
                name: name.to_string(),
                converter: token.to_string(),
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mps_to_10kt_round_trip() {
        let mps = 12.5;
        let tenths_kt = mps_to_10kt(mps);
        assert!((tenths_kt - 242.98).abs() < 1e-9);
        assert!((kt_to_mps(tenths_kt / 10.0) - mps).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_and_pressure() {
        assert!((kelvin_to_celsius(273.15)).abs() < 1e-12);
        assert!((kelvin_to_10celsius(300.15) - 270.0).abs() < 1e-9);
        assert_eq!(pa_to_hpa(101325.0), 1013.25);
        assert_eq!(m_to_dam(5880.0), 588.0);
        assert!((km_to_nmi(1.852) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_registry_resolve() {
        let registry = UnitConverterRegistry::with_builtins();
        assert!(registry.resolve("shear", "pass").unwrap().is_none());
        let conv = registry.resolve("shear", "mps_to_kt").unwrap().unwrap();
        assert!((conv(1.0) - 1.94384).abs() < 1e-12);
        assert!(matches!(
            registry.resolve("shear", "furlongs"),
            Err(ConfigError::UnknownConverter { .. })
        ));
    }
}
