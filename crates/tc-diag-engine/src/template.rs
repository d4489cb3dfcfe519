//! Placeholder substitution for model paths and output file names.
//!
//! Templates use `{name}` or `{name:spec}` placeholders:
//!
//! - `{model_time:%Y%m%d%H}`: model initialization time, strftime spec
//! - `{forecast_hour}` / `{forecast_hour:03}`: lead time, optional zero-padded width
//! - `{atcf_id}`, `{atcf_tech_id}`: storm id and track technique
//! - `{{` and `}}` are literal braces.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::ConfigError;

/// A value that can be substituted into a template.
#[derive(Debug, Clone)]
pub enum TemplateValue {
    Time(DateTime<Utc>),
    Int(i64),
    Text(String),
}

/// Named values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: BTreeMap<String, TemplateValue>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(mut self, name: &str, value: DateTime<Utc>) -> Self {
        self.values.insert(name.to_string(), TemplateValue::Time(value));
        self
    }

    pub fn int(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), TemplateValue::Int(value));
        self
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(name.to_string(), TemplateValue::Text(value.into()));
        self
    }

    /// Substitute every placeholder in `template`.
    pub fn render(&self, template: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field.push(c),
                            None => {
                                return Err(ConfigError::template(template, "unclosed '{'"))
                            }
                        }
                    }
                    self.render_field(template, &field, &mut out)?;
                }
                '}' => return Err(ConfigError::template(template, "unmatched '}'")),
                c => out.push(c),
            }
        }

        Ok(out)
    }

    fn render_field(&self, template: &str, field: &str, out: &mut String) -> Result<(), ConfigError> {
        let (name, spec) = match field.split_once(':') {
            Some((name, spec)) => (name.trim(), Some(spec)),
            None => (field.trim(), None),
        };
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ConfigError::template(template, format!("unknown placeholder {:?}", name)))?;

        let result = match (value, spec) {
            (TemplateValue::Time(t), Some(spec)) => write!(out, "{}", t.format(spec)),
            (TemplateValue::Time(t), None) => write!(out, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            (TemplateValue::Int(v), Some(spec)) => {
                let width = parse_int_spec(spec).ok_or_else(|| {
                    ConfigError::template(template, format!("bad integer format {:?}", spec))
                })?;
                write!(out, "{:0width$}", v, width = width)
            }
            (TemplateValue::Int(v), None) => write!(out, "{}", v),
            (TemplateValue::Text(s), None) => write!(out, "{}", s),
            (TemplateValue::Text(_), Some(spec)) => {
                return Err(ConfigError::template(
                    template,
                    format!("{:?} does not take a format spec ({:?})", name, spec),
                ))
            }
        };
        result.map_err(|e| ConfigError::template(template, e.to_string()))
    }
}

/// Accepts `03`, `03d`, `3` or `d` and returns the zero-padded width.
fn parse_int_spec(spec: &str) -> Option<usize> {
    let digits = spec.strip_suffix('d').unwrap_or(spec);
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars() -> TemplateVars {
        TemplateVars::new()
            .time("model_time", Utc.with_ymd_and_hms(2022, 9, 26, 6, 0, 0).unwrap())
            .int("forecast_hour", 6)
            .text("atcf_id", "al092022")
    }

    #[test]
    fn test_model_path_template() {
        let path = vars()
            .render("/data/gfs.{model_time:%Y%m%d}/gfs.t{model_time:%H}z.f{forecast_hour:03}")
            .unwrap();
        assert_eq!(path, "/data/gfs.20220926/gfs.t06z.f006");
    }

    #[test]
    fn test_plain_and_escaped() {
        let s = vars().render("{atcf_id}_{forecast_hour}_{{x}}").unwrap();
        assert_eq!(s, "al092022_6_{x}");
    }

    #[test]
    fn test_errors() {
        assert!(vars().render("{nope}").is_err());
        assert!(vars().render("{atcf_id").is_err());
        assert!(vars().render("{atcf_id:03}").is_err());
        assert!(vars().render("{forecast_hour:x}").is_err());
        assert!(vars().render("a}b").is_err());
    }
}
