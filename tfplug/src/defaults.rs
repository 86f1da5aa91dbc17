//! Fixed defaults for optional attributes
//!
//! Planning substitutes the default when the configuration leaves the
//! attribute null, so the planned value matches what the API will report.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

pub struct StaticDefault(Dynamic);

impl StaticDefault {
    fn boxed(value: impl Into<Dynamic>) -> Box<dyn Default> {
        Box::new(Self(value.into()))
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::boxed(value)
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::boxed(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::boxed(value)
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        match &self.0 {
            Dynamic::String(s) => format!("defaults to {:?}", s),
            Dynamic::Number(n) => format!("defaults to {}", n),
            Dynamic::Bool(b) => format!("defaults to {}", b),
            other => format!("defaults to {:?}", other),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.0.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn value_of(default: &dyn Default) -> Dynamic {
        default
            .default_value(DefaultRequest {
                path: AttributePath::new("x"),
            })
            .value
            .value
    }

    #[test]
    fn static_defaults() {
        assert_eq!(value_of(StaticDefault::bool(true).as_ref()), Dynamic::Bool(true));
        assert_eq!(
            value_of(StaticDefault::string("P10675199DT2H48M5.4775807S").as_ref()),
            Dynamic::String("P10675199DT2H48M5.4775807S".into())
        );
        assert_eq!(value_of(StaticDefault::number(10.0).as_ref()), Dynamic::Number(10.0));
    }

    #[test]
    fn description_shows_value() {
        assert_eq!(StaticDefault::bool(false).description(), "defaults to false");
        assert_eq!(StaticDefault::string("Active").description(), r#"defaults to "Active""#);
        assert_eq!(StaticDefault::number(1024.0).description(), "defaults to 1024");
    }
}
