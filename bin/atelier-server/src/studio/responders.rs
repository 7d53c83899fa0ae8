//! Model selection for the responder endpoints.

use atelier_agent::Responder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::ServerError;

/// `"1"` selects the local model, `"2"` the hosted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum ModelType {
    #[default]
    #[serde(rename = "1")]
    #[strum(serialize = "1")]
    Local,
    #[serde(rename = "2")]
    #[strum(serialize = "2")]
    Hosted,
}

#[derive(Debug, Clone)]
pub struct Responders {
    pub local: Option<Responder>,
    pub hosted: Responder,
}

impl Responders {
    pub fn select(&self, model_type: ModelType) -> Result<&Responder, ServerError> {
        match model_type {
            ModelType::Hosted => Ok(&self.hosted),
            ModelType::Local => self.local.as_ref().ok_or_else(|| {
                ServerError::ServiceUnavailable("Local model is not configured".into())
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn model_type_wire_format() {
        assert_eq!(ModelType::from_str("1").ok(), Some(ModelType::Local));
        assert_eq!(ModelType::from_str("2").ok(), Some(ModelType::Hosted));
        assert!(ModelType::from_str("3").is_err());
        assert_eq!(serde_json::to_string(&ModelType::Hosted).expect("json"), "\"2\"");
        assert_eq!(ModelType::default(), ModelType::Local);
    }
}
