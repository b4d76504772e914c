use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised when a specification is structurally unusable.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("malformed specification: {field} {reason}")]
    Malformed { field: String, reason: String },
    #[error("specification JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SpecError::Malformed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A single named, typed parameter of a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Function signature: name, ordered parameters, optional return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<String>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn returning(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }
}

/// Structured, language-agnostic description of one function.
///
/// Effects are ordered. Assertions are compared as a multiset; their stored
/// order carries no meaning but is preserved so generated variants differ
/// from their baseline only where a transform applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub intent: String,
    pub signature: Signature,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub assertions: Vec<String>,
}

impl Specification {
    pub fn new(intent: impl Into<String>, signature: Signature) -> Self {
        Self {
            intent: intent.into(),
            signature,
            effects: Vec::new(),
            assertions: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }

    pub fn with_assertion(mut self, assertion: impl Into<String>) -> Self {
        self.assertions.push(assertion.into());
        self
    }

    /// Parse and validate a specification from JSON text.
    pub fn from_json_str(source: &str) -> Result<Self, SpecError> {
        let spec: Specification = serde_json::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse and validate a specification from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        let spec: Specification = serde_json::from_value(value)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the structural contract every comparison relies on.
    ///
    /// The intent may be empty; a signature without a name, a parameter
    /// without a name or type, or a blank effect/assertion entry may not.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.signature.name.trim().is_empty() {
            return Err(SpecError::malformed("signature.name", "is empty"));
        }
        for (idx, param) in self.signature.parameters.iter().enumerate() {
            if param.name.trim().is_empty() {
                return Err(SpecError::malformed(
                    format!("signature.parameters[{idx}].name"),
                    "is empty",
                ));
            }
            if param.ty.trim().is_empty() {
                return Err(SpecError::malformed(
                    format!("signature.parameters[{idx}].type"),
                    "is empty",
                ));
            }
        }
        if let Some(ret) = &self.signature.return_type {
            if ret.trim().is_empty() {
                return Err(SpecError::malformed(
                    "signature.return_type",
                    "is present but blank",
                ));
            }
        }
        for (idx, effect) in self.effects.iter().enumerate() {
            if effect.trim().is_empty() {
                return Err(SpecError::malformed(format!("effects[{idx}]"), "is blank"));
            }
        }
        for (idx, assertion) in self.assertions.iter().enumerate() {
            if assertion.trim().is_empty() {
                return Err(SpecError::malformed(
                    format!("assertions[{idx}]"),
                    "is blank",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Specification {
        Specification::new(
            "Compute the average of a list of numbers",
            Signature::new("compute_average")
                .with_parameter("nums", "list[float]")
                .returning("float"),
        )
        .with_effect("Sum all values in nums")
        .with_effect("Return the total divided by the count")
        .with_assertion("len(nums) > 0")
    }

    #[test]
    fn valid_spec_passes_validation() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn json_round_trip_uses_type_key() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["signature"]["parameters"][0]["type"], "list[float]");
        let back = Specification::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn missing_optional_sections_default_to_empty() {
        let spec = Specification::from_json_str(
            r#"{"intent": "noop", "signature": {"name": "noop"}}"#,
        )
        .unwrap();
        assert!(spec.effects.is_empty());
        assert!(spec.assertions.is_empty());
        assert!(spec.signature.parameters.is_empty());
        assert_eq!(spec.signature.return_type, None);
    }

    #[test]
    fn empty_signature_name_is_rejected() {
        let mut spec = sample();
        spec.signature.name = "  ".into();
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, SpecError::Malformed { ref field, .. } if field == "signature.name"));
    }

    #[test]
    fn blank_parameter_type_is_rejected() {
        let mut spec = sample();
        spec.signature.parameters[0].ty = String::new();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("parameters[0].type"), "{err}");
    }

    #[test]
    fn blank_effect_is_rejected() {
        let spec = sample().with_effect("   ");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn missing_signature_is_a_json_error() {
        let err = Specification::from_json_str(r#"{"intent": "x"}"#).unwrap_err();
        assert!(matches!(err, SpecError::Json(_)));
    }
}
