use super::deployments::Trigger;
use crate::storage::deployments::Payload;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single rule violation on a request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldError {
    /// Name of the offending field as the client sent it.
    pub field: String,

    /// What the client needs to fix.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn not_empty_str(s: &str) -> bool {
    !s.is_empty()
}

pub fn is_valid_trigger(s: &str) -> bool {
    Trigger::from_str(s).is_ok()
}

/// Checks a deployment payload against every field rule and returns all violations. Every rule is evaluated;
/// an empty result means the payload may be persisted. Branch is not validated.
pub fn validate_deployment(payload: &Payload) -> Vec<FieldError> {
    let mut errors = vec![];

    if !not_empty_str(&payload.repository) {
        errors.push(FieldError::new("repository", "Repository must be provided"));
    }

    if !is_valid_trigger(&payload.trigger) {
        errors.push(FieldError::new("trigger", "Trigger must be provided"));
    }

    if !not_empty_str(&payload.organization_guid) {
        errors.push(FieldError::new(
            "organizationGUID",
            "Organisation GUID must be provided",
        ));
    }

    if !not_empty_str(&payload.space_guid) {
        errors.push(FieldError::new("spaceGUID", "Space GUID must be provided"));
    }

    errors
}
