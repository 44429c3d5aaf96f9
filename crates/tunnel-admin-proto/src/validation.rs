//! Field-level violations collected while validating a tunnel update

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub(crate) const NAME_REQUIRED: &str = "name required";
pub(crate) const UNRECOGNIZED_FLOW: &str = "unrecognized flow mode";

/// Wire names of payload fields, in reporting order
const FIELD_ORDER: [&str; 9] = [
    crate::shape::BODY_FIELD,
    "id",
    "name",
    "flow",
    "inIp",
    "trafficRatio",
    "inNodeId",
    "chainNodes",
    "outNodeId",
];

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Violation {
    /// Offending field, as spelled on the wire
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A rejected payload with every violation that was found
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tunnel update: {}", join(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Build an error, sorting violations into the stable field order
    pub fn new(mut violations: Vec<Violation>) -> Self {
        violations.sort_by_key(|v| field_rank(&v.field));
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rank of a field; indexed paths like `inNodeId[2]` rank with their list
fn field_rank(field: &str) -> usize {
    let root = field.split('[').next().unwrap_or(field);
    FIELD_ORDER
        .iter()
        .position(|known| *known == root)
        .unwrap_or(FIELD_ORDER.len())
}

/// Rust field name to wire name
fn wire_name(field: &str) -> String {
    match field {
        "traffic_ratio" => "trafficRatio".to_string(),
        "in_ip" => "inIp".to_string(),
        other => other.to_string(),
    }
}

/// Flatten a `validator` report into violations
pub(crate) fn from_report(report: &validator::ValidationErrors) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (field, errors) in report.field_errors() {
        let field: &str = &field;
        for error in errors.iter() {
            let message = error
                .message
                .as_deref()
                .map(str::to_string)
                .unwrap_or_else(|| error.code.to_string());
            violations.push(Violation::new(wire_name(field), message));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_are_sorted_by_field() {
        let err = ValidationError::new(vec![
            Violation::new("outNodeId[0]", "missing field `nodeId`"),
            Violation::new("trafficRatio", "trafficRatio out of range"),
            Violation::new("chainNodes[1][0]", "missing field `nodeId`"),
            Violation::new("flow", UNRECOGNIZED_FLOW),
            Violation::new("id", "id required"),
        ]);

        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["id", "flow", "trafficRatio", "chainNodes[1][0]", "outNodeId[0]"]
        );
    }

    #[test]
    fn test_display_lists_every_violation() {
        let err = ValidationError::new(vec![
            Violation::new("name", NAME_REQUIRED),
            Violation::new("id", "id required"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid tunnel update: id: id required, name: name required"
        );
    }

    #[test]
    fn test_wire_name() {
        assert_eq!(wire_name("traffic_ratio"), "trafficRatio");
        assert_eq!(wire_name("id"), "id");
    }
}
