//! Tunnel update payload and its normalized form

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::node::{FlowMode, NodeRef};
use crate::patch::Patch;
use crate::shape;
use crate::validation::{self, ValidationError, Violation};

/// Request to change the configuration of an existing tunnel
///
/// This is the shape accepted on the wire. Required fields are still
/// optional here so that a missing one becomes a violation instead of a
/// deserialization failure. Call [`TunnelUpdateRequest::validate`] to obtain
/// a [`TunnelUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TunnelUpdateRequest {
    /// Identifier of the tunnel to update
    #[validate(required(message = "id required"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Tunnel name
    #[validate(required(message = "name required"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Traffic accounting mode (1 = single direction, 2 = bidirectional)
    #[validate(required(message = "flow required"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<i32>,

    /// Inbound bind address override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_ip: Option<String>,

    /// Multiplier applied to reported traffic, in (0, 100]
    #[validate(range(
        exclusive_min = 0.0,
        max = 100.0,
        message = "trafficRatio out of range"
    ))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_ratio: Option<f64>,

    /// Entry nodes; absent leaves the entry untouched, `[]` clears it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_node_id: Option<Vec<NodeRef>>,

    /// Forwarding chain, one inner list of alternative nodes per hop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_nodes: Option<Vec<Vec<NodeRef>>>,

    /// Exit nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_node_id: Option<Vec<NodeRef>>,
}

/// A tunnel update that passed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TunnelUpdate {
    pub id: i64,
    /// Trimmed tunnel name
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = i32))]
    pub flow: FlowMode,
    /// `Replace(None)` clears the override
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub in_ip: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_ratio: Option<f64>,
    #[serde(
        rename = "inNodeId",
        default,
        skip_serializing_if = "Patch::is_unchanged"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<NodeRef>>))]
    pub in_nodes: Patch<Vec<NodeRef>>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Vec<NodeRef>>>))]
    pub chain_nodes: Patch<Vec<Vec<NodeRef>>>,
    #[serde(
        rename = "outNodeId",
        default,
        skip_serializing_if = "Patch::is_unchanged"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<NodeRef>>))]
    pub out_nodes: Patch<Vec<NodeRef>>,
}

impl TunnelUpdateRequest {
    /// Check every field rule and normalize the payload
    ///
    /// All rules run; the error carries every violation found.
    pub fn validate(self) -> Result<TunnelUpdate, ValidationError> {
        let mut violations = match Validate::validate(&self) {
            Ok(()) => Vec::new(),
            Err(report) => validation::from_report(&report),
        };

        let name = self.name.as_deref().map(str::trim).map(str::to_string);
        if name.as_deref() == Some("") {
            violations.push(Violation::new("name", validation::NAME_REQUIRED));
        }

        let flow = self.flow.and_then(|code| {
            let mode = FlowMode::from_code(code);
            if mode.is_none() {
                violations.push(Violation::new("flow", validation::UNRECOGNIZED_FLOW));
            }
            mode
        });

        debug!(
            "Validated tunnel update for {:?}: {} violation(s)",
            self.id,
            violations.len()
        );

        match (self.id, name, flow) {
            (Some(id), Some(name), Some(flow)) if violations.is_empty() => Ok(TunnelUpdate {
                id,
                name,
                flow,
                in_ip: self.in_ip.map(normalize_in_ip).into(),
                traffic_ratio: self.traffic_ratio,
                in_nodes: self.in_node_id.into(),
                chain_nodes: self.chain_nodes.into(),
                out_nodes: self.out_node_id.into(),
            }),
            _ => Err(ValidationError::new(violations)),
        }
    }

    /// Validate a raw JSON payload
    ///
    /// Type mismatches are reported as violations next to the field rules
    /// instead of aborting at the first one. A field that failed to parse is
    /// not reported a second time as missing.
    pub fn validate_json(value: serde_json::Value) -> Result<TunnelUpdate, ValidationError> {
        let (request, mut violations) = shape::read_request(value);

        match request.validate() {
            Ok(update) if violations.is_empty() => Ok(update),
            Ok(_) => Err(ValidationError::new(violations)),
            Err(err) => {
                let mistyped: Vec<String> = violations.iter().map(|v| v.field.clone()).collect();
                violations.extend(
                    err.into_violations()
                        .into_iter()
                        .filter(|v| !mistyped.contains(&v.field)),
                );
                Err(ValidationError::new(violations))
            }
        }
    }
}

fn normalize_in_ip(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> TunnelUpdateRequest {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    fn fields(err: &ValidationError) -> Vec<&str> {
        err.violations().iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_minimal_payload_is_accepted() {
        let update = request(json!({
            "id": 5,
            "name": "edge-1",
            "flow": 1,
            "trafficRatio": 2.5,
            "outNodeId": [{"nodeId": 9}]
        }))
        .validate()
        .unwrap();

        assert_eq!(update.id, 5);
        assert_eq!(update.name, "edge-1");
        assert_eq!(update.flow, FlowMode::Single);
        assert_eq!(update.traffic_ratio, Some(2.5));
        assert!(update.in_nodes.is_unchanged());
        assert!(update.chain_nodes.is_unchanged());
        assert_eq!(update.out_nodes, Patch::Replace(vec![NodeRef::new(9)]));
        assert!(update.in_ip.is_unchanged());
    }

    #[test]
    fn test_missing_id_and_blank_name_are_both_reported() {
        let err = request(json!({"name": "", "flow": 1}))
            .validate()
            .unwrap_err();

        assert_eq!(fields(&err), vec!["id", "name"]);
        assert_eq!(err.violations()[0].message, "id required");
        assert_eq!(err.violations()[1].message, "name required");
    }

    #[test]
    fn test_empty_payload_reports_every_required_field() {
        let err = TunnelUpdateRequest::default().validate().unwrap_err();
        assert_eq!(fields(&err), vec!["id", "name", "flow"]);
    }

    #[test]
    fn test_whitespace_name_is_blank() {
        let err = request(json!({"id": 1, "name": " \t ", "flow": 2}))
            .validate()
            .unwrap_err();
        assert_eq!(fields(&err), vec!["name"]);
    }

    #[test]
    fn test_name_is_trimmed() {
        let update = request(json!({"id": 1, "name": "  core  ", "flow": 2}))
            .validate()
            .unwrap();
        assert_eq!(update.name, "core");
        assert_eq!(update.flow, FlowMode::Bidirectional);
    }

    #[test]
    fn test_unrecognized_flow_mode() {
        let err = request(json!({"id": 1, "name": "a", "flow": 9}))
            .validate()
            .unwrap_err();
        assert_eq!(fields(&err), vec!["flow"]);
        assert_eq!(err.violations()[0].message, "unrecognized flow mode");
    }

    #[test]
    fn test_traffic_ratio_bounds() {
        let check = |ratio: f64| {
            TunnelUpdateRequest {
                id: Some(1),
                name: Some("a".into()),
                flow: Some(1),
                traffic_ratio: Some(ratio),
                ..Default::default()
            }
            .validate()
        };

        assert!(check(0.0).is_err());
        assert!(check(-1.0).is_err());
        assert!(check(0.0001).is_ok());
        assert!(check(1.0).is_ok());
        assert!(check(100.0).is_ok());
        assert!(check(100.0001).is_err());
        assert!(check(f64::NAN).is_err());
        assert!(check(f64::INFINITY).is_err());

        for ratio in [0.0, f64::NAN, f64::NEG_INFINITY] {
            let err = check(ratio).unwrap_err();
            assert_eq!(err.violations().len(), 1, "ratio {}", ratio);
            assert_eq!(err.violations()[0].field, "trafficRatio");
            assert_eq!(err.violations()[0].message, "trafficRatio out of range");
        }
    }

    #[test]
    fn test_absent_traffic_ratio_is_accepted() {
        let update = request(json!({"id": 1, "name": "a", "flow": 1}))
            .validate()
            .unwrap();
        assert_eq!(update.traffic_ratio, None);
    }

    #[test]
    fn test_all_violations_in_field_order() {
        let err = request(json!({"name": "  ", "flow": 0, "trafficRatio": 500.0}))
            .validate()
            .unwrap_err();
        assert_eq!(fields(&err), vec!["id", "name", "flow", "trafficRatio"]);
    }

    #[test]
    fn test_empty_node_list_differs_from_absent() {
        let cleared = request(json!({"id": 1, "name": "a", "flow": 1, "inNodeId": []}))
            .validate()
            .unwrap();
        let untouched = request(json!({"id": 1, "name": "a", "flow": 1}))
            .validate()
            .unwrap();
        let null = request(json!({"id": 1, "name": "a", "flow": 1, "inNodeId": null}))
            .validate()
            .unwrap();

        assert_eq!(cleared.in_nodes, Patch::Replace(vec![]));
        assert!(untouched.in_nodes.is_unchanged());
        assert!(null.in_nodes.is_unchanged());
        assert_ne!(cleared, untouched);
    }

    #[test]
    fn test_chain_order_is_preserved() {
        let update = request(json!({
            "id": 1,
            "name": "a",
            "flow": 1,
            "chainNodes": [
                [{"nodeId": 30}, {"nodeId": 10}, {"nodeId": 20}],
                [],
                [{"nodeId": 5}, {"nodeId": 5}]
            ]
        }))
        .validate()
        .unwrap();

        let hops: Vec<Vec<i64>> = update
            .chain_nodes
            .as_replacement()
            .unwrap()
            .iter()
            .map(|hop| hop.iter().map(|n| n.node_id).collect())
            .collect();
        assert_eq!(hops, vec![vec![30, 10, 20], vec![], vec![5, 5]]);
    }

    #[test]
    fn test_in_ip_normalization() {
        let base = json!({"id": 1, "name": "a", "flow": 1});

        let mut set = base.clone();
        set["inIp"] = json!(" 10.0.0.1,10.0.0.2 ");
        let update = request(set).validate().unwrap();
        assert_eq!(
            update.in_ip,
            Patch::Replace(Some("10.0.0.1,10.0.0.2".to_string()))
        );

        let mut blank = base.clone();
        blank["inIp"] = json!("   ");
        assert_eq!(request(blank).validate().unwrap().in_ip, Patch::Replace(None));

        assert!(request(base).validate().unwrap().in_ip.is_unchanged());
    }

    #[test]
    fn test_validate_json_accepts_well_typed_payload() {
        let update = TunnelUpdateRequest::validate_json(json!({
            "id": 5,
            "name": "edge-1",
            "flow": 1,
            "trafficRatio": 2.5,
            "outNodeId": [{"nodeId": 9}]
        }))
        .unwrap();

        assert_eq!(update.id, 5);
        assert!(update.in_nodes.is_unchanged());
        assert_eq!(update.out_nodes, Patch::Replace(vec![NodeRef::new(9)]));
    }

    #[test]
    fn test_validate_json_keeps_rule_violations_next_to_type_errors() {
        let err = TunnelUpdateRequest::validate_json(json!({
            "id": "abc",
            "name": "",
            "flow": 1,
            "trafficRatio": "2.5",
            "inNodeId": [{"port": 1}]
        }))
        .unwrap_err();

        assert_eq!(fields(&err), vec!["id", "name", "trafficRatio", "inNodeId[0]"]);
        assert!(err.violations()[0].message.contains("invalid type"));
        assert_eq!(err.violations()[1].message, "name required");
    }

    #[test]
    fn test_validate_json_malformed_node_alone_rejects() {
        let err = TunnelUpdateRequest::validate_json(json!({
            "id": 1,
            "name": "a",
            "flow": 1,
            "chainNodes": [[{"nodeId": 2}, {"nodeId": true}]]
        }))
        .unwrap_err();

        assert_eq!(fields(&err), vec!["chainNodes[0][1]"]);
    }

    #[test]
    fn test_normalized_json_omits_unchanged_sections() {
        let update = request(json!({
            "id": 5,
            "name": "edge-1",
            "flow": 1,
            "trafficRatio": 2.5,
            "chainNodes": [],
            "outNodeId": [{"nodeId": 9, "protocol": "tls"}]
        }))
        .validate()
        .unwrap();

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "id": 5,
                "name": "edge-1",
                "flow": 1,
                "trafficRatio": 2.5,
                "chainNodes": [],
                "outNodeId": [{"nodeId": 9, "protocol": "tls"}]
            })
        );
    }
}
