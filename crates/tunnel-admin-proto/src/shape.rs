//! Field-by-field reading of an update payload
//!
//! A derived `Deserialize` stops at the first mistyped field. Reading each
//! field on its own turns every type mismatch into a [`Violation`] and lets the
//! remaining rules still run on the fields that did parse.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::node::NodeRef;
use crate::update::TunnelUpdateRequest;
use crate::validation::Violation;

/// Field carrying violations about the payload as a whole
pub const BODY_FIELD: &str = "body";

/// Read `value` into a request, collecting a violation per mistyped field
pub(crate) fn read_request(value: Value) -> (TunnelUpdateRequest, Vec<Violation>) {
    let mut violations = Vec::new();

    let mut object = match value {
        Value::Object(object) => object,
        other => {
            violations.push(Violation::new(
                BODY_FIELD,
                format!("expected a JSON object, found {}", kind(&other)),
            ));
            Map::new()
        }
    };

    let request = TunnelUpdateRequest {
        id: scalar(&mut object, "id", &mut violations),
        name: scalar(&mut object, "name", &mut violations),
        flow: scalar(&mut object, "flow", &mut violations),
        in_ip: scalar(&mut object, "inIp", &mut violations),
        traffic_ratio: scalar(&mut object, "trafficRatio", &mut violations),
        in_node_id: node_list(&mut object, "inNodeId", &mut violations),
        chain_nodes: hop_list(&mut object, "chainNodes", &mut violations),
        out_node_id: node_list(&mut object, "outNodeId", &mut violations),
    };

    (request, violations)
}

/// Missing and `null` both read as `None`
fn take(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|value| !value.is_null())
}

fn scalar<T: DeserializeOwned>(
    object: &mut Map<String, Value>,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<T> {
    parse(take(object, key)?, key.to_string(), violations)
}

fn parse<T: DeserializeOwned>(
    value: Value,
    path: String,
    violations: &mut Vec<Violation>,
) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            violations.push(Violation::new(path, err.to_string()));
            None
        }
    }
}

fn array(value: Value, path: &str, violations: &mut Vec<Violation>) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        other => {
            violations.push(Violation::new(
                path,
                format!("expected an array, found {}", kind(&other)),
            ));
            None
        }
    }
}

fn nodes(items: Vec<Value>, path: &str, violations: &mut Vec<Violation>) -> Vec<NodeRef> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| parse(item, format!("{}[{}]", path, index), violations))
        .collect()
}

fn node_list(
    object: &mut Map<String, Value>,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<Vec<NodeRef>> {
    let items = array(take(object, key)?, key, violations)?;
    Some(nodes(items, key, violations))
}

fn hop_list(
    object: &mut Map<String, Value>,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<Vec<Vec<NodeRef>>> {
    let hops = array(take(object, key)?, key, violations)?;
    let mut parsed = Vec::with_capacity(hops.len());
    for (index, hop) in hops.into_iter().enumerate() {
        let path = format!("{}[{}]", key, index);
        if let Some(items) = array(hop, &path, violations) {
            parsed.push(nodes(items, &path, violations));
        }
    }
    Some(parsed)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
