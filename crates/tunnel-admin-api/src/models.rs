use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tunnel_admin_proto::{ChainType, FlowMode, NodeRef, TunnelUpdate, Violation};
use tunnel_admin_proto::DEFAULT_TRAFFIC_RATIO;

/// Stored configuration of a tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TunnelConfig {
    /// Tunnel identifier
    pub id: i64,
    /// Tunnel name
    pub name: String,
    /// Traffic accounting mode (1 = single direction, 2 = bidirectional)
    #[schema(value_type = i32)]
    pub flow: FlowMode,
    /// Inbound bind address override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_ip: Option<String>,
    /// Multiplier applied to reported traffic
    #[serde(default = "default_traffic_ratio")]
    pub traffic_ratio: f64,
    /// Entry nodes
    #[serde(rename = "inNodeId", default)]
    pub in_nodes: Vec<NodeRef>,
    /// Forwarding chain, one list of alternative nodes per hop
    #[serde(default)]
    pub chain_nodes: Vec<Vec<NodeRef>>,
    /// Exit nodes
    #[serde(rename = "outNodeId", default)]
    pub out_nodes: Vec<NodeRef>,
    /// Last modification time (unix millis)
    #[serde(default)]
    pub updated_time: i64,
}

fn default_traffic_ratio() -> f64 {
    DEFAULT_TRAFFIC_RATIO
}

impl TunnelConfig {
    /// A tunnel with no nodes attached yet
    pub fn new(id: i64, name: impl Into<String>, flow: FlowMode) -> Self {
        Self {
            id,
            name: name.into(),
            flow,
            in_ip: None,
            traffic_ratio: DEFAULT_TRAFFIC_RATIO,
            in_nodes: Vec::new(),
            chain_nodes: Vec::new(),
            out_nodes: Vec::new(),
            updated_time: 0,
        }
    }

    /// Apply a validated update; sections marked unchanged are left alone
    pub fn apply(&mut self, update: TunnelUpdate, now_millis: i64) {
        self.name = update.name;
        self.flow = update.flow;
        if let Some(ratio) = update.traffic_ratio {
            self.traffic_ratio = ratio;
        }
        update.in_ip.apply_to(&mut self.in_ip);
        update.in_nodes.apply_to(&mut self.in_nodes);
        update.chain_nodes.apply_to(&mut self.chain_nodes);
        update.out_nodes.apply_to(&mut self.out_nodes);
        self.updated_time = now_millis;
    }

    /// Every node referenced by this tunnel, tagged with its role
    pub fn bindings(&self) -> Vec<TunnelNodeBinding> {
        let entries = self
            .in_nodes
            .iter()
            .map(|node| TunnelNodeBinding::new(ChainType::In, 0, node));
        let hops = self.chain_nodes.iter().enumerate().flat_map(|(hop, nodes)| {
            nodes
                .iter()
                .map(move |node| TunnelNodeBinding::new(ChainType::Chain, hop, node))
        });
        let exits = self
            .out_nodes
            .iter()
            .map(|node| TunnelNodeBinding::new(ChainType::Out, 0, node));

        entries.chain(hops).chain(exits).collect()
    }

    /// Node identities in the order they appear in the topology
    pub fn node_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.in_nodes
            .iter()
            .chain(self.chain_nodes.iter().flatten())
            .chain(self.out_nodes.iter())
            .map(|node| node.node_id)
    }
}

/// One node's place in a tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TunnelNodeBinding {
    /// 1 = entry, 2 = chain hop, 3 = exit
    #[schema(value_type = u8)]
    pub chain_type: ChainType,
    /// Hop position for chain nodes, 0 otherwise
    pub hop_index: usize,
    /// The referenced node
    pub node: NodeRef,
}

impl TunnelNodeBinding {
    fn new(chain_type: ChainType, hop_index: usize, node: &NodeRef) -> Self {
        Self {
            chain_type,
            hop_index,
            node: node.clone(),
        }
    }
}

/// List of tunnels
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TunnelList {
    /// Tunnels
    pub tunnels: Vec<TunnelConfig>,
    /// Total count
    pub total: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Field-level violations when the payload was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
            violations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnel_admin_proto::{Patch, TunnelUpdateRequest};

    fn tunnel() -> TunnelConfig {
        let mut tunnel = TunnelConfig::new(7, "edge", FlowMode::Single);
        tunnel.in_nodes = vec![NodeRef::new(1)];
        tunnel.chain_nodes = vec![vec![NodeRef::new(2), NodeRef::new(3)], vec![NodeRef::new(4)]];
        tunnel.out_nodes = vec![NodeRef::new(5)];
        tunnel.in_ip = Some("10.0.0.1".to_string());
        tunnel
    }

    fn update(value: serde_json::Value) -> TunnelUpdate {
        serde_json::from_value::<TunnelUpdateRequest>(value)
            .unwrap()
            .validate()
            .unwrap()
    }

    #[test]
    fn test_apply_keeps_unchanged_sections() {
        let mut tunnel = tunnel();
        tunnel.apply(
            update(serde_json::json!({"id": 7, "name": "renamed", "flow": 2})),
            42,
        );

        assert_eq!(tunnel.name, "renamed");
        assert_eq!(tunnel.flow, FlowMode::Bidirectional);
        assert_eq!(tunnel.in_nodes, vec![NodeRef::new(1)]);
        assert_eq!(tunnel.chain_nodes.len(), 2);
        assert_eq!(tunnel.out_nodes, vec![NodeRef::new(5)]);
        assert_eq!(tunnel.in_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(tunnel.traffic_ratio, DEFAULT_TRAFFIC_RATIO);
        assert_eq!(tunnel.updated_time, 42);
    }

    #[test]
    fn test_apply_clears_replaced_sections() {
        let mut tunnel = tunnel();
        let update = update(serde_json::json!({
            "id": 7,
            "name": "edge",
            "flow": 1,
            "inIp": "",
            "trafficRatio": 0.5,
            "inNodeId": [],
            "chainNodes": []
        }));
        assert_eq!(update.in_ip, Patch::Replace(None));
        tunnel.apply(update, 1);

        assert!(tunnel.in_nodes.is_empty());
        assert!(tunnel.chain_nodes.is_empty());
        assert_eq!(tunnel.out_nodes, vec![NodeRef::new(5)]);
        assert_eq!(tunnel.in_ip, None);
        assert_eq!(tunnel.traffic_ratio, 0.5);
    }

    #[test]
    fn test_bindings_carry_roles_and_hops() {
        let bindings = tunnel().bindings();
        let summary: Vec<(ChainType, usize, i64)> = bindings
            .iter()
            .map(|b| (b.chain_type, b.hop_index, b.node.node_id))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ChainType::In, 0, 1),
                (ChainType::Chain, 0, 2),
                (ChainType::Chain, 0, 3),
                (ChainType::Chain, 1, 4),
                (ChainType::Out, 0, 5),
            ]
        );
    }

    #[test]
    fn test_seeded_tunnel_defaults() {
        let tunnel: TunnelConfig = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "seed",
            "flow": 1
        }))
        .unwrap();
        assert_eq!(tunnel, TunnelConfig::new(1, "seed", FlowMode::Single));
    }
}
