//! Node references and the enumerations attached to a tunnel's topology

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic accounting mode of a tunnel
///
/// Serialized as its integer wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum FlowMode {
    /// Only one direction of traffic is counted
    Single,
    /// Upload and download are both counted
    Bidirectional,
}

impl FlowMode {
    /// Integer value used on the wire
    pub fn code(self) -> i32 {
        match self {
            FlowMode::Single => 1,
            FlowMode::Bidirectional => 2,
        }
    }

    /// Look up a mode by wire value
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(FlowMode::Single),
            2 => Some(FlowMode::Bidirectional),
            _ => None,
        }
    }
}

impl TryFrom<i32> for FlowMode {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        FlowMode::from_code(code).ok_or_else(|| format!("unrecognized flow mode: {}", code))
    }
}

impl From<FlowMode> for i32 {
    fn from(mode: FlowMode) -> Self {
        mode.code()
    }
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowMode::Single => write!(f, "single"),
            FlowMode::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// Role a node plays inside a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChainType {
    /// Entry node
    In,
    /// Intermediate hop
    Chain,
    /// Exit node
    Out,
}

impl TryFrom<u8> for ChainType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ChainType::In),
            2 => Ok(ChainType::Chain),
            3 => Ok(ChainType::Out),
            other => Err(format!("unknown chain type: {}", other)),
        }
    }
}

impl From<ChainType> for u8 {
    fn from(chain_type: ChainType) -> Self {
        match chain_type {
            ChainType::In => 1,
            ChainType::Chain => 2,
            ChainType::Out => 3,
        }
    }
}

/// Reference to a forwarding node owned by the node registry
///
/// Only the identity is interpreted here; the remaining fields are carried
/// through to the tunnel store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    /// Registry identity of the node
    pub node_id: i64,
    /// Port the node listens on for this tunnel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Load-balancing strategy for this hop (e.g. `fifo`, `round`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Transport protocol between this node and the next one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl NodeRef {
    /// Reference a node by identity only
    pub fn new(node_id: i64) -> Self {
        Self {
            node_id,
            port: None,
            strategy: None,
            protocol: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}
