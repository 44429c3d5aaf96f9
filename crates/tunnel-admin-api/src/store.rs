//! Tunnel update collaborator
//!
//! The API hands validated updates to a [`TunnelUpdater`]. Node identities are
//! resolved through a [`NodeRegistry`]. [`MemoryTunnelStore`] is an in-process
//! implementation of both seams, used by the CLI server and the tests.

use async_trait::async_trait;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tunnel_admin_proto::{TunnelUpdate, MAX_TRAFFIC_RATIO};

use crate::models::TunnelConfig;

/// Errors returned when applying an update
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Tunnel '{0}' not found")]
    TunnelNotFound(i64),

    #[error("Node '{0}' is not registered")]
    UnknownNode(i64),
}

/// Errors loading a seed file
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Applies validated updates to stored tunnels
#[async_trait]
pub trait TunnelUpdater: Send + Sync {
    /// Apply an update and return the resulting configuration
    async fn update_tunnel(&self, update: TunnelUpdate) -> Result<TunnelConfig, UpdateError>;

    async fn get_tunnel(&self, id: i64) -> Option<TunnelConfig>;

    async fn list_tunnels(&self) -> Vec<TunnelConfig>;
}

/// Resolves node identities
pub trait NodeRegistry: Send + Sync {
    fn contains(&self, node_id: i64) -> bool;
}

/// Node registry backed by an in-memory set
#[derive(Debug, Default)]
pub struct MemoryNodeRegistry {
    nodes: DashSet<i64>,
}

impl MemoryNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: i64) {
        self.nodes.insert(node_id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeRegistry for MemoryNodeRegistry {
    fn contains(&self, node_id: i64) -> bool {
        self.nodes.contains(&node_id)
    }
}

/// Initial content for a [`MemoryTunnelStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    /// Registered node identities
    #[serde(default)]
    pub nodes: Vec<i64>,
    /// Existing tunnels
    #[serde(default)]
    pub tunnels: Vec<TunnelConfig>,
}

impl SeedFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Ways a seeded tunnel breaks the rules an update would enforce
///
/// Seeds are loaded anyway; the problems are only logged.
fn seed_problems(tunnel: &TunnelConfig, registry: &dyn NodeRegistry) -> Vec<String> {
    let mut problems = Vec::new();

    if tunnel.name.trim().is_empty() {
        problems.push("has a blank name".to_string());
    }

    let ratio = tunnel.traffic_ratio;
    if !(ratio > 0.0 && ratio <= MAX_TRAFFIC_RATIO) {
        problems.push(format!(
            "has traffic ratio {} outside (0, {}]",
            ratio, MAX_TRAFFIC_RATIO
        ));
    }

    if let Some(missing) = tunnel.node_ids().find(|id| !registry.contains(*id)) {
        problems.push(format!("references unregistered node {}", missing));
    }

    problems
}

/// In-memory tunnel store
pub struct MemoryTunnelStore {
    tunnels: RwLock<HashMap<i64, TunnelConfig>>,
    registry: Arc<dyn NodeRegistry>,
}

impl MemoryTunnelStore {
    pub fn new(registry: Arc<dyn NodeRegistry>) -> Self {
        Self {
            tunnels: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Build a store and its registry from seed content
    pub fn from_seed(seed: SeedFile) -> Self {
        let registry = MemoryNodeRegistry::new();
        for node_id in &seed.nodes {
            registry.register(*node_id);
        }

        let mut tunnels = HashMap::new();
        for tunnel in seed.tunnels {
            for problem in seed_problems(&tunnel, &registry) {
                warn!("Seeded tunnel {} {}", tunnel.id, problem);
            }
            tunnels.insert(tunnel.id, tunnel);
        }

        info!(
            "Loaded {} tunnel(s) and {} node(s) from seed",
            tunnels.len(),
            registry.len()
        );

        Self {
            tunnels: RwLock::new(tunnels),
            registry: Arc::new(registry),
        }
    }

    /// Insert or replace a tunnel
    pub async fn insert_tunnel(&self, tunnel: TunnelConfig) {
        self.tunnels.write().await.insert(tunnel.id, tunnel);
    }

    /// First node referenced by a replacement that the registry does not know
    fn find_unknown_node(&self, update: &TunnelUpdate) -> Option<i64> {
        let in_nodes = update.in_nodes.as_replacement().into_iter().flatten();
        let chain_nodes = update
            .chain_nodes
            .as_replacement()
            .into_iter()
            .flatten()
            .flatten();
        let out_nodes = update.out_nodes.as_replacement().into_iter().flatten();

        in_nodes
            .chain(chain_nodes)
            .chain(out_nodes)
            .map(|node| node.node_id)
            .find(|id| !self.registry.contains(*id))
    }
}

#[async_trait]
impl TunnelUpdater for MemoryTunnelStore {
    async fn update_tunnel(&self, update: TunnelUpdate) -> Result<TunnelConfig, UpdateError> {
        let mut tunnels = self.tunnels.write().await;

        let tunnel = tunnels
            .get_mut(&update.id)
            .ok_or(UpdateError::TunnelNotFound(update.id))?;

        if let Some(node_id) = self.find_unknown_node(&update) {
            return Err(UpdateError::UnknownNode(node_id));
        }

        debug!("Applying update to tunnel {}: {:?}", update.id, update);
        tunnel.apply(update, chrono::Utc::now().timestamp_millis());

        info!(
            "Tunnel {} updated ({} entry, {} hop(s), {} exit)",
            tunnel.id,
            tunnel.in_nodes.len(),
            tunnel.chain_nodes.len(),
            tunnel.out_nodes.len()
        );

        Ok(tunnel.clone())
    }

    async fn get_tunnel(&self, id: i64) -> Option<TunnelConfig> {
        self.tunnels.read().await.get(&id).cloned()
    }

    async fn list_tunnels(&self) -> Vec<TunnelConfig> {
        let mut tunnels: Vec<TunnelConfig> = self.tunnels.read().await.values().cloned().collect();
        tunnels.sort_by_key(|t| t.id);
        tunnels
    }
}
