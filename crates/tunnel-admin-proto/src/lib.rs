//! Tunnel Admin Protocol Definitions
//!
//! Wire types for tunnel configuration updates and the validator that turns an
//! incoming update payload into a normalized [`TunnelUpdate`].

pub mod node;
pub mod patch;
pub mod shape;
pub mod update;
pub mod validation;

pub use node::{ChainType, FlowMode, NodeRef};
pub use patch::Patch;
pub use shape::BODY_FIELD;
pub use update::{TunnelUpdate, TunnelUpdateRequest};
pub use validation::{ValidationError, Violation};

/// Largest accepted traffic ratio
pub const MAX_TRAFFIC_RATIO: f64 = 100.0;

/// Ratio applied by the store when a tunnel never had one set
pub const DEFAULT_TRAFFIC_RATIO: f64 = 1.0;
