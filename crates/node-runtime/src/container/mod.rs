//! # Node Container
//!
//! Configuration and the wired set of node components.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, ConfigStore, NodeConfig};
pub use subsystems::NodeContainer;
