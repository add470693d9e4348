//! # Node Runtime Library
//!
//! Everything the `node-runtime` binary wires together, exposed for tests.
//!
//! - `container/` - configuration file and component wiring
//! - `adapters/` - TCP implementation of the peer network port
//! - `api` - node-creation facade
//! - `logging` - tracing subscriber setup
//! - `runtime` - bootstrap, sync and teardown

pub mod adapters;
pub mod api;
pub mod container;
pub mod logging;
pub mod runtime;

pub use adapters::{TcpNetworkConfig, TcpPeerNetwork, HANDSHAKE_PROTOCOL};
pub use api::{ApiError, ForumService};
pub use container::{ConfigError, ConfigStore, NodeConfig, NodeContainer};
pub use runtime::NodeRuntime;
