//! Cross-crate integration scenarios.

mod gossip_flows;
mod storage_flows;
