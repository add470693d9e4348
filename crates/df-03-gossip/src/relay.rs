//! Re-announcement of newly published nodes.
//!
//! The relay is a storage listener that queues fingerprints; a task drains
//! the queue and broadcasts an inventory message for each. The listener
//! never blocks the publishing path.

use df_01_content_model::Node;
use df_02_node_storage::NodeListener;
use shared_types::HashSignature;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::service::CommunicationManager;

pub struct InventoryRelay {
    sender: mpsc::UnboundedSender<HashSignature>,
}

impl InventoryRelay {
    pub fn new(sender: mpsc::UnboundedSender<HashSignature>) -> Self {
        Self { sender }
    }
}

impl NodeListener for InventoryRelay {
    fn on_new_node(&self, node: &Arc<Node>) {
        if self.sender.send(node.fingerprint()).is_err() {
            debug!(fingerprint = %node.fingerprint(), "[df-03] relay stopped, announcement dropped");
        }
    }
}

/// Subscribe a relay to the manager's storage and spawn the broadcast task.
///
/// The task holds the manager weakly and ends once it is dropped.
pub fn start_inventory_relay(manager: &Arc<CommunicationManager>) -> JoinHandle<()> {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager
        .storage()
        .subscribe(Arc::new(InventoryRelay::new(sender)));

    let manager = Arc::downgrade(manager);
    tokio::spawn(async move {
        while let Some(fingerprint) = receiver.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.send_inventory_message(fingerprint).await;
        }
    })
}
