//! # Forum Service
//!
//! The node-creation facade used by a front end. Creating a node runs the
//! proof-of-work search on a blocking worker, then stores and publishes the
//! result so the gossip relay announces it to every peer.

use std::sync::Arc;

use df_01_content_model::{ContentError, Node, ProofOfWorkEngine, TOPIC_INDICATOR};
use df_02_node_storage::StorageModule;
use rand::seq::SliceRandom;
use shared_types::HashSignature;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build node: {0}")]
    Content(#[from] ContentError),

    #[error("proof-of-work worker failed: {0}")]
    Worker(String),
}

pub struct ForumService {
    storage: Arc<StorageModule>,
    engine: ProofOfWorkEngine,
}

impl ForumService {
    pub fn new(storage: Arc<StorageModule>, engine: ProofOfWorkEngine) -> Self {
        Self { storage, engine }
    }

    pub fn difficulty(&self) -> u32 {
        self.engine.difficulty()
    }

    /// Start a new top-level thread.
    pub async fn create_topic(&self, topic: &str, detail: &str) -> Result<Arc<Node>, ApiError> {
        self.create_node(topic, detail, TOPIC_INDICATOR, HashSignature::ZERO)
            .await
    }

    /// Stamp, store and publish a node under `parent`.
    ///
    /// The parent is not required to be known locally; it may still be on
    /// its way from a peer.
    pub async fn create_node(
        &self,
        topic: &str,
        detail: &str,
        indicator: i8,
        parent: HashSignature,
    ) -> Result<Arc<Node>, ApiError> {
        let engine = self.engine.clone();
        let topic = topic.to_string();
        let detail = detail.to_string();
        let node = tokio::task::spawn_blocking(move || {
            Node::create(&topic, &detail, indicator, parent, &engine)
        })
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))??;

        let node = Arc::new(node);
        let report = self.storage.store_and_publish(Arc::clone(&node));
        for (index, error) in report.failures() {
            warn!(
                fingerprint = %node.fingerprint(),
                index = %index,
                error = %error,
                "local node write failed"
            );
        }
        info!(
            fingerprint = %node.fingerprint(),
            parent = %parent,
            "created node"
        );
        Ok(node)
    }

    /// Children of `parent` in random order, capped at the storage default.
    pub fn get_children(&self, parent: &HashSignature) -> Vec<Arc<Node>> {
        shuffled(self.storage.get_children_nodes(parent, false, -1))
    }

    /// Every top-level node in random order.
    pub fn get_all_topics(&self) -> Vec<Arc<Node>> {
        shuffled(self.storage.get_top_level_nodes())
    }

    pub fn get_node(&self, fingerprint: &HashSignature) -> Option<Arc<Node>> {
        self.storage.get_node(fingerprint, true)
    }
}

fn shuffled(mut nodes: Vec<Arc<Node>>) -> Vec<Arc<Node>> {
    nodes.shuffle(&mut rand::thread_rng());
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_01_content_model::ProofOfWorkConfig;
    use df_02_node_storage::{InMemoryNodeDatabase, NodeListener};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HashSignature>>,
    }

    impl NodeListener for Recorder {
        fn on_new_node(&self, node: &Arc<Node>) {
            self.seen.lock().push(node.fingerprint());
        }
    }

    fn service() -> (ForumService, Arc<StorageModule>) {
        let storage = Arc::new(StorageModule::new(Arc::new(InMemoryNodeDatabase::new())));
        let engine = ProofOfWorkEngine::new(&ProofOfWorkConfig::with_difficulty(16));
        (ForumService::new(Arc::clone(&storage), engine), storage)
    }

    #[tokio::test]
    async fn test_create_topic_is_top_level_and_published() {
        let (forum, storage) = service();
        let recorder = Arc::new(Recorder::default());
        storage.subscribe(recorder.clone());

        let topic = forum.create_topic("Rust", "ownership questions").await.unwrap();
        assert_eq!(topic.indicator(), TOPIC_INDICATOR);
        assert!(topic.parent().is_zero());
        assert!(topic.verify());

        let topics = forum.get_all_topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].fingerprint(), topic.fingerprint());
        assert_eq!(*recorder.seen.lock(), vec![topic.fingerprint()]);
    }

    #[tokio::test]
    async fn test_replies_are_listed_under_parent() {
        let (forum, _storage) = service();
        let topic = forum.create_topic("t", "d").await.unwrap();
        let a = forum
            .create_node("re", "first", 1, topic.fingerprint())
            .await
            .unwrap();
        let b = forum
            .create_node("re", "second", 0, topic.fingerprint())
            .await
            .unwrap();

        let mut children: Vec<HashSignature> = forum
            .get_children(&topic.fingerprint())
            .iter()
            .map(|n| n.fingerprint())
            .collect();
        children.sort();
        let mut expected = vec![a.fingerprint(), b.fingerprint()];
        expected.sort();
        assert_eq!(children, expected);

        assert_eq!(forum.get_all_topics().len(), 1);
        assert!(forum.get_node(&a.fingerprint()).is_some());
    }

    #[tokio::test]
    async fn test_failed_search_stores_nothing() {
        let storage = Arc::new(StorageModule::new(Arc::new(InMemoryNodeDatabase::new())));
        let engine = ProofOfWorkEngine::new(&ProofOfWorkConfig::with_difficulty(28))
            .with_max_iterations(1);
        let forum = ForumService::new(Arc::clone(&storage), engine);

        let err = forum.create_topic("t", "d").await.unwrap_err();
        assert!(matches!(err, ApiError::Content(ContentError::ProofOfWork(_))));
        assert!(forum.get_all_topics().is_empty());
    }
}
