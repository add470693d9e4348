//! # Storage Flows
//!
//! Node store behaviour seen through the storage service.
//!
//! ## Flows Tested:
//!
//! 1. **Pagination**: child listings honour the explicit and default caps
//! 2. **Idempotence**: storing a node twice leaves every index unchanged
//! 3. **Sync ranges**: `get_nodes_since` and the most recent timestamp

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use df_01_content_model::Node;
    use df_02_node_storage::{
        InMemoryNodeDatabase, NodeListener, StorageIndex, StorageModule, DEFAULT_CHILDREN_LIMIT,
    };
    use proptest::prelude::*;
    use shared_types::{sync_floor, unix_now, HashSignature, SECONDS_PER_DAY};

    use crate::fixtures::{node, node_at};

    fn store() -> (Arc<InMemoryNodeDatabase>, StorageModule) {
        let database = Arc::new(InMemoryNodeDatabase::new());
        let storage = StorageModule::new(database.clone());
        (database, storage)
    }

    #[test]
    fn test_children_pagination() {
        let (_, storage) = store();
        let parent = node("parent", HashSignature::ZERO);
        storage.store_node(&parent);
        for i in 0..60 {
            storage.store_node(&node(&format!("child {i}"), parent.fingerprint()));
        }

        let default_page = storage.get_children_nodes(&parent.fingerprint(), false, 0);
        assert_eq!(default_page.len(), DEFAULT_CHILDREN_LIMIT);
        assert_eq!(storage.get_children_nodes(&parent.fingerprint(), false, -7).len(), 50);

        let small = storage.get_children_nodes(&parent.fingerprint(), true, 10);
        assert_eq!(small.len(), 11);
        assert_eq!(small[0].fingerprint(), parent.fingerprint());
        assert!(small[1..].iter().all(|n| n.parent() == parent.fingerprint()));

        let all = storage.get_children_nodes(&parent.fingerprint(), false, 100);
        assert_eq!(all.len(), 60);
        assert_eq!(storage.get_top_level_nodes().len(), 1);
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl NodeListener for Counter {
        fn on_new_node(&self, _node: &Arc<Node>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_store_is_idempotent() {
        let (database, storage) = store();
        let counter = Arc::new(Counter::default());
        storage.subscribe(counter.clone());

        let n = node("once", HashSignature::ZERO);
        assert!(storage.store_node(&n).is_complete());
        let sizes = database.index_sizes();
        assert!(storage.store_node(&n).is_complete());
        assert_eq!(database.index_sizes(), sizes);
        assert_eq!(sizes, (1, 1, 1));

        assert_eq!(storage.get_top_level_nodes().len(), 1);
        // Storing alone never notifies listeners.
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_partial_write_is_reported_per_index() {
        let (database, storage) = store();
        database.fail_writes_to(StorageIndex::Timestamps);

        let n = node("partial", HashSignature::ZERO);
        let report = storage.store_node(&n);
        assert!(!report.is_complete());
        let failed: Vec<StorageIndex> = report.failures().into_iter().map(|(i, _)| i).collect();
        assert_eq!(failed, vec![StorageIndex::Timestamps]);

        // The body and edge landed, so the node is still readable and listed.
        assert!(storage.node_exists(&n.fingerprint()));
        assert_eq!(storage.get_top_level_nodes().len(), 1);
        assert!(storage.get_nodes_since(0).is_empty());
    }

    #[test]
    fn test_most_recent_timestamp_and_range() {
        let (_, storage) = store();
        let now = unix_now();
        assert!(storage.time_of_most_recent_node() >= sync_floor(now));

        let older = node_at("older", HashSignature::ZERO, now - 3 * SECONDS_PER_DAY);
        let newer = node_at("newer", HashSignature::ZERO, now - SECONDS_PER_DAY);
        storage.store_node(&older);
        storage.store_node(&newer);

        assert_eq!(storage.time_of_most_recent_node(), now - SECONDS_PER_DAY);
        assert_eq!(
            storage.get_nodes_since(now - 2 * SECONDS_PER_DAY),
            vec![newer.fingerprint()]
        );
        assert_eq!(storage.get_nodes_since(-5).len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(4))]

        #[test]
        fn prop_listing_never_exceeds_cap(children in 0usize..8, max in -2i32..6) {
            let (_, storage) = store();
            let parent = HashSignature::new([9u8; 28]);
            for i in 0..children {
                storage.store_node(&node(&format!("c{i}"), parent));
            }
            let listed = storage.get_children_nodes(&parent, false, max);
            let cap = if max <= 0 { DEFAULT_CHILDREN_LIMIT } else { max as usize };
            prop_assert_eq!(listed.len(), children.min(cap));
        }
    }
}
