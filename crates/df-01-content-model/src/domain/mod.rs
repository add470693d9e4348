//! Content entities.

mod data_object;
mod node;
mod security_object;

pub use data_object::{DataObject, TOPIC_INDICATOR};
pub use node::Node;
pub use security_object::{create_fingerprint, SecurityObject};
