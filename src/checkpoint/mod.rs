mod discovery;
pub mod format;
mod store;

pub use discovery::{DiscoveryStrategy, latest_resumable_round};
pub use store::{CheckpointStore, FILE_PREFIX};
