pub mod redis;
pub mod snapshot;

pub use redis::{create_redis_client, MirrorWriterHandle, SnapshotMirror};
pub use snapshot::{Snapshot, SnapshotStore};
