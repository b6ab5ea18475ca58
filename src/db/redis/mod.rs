pub mod mirror;

pub use mirror::{create_redis_client, MirrorWriterHandle, SnapshotMirror};
