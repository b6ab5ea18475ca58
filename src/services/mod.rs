pub mod index;
pub mod notifier;
pub mod providers;
pub mod publisher;
pub mod recommendations;
pub mod scorer;
pub mod sync;

pub use publisher::Publisher;
pub use recommendations::RecommendationService;
pub use sync::{SyncJob, SyncOrchestrator, SyncQueue, SyncWorkerHandle};
