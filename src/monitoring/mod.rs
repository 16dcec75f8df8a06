pub mod events;
pub mod janitor;
pub mod journal;
pub mod notifier;
pub mod scan_engine;
pub mod scheduler;
pub mod snapshot_cache;

pub use events::{ChangeEvent, ChangeType};
pub use janitor::CacheJanitor;
pub use journal::{ChangeJournal, ChangeStatistics};
pub use notifier::NotifierGate;
pub use scan_engine::{CycleOutcome, CycleReport, EngineStatus, ScanEngine, ScanSettings};
pub use scheduler::Scheduler;
pub use snapshot_cache::{Snapshot, SnapshotCache};
