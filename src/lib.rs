pub mod broker;
pub mod catalog;
pub mod core;
pub mod monitoring;
pub mod server;

pub use crate::core::{Config, MonitorError, MonitorResult};
pub use crate::monitoring::{
    CacheJanitor, ChangeEvent, ChangeType, CycleOutcome, NotifierGate, ScanEngine, SnapshotCache,
};
