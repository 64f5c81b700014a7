pub mod sync;

// Re-export core engine components
pub use sync::{
    default_engine, MirrorEngine, SyncError, SyncOptions, SyncRequest, SyncResult, SyncStats,
};
