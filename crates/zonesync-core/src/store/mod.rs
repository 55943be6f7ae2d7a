//! Record store implementations
//!
//! - [`MemoryRecordStore`]: in-memory, not persistent
//! - [`FileRecordStore`]: JSON file with atomic writes and backup recovery

pub mod file;
pub mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
