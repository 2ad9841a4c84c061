//! Reference backends.

pub mod fs;
mod memory;

pub use fs::FsBackend;
pub use memory::MemoryBackend;
