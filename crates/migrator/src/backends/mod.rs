//! Migration Backend Abstractions
//!
//! The traits every store adapter implements, plus an in-memory backend for
//! development and tests.

pub mod core;
pub mod memory;

// Re-export core traits and types
pub use self::core::*;
pub use memory::MemoryBackend;
