//! Event source backends.

pub mod memory;
pub mod notify_backend;

pub use memory::{MemoryController, MemoryFactory, MemorySource};
pub use notify_backend::{NotifyFactory, NotifySource};
