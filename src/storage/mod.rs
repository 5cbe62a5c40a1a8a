//! Storage layer abstraction.
//!
//! The memory store is remote and authoritative. The sweeper talks to it only
//! through [`MemoryStore`]: paginated listing and bulk deletion.

pub mod memory;
pub mod openmemory;
pub mod traits;

pub use memory::InMemoryStore;
pub use openmemory::OpenMemoryClient;
pub use traits::MemoryStore;
