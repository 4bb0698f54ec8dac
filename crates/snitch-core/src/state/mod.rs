// # Persisted Topology Store Implementations
//
// Implementations of the PersistedTopologyStore trait.

pub mod file;
pub mod memory;

pub use file::FileTopologyStore;
pub use memory::MemoryTopologyStore;
