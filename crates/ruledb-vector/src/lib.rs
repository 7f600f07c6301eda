//! Vector collection backends implementing [`ruledb_core::traits::IndexStore`].

pub mod lance_store;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance_store::LanceIndexStore;
pub use memory::MemoryIndexStore;
