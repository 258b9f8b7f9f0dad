mod eval;
mod pipeline;
mod store;
mod update;

pub use store::MemoryStore;
