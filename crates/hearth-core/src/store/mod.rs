// ── Registry store ──

mod collection;
mod registry_store;

pub use registry_store::{RegistrySnapshot, RegistryStore, StateChange};
