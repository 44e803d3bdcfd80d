mod data;
mod denormalizer;
mod normalizer;
#[allow(clippy::module_inception)]
mod store;


pub use data::{CacheStore, EntityRecord, Fields, Snapshot, StoreValue};
pub use normalizer::WriteBatch;
pub use store::{Store, WriteOutcome};
