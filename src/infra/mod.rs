//! Infrastructure adapters for the remote object store.

pub mod store;

pub use store::{FileObjectStore, InMemoryObjectStore, ObjectStore, StaticConnector, StoreConnector};
