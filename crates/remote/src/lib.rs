//! Remote relational store boundary: the `RemoteStore` contract, an HTTP
//! implementation speaking a PostgREST-style row API, and an in-memory
//! implementation for tests.

mod error;
mod http;
mod memory;
mod store;

pub use error::{RemoteStoreError, Result, RetryClass};
pub use http::HttpRemoteStore;
pub use memory::InMemoryRemoteStore;
pub use store::RemoteStore;
