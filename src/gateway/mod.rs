//! Offline cache gateway.
//!
//! Every outbound request goes through a [`Dispatcher`]. Once a [`Gateway`]
//! has been registered and installed, it answers requests cache-first:
//! - A stored response for the request's identity is returned as is, with
//!   no revalidation and no expiry
//! - Otherwise the request is fetched and the response written to the
//!   active, version-named store
//! - Failures propagate; nothing is retried and no placeholder is served
//!
//! Stores are injected through [`CacheStorage`], so SQLite, memory or a test
//! double can sit behind the same gateway.

mod dispatcher;
mod error;
mod key;
mod layer;
#[cfg(test)]
mod mock;
mod network;
mod storage;
mod traits;

pub use dispatcher::Dispatcher;
pub use layer::Gateway;
pub use network::HttpFetcher;
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::{GatewayRequest, GatewayResponse, ResponseSource, StoredResponse};
