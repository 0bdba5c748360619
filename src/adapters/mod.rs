// Adapters layer: concrete implementations for external systems (http, storage, cache, output files)

pub mod cache;
pub mod hosts;
pub mod http;
pub mod readme;
pub mod storage;

pub use cache::{CachedFetcher, SourceCache};
pub use http::{ensure_psl_and_load, load_local_psl, HttpFetcher};
pub use storage::LocalStorage;
