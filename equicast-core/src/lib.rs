//! Equicast Core: identifiers, chunk splitting, object storage, extractors.
//!
//! This crate holds the leaf components of the ingestion pipeline:
//! - Ticker and currency-pair identifiers with their JSON forms
//! - The deduplicating chunk splitter
//! - The `ObjectStore` abstraction with S3 and local-directory backends
//! - Extractor traits, the Yahoo Finance implementation, and Parquet output

pub mod extract;
pub mod identifier;
pub mod splitter;
pub mod storage;

pub use identifier::{FxPair, Identifier, Mode, Ticker};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the worker pool touches is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Ticker>();
        require_sync::<Ticker>();
        require_send::<FxPair>();
        require_sync::<FxPair>();
        require_send::<extract::Table>();
        require_sync::<extract::Table>();
        require_send::<extract::ExtractError>();
        require_sync::<extract::ExtractError>();
        require_send::<extract::CircuitBreaker>();
        require_sync::<extract::CircuitBreaker>();
        require_send::<extract::YahooExtractor>();
        require_sync::<extract::YahooExtractor>();
        require_send::<storage::LocalStore>();
        require_sync::<storage::LocalStore>();
        require_send::<storage::S3Store>();
        require_sync::<storage::S3Store>();
    }
}
