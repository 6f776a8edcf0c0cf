//! Per-entity fetch adapters invoked by the retry executor.
//!
//! An adapter turns one identifier into one or more Parquet artifacts and
//! reports the outcome as a [`FetchResult`]. Adapters are stateless across
//! attempts; all retry bookkeeping lives in the executor.

pub mod fx;
pub mod stock;

pub use fx::FxAdapter;
pub use stock::StockAdapter;

use crate::executor::{panic_message, FetchResult};
use equicast_core::extract::ExtractError;
use equicast_core::Identifier;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

pub trait FetchAdapter: Send + Sync {
    type Item: Identifier;

    /// Fetch and persist artifacts for `item`. Never panics past this call.
    fn fetch(&self, item: &Self::Item) -> FetchResult;

    /// How long the provider will keep refusing requests. The executor waits
    /// at least this long before the next attempt.
    fn cooldown(&self) -> Duration {
        Duration::ZERO
    }
}

/// Run an extractor call, folding both errors and panics into a message.
pub(crate) fn contain(f: impl FnOnce() -> Result<(), ExtractError>) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_reports_errors_and_panics() {
        assert_eq!(contain(|| Ok(())), Ok(()));
        assert_eq!(
            contain(|| Err(ExtractError::CircuitOpen)),
            Err("provider is refusing requests (circuit breaker open)".to_string())
        );
        assert_eq!(
            contain(|| panic!("index out of bounds")),
            Err("panicked: index out of bounds".to_string())
        );
    }
}
