//! Price source integrations.
//!
//! Defines the `QuoteProvider` trait and the fan-out helper that turns
//! a set of providers into a set of quotes for one card. Providers may
//! fail however they like; [`fetch_all`] guarantees that a failure, a
//! hang or a panic only ever costs that provider's quote.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{clamp_weight, Card, OracleError, Quote};

/// Abstraction over external price sources.
///
/// Implementors look up one card and return what the source reports,
/// `Ok(None)` when the source has no listing for it, or an error.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Source identifier, used as `Quote::source_id`.
    fn name(&self) -> &str;

    /// Fixed trust weight in [0, 1].
    fn static_weight(&self) -> f64;

    /// Fetch this source's observation for a card.
    async fn fetch_quote(&self, card: &Card) -> Result<Option<Quote>>;
}

/// Query every provider concurrently and collect the quotes that came back.
///
/// Each call is bounded by `timeout`. Errors, timeouts and panics are logged and
/// treated as "no quote"; this function itself cannot fail. Returned
/// quotes carry the provider's name and static weight regardless of what
/// the provider put in them.
pub async fn fetch_all(
    providers: &[Arc<dyn QuoteProvider>],
    card: &Card,
    timeout: Duration,
) -> Vec<Quote> {
    let calls = providers.iter().map(|p| fetch_one(p.as_ref(), card, timeout));
    let quotes: Vec<Quote> = join_all(calls).await.into_iter().flatten().collect();

    debug!(
        card = %card.key,
        providers = providers.len(),
        quotes = quotes.len(),
        "Provider fan-out complete"
    );

    quotes
}

async fn fetch_one(provider: &dyn QuoteProvider, card: &Card, timeout: Duration) -> Option<Quote> {
    match call_provider(provider, card, timeout).await {
        Ok(Some(mut quote)) => {
            quote.source_id = provider.name().to_string();
            quote.static_weight = clamp_weight(provider.static_weight());
            Some(quote)
        }
        Ok(None) => {
            debug!(provider = provider.name(), card = %card.key, "No quote available");
            None
        }
        Err(e) => {
            warn!(
                provider = provider.name(),
                card = %card.key,
                error = %e,
                "Provider failed, continuing without"
            );
            None
        }
    }
}

/// One bounded provider call, with hangs and panics folded into the error.
async fn call_provider(
    provider: &dyn QuoteProvider,
    card: &Card,
    timeout: Duration,
) -> Result<Option<Quote>> {
    let call = AssertUnwindSafe(provider.fetch_quote(card)).catch_unwind();

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(OracleError::Provider {
            provider: provider.name().to_string(),
            message: panic_message(&*panic),
        }
        .into()),
        Err(_) => Err(OracleError::Timeout {
            provider: provider.name().to_string(),
            millis: timeout.as_millis() as u64,
        }
        .into()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
