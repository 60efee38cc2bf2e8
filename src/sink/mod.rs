//! Stream sink contract and adapters.
//!
//! The sink is consumed as an opaque capability: its internal batching,
//! retry, and transport never leak into the export job. One call delivers a
//! whole batch or fails as a whole.

pub mod http;

use std::future::Future;

use anyhow::Result;

use crate::pipeline::UsageEvent;

/// Delivers batches of usage events to a durable external event stream.
pub trait StreamSink: Send + Sync {
    /// Returns the sink's name for logging.
    fn name(&self) -> &str;

    /// Delivers the entire batch or reports failure for the whole call.
    ///
    /// A partial internal success followed by an overall failure must still
    /// surface as an error: the caller has no per-event visibility and
    /// treats the call as atomic.
    fn send_events(&self, events: &[UsageEvent]) -> impl Future<Output = Result<()>> + Send;
}
