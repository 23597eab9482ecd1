//! HTTP gateway.
//!
//! Exposes the generation pipelines as JSON endpoints, lists and serves the
//! generated artifacts, and maps pipeline errors onto HTTP statuses.

use std::time::Instant;

use tracing::info;

use giftgen_core::error::Result;

pub mod api;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use server::{build_router, serve, start_gateway};
pub use state::GatewayState;

/// Measures one generation request and records its outcome.
pub(crate) struct GenerationTimer {
    kind: &'static str,
    started: Instant,
}

impl GenerationTimer {
    pub(crate) fn start(kind: &'static str) -> Self {
        Self {
            kind,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish<T>(self, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        let secs = self.started.elapsed().as_secs_f64();
        info!(kind = self.kind, outcome, secs, "Generation finished");
        #[cfg(feature = "metrics")]
        crate::metrics::record_generation(self.kind, outcome, secs);
    }
}
