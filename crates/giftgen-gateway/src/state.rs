//! Gateway shared state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use giftgen_core::config::Config;
use giftgen_core::types::ServiceDescriptor;
use giftgen_jobs::Orchestrator;
use giftgen_providers::VendorSet;

pub const SERVICE_NAME: &str = "BirthdAI Music Generation API";

/// Shared state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub lyrics_configured: bool,
    pub music_configured: bool,
    pub video_configured: bool,
    /// Root of every job's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    #[cfg(feature = "metrics")]
    pub prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, vendors: &VendorSet) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(&config, vendors));
        Self {
            config,
            orchestrator,
            lyrics_configured: vendors.lyrics.is_some(),
            music_configured: vendors.music.is_some(),
            video_configured: vendors.video.is_some(),
            shutdown: CancellationToken::new(),
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_prometheus(
        mut self,
        handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            service: SERVICE_NAME.into(),
            status: "running".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            elevenlabs_configured: self.music_configured,
            openai_configured: self.lyrics_configured,
            fal_configured: self.video_configured,
        }
    }
}
