use std::sync::Arc;

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token cache metrics
    pub token_refreshes: IntCounterVec,
    pub token_cache_hits: IntCounterVec,
    pub token_mint_failures: IntCounterVec,

    // Relay metrics
    pub proxied_requests: IntCounterVec,
    pub sse_streams_active: IntGauge,

    // Runtime
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("kioskproxy".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            token_refreshes: IntCounterVec::new(Opts::new("token_refreshes_total", "Successful token mints by audience"), &["audience"]).unwrap(),
            token_cache_hits: IntCounterVec::new(Opts::new("token_cache_hits_total", "Token cache hits by audience"), &["audience"]).unwrap(),
            token_mint_failures: IntCounterVec::new(Opts::new("token_mint_failures_total", "Failed token mints by audience"), &["audience"]).unwrap(),

            proxied_requests: IntCounterVec::new(Opts::new("proxied_requests_total", "Relayed unary requests by route and upstream status"), &["route", "status"]).unwrap(),
            sse_streams_active: IntGauge::new("sse_streams_active", "Currently open event stream relays").unwrap(),

            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.token_mint_failures.clone())).unwrap();
        reg.register(Box::new(metrics.proxied_requests.clone())).unwrap();
        reg.register(Box::new(metrics.sse_streams_active.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
