use std::net::SocketAddr;
use std::sync::Arc;

use automask_server::config::Config;
use automask_server::discovery::{HttpMaskGenerator, MaskGenerator, RegionDiscovery};
use automask_server::pipeline::SegmentPipeline;
use automask_server::server::{AppState, build_router_with};
use axum::{Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automask=debug,automask_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    config.validate()?;
    info!(
        "Loaded configuration: host={}, port={}, max_dim={}",
        config.host, config.port, config.pipeline.max_dim
    );

    // The model handle is built once and shared read-only by every request
    let generator: Arc<dyn MaskGenerator> =
        Arc::new(HttpMaskGenerator::new(&config.inference.url, config.model.clone())?);
    let model = generator.describe();
    info!(
        "Mask generator: checkpoint={}, device={}, points_per_side={}, pred_iou_thresh={}, stability_score_thresh={}, min_mask_region_area={}",
        model.checkpoint,
        model.device,
        model.settings.points_per_side,
        model.settings.pred_iou_thresh,
        model.settings.stability_score_thresh,
        model.settings.min_mask_region_area
    );
    if !generator.is_ready().await {
        warn!(
            "Inference sidecar at {} is not reachable yet - /segment will fail until it is",
            config.inference.url
        );
    }

    let discovery_config = config.inference.discovery();
    match discovery_config.max_concurrency {
        0 => info!("Inference admission gate disabled"),
        n => info!("Inference admission gate: {} concurrent call(s)", n),
    }
    match discovery_config.timeout {
        Some(timeout) => info!("Inference timeout: {:?}", timeout),
        None => warn!(
            "INFERENCE_TIMEOUT_SECS is not set - a stalled sidecar will hold the admission gate indefinitely"
        ),
    }

    let discovery = Arc::new(RegionDiscovery::new(generator, &discovery_config));
    let pipeline = Arc::new(SegmentPipeline::new(discovery, config.pipeline.max_dim));
    let app_state = AppState::new(pipeline);

    let metrics_routes = Router::new().route("/metrics/prometheus", get(prometheus_metrics));
    let app = build_router_with(app_state, config.max_upload_size, metrics_routes);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Automask server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
