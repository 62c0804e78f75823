use crate::cli::ServeArgs;
use crate::infra::{seed_demo_agency, AppState};
use crate::routes::with_visit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use carevisit::config::AppConfig;
use carevisit::error::AppError;
use carevisit::telemetry;
use carevisit::workflows::evv::EvvService;
use carevisit::workflows::scheduling::{SchedulingService, SchedulingServiceError};
use carevisit::workflows::visits::InMemoryVisitStore;
use chrono::Local;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryVisitStore::new());
    if args.seed_demo {
        let date = args
            .demo_date
            .unwrap_or_else(|| Local::now().date_naive());
        seed_demo_agency(&store, date).map_err(SchedulingServiceError::from)?;
        info!(%date, "seeded demo agency");
    }

    let scheduling = Arc::new(SchedulingService::new(
        store.clone(),
        config.policy.scheduling.clone(),
    ));
    let evv = Arc::new(EvvService::new(store, config.policy.evv.clone()));

    let app = with_visit_routes(scheduling, evv)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "visit coordination service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
