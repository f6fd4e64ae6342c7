use crate::cli::ServeArgs;
use crate::infra::{seed_reference_data, AppState, InMemoryRegistrationStore, LoggingNotifier};
use crate::routes::app_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use picnew::config::AppConfig;
use picnew::error::AppError;
use picnew::telemetry;
use picnew::workflows::registration::RegistrationService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if config.auth.admin_token.is_none() {
        warn!("APP_ADMIN_TOKEN is not set; the admin surface will reject every request");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryRegistrationStore::default());
    seed_reference_data(&store);
    let notifier = Arc::new(LoggingNotifier);
    let registration_service = Arc::new(RegistrationService::new(
        store,
        notifier,
        config.audit_policy,
    ));

    let app = app_router(registration_service, config.auth.clone().into())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "training registration service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
