use crate::cli::{ServeArgs, SweepArgs};
use crate::infra::{AppState, LocalDiskUploader};
use crate::routes::{with_inspection_routes, UPLOAD_URL_PREFIX};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{DateTime, Utc};
use inspections::config::AppConfig;
use inspections::error::AppError;
use inspections::telemetry;
use inspections::workflows::inspection::{
    ArchivalSweep, InMemoryInspectionStore, InspectionRepository, InspectionService,
    SqliteInspectionStore, StaffDirectory,
};
use std::sync::atomic::{AtomicBool, Ordering};
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

    match config.storage.database_path.clone() {
        Some(path) => {
            info!(path = %path.display(), "using sqlite inspection store");
            let store = Arc::new(SqliteInspectionStore::open(&path)?);
            serve(config, store).await
        }
        None => {
            info!("using in-memory inspection store; records are lost on restart");
            serve(config, Arc::new(InMemoryInspectionStore::new())).await
        }
    }
}

async fn serve<R>(config: AppConfig, store: Arc<R>) -> Result<(), AppError>
where
    R: InspectionRepository + StaffDirectory + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let uploader = Arc::new(LocalDiskUploader::new(
        config.storage.upload_dir.clone(),
        UPLOAD_URL_PREFIX,
    ));
    info!(upload_dir = %uploader.root().display(), "photo uploads stored on local disk");

    let service = Arc::new(InspectionService::new(
        store.clone(),
        store,
        uploader,
        config.roster,
    ));

    let sweep = service
        .archival_sweep(config.archival.retention())
        .spawn(config.archival.interval());

    let app = with_inspection_routes(service, &config.storage.upload_dir)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        retention_days = config.archival.retention_days,
        "inspection service ready"
    );

    let served = axum::serve(listener, app).await;
    sweep.shutdown().await;
    served?;
    Ok(())
}

/// One archival pass against the configured store, for cron-style deployments.
pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let now = args.now.unwrap_or_else(Utc::now);
    let retention = config.archival.retention();
    match config.storage.database_path.as_ref() {
        Some(path) => {
            let store = Arc::new(SqliteInspectionStore::open(path)?);
            sweep_once(&ArchivalSweep::new(store, retention), now)
        }
        None => {
            warn!("APP_DATABASE_PATH is not set; sweeping an empty in-memory store");
            let store = Arc::new(InMemoryInspectionStore::new());
            sweep_once(&ArchivalSweep::new(store, retention), now)
        }
    }
}

fn sweep_once<R>(sweep: &ArchivalSweep<R>, now: DateTime<Utc>) -> Result<(), AppError>
where
    R: InspectionRepository + 'static,
{
    let cutoff = sweep.cutoff_at(now)?;
    let archived = sweep.run_once_at(now)?;
    println!(
        "Archived {archived} inspection(s) reviewed before {}",
        cutoff.to_rfc3339()
    );
    Ok(())
}
