use crate::cli::ServeArgs;
use crate::infra::{AppState, UserStore};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use registration::config::{AppConfig, StorageConfig};
use registration::drive::GoogleDriveStore;
use registration::error::AppError;
use registration::telemetry;
use registration::{FileStorage, RegistrationService};
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let users = Arc::new(UserStore::from_config(&config.database).await);
    let storage = build_storage(&config.storage).await?;
    let registration_service = Arc::new(
        RegistrationService::new(users.clone(), storage)
            .with_uploads_folder(config.storage.uploads_folder.clone()),
    );

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        users,
    };

    let app = with_service_routes(
        registration_service,
        &config.storage.public_root,
        config.storage.max_upload_bytes,
    )
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "registration service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_storage(config: &StorageConfig) -> Result<FileStorage, AppError> {
    let storage = FileStorage::local(config.public_root.clone());
    let Some(drive) = &config.drive else {
        return Ok(storage);
    };

    let remote =
        GoogleDriveStore::from_service_account(&drive.service_account_key, drive.folder_id.clone())
            .await?;
    info!(folder_id = %drive.folder_id, "uploads forwarded to google drive");
    Ok(storage
        .with_remote(Arc::new(remote))
        .keep_local_copy(config.keep_local_copy))
}
