//! # Server Configuration
//!
//! Server setup for the publishing service: router construction, shared
//! state, background dispatch tasks, and graceful shutdown wiring.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use migration::{Migrator, MigratorTrait};

use crate::accounts::AccountResolver;
use crate::assets::AssetResolver;
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::dispatch::{DispatchQueue, DispatchWorker};
use crate::handlers;
use crate::orchestrator::PublishOrchestrator;
use crate::platform::graph::{GraphClientConfig, GraphPublishClient};
use crate::scanner::PeriodicScanner;
use crate::storage::HttpBlobStore;
use crate::telemetry::TraceContext;
use crate::{auth, db, telemetry};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub queue: DispatchQueue,
    pub scanner: Arc<PeriodicScanner>,
}

/// The assembled publish pipeline: orchestrator plus both dispatch
/// triggers, sharing one database pool.
pub struct Pipeline {
    pub orchestrator: Arc<PublishOrchestrator>,
    pub scanner: Arc<PeriodicScanner>,
    pub worker: DispatchWorker,
    pub queue: DispatchQueue,
}

/// Build the publish pipeline from configuration and a live pool.
pub fn build_pipeline(config: &AppConfig, db: &DatabaseConnection) -> anyhow::Result<Pipeline> {
    let key_bytes = config
        .crypto_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("crypto key missing; validate configuration first"))?;
    let key = CryptoKey::new(key_bytes).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let assets = AssetResolver::new(Arc::new(HttpBlobStore::new(config.storage_base_url.clone())));
    let accounts = AccountResolver::new(db.clone(), key);
    let platform = Arc::new(GraphPublishClient::new(GraphClientConfig::from_app_config(
        config,
    )));

    let orchestrator = Arc::new(PublishOrchestrator::new(
        db.clone(),
        assets,
        accounts,
        platform,
        config.publish.max_attempts,
    ));

    let scanner = Arc::new(PeriodicScanner::new(
        db.clone(),
        Arc::clone(&orchestrator),
        config.scan.clone(),
    ));

    let worker = DispatchWorker::new(
        db.clone(),
        Arc::clone(&orchestrator),
        config.dispatch.clone(),
    );

    Ok(Pipeline {
        orchestrator,
        scanner,
        worker,
        queue: DispatchQueue::new(db.clone()),
    })
}

/// Per-request trace context: a short correlation id carried through
/// task-local storage so error responses and logs line up.
async fn trace_context_middleware(request: Request, next: Next) -> Response {
    let context = TraceContext {
        trace_id: format!("req-{}", &Uuid::new_v4().to_string()[..8]),
    };
    let mut request = request;
    request.extensions_mut().insert(context.clone());
    telemetry::with_trace_context(context, next.run(request)).await
}

/// Database health probe
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 503, description = "Database unreachable", body = crate::error::ApiError)
    ),
    tag = "root"
)]
async fn healthz(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<&'static str, crate::error::ApiError> {
    db::health_check(&state.db)
        .await
        .map_err(crate::error::ApiError::from)?;
    Ok("ok")
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/posts",
            post(handlers::posts::schedule_post).get(handlers::posts::list_posts),
        )
        .route(
            "/posts/{id}",
            get(handlers::posts::get_post_status).delete(handlers::posts::cancel_post),
        )
        .route(
            "/posts/{id}/reschedule",
            post(handlers::posts::reschedule_post),
        )
        .route("/internal/scan", post(handlers::scan::run_scan))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration: HTTP API plus both
/// background dispatch triggers, all stopping on SIGTERM/ctrl-c.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let pool = db::init_pool(&config).await?;
    Migrator::up(&pool, None).await?;

    let pipeline = build_pipeline(&config, &pool)?;
    let shutdown = CancellationToken::new();

    let scanner_handle = {
        let scanner = PeriodicScanner::new(
            pool.clone(),
            Arc::clone(&pipeline.orchestrator),
            config.scan.clone(),
        );
        let token = shutdown.clone();
        tokio::spawn(scanner.run(token))
    };

    let worker_handle = {
        let token = shutdown.clone();
        tokio::spawn(pipeline.worker.run(token))
    };

    let state = AppState {
        db: pool.clone(),
        config: Arc::clone(&config),
        queue: pipeline.queue,
        scanner: pipeline.scanner,
    };
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    let _ = scanner_handle.await;
    let _ = worker_handle.await;

    Ok(())
}

/// Resolve on SIGTERM or ctrl-c, cancelling the background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::posts::schedule_post,
        crate::handlers::posts::get_post_status,
        crate::handlers::posts::list_posts,
        crate::handlers::posts::cancel_post,
        crate::handlers::posts::reschedule_post,
        crate::handlers::scan::run_scan,
        healthz,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::scheduled_post::PostStatus,
            crate::models::scheduled_post::PostSubtype,
            crate::error::ApiError,
            crate::handlers::posts::SchedulePostRequest,
            crate::handlers::posts::ReschedulePostRequest,
            crate::handlers::posts::PostStatusResponse,
            crate::handlers::posts::PostsResponse,
            crate::handlers::posts::PostCreatedResponse,
            crate::scanner::SweepStats,
        )
    ),
    info(
        title = "Publisher API",
        description = "Scheduled social publishing pipeline",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
