use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBlobStore, InMemoryRecordStore};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_board::config::AppConfig;
use job_board::error::AppError;
use job_board::telemetry;
use job_board::workflows::hiring::notifications::{
    AckPolicy, DedupNotifier, InMemoryQueue, LoggingNotifier, NotificationWorker, Notifier,
    WorkerHandle,
};
use job_board::workflows::hiring::JobBoardService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(workers) = args.workers.take() {
        config.worker.instances = workers;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let queue = Arc::new(InMemoryQueue::new(config.queue.visibility_timeout));
    let service = Arc::new(JobBoardService::new(
        Arc::new(InMemoryRecordStore::default()),
        Arc::new(InMemoryBlobStore::default()),
        queue.clone(),
    ));

    let dead_letters = dead_letter_queue(&config);
    let shutdown = CancellationToken::new();
    let workers = spawn_workers(
        &config,
        queue.clone(),
        Arc::new(DedupNotifier::new(LoggingNotifier)),
        dead_letters.clone(),
        &shutdown,
    );

    let app = with_platform_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        workers = config.worker.instances,
        ack_policy = config.worker.ack_policy.label(),
        "job board ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag))
        .await;

    shutdown.cancel();
    for handle in workers {
        let stats = handle.join().await?;
        info!(
            received = stats.received,
            succeeded = stats.succeeded,
            failed = stats.failed,
            dead_lettered = stats.dead_lettered,
            "notification worker drained"
        );
    }
    if !queue.is_empty() {
        warn!(pending = queue.len(), "undelivered notifications discarded on shutdown");
    }
    if let Some(dead_letters) = dead_letters.filter(|parked| !parked.is_empty()) {
        warn!(count = dead_letters.len(), "dead-lettered notifications discarded on shutdown");
    }

    served?;
    Ok(())
}

/// A dead-letter queue only exists when failures are retried and capped.
pub(crate) fn dead_letter_queue(config: &AppConfig) -> Option<Arc<InMemoryQueue>> {
    match (config.worker.ack_policy, config.worker.max_receives) {
        (AckPolicy::OnSuccess, Some(_)) => Some(Arc::new(InMemoryQueue::default())),
        _ => None,
    }
}

pub(crate) fn spawn_workers<N>(
    config: &AppConfig,
    queue: Arc<InMemoryQueue>,
    notifier: Arc<N>,
    dead_letters: Option<Arc<InMemoryQueue>>,
    shutdown: &CancellationToken,
) -> Vec<WorkerHandle>
where
    N: Notifier + 'static,
{
    (0..config.worker.instances)
        .map(|index| {
            let mut worker =
                NotificationWorker::new(config.worker_config(index), queue.clone(), notifier.clone());
            if let Some(dead_letters) = &dead_letters {
                worker = worker.with_dead_letter_queue(dead_letters.clone());
            }
            worker.spawn(shutdown.child_token())
        })
        .collect()
}

async fn shutdown_signal(readiness: Arc<AtomicBool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install shutdown signal handler");
        std::future::pending::<()>().await;
    }
    readiness.store(false, Ordering::Release);
    info!("shutdown signal received; draining notification workers");
}
