use std::sync::Arc;

use push_coordinator::gather_metrics;
use push_coordinator::CoordinatorBuilder;
use push_coordinator::CoordinatorConfig;
use push_coordinator::Error;
use push_coordinator::MemoryRegistry;
use push_coordinator::Result;
use push_coordinator::ServiceCoordinator;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = CoordinatorConfig::new()?;
    debug!(?config, "configuration loaded");

    let coordinator = Arc::new(
        CoordinatorBuilder::new(config)
            .with_registry(Arc::new(MemoryRegistry::new()))
            .build()?,
    );
    info!(node_id = %coordinator.node_id(), "push-consumer coordinator built");

    let stopper = coordinator.clone();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(stopper).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let result = coordinator.start().await;
    debug!("final metrics:\n{}", gather_metrics());

    match result {
        Err(e) if !e.is_stop_requested() => {
            error!("coordinator stops: {:?}", e);
            Err(e)
        }
        _ => {
            info!("Exiting program.");
            Ok(())
        }
    }
}

async fn graceful_shutdown(coordinator: Arc<ServiceCoordinator>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("cannot listen for SIGINT: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("cannot listen for SIGTERM: {e}")))?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    coordinator.stop().await;
    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();
}
