//! Serve a local Kernel over loopback HTTP.
//!
//! Environment:
//! - `KERI_DRIVER_HOST`, `KERI_DRIVER_PORT`: listen address
//! - `KERI_DATABASE`: SQLite path; in-memory when unset
//! - `RUST_LOG`: log filter, default `info`

use std::sync::Arc;

use anyhow::Context;
use keri_kernel::driver::router;
use keri_kernel::store::{MemoryStore, SqliteStore};
use keri_kernel::{Controller, Kernel, KernelConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = KernelConfig::from_env();
    let addr = format!("{}:{}", config.driver.host, config.driver.port);

    let controller: Arc<dyn Controller> = match &config.database {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            info!(database = %path.display(), "using sqlite store");
            Arc::new(Kernel::new(store, config.clone()))
        }
        None => {
            info!("using in-memory store");
            Arc::new(Kernel::new(MemoryStore::new(), config.clone()))
        }
    };

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(addr = %listener.local_addr()?, "keri driver listening");

    axum::serve(listener, router(controller))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving driver")?;

    info!("keri driver stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
