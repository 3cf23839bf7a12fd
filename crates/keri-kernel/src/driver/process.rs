//! Driver process lifecycle: spawn, wait for readiness, stop.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::client::DriverClient;
use super::types::STATUS_ACTIVE;
use crate::config::DriverConfig;
use crate::error::{KernelError, Result};

/// Attempts polled at the short interval before backing off.
const FAST_ATTEMPTS: u32 = 3;

/// Delay after the given (1-based) readiness attempt.
pub fn backoff(attempt: u32) -> Duration {
    if attempt <= FAST_ATTEMPTS {
        Duration::from_millis(500)
    } else {
        Duration::from_secs(1)
    }
}

/// Poll `/status` until the driver reports active or `timeout` passes.
///
/// Returns the number of attempts it took.
pub async fn wait_for_ready(client: &DriverClient, timeout: Duration) -> Result<u32> {
    poll_ready(client, timeout, None).await
}

/// Like [`wait_for_ready`], but fail as soon as `child` exits.
///
/// The child is checked again after a ready answer, so a different process
/// answering on the port is not taken for a driver that already died.
async fn poll_ready(
    client: &DriverClient,
    timeout: Duration,
    mut child: Option<&mut Child>,
) -> Result<u32> {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0;

    while Instant::now() < deadline {
        attempt += 1;
        if let Some(child) = child.as_deref_mut() {
            check_running(child)?;
        }
        match client.status().await {
            Ok(status) if status.status == STATUS_ACTIVE => {
                if let Some(child) = child.as_deref_mut() {
                    check_running(child)?;
                }
                info!(attempt, driver = %status.driver, version = %status.version, "driver ready");
                return Ok(attempt);
            }
            Ok(status) => debug!(attempt, status = %status.status, "driver not active yet"),
            Err(e) => debug!(attempt, error = %e, "driver not reachable yet"),
        }
        sleep(backoff(attempt)).await;
    }

    Err(KernelError::Driver(format!(
        "driver at {} did not become ready within {:?}",
        client.base_url(),
        timeout
    )))
}

fn check_running(child: &mut Child) -> Result<()> {
    match child.try_wait() {
        Ok(None) => Ok(()),
        Ok(Some(status)) => Err(KernelError::Driver(format!(
            "driver exited during startup: {}",
            status
        ))),
        Err(e) => Err(KernelError::Driver(format!(
            "failed to check driver process: {}",
            e
        ))),
    }
}

/// A supervised driver child process.
///
/// The child is killed if this value is dropped without [`stop`](Self::stop).
pub struct DriverProcess {
    child: Child,
    client: DriverClient,
}

impl DriverProcess {
    /// Spawn `config.program` and wait until it serves `/status`.
    pub async fn start(config: &DriverConfig) -> Result<Self> {
        let program = config
            .program
            .as_ref()
            .ok_or_else(|| KernelError::Driver("no driver program configured".into()))?;

        info!(program = %program.display(), port = config.port, "starting driver");
        let mut child = Command::new(program)
            .args(&config.args)
            .env("KERI_DRIVER_HOST", &config.host)
            .env("KERI_DRIVER_PORT", config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                KernelError::Driver(format!("failed to start {}: {}", program.display(), e))
            })?;
        debug!(pid = ?child.id(), "driver process spawned");

        let client = DriverClient::new(config)?;
        if let Err(e) = poll_ready(&client, config.startup_timeout, Some(&mut child)).await {
            warn!(error = %e, "driver failed to start, killing it");
            let _ = child.kill().await;
            return Err(e);
        }

        Ok(Self { child, client })
    }

    /// A client connected to this driver.
    pub fn client(&self) -> &DriverClient {
        &self.client
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the child and reap it.
    pub async fn stop(mut self) -> Result<()> {
        info!(pid = ?self.child.id(), "stopping driver");
        // An already exited child is not an error.
        if self.child.try_wait().ok().flatten().is_none() {
            self.child
                .kill()
                .await
                .map_err(|e| KernelError::Driver(format!("failed to kill driver: {}", e)))?;
        }
        info!("driver stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<Duration> = (1..=5).map(backoff).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_without_program() {
        let config = DriverConfig::default();
        assert!(matches!(
            DriverProcess::start(&config).await,
            Err(KernelError::Driver(_))
        ));
    }

    #[tokio::test]
    async fn test_start_missing_program() {
        let config = DriverConfig {
            program: Some("/nonexistent/keri-driver".into()),
            ..DriverConfig::default()
        };
        assert!(matches!(
            DriverProcess::start(&config).await,
            Err(KernelError::Driver(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_fails_fast_when_driver_exits() {
        let config = DriverConfig {
            program: Some("/bin/false".into()),
            startup_timeout: Duration::from_secs(10),
            ..DriverConfig::default()
        };
        let started = std::time::Instant::now();
        let err = DriverProcess::start(&config).await.err().unwrap();
        match err {
            KernelError::Driver(message) => assert!(message.contains("exited"), "{}", message),
            other => panic!("expected driver error, got {:?}", other),
        }
        assert!(started.elapsed() < config.startup_timeout);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_driver_is_not_ready_when_port_answers() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/status",
                axum::routing::get(|| async {
                    // Answer slowly so the child has exited by the time it lands.
                    sleep(Duration::from_millis(300)).await;
                    axum::Json(serde_json::json!({
                        "status": STATUS_ACTIVE,
                        "driver": "impostor",
                        "version": "0",
                        "uptime": 0
                    }))
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        let config = DriverConfig {
            port,
            program: Some("/bin/false".into()),
            startup_timeout: Duration::from_secs(10),
            ..DriverConfig::default()
        };
        assert!(matches!(
            DriverProcess::start(&config).await,
            Err(KernelError::Driver(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out_when_nothing_listens() {
        // Reserve a port, then free it so nothing answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = DriverConfig {
            port,
            ..DriverConfig::default()
        };
        let client = DriverClient::new(&config).unwrap();
        let err = wait_for_ready(&client, Duration::from_millis(700))
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Driver(_)));
    }
}
