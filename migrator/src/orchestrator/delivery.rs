//! Hand written outputs to a transport.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TransportResult;
use crate::logs::{log_error_indent, log_info, log_info_indent, log_success, log_warning};
use crate::models::display_name;
use crate::transport::Transport;

/// Delay between upload attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// What was delivered. Local files are never touched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Remote copies removed before uploading
    pub removed: Vec<String>,
    /// Uploaded names with their size in bytes
    pub uploaded: Vec<(String, u64)>,
    /// Names that could not be uploaded, with the last error
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Retry policy of a delivery.
#[derive(Debug, Clone, Copy)]
pub struct Delivery {
    /// Attempts per file (at least one)
    pub attempts: u32,
    pub delay: Duration,
}

impl Delivery {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: RETRY_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Upload `files` under their own names.
    ///
    /// Remote copies of exactly these names are removed first. A failed
    /// upload is retried on a fresh connection and then recorded; the other
    /// files are still delivered. Only a connection that never opens is an
    /// error.
    pub async fn deliver<T: Transport>(
        &self,
        transport: &mut T,
        files: &[PathBuf],
    ) -> TransportResult<DeliveryReport> {
        let mut report = DeliveryReport::default();
        log_info(format!("📤 Delivering {} file(s) to {}", files.len(), transport.describe()));
        if files.is_empty() {
            return Ok(report);
        }

        self.connect(transport).await?;

        for path in files {
            let name = display_name(path);
            match transport.remove(&name).await {
                Ok(true) => {
                    log_info_indent(format!("removed previous {}", name), 1);
                    report.removed.push(name);
                }
                Ok(false) => {}
                Err(e) => log_warning(format!("Could not remove previous {}: {}", name, e)),
            }
        }

        for path in files {
            let name = display_name(path);
            let mut attempt = 1;
            loop {
                match transport.upload(path, &name).await {
                    Ok(size) => {
                        log_success(format!("{} ({:.1} KB)", name, size as f64 / 1024.0));
                        report.uploaded.push((name, size));
                        break;
                    }
                    Err(e) if attempt < self.attempts => {
                        log_warning(format!(
                            "Attempt {}/{} for {} failed: {}",
                            attempt, self.attempts, name, e
                        ));
                        attempt += 1;
                        tokio::time::sleep(self.delay).await;
                        let _ = transport.disconnect().await;
                        if let Err(e) = transport.connect().await {
                            log_warning(format!("Reconnect failed: {}", e));
                        }
                    }
                    Err(e) => {
                        log_error_indent(format!("{}: {}", name, e), 1);
                        report.failed.push((name, e.to_string()));
                        break;
                    }
                }
            }
        }

        if let Err(e) = transport.disconnect().await {
            log_warning(format!("Disconnect failed: {}", e));
        }
        Ok(report)
    }

    async fn connect<T: Transport>(&self, transport: &mut T) -> TransportResult<()> {
        let mut attempt = 1;
        loop {
            match transport.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    log_warning(format!(
                        "Connection attempt {}/{} failed: {}",
                        attempt, self.attempts, e
                    ));
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
