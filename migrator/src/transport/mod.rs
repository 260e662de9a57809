//! Delivery of output files.
//!
//! - [`FtpTransport`] - uploads to the mainframe over FTP
//! - [`DirectoryTransport`] - copies into a mounted directory
//! - [`DryRunTransport`] - logs what would be sent

pub mod ftp;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::TransportResult;
use crate::logs::log_info_indent;

pub use ftp::FtpTransport;

/// A destination for output files.
///
/// Calls are sequential: `connect`, any number of `remove`/`upload`, then
/// `disconnect`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Destination, for logs.
    fn describe(&self) -> String;

    async fn connect(&mut self) -> TransportResult<()>;

    /// Remove a remote file. `Ok(false)` when there was nothing to remove.
    async fn remove(&mut self, remote_name: &str) -> TransportResult<bool>;

    /// Upload a local file. Returns the number of bytes sent.
    async fn upload(&mut self, local: &Path, remote_name: &str) -> TransportResult<u64>;

    async fn disconnect(&mut self) -> TransportResult<()>;
}

/// Copies files into a directory, e.g. a mounted share of the mainframe.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    target: PathBuf,
}

impl DirectoryTransport {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Transport for DirectoryTransport {
    fn describe(&self) -> String {
        format!("directory {}", self.target.display())
    }

    async fn connect(&mut self) -> TransportResult<()> {
        tokio::fs::create_dir_all(&self.target).await?;
        Ok(())
    }

    async fn remove(&mut self, remote_name: &str) -> TransportResult<bool> {
        match tokio::fs::remove_file(self.target.join(remote_name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&mut self, local: &Path, remote_name: &str) -> TransportResult<u64> {
        Ok(tokio::fs::copy(local, self.target.join(remote_name)).await?)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        Ok(())
    }
}

/// Sends nothing. Used when no destination is configured.
#[derive(Debug, Clone, Default)]
pub struct DryRunTransport {
    sent: BTreeSet<String>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for DryRunTransport {
    fn describe(&self) -> String {
        "dry run (nothing is sent)".to_string()
    }

    async fn connect(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn remove(&mut self, remote_name: &str) -> TransportResult<bool> {
        Ok(self.sent.contains(remote_name))
    }

    async fn upload(&mut self, local: &Path, remote_name: &str) -> TransportResult<u64> {
        let size = tokio::fs::metadata(local).await?.len();
        log_info_indent(format!("would upload {} ({} bytes)", remote_name, size), 1);
        self.sent.insert(remote_name.to_string());
        Ok(size)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        Ok(())
    }
}
