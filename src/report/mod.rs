//! Line-oriented harvest report.
//!
//! The report is streamed: every recorded item is flushed as soon as it is
//! written so an interrupted run still leaves everything fetched so far on
//! disk.

use crate::nacos_api::resources::{ConfigEntry, Namespace};
use crate::nacos_api::token::Token;
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// `strftime` pattern of report file names (14 digits)
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Line closing each recorded item
pub const ENTRY_SEPARATOR: &str = "-------------------";

/// Line written in place of further results when the token is rejected
pub const AUTH_FAILURE_LINE: &str =
    "Error: Token validation failed. The provided secret key may be invalid.";

/// File name of a report started at `started_at`
pub fn report_file_name(started_at: &DateTime<Local>) -> String {
    format!("{}.txt", started_at.format(REPORT_TIMESTAMP_FORMAT))
}

/// Append-only report sink
///
/// Owns its sink exclusively; [`ReportWriter::close`] flushes and releases it
/// and is safe to call more than once.
pub struct ReportWriter<W = File> {
    sink: Option<BufWriter<W>>,
    path: Option<PathBuf>,
}

impl ReportWriter<File> {
    /// Create `<dir>/<YYYYMMDDHHMMSS>.txt`, creating `dir` if needed
    pub async fn create(dir: impl AsRef<Path>, started_at: DateTime<Local>) -> io::Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(report_file_name(&started_at));
        let file = File::create(&path).await?;
        tracing::debug!("Opened report file: {:?}", path);

        Ok(Self {
            sink: Some(BufWriter::new(file)),
            path: Some(path),
        })
    }
}

impl<W: AsyncWrite + Unpin> ReportWriter<W> {
    /// Wrap an arbitrary sink (no backing path)
    pub fn from_writer(writer: W) -> Self {
        Self {
            sink: Some(BufWriter::new(writer)),
            path: None,
        }
    }

    /// Path of the report file, when backed by one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    fn sink(&mut self) -> io::Result<&mut BufWriter<W>> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "report already closed"))
    }

    /// Append `text` followed by a newline
    pub async fn write_line(&mut self, text: &str) -> io::Result<()> {
        let sink = self.sink()?;
        sink.write_all(text.as_bytes()).await?;
        sink.write_all(b"\n").await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.sink()?.flush().await
    }

    pub async fn write_token(&mut self, token: &Token) -> io::Result<()> {
        self.write_line(&format!("Token generated: {}", token)).await?;
        self.write_line("").await?;
        self.flush().await
    }

    pub async fn write_namespaces_listed(&mut self) -> io::Result<()> {
        self.write_line("Namespaces retrieved successfully.").await
    }

    /// Record one fetched item and flush it
    pub async fn write_entry(
        &mut self,
        namespace: &Namespace,
        entry: &ConfigEntry,
        content: &str,
    ) -> io::Result<()> {
        self.write_line(&format!(
            "Namespace: {}, DataId: {}, Group: {}",
            namespace.id, entry.data_id, entry.group
        ))
        .await?;
        self.write_line(&format!("Config: {}", content)).await?;
        self.write_line(ENTRY_SEPARATOR).await?;
        self.flush().await
    }

    pub async fn write_total(&mut self, count: usize) -> io::Result<()> {
        self.write_line(&format!("Total configs retrieved: {}", count))
            .await?;
        self.flush().await
    }

    pub async fn write_auth_failure(&mut self) -> io::Result<()> {
        self.write_line(AUTH_FAILURE_LINE).await?;
        self.flush().await
    }

    /// Flush and release the sink
    pub async fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(mut sink) => {
                sink.flush().await?;
                sink.shutdown().await?;
                if let Some(path) = &self.path {
                    tracing::debug!("Closed report file: {:?}", path);
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Recover the underlying sink, if not yet closed
    pub fn into_inner(self) -> Option<W> {
        self.sink.map(BufWriter::into_inner)
    }
}
