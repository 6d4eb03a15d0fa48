//! Sink selection for the daemon.
//!
//! `sink.kind = "elasticsearch"` ships batches with [`ElasticSink`];
//! `sink.kind = "stdout"` writes the same `_bulk` body to standard output.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use bulkpost_core::config::SinkConfig;
use bulkpost_core::sink::{Sink, SinkResponse, TransportError};
use bulkpost_core::types::Batch;
use bulkpost_elastic::{BulkRequestBody, ElasticConfig, ElasticError, ElasticSink};

/// Writes each batch as an NDJSON `_bulk` body to an async writer.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Return the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<tokio::io::Stdout> {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> Sink for WriterSink<W> {
    async fn execute(&self, batch: &Batch) -> Result<SinkResponse, TransportError> {
        let body = BulkRequestBody::from_batch(batch)
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&body.into_bytes()).await?;
        writer.flush().await?;
        Ok(SinkResponse::success())
    }
}

/// The sink chosen by configuration.
pub enum DaemonSink {
    /// Elasticsearch `_bulk` over HTTP
    Elastic(ElasticSink),
    /// NDJSON on stdout
    Stdout(WriterSink<tokio::io::Stdout>),
}

impl DaemonSink {
    /// Build the sink named by `sink.kind`.
    pub fn from_config(config: &SinkConfig) -> Result<Self, ElasticError> {
        match config.kind.as_str() {
            "stdout" => Ok(Self::Stdout(WriterSink::stdout())),
            "elasticsearch" => Ok(Self::Elastic(ElasticSink::new(ElasticConfig::from_core(
                config,
            ))?)),
            other => Err(ElasticError::Config {
                field: "sink.kind".to_owned(),
                reason: format!("unknown sink kind '{other}'"),
            }),
        }
    }

    /// Sink kind name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Elastic(_) => "elasticsearch",
            Self::Stdout(_) => "stdout",
        }
    }
}

impl Sink for DaemonSink {
    async fn execute(&self, batch: &Batch) -> Result<SinkResponse, TransportError> {
        match self {
            Self::Elastic(sink) => sink.execute(batch).await,
            Self::Stdout(sink) => sink.execute(batch).await,
        }
    }
}
