//! Input loop and processor lifecycle.
//!
//! The [`Runner`] owns one [`BulkProcessor`] and feeds it from a line
//! reader until the input ends or a shutdown signal arrives.
//!
//! # Loop
//!
//! 1. Read a line, waiting at most `idle_flush_ms`
//! 2. On timeout, flush the partially filled batch
//! 3. On a line, decode it and hand the record to the processor
//! 4. On EOF or shutdown, request shutdown and wait for the workers

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use bulkpost_core::config::BulkpostConfig;
use bulkpost_core::metrics as m;
use bulkpost_core::sink::Sink;
use bulkpost_dispatch::{BulkProcessor, BulkProcessorBuilder, ProcessorConfig, TerminationReport};

use crate::input::parse_line;

/// Why the input loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The reader reached end of input.
    EndOfInput,
    /// The shutdown future completed.
    Signal,
}

/// Totals reported after the runner stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop ended
    pub reason: StopReason,
    /// Lines read from the input
    pub lines: u64,
    /// Lines that could not be decoded
    pub invalid_lines: u64,
    /// Records dropped by backpressure
    pub dropped_records: u64,
    /// Worker shutdown outcome
    pub termination: TerminationReport,
}

/// Feeds input lines into a bulk processor.
pub struct Runner<S: Sink> {
    processor: BulkProcessor<S>,
    default_index: String,
    idle_flush: Duration,
}

impl<S: Sink> Runner<S> {
    /// Build the processor from an already validated configuration.
    pub fn new(config: &BulkpostConfig, sink: S) -> Result<Self> {
        let processor = BulkProcessorBuilder::new()
            .config(ProcessorConfig::from_core(&config.dispatch))
            .sink(sink)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build bulk processor: {}", e))?;

        Ok(Self {
            processor,
            default_index: config.dispatch.default_index.clone(),
            idle_flush: Duration::from_millis(config.dispatch.idle_flush_ms),
        })
    }

    /// The underlying processor.
    pub fn processor(&self) -> &BulkProcessor<S> {
        &self.processor
    }

    /// Run until `reader` ends or `shutdown` completes.
    pub async fn run<R, F>(self, reader: R, shutdown: F) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        self.processor
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start bulk processor: {}", e))?;
        tracing::info!(
            idle_flush_ms = self.idle_flush.as_millis() as u64,
            default_index = %self.default_index,
            "reading input"
        );

        let mut lines = reader.lines();
        let mut line_count = 0u64;
        let mut invalid = 0u64;
        tokio::pin!(shutdown);

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("shutdown signal received");
                    break Ok(StopReason::Signal);
                }
                next = tokio::time::timeout(self.idle_flush, lines.next_line()) => next,
            };

            match next {
                Err(_idle) => {
                    self.processor.flush().await;
                }
                Ok(Ok(Some(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    line_count += 1;
                    metrics::counter!(m::DAEMON_INPUT_LINES_TOTAL).increment(1);
                    match parse_line(&line, &self.default_index) {
                        Ok(record) => {
                            self.processor.add_record(record).await;
                        }
                        Err(e) => {
                            invalid += 1;
                            metrics::counter!(m::DAEMON_INPUT_ERRORS_TOTAL).increment(1);
                            tracing::warn!(line = line_count, error = %e, "skipping invalid input line");
                        }
                    }
                }
                Ok(Ok(None)) => {
                    tracing::info!(lines = line_count, "end of input");
                    break Ok(StopReason::EndOfInput);
                }
                Ok(Err(e)) => break Err(e),
            }
        };

        // 입력 에러여도 이미 받은 레코드는 전송 시도
        self.processor.request_shutdown().await;
        let termination = self
            .processor
            .await_termination(self.processor.config().shutdown_timeout())
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop bulk processor: {}", e))?;

        let reason = outcome.map_err(|e| anyhow::anyhow!("failed to read input: {}", e))?;
        let summary = RunSummary {
            reason,
            lines: line_count,
            invalid_lines: invalid,
            dropped_records: self.processor.dropped_records(),
            termination,
        };
        tracing::info!(
            reason = ?summary.reason,
            lines = summary.lines,
            invalid_lines = summary.invalid_lines,
            dropped_records = summary.dropped_records,
            abandoned_workers = summary.termination.abandoned,
            "bulkpost-daemon finished"
        );
        Ok(summary)
    }
}
