//! 배치 전송 프로세서
//!
//! [`BulkProcessor`]는 누산기, 큐, 워커 풀, 생명주기 컨트롤러를 하나로 묶은
//! 공개 진입점입니다. [`BulkProcessorBuilder`]로 생성합니다.
//!
//! # 사용 예시
//! ```ignore
//! let processor = BulkProcessorBuilder::new()
//!     .config(ProcessorConfig::from_core(&core.dispatch))
//!     .sink(my_sink)
//!     .build()?;
//!
//! processor.start().await?;
//! processor.add_record(record).await;
//! let report = processor.shutdown().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use bulkpost_core::sink::Sink;
use bulkpost_core::types::Record;
use tracing::info;

use crate::accumulator::BatchAccumulator;
use crate::config::ProcessorConfig;
use crate::drop_counter::DropCounter;
use crate::error::DispatchError;
use crate::lifecycle::{LifecycleController, LifecycleState, TerminationReport};
use crate::queue::BoundedDispatchQueue;

/// 배치 전송 프로세서
pub struct BulkProcessor<S: Sink> {
    config: ProcessorConfig,
    accumulator: Arc<BatchAccumulator>,
    queue: Arc<BoundedDispatchQueue>,
    drops: DropCounter,
    lifecycle: LifecycleController<S>,
}

impl<S: Sink> BulkProcessor<S> {
    /// 레코드를 추가합니다.
    ///
    /// 이 호출로 봉인된 배치가 큐에 들어가지 못하고 드롭되면 `false`를 반환합니다.
    /// 워커가 시작되기 전에 추가된 레코드는 시작 후 전송됩니다.
    pub async fn add_record(&self, record: Record) -> bool {
        self.accumulator.add_record(record).await
    }

    /// 현재 배치를 봉인하여 큐에 넘깁니다.
    pub async fn flush(&self) -> bool {
        self.accumulator.flush().await
    }

    /// 워커를 시작합니다.
    pub async fn start(&self) -> Result<(), DispatchError> {
        self.lifecycle.start().await
    }

    /// 종료를 요청합니다. 처음 종료를 시작한 호출만 `true`를 반환합니다.
    pub async fn request_shutdown(&self) -> bool {
        self.lifecycle.request_shutdown().await
    }

    /// 워커 종료를 최대 `timeout` 동안 기다립니다.
    pub async fn await_termination(
        &self,
        timeout: Duration,
    ) -> Result<TerminationReport, DispatchError> {
        self.lifecycle.await_termination(timeout).await
    }

    /// 종료를 요청하고 설정된 `shutdown_timeout` 동안 기다립니다.
    pub async fn shutdown(&self) -> Result<TerminationReport, DispatchError> {
        self.request_shutdown().await;
        self.await_termination(self.config.shutdown_timeout()).await
    }

    /// 현재 생명주기 상태
    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// 백프레셔로 드롭된 레코드 수
    pub fn dropped_records(&self) -> u64 {
        self.drops.get()
    }

    /// 큐에 대기 중인 배치 수
    pub fn queued_batches(&self) -> usize {
        self.queue.len()
    }

    /// 아직 봉인되지 않은 레코드 수
    pub async fn buffered_records(&self) -> usize {
        self.accumulator.buffered_len().await
    }

    /// 프로세서 설정
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }
}

/// 배치 전송 프로세서 빌더
pub struct BulkProcessorBuilder<S: Sink> {
    config: ProcessorConfig,
    sink: Option<Arc<S>>,
}

impl<S: Sink> Default for BulkProcessorBuilder<S> {
    fn default() -> Self {
        Self {
            config: ProcessorConfig::default(),
            sink: None,
        }
    }
}

impl<S: Sink> BulkProcessorBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로세서 설정을 지정합니다.
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// sink를 지정합니다.
    pub fn sink(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// 이미 공유 중인 sink를 지정합니다.
    pub fn shared_sink(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 설정을 검증하고 프로세서를 생성합니다 (상태: `Stopped`).
    pub fn build(self) -> Result<BulkProcessor<S>, DispatchError> {
        self.config.validate()?;
        let sink = self.sink.ok_or_else(|| DispatchError::Config {
            field: "sink".to_owned(),
            reason: "a sink must be provided".to_owned(),
        })?;

        let config = self.config;
        let drops = DropCounter::new(config.name.clone());
        let queue = Arc::new(BoundedDispatchQueue::new(
            config.name.clone(),
            config.queue_capacity(),
            drops.clone(),
        ));
        let accumulator = Arc::new(BatchAccumulator::new(
            config.name.clone(),
            Arc::clone(&queue),
            config.flush_limit,
            config.enqueue_timeout(),
        ));
        let lifecycle = LifecycleController::new(
            config.name.clone(),
            config.concurrency,
            config.poll_interval(),
            Arc::clone(&queue),
            Arc::clone(&accumulator),
            sink,
        );

        if config.is_dry_run() {
            info!(processor = %config.name, "flush_limit is 0, records will be discarded (dry run)");
        }

        Ok(BulkProcessor {
            config,
            accumulator,
            queue,
            drops,
            lifecycle,
        })
    }
}
