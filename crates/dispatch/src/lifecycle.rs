//! 파이프라인 생명주기
//!
//! ```text
//! Stopped --start--> Starting --> Running --request_shutdown--> Draining --await_termination--> Stopped
//! ```
//!
//! - `start`: 워커 풀을 스폰합니다. `Stopped`가 아니면 거부됩니다.
//! - `request_shutdown`: 현재 배치를 한 번 flush한 뒤 워커에 종료 신호를 보냅니다.
//!   여러 번 호출해도 첫 호출만 효과가 있습니다.
//! - `await_termination`: 하나의 마감 시각까지 워커 종료를 기다립니다.
//!   마감을 넘긴 워커는 중단하지 않고 분리(detach)합니다. 분리된 워커는 진행 중인
//!   전송만 마치며, 큐에 남은 배치는 비워져 유실로 보고되고 전송되지 않습니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bulkpost_core::metrics as m;
use bulkpost_core::sink::Sink;

use crate::accumulator::BatchAccumulator;
use crate::error::DispatchError;
use crate::queue::BoundedDispatchQueue;
use crate::worker::{SenderWorkerPool, WorkerStats};

/// 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// 워커가 없음 (초기 상태, 종료 완료)
    Stopped,
    /// 워커를 스폰하는 중
    Starting,
    /// 워커가 큐를 폴링하는 중
    Running,
    /// 종료 신호를 보냈고 워커 종료를 기다리는 중
    Draining,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
        };
        f.write_str(s)
    }
}

/// `await_termination` 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TerminationReport {
    /// 마감 전에 종료된 워커 수
    pub joined: usize,
    /// 마감을 넘겨 분리된 워커 수
    pub abandoned: usize,
    /// 종료 시점에 큐에 남아 있던 배치 수
    pub batches_left: usize,
    /// 종료된 워커들의 통계 합계
    pub stats: WorkerStats,
}

impl TerminationReport {
    /// 모든 워커가 종료되고 큐가 비었는지 여부
    pub fn is_clean(&self) -> bool {
        self.abandoned == 0 && self.batches_left == 0
    }
}

struct Inner {
    state: LifecycleState,
    cancel: CancellationToken,
    abandon: CancellationToken,
    pool: Option<SenderWorkerPool>,
}

/// 생명주기 컨트롤러
pub struct LifecycleController<S: Sink> {
    processor: String,
    concurrency: usize,
    poll_interval: Duration,
    queue: Arc<BoundedDispatchQueue>,
    accumulator: Arc<BatchAccumulator>,
    sink: Arc<S>,
    inner: Mutex<Inner>,
}

impl<S: Sink> LifecycleController<S> {
    /// 새 컨트롤러를 생성합니다 (상태: `Stopped`).
    pub fn new(
        processor: impl Into<String>,
        concurrency: usize,
        poll_interval: Duration,
        queue: Arc<BoundedDispatchQueue>,
        accumulator: Arc<BatchAccumulator>,
        sink: Arc<S>,
    ) -> Self {
        Self {
            processor: processor.into(),
            concurrency,
            poll_interval,
            queue,
            accumulator,
            sink,
            inner: Mutex::new(Inner {
                state: LifecycleState::Stopped,
                cancel: CancellationToken::new(),
                abandon: CancellationToken::new(),
                pool: None,
            }),
        }
    }

    /// 현재 상태
    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    /// 워커 풀을 스폰하고 `Running`으로 전이합니다.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let mut inner = self.inner.lock().await;
        if inner.state != LifecycleState::Stopped {
            return Err(DispatchError::InvalidState {
                operation: "start",
                state: inner.state,
            });
        }

        inner.state = LifecycleState::Starting;
        inner.cancel = CancellationToken::new();
        inner.abandon = CancellationToken::new();
        let pool = SenderWorkerPool::spawn(
            &self.processor,
            self.concurrency,
            &self.queue,
            &self.sink,
            self.poll_interval,
            &inner.cancel,
            &inner.abandon,
        );
        inner.pool = Some(pool);
        inner.state = LifecycleState::Running;

        info!(
            processor = %self.processor,
            workers = self.concurrency,
            queue_capacity = self.queue.capacity(),
            "bulk processor started"
        );
        Ok(())
    }

    /// 종료를 요청합니다.
    ///
    /// `Running` 상태에서만 효과가 있으며, 현재 배치를 flush한 뒤 워커에
    /// 종료 신호를 보내고 `Draining`으로 전이합니다. 이 호출이 종료를
    /// 시작했으면 `true`를, 이미 종료 중이거나 실행 중이 아니면 `false`를 반환합니다.
    pub async fn request_shutdown(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != LifecycleState::Running {
            return false;
        }
        inner.state = LifecycleState::Draining;

        if !self.accumulator.flush().await {
            warn!(processor = %self.processor, "final batch dropped during shutdown");
        }
        inner.cancel.cancel();

        info!(
            processor = %self.processor,
            queued = self.queue.len(),
            "bulk processor shutdown requested"
        );
        true
    }

    /// 워커 종료를 최대 `timeout` 동안 기다리고 `Stopped`로 전이합니다.
    ///
    /// `Running` 상태에서 호출하면 에러를 반환합니다 (먼저 `request_shutdown` 필요).
    /// 이미 `Stopped`이면 빈 보고서를 반환합니다.
    ///
    /// 마감이 지나면 큐에 남은 배치를 비우고 `batches_left`로 보고합니다.
    /// 이 배치들은 어떤 워커도 전송하지 않습니다.
    pub async fn await_termination(
        &self,
        timeout: Duration,
    ) -> Result<TerminationReport, DispatchError> {
        let (pool, abandon) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                LifecycleState::Stopped => return Ok(TerminationReport::default()),
                LifecycleState::Draining => (inner.pool.take(), inner.abandon.clone()),
                state => {
                    return Err(DispatchError::InvalidState {
                        operation: "await termination",
                        state,
                    });
                }
            }
        };

        let deadline = Instant::now() + timeout;
        let mut report = TerminationReport::default();

        for worker in pool.map(SenderWorkerPool::into_handles).unwrap_or_default() {
            match tokio::time::timeout_at(deadline, worker.handle).await {
                Ok(Ok(stats)) => {
                    report.joined += 1;
                    report.stats.succeeded += stats.succeeded;
                    report.stats.partial += stats.partial;
                    report.stats.transport_failed += stats.transport_failed;
                    report.stats.drained += stats.drained;
                }
                Ok(Err(e)) => {
                    report.joined += 1;
                    error!(processor = %self.processor, worker = worker.id, error = %e, "sender worker panicked");
                }
                Err(_) => {
                    // 핸들을 drop하면 태스크는 분리되어 계속 실행됨
                    report.abandoned += 1;
                }
            }
        }

        // 분리된 워커가 더 이상 큐에서 꺼내지 않도록 한 뒤 남은 배치를 버림
        abandon.cancel();
        while self.queue.try_take().await.is_some() {
            report.batches_left += 1;
        }
        if report.batches_left > 0 {
            metrics::counter!(m::DISPATCH_BATCHES_ABANDONED_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
                .increment(report.batches_left as u64);
        }

        if report.is_clean() {
            info!(
                processor = %self.processor,
                workers = report.joined,
                batches_sent = report.stats.total(),
                "bulk processor stopped"
            );
        } else {
            warn!(
                processor = %self.processor,
                joined = report.joined,
                abandoned = report.abandoned,
                batches_left = report.batches_left,
                timeout_ms = timeout.as_millis() as u64,
                "bulk processor stopped before all batches were sent"
            );
        }

        self.inner.lock().await.state = LifecycleState::Stopped;
        Ok(report)
    }
}
