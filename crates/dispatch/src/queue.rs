//! 유한 디스패치 큐
//!
//! 누산기가 봉인한 배치를 전송 워커에게 넘기는 FIFO 큐입니다.
//! 용량은 `concurrency × queue_capacity_multiplier`로 고정되며,
//! 가득 찬 상태가 `enqueue_timeout` 동안 풀리지 않으면 배치를 드롭합니다.
//! 생산자는 절대 무기한 대기하지 않습니다.
//!
//! # 아키텍처
//! ```text
//! BatchAccumulator --offer--> [ mpsc (bounded) ] --poll--> SenderWorker x N
//!                                   |
//!                          full + timeout -> DropCounter
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{info, warn};

use bulkpost_core::metrics as m;
use bulkpost_core::types::Batch;

use crate::drop_counter::DropCounter;

/// 큐 삽입 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// 큐에 들어감
    Accepted,
    /// 드롭됨 (드롭된 레코드 수)
    Dropped {
        /// 배치에 담겨 있던 레코드 수
        records: usize,
    },
}

impl Offer {
    /// 큐에 들어갔는지 여부
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 연속 드롭 구간 추적기
///
/// 구간의 첫 드롭만 경고로 남기고, 다음 삽입 성공 시 구간 전체를 한 줄로 요약합니다.
/// 삽입을 직렬화하는 쪽(누산기)이 단독으로 소유합니다.
#[derive(Debug, Default)]
pub struct EnqueueStreak {
    failures: u64,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
}

/// 끝난 드롭 구간 요약
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakSummary {
    /// 구간 동안의 드롭 횟수
    pub failures: u64,
    /// 구간 시작 시각
    pub started_at: DateTime<Utc>,
    /// 구간 길이
    pub elapsed: Duration,
}

impl EnqueueStreak {
    /// 드롭 하나를 기록하고 구간 내 드롭 횟수를 반환합니다.
    pub fn fail(&mut self) -> u64 {
        if self.failures == 0 {
            self.started_at = Some(Utc::now());
            self.started = Some(Instant::now());
        }
        self.failures += 1;
        self.failures
    }

    /// 삽입 성공을 기록합니다. 진행 중이던 구간이 있으면 요약을 반환합니다.
    pub fn recover(&mut self) -> Option<StreakSummary> {
        if self.failures == 0 {
            return None;
        }
        let summary = StreakSummary {
            failures: self.failures,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            elapsed: self.started.map(|s| s.elapsed()).unwrap_or_default(),
        };
        *self = Self::default();
        Some(summary)
    }

    /// 구간 내 드롭 횟수 (구간이 없으면 0)
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// 진행 중인 구간의 시작 시각
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

/// 유한 디스패치 큐
///
/// 송신측과 수신측을 함께 보유하므로 채널이 닫히지 않습니다.
/// 워커들은 수신측을 `Mutex`로 공유하며 한 배치는 정확히 한 워커에게만 전달됩니다.
pub struct BoundedDispatchQueue {
    tx: mpsc::Sender<Batch>,
    rx: Mutex<mpsc::Receiver<Batch>>,
    drops: DropCounter,
    processor: String,
}

impl BoundedDispatchQueue {
    /// 주어진 용량의 큐를 생성합니다.
    ///
    /// `capacity`는 1 이상이어야 합니다 ([`ProcessorConfig::validate`](crate::config::ProcessorConfig::validate)가 보장).
    pub fn new(processor: impl Into<String>, capacity: usize, drops: DropCounter) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            drops,
            processor: processor.into(),
        }
    }

    /// 배치를 큐에 넣습니다.
    ///
    /// 자리가 없으면 최대 `timeout` 동안 기다린 뒤 배치를 드롭하고
    /// 레코드 수만큼 드롭 카운터를 올립니다.
    pub async fn offer(&self, batch: Batch, timeout: Duration, streak: &mut EnqueueStreak) -> Offer {
        let records = batch.len();
        let batch_id = batch.id();
        let target = batch.target().to_string();

        match self.tx.send_timeout(batch, timeout).await {
            Ok(()) => {
                self.report_depth();
                if let Some(summary) = streak.recover() {
                    info!(
                        processor = %self.processor,
                        failures = summary.failures,
                        since = %summary.started_at.to_rfc3339(),
                        elapsed_ms = summary.elapsed.as_millis() as u64,
                        "dispatch queue accepting batches again"
                    );
                }
                Offer::Accepted
            }
            Err(err) => {
                let reason = match err {
                    mpsc::error::SendTimeoutError::Timeout(_) => "timeout",
                    mpsc::error::SendTimeoutError::Closed(_) => "closed",
                };
                let total_dropped = self.drops.record_batch(records);
                if streak.fail() == 1 {
                    let since = streak.started_at().unwrap_or_else(Utc::now);
                    warn!(
                        processor = %self.processor,
                        %batch_id,
                        %target,
                        records,
                        total_dropped,
                        reason,
                        since = %since.to_rfc3339(),
                        queue_capacity = self.capacity(),
                        timeout_ms = timeout.as_millis() as u64,
                        "dispatch queue full, dropping batch"
                    );
                }
                Offer::Dropped { records }
            }
        }
    }

    /// 배치 하나를 최대 `wait` 동안 기다려 꺼냅니다.
    ///
    /// 취소 안전(cancel-safe)합니다: 반환 전에 future가 drop되면 배치는 큐에 남습니다.
    pub async fn poll(&self, wait: Duration) -> Option<Batch> {
        let polled = tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten();
        if polled.is_some() {
            self.report_depth();
        }
        polled
    }

    /// 기다리지 않고 배치 하나를 꺼냅니다.
    pub async fn try_take(&self) -> Option<Batch> {
        let taken = self.rx.lock().await.try_recv().ok();
        if taken.is_some() {
            self.report_depth();
        }
        taken
    }

    /// 대기 중인 배치 수
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 큐 용량
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    fn report_depth(&self) {
        metrics::gauge!(m::DISPATCH_QUEUE_DEPTH, m::LABEL_PROCESSOR => self.processor.clone())
            .set(self.len() as f64);
    }
}
