//! 전송 워커 풀
//!
//! 고정 개수의 워커 태스크가 큐에서 배치를 꺼내 sink로 전송합니다.
//! 각 배치는 정확히 한 번, 한 워커에 의해서만 전송되며 재시도되지 않습니다.
//!
//! 워커는 종료 신호를 받으면 루프를 빠져나온 뒤 큐에 남은 배치를
//! 대기 없이 꺼낼 수 있는 만큼 전송하고 끝납니다. 포기 신호가 오면
//! 진행 중인 전송만 마치고 더 이상 큐에서 배치를 꺼내지 않습니다.
//!
//! 연속 실패는 [`staged`](crate::staged) 규칙에 따라 점점 낮은 레벨로 기록합니다.
//! 전송 실패 카운터와 부분 실패 카운터는 워커마다 따로 유지합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use bulkpost_core::metrics as m;
use bulkpost_core::sink::Sink;
use bulkpost_core::types::Batch;

use crate::classify::{Outcome, classify, format_failed_items};
use crate::queue::BoundedDispatchQueue;
use crate::staged::{StagedLevel, Streak, staged_event};

/// 워커 하나가 처리한 결과 통계
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// 전체 성공한 배치 수
    pub succeeded: u64,
    /// 부분 실패한 배치 수
    pub partial: u64,
    /// 전송 실패한 배치 수
    pub transport_failed: u64,
    /// 종료 신호 이후 전송한 배치 수
    pub drained: u64,
}

impl WorkerStats {
    /// 전송을 시도한 전체 배치 수
    pub fn total(&self) -> u64 {
        self.succeeded + self.partial + self.transport_failed
    }
}

/// 로그 레벨 결정을 위한 워커별 연속 실패 상태
#[derive(Debug, Default)]
pub struct FailureTracker {
    transport: Streak,
    partial: Streak,
}

/// 결과 하나를 반영한 뒤 기록할 로그
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// 전송 실패 (연속 횟수, 레벨)
    Transport(u32, StagedLevel),
    /// 부분 실패 (연속 횟수, 레벨)
    Partial(u32, StagedLevel),
    /// 부분 실패 구간 이후 첫 성공 (구간 길이)
    Recovered(u32),
    /// 기록할 것 없음
    Quiet,
}

impl FailureTracker {
    /// 분류된 결과를 반영하고 기록할 로그를 결정합니다.
    ///
    /// 전송 실패 카운터는 에러가 아닌 결과(성공, 부분 실패)에서 초기화되고,
    /// 부분 실패 카운터는 전체 성공에서만 초기화됩니다.
    pub fn observe(&mut self, outcome: &Outcome) -> Report {
        match outcome {
            Outcome::TransportFailure { .. } => {
                let (n, level) = self.transport.hit();
                Report::Transport(n, level)
            }
            Outcome::PartialFailure { .. } => {
                self.transport.reset();
                let (n, level) = self.partial.hit();
                Report::Partial(n, level)
            }
            Outcome::FullSuccess => {
                self.transport.reset();
                match self.partial.reset() {
                    0 => Report::Quiet,
                    n => Report::Recovered(n),
                }
            }
        }
    }
}

struct SenderWorker<S: Sink> {
    id: usize,
    processor: String,
    queue: Arc<BoundedDispatchQueue>,
    sink: Arc<S>,
    poll_interval: Duration,
    tracker: FailureTracker,
    stats: WorkerStats,
}

impl<S: Sink> SenderWorker<S> {
    async fn run(mut self, cancel: CancellationToken, abandon: CancellationToken) -> WorkerStats {
        debug!("sender worker started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.queue.poll(self.poll_interval) => polled,
            };
            if let Some(batch) = polled {
                self.send(batch).await;
            }
        }

        // 종료 신호 이후: 포기 신호 전까지 이미 큐에 있는 배치를 전송
        while !abandon.is_cancelled() {
            let Some(batch) = self.queue.try_take().await else {
                break;
            };
            self.stats.drained += 1;
            self.send(batch).await;
        }
        if abandon.is_cancelled() {
            debug!("sender worker abandoned, leaving queued batches");
        }

        debug!(
            succeeded = self.stats.succeeded,
            partial = self.stats.partial,
            transport_failed = self.stats.transport_failed,
            drained = self.stats.drained,
            "sender worker stopped"
        );
        self.stats
    }

    async fn send(&mut self, batch: Batch) {
        let started = Instant::now();
        let result = self.sink.execute(&batch).await;
        metrics::histogram!(m::SINK_REQUEST_DURATION_SECONDS, m::LABEL_PROCESSOR => self.processor.clone())
            .record(started.elapsed().as_secs_f64());

        let outcome = classify(result);
        metrics::counter!(
            m::SINK_BATCHES_TOTAL,
            m::LABEL_PROCESSOR => self.processor.clone(),
            m::LABEL_OUTCOME => outcome.label()
        )
        .increment(1);

        let report = self.tracker.observe(&outcome);
        let batch_id = batch.id();
        let target = batch.target();
        let records = batch.len();

        match outcome {
            Outcome::FullSuccess => {
                self.stats.succeeded += 1;
                metrics::counter!(m::SINK_RECORDS_SENT_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
                    .increment(records as u64);
                if let Report::Recovered(failures) = report {
                    info!(
                        worker = self.id,
                        %batch_id,
                        failures,
                        "bulk requests succeeding again after partial failures"
                    );
                } else {
                    debug!(worker = self.id, %batch_id, %target, records, "batch sent");
                }
            }
            Outcome::PartialFailure { message, items } => {
                self.stats.partial += 1;
                metrics::counter!(m::SINK_FAILED_ITEMS_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
                    .increment(items.len() as u64);
                if let Report::Partial(streak, level) = report {
                    staged_event!(
                        level,
                        worker = self.id,
                        %batch_id,
                        %target,
                        records,
                        failed = items.len(),
                        streak,
                        message = message.as_deref().unwrap_or(""),
                        items = %format_failed_items(&items),
                        "bulk request reported failed items"
                    );
                }
            }
            Outcome::TransportFailure { cause } => {
                self.stats.transport_failed += 1;
                if let Report::Transport(streak, level) = report {
                    staged_event!(
                        level,
                        worker = self.id,
                        %batch_id,
                        %target,
                        records,
                        streak,
                        error = %cause,
                        "bulk request failed, batch discarded"
                    );
                }
            }
        }
    }
}

/// 스폰된 워커 하나의 핸들
pub struct WorkerHandle {
    /// 워커 번호 (0부터)
    pub id: usize,
    /// 태스크 핸들
    pub handle: JoinHandle<WorkerStats>,
}

/// 전송 워커 풀
pub struct SenderWorkerPool {
    workers: Vec<WorkerHandle>,
}

impl SenderWorkerPool {
    /// `concurrency`개의 워커를 스폰합니다.
    ///
    /// 워커는 `cancel`이 취소될 때까지 큐를 폴링하고, 이후 `abandon`이
    /// 취소되기 전까지 큐에 남은 배치를 전송합니다.
    pub fn spawn<S: Sink>(
        processor: &str,
        concurrency: usize,
        queue: &Arc<BoundedDispatchQueue>,
        sink: &Arc<S>,
        poll_interval: Duration,
        cancel: &CancellationToken,
        abandon: &CancellationToken,
    ) -> Self {
        let workers = (0..concurrency)
            .map(|id| {
                let worker = SenderWorker {
                    id,
                    processor: processor.to_owned(),
                    queue: Arc::clone(queue),
                    sink: Arc::clone(sink),
                    poll_interval,
                    tracker: FailureTracker::default(),
                    stats: WorkerStats::default(),
                };
                let span = info_span!("sender", processor = %processor, worker = id);
                let handle = tokio::spawn(worker.run(cancel.clone(), abandon.clone()).instrument(span));
                WorkerHandle { id, handle }
            })
            .collect();
        Self { workers }
    }

    /// 워커 수
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// 워커가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 워커 핸들을 꺼냅니다.
    pub fn into_handles(self) -> Vec<WorkerHandle> {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drop_counter::DropCounter;
    use crate::queue::EnqueueStreak;
    use bulkpost_core::sink::{FailedItem, SinkResponse, TransportError};
    use bulkpost_core::types::{Record, RoutingKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn partial() -> Outcome {
        Outcome::PartialFailure {
            message: None,
            items: vec![FailedItem::new("1", "bad")],
        }
    }

    fn transport() -> Outcome {
        Outcome::TransportFailure {
            cause: TransportError::Connection("refused".to_owned()),
        }
    }

    #[test]
    fn transport_streak_is_staged() {
        let mut tracker = FailureTracker::default();
        let levels: Vec<_> = (0..25)
            .map(|_| match tracker.observe(&transport()) {
                Report::Transport(_, level) => level,
                other => panic!("unexpected report {other:?}"),
            })
            .collect();
        assert_eq!(levels.iter().filter(|l| **l == StagedLevel::Error).count(), 3);
        assert_eq!(levels.iter().filter(|l| **l == StagedLevel::Info).count(), 17);
        assert_eq!(levels.iter().filter(|l| **l == StagedLevel::Debug).count(), 5);
    }

    #[test]
    fn partial_failure_resets_transport_streak() {
        let mut tracker = FailureTracker::default();
        for _ in 0..5 {
            tracker.observe(&transport());
        }
        assert_eq!(tracker.observe(&partial()), Report::Partial(1, StagedLevel::Error));
        assert_eq!(
            tracker.observe(&transport()),
            Report::Transport(1, StagedLevel::Error)
        );
    }

    #[test]
    fn transport_failure_keeps_partial_streak() {
        let mut tracker = FailureTracker::default();
        tracker.observe(&partial());
        tracker.observe(&partial());
        tracker.observe(&transport());
        assert_eq!(tracker.observe(&partial()), Report::Partial(3, StagedLevel::Error));
    }

    #[test]
    fn success_after_partial_streak_reports_recovery_once() {
        let mut tracker = FailureTracker::default();
        for _ in 0..4 {
            tracker.observe(&partial());
        }
        assert_eq!(tracker.observe(&Outcome::FullSuccess), Report::Recovered(4));
        assert_eq!(tracker.observe(&Outcome::FullSuccess), Report::Quiet);
    }

    #[test]
    fn success_after_transport_streak_is_quiet() {
        let mut tracker = FailureTracker::default();
        tracker.observe(&transport());
        assert_eq!(tracker.observe(&Outcome::FullSuccess), Report::Quiet);
    }

    /// 호출 순서대로 정해진 결과를 돌려주는 sink
    struct ScriptedSink {
        calls: AtomicUsize,
        fail_every: usize,
    }

    impl Sink for ScriptedSink {
        async fn execute(&self, _batch: &Batch) -> Result<SinkResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_every > 0 && n % self.fail_every == 0 {
                Err(TransportError::Connection("refused".to_owned()))
            } else {
                Ok(SinkResponse::success())
            }
        }
    }

    fn batch() -> Batch {
        let mut b = Batch::new(RoutingKey::new("logs"));
        b.push(Record::new(RoutingKey::new("logs"), "x")).unwrap();
        b
    }

    #[tokio::test]
    async fn workers_send_every_batch_once_and_drain_on_stop() {
        let queue = Arc::new(BoundedDispatchQueue::new("test", 32, DropCounter::new("test")));
        let mut streak = EnqueueStreak::default();
        for _ in 0..20 {
            queue.offer(batch(), Duration::ZERO, &mut streak).await;
        }
        let sink = Arc::new(ScriptedSink {
            calls: AtomicUsize::new(0),
            fail_every: 3,
        });
        let cancel = CancellationToken::new();
        let pool = SenderWorkerPool::spawn(
            "test",
            3,
            &queue,
            &sink,
            Duration::from_millis(5),
            &cancel,
            &CancellationToken::new(),
        );
        assert_eq!(pool.len(), 3);

        cancel.cancel();
        let mut total = WorkerStats::default();
        for worker in pool.into_handles() {
            let stats = worker.handle.await.unwrap();
            total.succeeded += stats.succeeded;
            total.transport_failed += stats.transport_failed;
        }

        assert_eq!(total.total(), 20);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 20);
        assert_eq!(total.transport_failed, 7);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn abandoned_worker_leaves_queue_untouched() {
        let queue = Arc::new(BoundedDispatchQueue::new("test", 8, DropCounter::new("test")));
        let mut streak = EnqueueStreak::default();
        for _ in 0..5 {
            queue.offer(batch(), Duration::ZERO, &mut streak).await;
        }
        let sink = Arc::new(ScriptedSink {
            calls: AtomicUsize::new(0),
            fail_every: 0,
        });
        let cancel = CancellationToken::new();
        let abandon = CancellationToken::new();
        cancel.cancel();
        abandon.cancel();

        let pool = SenderWorkerPool::spawn(
            "test",
            1,
            &queue,
            &sink,
            Duration::from_millis(5),
            &cancel,
            &abandon,
        );
        for worker in pool.into_handles() {
            assert_eq!(worker.handle.await.unwrap(), WorkerStats::default());
        }
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 5);
    }
}
