//! 배치 누산기
//!
//! 입력 레코드를 같은 대상끼리 모아 배치로 만들고, 배치가 `flush_limit`에
//! 도달하거나 대상이 바뀌거나 명시적 flush가 요청되면 봉인하여 큐에 넘깁니다.
//!
//! 현재 배치와 드롭 구간 추적기는 하나의 비동기 `Mutex` 아래에 있습니다.
//! 봉인과 큐 삽입이 같은 잠금 안에서 일어나므로 큐에 들어가는 배치의 순서는
//! 봉인 순서와 같고, 배치 안의 레코드 순서는 `add_record` 호출 순서와 같습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use bulkpost_core::metrics as m;
use bulkpost_core::types::{Batch, Record};

use crate::queue::{BoundedDispatchQueue, EnqueueStreak};

/// 배치 하나에 미리 확보하는 최대 슬롯 수
const PREALLOC_LIMIT: usize = 1024;

#[derive(Debug, Default)]
struct AccumulatorState {
    current: Option<Batch>,
    streak: EnqueueStreak,
}

/// 배치 누산기
pub struct BatchAccumulator {
    state: Mutex<AccumulatorState>,
    queue: Arc<BoundedDispatchQueue>,
    flush_limit: usize,
    enqueue_timeout: Duration,
    processor: String,
}

impl BatchAccumulator {
    /// 새 누산기를 생성합니다.
    ///
    /// `flush_limit`이 0이면 dry-run 모드로 동작하여 모든 레코드를 버립니다.
    pub fn new(
        processor: impl Into<String>,
        queue: Arc<BoundedDispatchQueue>,
        flush_limit: usize,
        enqueue_timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(AccumulatorState::default()),
            queue,
            flush_limit,
            enqueue_timeout,
            processor: processor.into(),
        }
    }

    /// 레코드를 현재 배치에 추가합니다.
    ///
    /// 대상이 현재 배치와 다르면 현재 배치를 먼저 봉인합니다. 추가 후 배치가
    /// `flush_limit`에 도달하면 봉인합니다. 이 호출이 봉인한 배치 중 하나라도
    /// 큐에 들어가지 못해 드롭되면 `false`를 반환합니다.
    pub async fn add_record(&self, record: Record) -> bool {
        metrics::counter!(m::DISPATCH_RECORDS_ACCEPTED_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
            .increment(1);

        if self.flush_limit == 0 {
            return true;
        }

        let mut state = self.state.lock().await;
        let mut accepted = true;
        let mut pending = record;

        let count = loop {
            let batch = state.current.get_or_insert_with(|| {
                Batch::with_capacity(pending.target.clone(), self.flush_limit.min(PREALLOC_LIMIT))
            });
            match batch.push(pending) {
                Ok(count) => break count,
                Err(rejected) => {
                    // 대상 변경: 현재 배치를 봉인하고 새 배치에서 다시 시도
                    debug!(
                        processor = %self.processor,
                        next_target = %rejected.target,
                        "routing target changed, sealing current batch"
                    );
                    pending = rejected;
                    accepted &= self.seal(&mut state).await;
                }
            }
        };

        if count >= self.flush_limit {
            accepted &= self.seal(&mut state).await;
        }
        accepted
    }

    /// 현재 배치가 비어있지 않으면 봉인하여 큐에 넘깁니다.
    ///
    /// 배치가 없거나 비어 있으면 아무것도 하지 않고 `true`를 반환합니다.
    pub async fn flush(&self) -> bool {
        let mut state = self.state.lock().await;
        self.seal(&mut state).await
    }

    /// 아직 봉인되지 않은 레코드 수
    pub async fn buffered_len(&self) -> usize {
        self.state
            .lock()
            .await
            .current
            .as_ref()
            .map_or(0, Batch::len)
    }

    async fn seal(&self, state: &mut AccumulatorState) -> bool {
        let Some(batch) = state.current.take() else {
            return true;
        };
        if batch.is_empty() {
            return true;
        }

        metrics::counter!(m::DISPATCH_BATCHES_SEALED_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
            .increment(1);
        debug!(
            processor = %self.processor,
            batch_id = %batch.id(),
            target = %batch.target(),
            records = batch.len(),
            "batch sealed"
        );

        self.queue
            .offer(batch, self.enqueue_timeout, &mut state.streak)
            .await
            .is_accepted()
    }
}
