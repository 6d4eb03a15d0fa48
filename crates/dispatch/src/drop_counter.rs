//! 드롭된 레코드 카운터
//!
//! 백프레셔로 큐에 들어가지 못한 배치의 레코드 수를 누적합니다.
//! 값은 단조 증가하며 복제본끼리 같은 카운터를 공유합니다.
//! 같은 값을 `bulkpost_dispatch_records_dropped_total` 메트릭으로도 내보냅니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bulkpost_core::metrics as m;

/// 드롭된 레코드 카운터
#[derive(Debug, Clone)]
pub struct DropCounter {
    dropped: Arc<AtomicU64>,
    processor: String,
}

impl DropCounter {
    /// 파이프라인 이름을 메트릭 레이블로 쓰는 카운터를 생성합니다.
    pub fn new(processor: impl Into<String>) -> Self {
        Self {
            dropped: Arc::new(AtomicU64::new(0)),
            processor: processor.into(),
        }
    }

    /// 드롭된 배치 하나의 레코드 수를 더하고 새 누적값을 반환합니다.
    pub fn record_batch(&self, records: usize) -> u64 {
        let records = records as u64;
        metrics::counter!(m::DISPATCH_RECORDS_DROPPED_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
            .increment(records);
        metrics::counter!(m::DISPATCH_BATCHES_DROPPED_TOTAL, m::LABEL_PROCESSOR => self.processor.clone())
            .increment(1);
        self.dropped.fetch_add(records, Ordering::Relaxed) + records
    }

    /// 지금까지 드롭된 레코드 수
    pub fn get(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
