//! 통합 테스트 -- 레코드 추가부터 sink 전송, 종료까지의 전체 흐름 검증

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use bulkpost_core::sink::{FailedItem, Sink, SinkResponse, TransportError};
use bulkpost_core::types::{Batch, Record, RoutingKey};
use bulkpost_dispatch::{
    BulkProcessor, BulkProcessorBuilder, LifecycleState, ProcessorConfigBuilder,
};

/// 전송된 배치의 페이로드를 순서대로 기록하는 sink
#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    async fn snapshot(&self) -> Vec<Vec<String>> {
        self.batches.lock().await.clone()
    }
}

impl Sink for RecordingSink {
    async fn execute(&self, batch: &Batch) -> Result<SinkResponse, TransportError> {
        let payloads = batch
            .records()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.payload).into_owned())
            .collect();
        self.batches.lock().await.push(payloads);
        Ok(SinkResponse::success())
    }
}

/// 응답하지 않는 sink
struct StuckSink {
    calls: AtomicUsize,
}

impl Sink for StuckSink {
    async fn execute(&self, _batch: &Batch) -> Result<SinkResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(SinkResponse::success())
    }
}

/// 호출마다 일정 시간 걸리는 sink
struct SlowSink {
    calls: AtomicUsize,
    delay: Duration,
}

impl Sink for SlowSink {
    async fn execute(&self, _batch: &Batch) -> Result<SinkResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(SinkResponse::success())
    }
}

/// 성공, 부분 실패, 전송 실패를 번갈아 돌려주는 sink
#[derive(Default)]
struct FlakySink {
    calls: AtomicUsize,
}

impl Sink for FlakySink {
    async fn execute(&self, batch: &Batch) -> Result<SinkResponse, TransportError> {
        match self.calls.fetch_add(1, Ordering::SeqCst) % 3 {
            0 => Ok(SinkResponse::success()),
            1 => Ok(SinkResponse::partial(
                "One or more of the items in the Bulk request failed",
                vec![FailedItem::new(batch.id().to_string(), "mapper_parsing_exception")],
            )),
            _ => Err(TransportError::Connection("connection reset".to_owned())),
        }
    }
}

fn record(payload: &str) -> Record {
    Record::new(RoutingKey::new("logs"), payload.to_owned())
}

fn processor<S: Sink>(sink: Arc<S>, flush_limit: usize, concurrency: usize) -> BulkProcessor<S> {
    let config = ProcessorConfigBuilder::new()
        .name("it")
        .flush_limit(flush_limit)
        .concurrency(concurrency)
        .poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    BulkProcessorBuilder::new()
        .config(config)
        .shared_sink(sink)
        .build()
        .unwrap()
}

/// 조건이 참이 될 때까지 최대 5초 기다립니다.
async fn wait_until<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// flush_limit=3에서 7개 레코드: 두 배치가 전송되고 R7은 종료 시 flush
#[tokio::test]
async fn test_seven_records_then_shutdown() {
    let sink = Arc::new(RecordingSink::default());
    let processor = processor(Arc::clone(&sink), 3, 1);
    processor.start().await.unwrap();

    for i in 1..=7 {
        assert!(processor.add_record(record(&format!("R{i}"))).await);
    }

    wait_until(|| {
        let sink = Arc::clone(&sink);
        async move { sink.snapshot().await.len() == 2 }
    })
    .await;
    assert_eq!(
        sink.snapshot().await,
        vec![vec!["R1", "R2", "R3"], vec!["R4", "R5", "R6"]]
    );
    assert_eq!(processor.buffered_records().await, 1);

    assert!(processor.request_shutdown().await);
    let report = processor
        .await_termination(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(
        sink.snapshot().await,
        vec![
            vec!["R1", "R2", "R3"],
            vec!["R4", "R5", "R6"],
            vec!["R7"]
        ]
    );
    assert_eq!(processor.state().await, LifecycleState::Stopped);
}

/// 종료 요청을 두 번 해도 마지막 배치는 한 번만 전송
#[tokio::test]
async fn test_double_shutdown_flushes_once() {
    let sink = Arc::new(RecordingSink::default());
    let processor = Arc::new(processor(Arc::clone(&sink), 100, 2));
    processor.start().await.unwrap();
    processor.add_record(record("last")).await;

    let a = {
        let p = Arc::clone(&processor);
        tokio::spawn(async move { p.request_shutdown().await })
    };
    let b = {
        let p = Arc::clone(&processor);
        tokio::spawn(async move { p.request_shutdown().await })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a ^ b, "exactly one call initiates shutdown");

    processor
        .await_termination(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!processor.request_shutdown().await);
    assert_eq!(sink.snapshot().await, vec![vec!["last"]]);
}

/// flush_limit=0: 아무것도 전송되지 않고 드롭도 없음
#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let sink = Arc::new(RecordingSink::default());
    let processor = processor(Arc::clone(&sink), 0, 1);
    processor.start().await.unwrap();
    for i in 0..50 {
        assert!(processor.add_record(record(&i.to_string())).await);
    }
    processor.shutdown().await.unwrap();
    assert!(sink.snapshot().await.is_empty());
    assert_eq!(processor.dropped_records(), 0);
}

/// 워커 없이 용량을 넘기면 배치가 드롭되고 레코드 수만큼 카운트
#[tokio::test(start_paused = true)]
async fn test_backpressure_drops_when_full() {
    let config = ProcessorConfigBuilder::new()
        .flush_limit(2)
        .concurrency(1)
        .queue_capacity_multiplier(2)
        .enqueue_timeout(Duration::from_millis(10))
        .build()
        .unwrap();
    let processor = BulkProcessorBuilder::new()
        .config(config)
        .sink(RecordingSink::default())
        .build()
        .unwrap();

    let mut results = Vec::new();
    for i in 0..6 {
        results.push(processor.add_record(record(&i.to_string())).await);
    }
    // 배치 1, 2는 큐에 들어가고 배치 3(레코드 4, 5)은 드롭됨
    assert_eq!(results, vec![true, true, true, true, true, false]);
    assert_eq!(processor.queued_batches(), 2);
    assert_eq!(processor.dropped_records(), 2);
}

/// 응답하지 않는 sink: 마감이 지나면 워커를 분리하고 남은 배치를 보고
#[tokio::test(start_paused = true)]
async fn test_termination_timeout_abandons_stuck_worker() {
    let sink = Arc::new(StuckSink {
        calls: AtomicUsize::new(0),
    });
    let processor = processor(Arc::clone(&sink), 1, 1);
    processor.start().await.unwrap();

    for i in 0..3 {
        processor.add_record(record(&i.to_string())).await;
    }
    wait_until(|| {
        let sink = Arc::clone(&sink);
        async move { sink.calls.load(Ordering::SeqCst) == 1 }
    })
    .await;

    processor.request_shutdown().await;
    let report = processor
        .await_termination(Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(report.joined, 0);
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.batches_left, 2);
    assert!(!report.is_clean());
    assert_eq!(processor.state().await, LifecycleState::Stopped);
}

/// 마감 후 분리된 워커는 진행 중인 전송만 마치고 남은 배치는 전송하지 않음
#[tokio::test(start_paused = true)]
async fn test_abandoned_batches_are_never_sent() {
    let sink = Arc::new(SlowSink {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(200),
    });
    let processor = processor(Arc::clone(&sink), 1, 1);
    processor.start().await.unwrap();

    for i in 0..3 {
        processor.add_record(record(&i.to_string())).await;
    }
    wait_until(|| {
        let sink = Arc::clone(&sink);
        async move { sink.calls.load(Ordering::SeqCst) == 1 }
    })
    .await;

    processor.request_shutdown().await;
    let report = processor
        .await_termination(Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.batches_left, 2);
    assert_eq!(processor.queued_batches(), 0);

    // 진행 중이던 전송이 끝난 뒤에도 추가 호출이 없어야 함
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

    // 재시작 후에는 새 워커만 큐를 소비
    processor.start().await.unwrap();
    processor.add_record(record("after-restart")).await;
    let report = processor.shutdown().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.stats.succeeded, 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

/// 실패가 섞여도 모든 배치가 정확히 한 번씩 시도됨
#[tokio::test]
async fn test_failures_do_not_stop_workers() {
    let sink = Arc::new(FlakySink::default());
    let processor = processor(Arc::clone(&sink), 2, 3);
    processor.start().await.unwrap();

    for i in 0..60 {
        processor.add_record(record(&i.to_string())).await;
    }

    let report = processor.shutdown().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(sink.calls.load(Ordering::SeqCst), 30);
    assert_eq!(report.stats.total(), 30);
    assert_eq!(report.stats.succeeded, 10);
    assert_eq!(report.stats.partial, 10);
    assert_eq!(report.stats.transport_failed, 10);
}

/// 여러 워커에서도 모든 레코드가 한 번씩 전송되고 배치 내 순서가 유지됨
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_deliver_everything() {
    let sink = Arc::new(RecordingSink::default());
    let processor = processor(Arc::clone(&sink), 10, 4);
    processor.start().await.unwrap();

    for i in 0..95 {
        assert!(processor.add_record(record(&format!("{i:03}"))).await);
    }
    processor.shutdown().await.unwrap();

    let mut batches = sink.snapshot().await;
    assert_eq!(batches.len(), 10);
    for batch in &batches {
        let mut sorted = batch.clone();
        sorted.sort();
        assert_eq!(&sorted, batch, "records keep their order within a batch");
    }
    batches.sort();
    let flat: Vec<String> = batches.into_iter().flatten().collect();
    let expected: Vec<String> = (0..95).map(|i| format!("{i:03}")).collect();
    assert_eq!(flat, expected);
}

/// 대상이 바뀌면 배치가 나뉨
#[tokio::test]
async fn test_routing_change_splits_batches() {
    let sink = Arc::new(RecordingSink::default());
    let processor = processor(Arc::clone(&sink), 100, 1);
    processor.start().await.unwrap();

    processor
        .add_record(Record::new(RoutingKey::new("a"), "a1"))
        .await;
    processor
        .add_record(Record::new(RoutingKey::new("a").with_pipeline("geoip"), "a2"))
        .await;
    processor
        .add_record(Record::new(RoutingKey::new("a").with_pipeline("geoip"), "a3"))
        .await;
    processor.shutdown().await.unwrap();

    assert_eq!(sink.snapshot().await, vec![vec!["a1"], vec!["a2", "a3"]]);
}
