//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `bulkpost_`
//! - 구성요소: `dispatch_`, `sink_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(bulkpost_core::metrics::DISPATCH_RECORDS_DROPPED_TOTAL).increment(5000);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파이프라인 이름 레이블 키
pub const LABEL_PROCESSOR: &str = "processor";

/// 전송 결과 레이블 키 (success, partial, transport)
pub const LABEL_OUTCOME: &str = "outcome";

// ─── Dispatch 메트릭 ────────────────────────────────────────────────

/// Dispatch: 파이프라인에 수락된 레코드 수 (counter)
pub const DISPATCH_RECORDS_ACCEPTED_TOTAL: &str = "bulkpost_dispatch_records_accepted_total";

/// Dispatch: 백프레셔로 드롭된 레코드 수 (counter)
pub const DISPATCH_RECORDS_DROPPED_TOTAL: &str = "bulkpost_dispatch_records_dropped_total";

/// Dispatch: 봉인된 배치 수 (counter)
pub const DISPATCH_BATCHES_SEALED_TOTAL: &str = "bulkpost_dispatch_batches_sealed_total";

/// Dispatch: 백프레셔로 드롭된 배치 수 (counter)
pub const DISPATCH_BATCHES_DROPPED_TOTAL: &str = "bulkpost_dispatch_batches_dropped_total";

/// Dispatch: 큐에 대기 중인 배치 수 (gauge)
pub const DISPATCH_QUEUE_DEPTH: &str = "bulkpost_dispatch_queue_depth";

/// Dispatch: 종료 시 큐에 남아 유실된 배치 수 (counter)
pub const DISPATCH_BATCHES_ABANDONED_TOTAL: &str = "bulkpost_dispatch_batches_abandoned_total";

// ─── Sink 메트릭 ────────────────────────────────────────────────────

/// Sink: 전송 시도한 배치 수 (counter, label: outcome)
pub const SINK_BATCHES_TOTAL: &str = "bulkpost_sink_batches_total";

/// Sink: 전체 성공으로 전송된 레코드 수 (counter)
pub const SINK_RECORDS_SENT_TOTAL: &str = "bulkpost_sink_records_sent_total";

/// Sink: 항목 단위로 거부된 레코드 수 (counter)
pub const SINK_FAILED_ITEMS_TOTAL: &str = "bulkpost_sink_failed_items_total";

/// Sink: 배치 전송 소요 시간 (histogram, 초)
pub const SINK_REQUEST_DURATION_SECONDS: &str = "bulkpost_sink_request_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 읽은 입력 줄 수 (counter)
pub const DAEMON_INPUT_LINES_TOTAL: &str = "bulkpost_daemon_input_lines_total";

/// Daemon: 해석에 실패한 입력 줄 수 (counter)
pub const DAEMON_INPUT_ERRORS_TOTAL: &str = "bulkpost_daemon_input_errors_total";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "bulkpost_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 전송 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위, 원격 bulk 요청 분포
pub const SINK_REQUEST_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `bulkpost-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Dispatch
    describe_counter!(
        DISPATCH_RECORDS_ACCEPTED_TOTAL,
        "Total number of records accepted into the dispatch pipeline"
    );
    describe_counter!(
        DISPATCH_RECORDS_DROPPED_TOTAL,
        "Total number of records dropped because the dispatch queue was full"
    );
    describe_counter!(
        DISPATCH_BATCHES_SEALED_TOTAL,
        "Total number of batches sealed by the accumulator"
    );
    describe_counter!(
        DISPATCH_BATCHES_DROPPED_TOTAL,
        "Total number of batches dropped because the dispatch queue was full"
    );
    describe_gauge!(
        DISPATCH_QUEUE_DEPTH,
        "Current number of sealed batches waiting for a sender worker"
    );
    describe_counter!(
        DISPATCH_BATCHES_ABANDONED_TOTAL,
        "Total number of queued batches lost because shutdown timed out"
    );

    // Sink
    describe_counter!(
        SINK_BATCHES_TOTAL,
        "Total number of batches handed to the sink, by outcome"
    );
    describe_counter!(
        SINK_RECORDS_SENT_TOTAL,
        "Total number of records in batches the sink fully accepted"
    );
    describe_counter!(
        SINK_FAILED_ITEMS_TOTAL,
        "Total number of individual items the sink reported as failed"
    );
    describe_histogram!(
        SINK_REQUEST_DURATION_SECONDS,
        "Time to execute a single bulk request in seconds"
    );

    // Daemon
    describe_counter!(
        DAEMON_INPUT_LINES_TOTAL,
        "Total number of input lines read by the daemon"
    );
    describe_counter!(
        DAEMON_INPUT_ERRORS_TOTAL,
        "Total number of input lines that could not be turned into records"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        DISPATCH_RECORDS_ACCEPTED_TOTAL,
        DISPATCH_RECORDS_DROPPED_TOTAL,
        DISPATCH_BATCHES_SEALED_TOTAL,
        DISPATCH_BATCHES_DROPPED_TOTAL,
        DISPATCH_QUEUE_DEPTH,
        DISPATCH_BATCHES_ABANDONED_TOTAL,
        SINK_BATCHES_TOTAL,
        SINK_RECORDS_SENT_TOTAL,
        SINK_FAILED_ITEMS_TOTAL,
        SINK_REQUEST_DURATION_SECONDS,
        DAEMON_INPUT_LINES_TOTAL,
        DAEMON_INPUT_ERRORS_TOTAL,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_bulkpost_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("bulkpost_"),
                "Metric '{}' does not start with 'bulkpost_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            DISPATCH_RECORDS_ACCEPTED_TOTAL,
            DISPATCH_RECORDS_DROPPED_TOTAL,
            SINK_BATCHES_TOTAL,
            SINK_FAILED_ITEMS_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "counter '{name}' lacks _total suffix");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않은 상태에서도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_PROCESSOR, LABEL_OUTCOME] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn sink_duration_buckets_are_sorted() {
        let buckets = SINK_REQUEST_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
