//! 배치 전송 파이프라인 설정
//!
//! [`ProcessorConfig`]는 core의 [`DispatchConfig`](bulkpost_core::config::DispatchConfig)를
//! 기반으로 파이프라인 내부에서 쓰는 값(큐 용량, 대기 시간)을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use bulkpost_core::config::BulkpostConfig;
//! use bulkpost_dispatch::config::ProcessorConfig;
//!
//! let core_config = BulkpostConfig::default();
//! let config = ProcessorConfig::from_core(&core_config.dispatch);
//! assert_eq!(config.queue_capacity(), 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// 워커 수 상한
const MAX_CONCURRENCY: usize = 1024;

/// 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// 로그와 메트릭 레이블에 쓰이는 파이프라인 이름
    pub name: String,
    /// 배치를 봉인하는 레코드 수 (0이면 dry-run: 레코드를 모두 버림)
    pub flush_limit: usize,
    /// 전송 워커 수
    pub concurrency: usize,
    /// 큐 용량 배수 (큐 용량 = concurrency × 배수)
    pub queue_capacity_multiplier: usize,
    /// 큐가 가득 찼을 때 빈 자리를 기다리는 시간 (밀리초)
    pub enqueue_timeout_ms: u64,
    /// 워커가 큐를 한 번 기다리는 시간 (밀리초)
    pub poll_interval_ms: u64,
    /// 종료 시 워커를 기다리는 기본 시간 (밀리초)
    pub shutdown_timeout_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: "bulkpost".to_owned(),
            flush_limit: 5000,
            concurrency: 1,
            queue_capacity_multiplier: 10,
            enqueue_timeout_ms: 100,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl ProcessorConfig {
    /// core의 `DispatchConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// `idle_flush_ms`, `default_index`는 입력 측(daemon) 설정이므로 포함하지 않습니다.
    pub fn from_core(core: &bulkpost_core::config::DispatchConfig) -> Self {
        Self {
            name: core.name.clone(),
            flush_limit: core.flush_limit,
            concurrency: core.concurrency,
            queue_capacity_multiplier: core.queue_capacity_multiplier,
            enqueue_timeout_ms: core.enqueue_timeout_ms,
            poll_interval_ms: core.poll_interval_ms,
            shutdown_timeout_ms: core.shutdown_timeout_ms,
        }
    }

    /// 큐 용량 (봉인된 배치 수 기준)
    pub fn queue_capacity(&self) -> usize {
        self.concurrency.saturating_mul(self.queue_capacity_multiplier)
    }

    /// dry-run 여부
    pub fn is_dry_run(&self) -> bool {
        self.flush_limit == 0
    }

    /// 큐 삽입 대기 시간
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// 워커 폴링 대기 시간
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 종료 대기 시간
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.name.is_empty() {
            return Err(DispatchError::Config {
                field: "name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(DispatchError::Config {
                field: "concurrency".to_owned(),
                reason: format!("must be 1-{}", MAX_CONCURRENCY),
            });
        }

        if self.queue_capacity_multiplier == 0 {
            return Err(DispatchError::Config {
                field: "queue_capacity_multiplier".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        // tokio 채널 용량 상한을 넘지 않도록 곱셈 오버플로우를 거부
        if self
            .concurrency
            .checked_mul(self.queue_capacity_multiplier)
            .is_none_or(|cap| cap > usize::MAX >> 3)
        {
            return Err(DispatchError::Config {
                field: "queue_capacity_multiplier".to_owned(),
                reason: "queue capacity overflows".to_owned(),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(DispatchError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인 이름을 설정합니다.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// 배치 봉인 기준 레코드 수를 설정합니다.
    pub fn flush_limit(mut self, limit: usize) -> Self {
        self.config.flush_limit = limit;
        self
    }

    /// 워커 수를 설정합니다.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.config.concurrency = workers;
        self
    }

    /// 큐 용량 배수를 설정합니다.
    pub fn queue_capacity_multiplier(mut self, multiplier: usize) -> Self {
        self.config.queue_capacity_multiplier = multiplier;
        self
    }

    /// 큐 삽입 대기 시간을 설정합니다.
    pub fn enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.config.enqueue_timeout_ms = duration_ms(timeout);
        self
    }

    /// 워커 폴링 대기 시간을 설정합니다.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = duration_ms(interval);
        self
    }

    /// 종료 대기 시간을 설정합니다.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = duration_ms(timeout);
        self
    }

    /// 설정을 검증하고 `ProcessorConfig`를 생성합니다.
    pub fn build(self) -> Result<ProcessorConfig, DispatchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
