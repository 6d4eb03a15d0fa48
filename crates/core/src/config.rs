//! 설정 관리: bulkpost.toml 파싱 및 런타임 설정
//!
//! [`BulkpostConfig`]는 모든 구성요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`BULKPOST_DISPATCH_CONCURRENCY=4` 형식)
//! 3. 설정 파일 (`bulkpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), bulkpost_core::error::BulkpostError> {
//! use bulkpost_core::config::BulkpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = BulkpostConfig::load("bulkpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = BulkpostConfig::parse("[dispatch]\nflush_limit = 500")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BulkpostError, ConfigError};

/// 지원하는 sink 종류
pub const SINK_KINDS: &[&str] = &["elasticsearch", "stdout"];

/// bulkpost 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 배치 전송 파이프라인 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Sink 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl BulkpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, BulkpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, BulkpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BulkpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                BulkpostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, BulkpostError> {
        toml::from_str(toml_str).map_err(|e| {
            BulkpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `BULKPOST_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "BULKPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "BULKPOST_GENERAL_LOG_FORMAT");

        // Dispatch
        override_string(&mut self.dispatch.name, "BULKPOST_DISPATCH_NAME");
        override_usize(
            &mut self.dispatch.flush_limit,
            "BULKPOST_DISPATCH_FLUSH_LIMIT",
        );
        override_usize(
            &mut self.dispatch.concurrency,
            "BULKPOST_DISPATCH_CONCURRENCY",
        );
        override_usize(
            &mut self.dispatch.queue_capacity_multiplier,
            "BULKPOST_DISPATCH_QUEUE_CAPACITY_MULTIPLIER",
        );
        override_u64(
            &mut self.dispatch.enqueue_timeout_ms,
            "BULKPOST_DISPATCH_ENQUEUE_TIMEOUT_MS",
        );
        override_u64(
            &mut self.dispatch.poll_interval_ms,
            "BULKPOST_DISPATCH_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.dispatch.shutdown_timeout_ms,
            "BULKPOST_DISPATCH_SHUTDOWN_TIMEOUT_MS",
        );
        override_u64(
            &mut self.dispatch.idle_flush_ms,
            "BULKPOST_DISPATCH_IDLE_FLUSH_MS",
        );
        override_string(
            &mut self.dispatch.default_index,
            "BULKPOST_DISPATCH_DEFAULT_INDEX",
        );

        // Sink
        override_string(&mut self.sink.kind, "BULKPOST_SINK_KIND");
        override_csv(&mut self.sink.servers, "BULKPOST_SINK_SERVERS");
        override_u64(
            &mut self.sink.request_timeout_secs,
            "BULKPOST_SINK_REQUEST_TIMEOUT_SECS",
        );
        override_opt_string(&mut self.sink.username, "BULKPOST_SINK_USERNAME");
        override_opt_string(&mut self.sink.password, "BULKPOST_SINK_PASSWORD");

        // Metrics
        override_bool(&mut self.metrics.enabled, "BULKPOST_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "BULKPOST_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "BULKPOST_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), BulkpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.dispatch.validate()?;

        if !SINK_KINDS.contains(&self.sink.kind.as_str()) {
            return Err(invalid(
                "sink.kind",
                format!("must be one of: {}", SINK_KINDS.join(", ")),
            ));
        }

        if self.sink.kind == "elasticsearch" {
            if self.sink.servers.is_empty() || self.sink.servers.iter().any(|s| s.is_empty()) {
                return Err(invalid(
                    "sink.servers",
                    "at least one non-empty server url is required".to_owned(),
                ));
            }
            if self.sink.request_timeout_secs == 0 {
                return Err(invalid(
                    "sink.request_timeout_secs",
                    "must be greater than 0".to_owned(),
                ));
            }
            if self.sink.username.is_some() != self.sink.password.is_some() {
                return Err(invalid(
                    "sink.username",
                    "username and password must be set together".to_owned(),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> BulkpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 배치 전송 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 파이프라인 이름 (태스크 이름, 로그 필드에 사용)
    pub name: String,
    /// 배치당 레코드 수. 0이면 dry-run (모든 레코드를 버림)
    pub flush_limit: usize,
    /// 전송 워커 수
    pub concurrency: usize,
    /// 큐 용량 배수 (용량 = concurrency * 배수)
    pub queue_capacity_multiplier: usize,
    /// 큐 삽입 대기 한도 (밀리초)
    pub enqueue_timeout_ms: u64,
    /// 워커의 큐 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 종료 시 워커 대기 한도 (밀리초)
    pub shutdown_timeout_ms: u64,
    /// 입력이 이 시간 동안 없으면 현재 배치를 플러시 (밀리초)
    pub idle_flush_ms: u64,
    /// 입력 레코드에 인덱스가 없을 때 사용할 기본 인덱스
    pub default_index: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "bulkpost".to_owned(),
            flush_limit: 5000,
            concurrency: 1,
            queue_capacity_multiplier: 10,
            enqueue_timeout_ms: 100,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 10_000,
            idle_flush_ms: 1000,
            default_index: "bulkpost".to_owned(),
        }
    }
}

impl DispatchConfig {
    /// 파이프라인 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), BulkpostError> {
        const MAX_CONCURRENCY: usize = 1024;

        if self.name.is_empty() {
            return Err(invalid("dispatch.name", "must not be empty".to_owned()));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "dispatch.concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }
        if self.queue_capacity_multiplier == 0 {
            return Err(invalid(
                "dispatch.queue_capacity_multiplier",
                "must be at least 1".to_owned(),
            ));
        }
        if self
            .concurrency
            .checked_mul(self.queue_capacity_multiplier)
            .is_none()
        {
            return Err(invalid(
                "dispatch.queue_capacity_multiplier",
                "queue capacity overflows".to_owned(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid(
                "dispatch.poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.idle_flush_ms == 0 {
            return Err(invalid(
                "dispatch.idle_flush_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.default_index.is_empty() {
            return Err(invalid(
                "dispatch.default_index",
                "must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Sink 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// sink 종류 (elasticsearch, stdout)
    pub kind: String,
    /// 서버 URL 목록 (요청마다 라운드로빈)
    pub servers: Vec<String>,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// HTTP basic 인증 사용자
    pub username: Option<String>,
    /// HTTP basic 인증 비밀번호
    pub password: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: "elasticsearch".to_owned(),
            servers: vec!["http://localhost:9200".to_owned()],
            request_timeout_secs: 30,
            username: None,
            password: None,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
