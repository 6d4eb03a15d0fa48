//! 에러 타입: 도메인별 에러 정의
//!
//! 전송 단계의 실패(큐 드롭, 전송 실패, 부분 실패)는 에러로 전파되지 않고
//! 로그와 메트릭으로만 드러납니다. 여기의 타입은 설정 로딩, 생명주기 조작처럼
//! 호출자가 직접 처리해야 하는 에러만 다룹니다.

/// bulkpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum BulkpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Sink 구성 에러
    #[error("sink error: {0}")]
    Sink(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,
}
