//! Elasticsearch sink 에러 타입
//!
//! [`ElasticError`]는 sink를 구성할 때 발생하는 에러입니다.
//! 요청 단위 실패는 [`TransportError`](bulkpost_core::sink::TransportError)로 보고됩니다.

use bulkpost_core::error::{BulkpostError, ConfigError};

/// Elasticsearch sink 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ElasticError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 서버 URL 형식 오류
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl {
        /// 입력된 URL
        url: String,
        /// 에러 사유
        reason: String,
    },

    /// HTTP 클라이언트 생성 실패
    #[error("http client error: {0}")]
    Client(String),

    /// 요청 본문 직렬화 실패
    #[error("request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ElasticError> for BulkpostError {
    fn from(err: ElasticError) -> Self {
        match err {
            ElasticError::Config { field, reason } => {
                BulkpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            ElasticError::InvalidUrl { url, reason } => {
                BulkpostError::Config(ConfigError::InvalidValue {
                    field: "sink.servers".to_owned(),
                    reason: format!("'{url}': {reason}"),
                })
            }
            other => BulkpostError::Sink(other.to_string()),
        }
    }
}
