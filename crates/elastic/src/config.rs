//! Elasticsearch sink 설정
//!
//! core의 [`SinkConfig`](bulkpost_core::config::SinkConfig)에서 파생됩니다.

use std::time::Duration;

use crate::error::ElasticError;

/// Elasticsearch sink 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfig {
    /// 서버 주소 목록 (요청마다 순환)
    pub servers: Vec<String>,
    /// 요청 타임아웃
    pub request_timeout: Duration,
    /// basic auth 사용자
    pub username: Option<String>,
    /// basic auth 비밀번호
    pub password: Option<String>,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            servers: vec!["http://localhost:9200".to_owned()],
            request_timeout: Duration::from_secs(30),
            username: None,
            password: None,
        }
    }
}

impl ElasticConfig {
    /// core의 `SinkConfig`에서 sink 설정을 생성합니다.
    pub fn from_core(core: &bulkpost_core::config::SinkConfig) -> Self {
        Self {
            servers: core.servers.clone(),
            request_timeout: Duration::from_secs(core.request_timeout_secs),
            username: core.username.clone(),
            password: core.password.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ElasticError> {
        if self.servers.is_empty() {
            return Err(ElasticError::Config {
                field: "servers".to_owned(),
                reason: "at least one server is required".to_owned(),
            });
        }

        for url in &self.servers {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ElasticError::InvalidUrl {
                    url: url.clone(),
                    reason: "scheme must be http or https".to_owned(),
                });
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ElasticError::Config {
                field: "request_timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(ElasticError::Config {
                field: "username".to_owned(),
                reason: "username and password must be set together".to_owned(),
            });
        }

        Ok(())
    }
}
