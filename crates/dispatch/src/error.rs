//! 배치 전송 파이프라인 에러 타입
//!
//! [`DispatchError`]는 파이프라인을 구성하거나 생명주기를 조작할 때 발생하는 에러입니다.
//! 레코드 전송 중의 실패(큐 드롭, 전송 실패, 항목 실패)는 여기에 포함되지 않으며
//! 로그와 메트릭으로만 보고됩니다.
//! `From<DispatchError> for BulkpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use bulkpost_core::error::{BulkpostError, ConfigError, PipelineError};

use crate::lifecycle::LifecycleState;

/// 배치 전송 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 현재 상태에서 허용되지 않는 생명주기 조작
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// 시도한 조작 (start, await_termination 등)
        operation: &'static str,
        /// 당시 상태
        state: LifecycleState,
    },
}

impl From<DispatchError> for BulkpostError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Config { field, reason } => {
                BulkpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            DispatchError::InvalidState {
                state: LifecycleState::Running,
                ..
            } => BulkpostError::Pipeline(PipelineError::AlreadyRunning),
            DispatchError::InvalidState { .. } => {
                BulkpostError::Pipeline(PipelineError::NotRunning)
            }
        }
    }
}
