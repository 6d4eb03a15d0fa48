//! Sink trait: 배치를 원격 수집 엔드포인트로 전송하는 외부 협력자
//!
//! 파이프라인은 sink 구현을 여러 워커 태스크에서 동시에 호출합니다.
//! 구현체는 `Send + Sync`여야 하며 호출 간 내부 상태를 직접 보호해야 합니다.
//!
//! # 구현 예시
//! ```ignore
//! struct NullSink;
//!
//! impl Sink for NullSink {
//!     async fn execute(&self, _batch: &Batch) -> Result<SinkResponse, TransportError> {
//!         Ok(SinkResponse::success())
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Batch;

/// 배치 전송 trait
///
/// 전송 자체가 실패한 경우(I/O, 타임아웃, 응답 해석 불가)에는
/// [`TransportError`]를, 요청은 처리되었으나 일부 항목이 거부된 경우에는
/// `succeeded == false`인 [`SinkResponse`]를 반환합니다.
pub trait Sink: Send + Sync + 'static {
    /// 배치 하나를 전송합니다.
    fn execute(
        &self,
        batch: &Batch,
    ) -> impl Future<Output = Result<SinkResponse, TransportError>> + Send;
}

impl<S: Sink> Sink for Arc<S> {
    fn execute(
        &self,
        batch: &Batch,
    ) -> impl Future<Output = Result<SinkResponse, TransportError>> + Send {
        (**self).execute(batch)
    }
}

/// 개별 항목 실패 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// 항목 식별자 (수신 측이 부여한 ID 포함)
    pub id: String,
    /// 실패 사유
    pub reason: String,
}

impl FailedItem {
    /// 새 실패 항목을 생성합니다.
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Sink 응답
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkResponse {
    /// 배치 전체 성공 여부
    pub succeeded: bool,
    /// 요청 수준 에러 메시지
    pub error_message: Option<String>,
    /// 실패한 항목 목록
    pub failed_items: Vec<FailedItem>,
}

impl SinkResponse {
    /// 전체 성공 응답
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error_message: None,
            failed_items: Vec::new(),
        }
    }

    /// 일부 항목이 실패한 응답
    pub fn partial(error_message: impl Into<String>, failed_items: Vec<FailedItem>) -> Self {
        Self {
            succeeded: false,
            error_message: Some(error_message.into()),
            failed_items,
        }
    }
}

/// 전송 계층 실패
///
/// 배치는 재시도되지 않으며 이 에러를 받은 배치는 그대로 소멸합니다.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 요청 시간 초과
    #[error("request timed out: {0}")]
    Timeout(String),

    /// 응답을 해석할 수 없음
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
