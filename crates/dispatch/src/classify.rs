//! 전송 결과 분류
//!
//! sink 호출 결과를 세 가지로 나눕니다.
//!
//! - 전체 성공: 응답이 성공이고 실패 항목이 없음
//! - 부분 실패: 요청은 처리되었으나 응답이 실패를 보고함
//! - 전송 실패: sink 호출 자체가 에러로 끝남
//!
//! 어떤 경우에도 배치는 재시도되지 않습니다.

use std::fmt::Write as _;

use bulkpost_core::sink::{FailedItem, SinkResponse, TransportError};

/// 분류된 전송 결과
#[derive(Debug)]
pub enum Outcome {
    /// 배치 전체가 수락됨
    FullSuccess,
    /// 요청은 처리되었으나 실패가 보고됨
    PartialFailure {
        /// 요청 수준 에러 메시지
        message: Option<String>,
        /// 실패한 항목 (비어 있을 수 있음)
        items: Vec<FailedItem>,
    },
    /// 전송 자체가 실패함
    TransportFailure {
        /// 실패 원인
        cause: TransportError,
    },
}

impl Outcome {
    /// 메트릭 레이블 값
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullSuccess => "success",
            Self::PartialFailure { .. } => "partial",
            Self::TransportFailure { .. } => "transport",
        }
    }
}

/// sink 호출 결과를 분류합니다.
///
/// `succeeded`가 참이어도 실패 항목이 있으면 부분 실패로 봅니다.
pub fn classify(result: Result<SinkResponse, TransportError>) -> Outcome {
    match result {
        Err(cause) => Outcome::TransportFailure { cause },
        Ok(resp) if resp.succeeded && resp.failed_items.is_empty() => Outcome::FullSuccess,
        Ok(resp) => Outcome::PartialFailure {
            message: resp.error_message,
            items: resp.failed_items,
        },
    }
}

/// 실패 항목을 `id=reason` 형식의 줄 목록으로 만듭니다.
pub fn format_failed_items(items: &[FailedItem]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "{}={}", item.id, item.reason);
    }
    out
}
