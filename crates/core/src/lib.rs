//! bulkpost 공통 크레이트
//!
//! 배치 전송 파이프라인과 sink 구현, 데몬이 함께 사용하는 타입을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`types`]: 레코드, 라우팅 키, 배치
//! - [`sink`]: 배치를 실제로 전송하는 외부 협력자 trait과 응답 타입
//! - [`error`]: 도메인 에러 타입
//! - [`config`]: `bulkpost.toml` 파싱 및 런타임 설정
//! - [`metrics`]: 메트릭 이름 상수와 설명 등록

pub mod config;
pub mod error;
pub mod metrics;
pub mod sink;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{BulkpostError, ConfigError, PipelineError};

// 설정
pub use config::BulkpostConfig;

// Sink trait
pub use sink::{FailedItem, Sink, SinkResponse, TransportError};

// 도메인 타입
pub use types::{Batch, Record, RoutingKey};
