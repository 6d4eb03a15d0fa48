//! # bulkpost-elastic
//!
//! 배치를 Elasticsearch `_bulk` API로 전송하는 [`Sink`](bulkpost_core::sink::Sink) 구현입니다.
//!
//! - [`bulk`]: NDJSON 요청 본문과 URL 생성
//! - [`response`]: 응답 해석 (빠른 성공 판정, 항목별 실패 추출)
//! - [`sink`]: reqwest 기반 HTTP 전송

pub mod bulk;
pub mod config;
pub mod error;
pub mod response;
pub mod sink;

pub use bulk::BulkRequestBody;
pub use config::ElasticConfig;
pub use error::ElasticError;
pub use sink::ElasticSink;
