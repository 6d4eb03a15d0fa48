//! # bulkpost-dispatch
//!
//! 레코드를 배치로 모아 유한 큐를 거쳐 sink로 비동기 전송하는 파이프라인입니다.
//!
//! # 아키텍처
//! ```text
//! add_record() -> BatchAccumulator -> BoundedDispatchQueue -> SenderWorkerPool -> Sink
//!                      |                     |                      |
//!                 seal on limit /      full + timeout:        classify result,
//!                 target change /      drop + DropCounter     staged logging
//!                 flush()
//! ```
//!
//! 생산자는 큐가 가득 차도 `enqueue_timeout` 이상 기다리지 않으며,
//! 넘치는 배치는 버리고 드롭 수를 기록합니다.
//!
//! # 사용 예시
//! ```ignore
//! use bulkpost_dispatch::{BulkProcessorBuilder, ProcessorConfig};
//!
//! let processor = BulkProcessorBuilder::new()
//!     .config(ProcessorConfig::default())
//!     .sink(sink)
//!     .build()?;
//! processor.start().await?;
//! ```

pub mod accumulator;
pub mod classify;
pub mod config;
pub mod drop_counter;
pub mod error;
pub mod lifecycle;
pub mod processor;
pub mod queue;
pub mod staged;
pub mod worker;

pub use accumulator::BatchAccumulator;
pub use classify::{Outcome, classify};
pub use config::{ProcessorConfig, ProcessorConfigBuilder};
pub use drop_counter::DropCounter;
pub use error::DispatchError;
pub use lifecycle::{LifecycleController, LifecycleState, TerminationReport};
pub use processor::{BulkProcessor, BulkProcessorBuilder};
pub use queue::{BoundedDispatchQueue, EnqueueStreak, Offer};
pub use worker::{SenderWorkerPool, WorkerStats};
