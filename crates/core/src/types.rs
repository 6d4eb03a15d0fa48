//! 도메인 타입: 레코드, 라우팅 키, 배치
//!
//! [`Record`]는 생성 이후 변경되지 않으며, 누산기에 넘겨지는 순간 소유권이
//! [`Batch`]로 이동합니다. 배치는 봉인(큐에 넘겨짐)되는 시점부터 값으로만
//! 이동하므로 더 이상 레코드가 추가되지 않습니다.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 배치의 전송 대상
///
/// 한 배치에 담긴 레코드는 모두 같은 대상을 가집니다.
/// 레코드별 명시적 식별자는 대상에 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingKey {
    /// 대상 컬렉션(인덱스) 이름
    pub index: String,
    /// 하위 타입 또는 파티션
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// 수집 측 변환 파이프라인 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}

impl RoutingKey {
    /// 인덱스만 지정한 라우팅 키를 생성합니다.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
            pipeline: None,
        }
    }

    /// 하위 타입을 지정합니다.
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// 변환 파이프라인을 지정합니다.
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)?;
        if let Some(doc_type) = &self.doc_type {
            write!(f, "/{doc_type}")?;
        }
        if let Some(pipeline) = &self.pipeline {
            write!(f, "@{pipeline}")?;
        }
        Ok(())
    }
}

/// 전송할 단일 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 전송 대상
    pub target: RoutingKey,
    /// 명시적 문서 식별자 (없으면 수신 측이 생성)
    pub id: Option<String>,
    /// 이미 포맷된 페이로드
    pub payload: Bytes,
}

impl Record {
    /// 새 레코드를 생성합니다.
    pub fn new(target: RoutingKey, payload: impl Into<Bytes>) -> Self {
        Self {
            target,
            id: None,
            payload: payload.into(),
        }
    }

    /// 명시적 식별자를 지정합니다.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// 같은 대상으로 향하는 레코드의 순서 있는 묶음
///
/// 레코드는 추가된 순서 그대로 보존됩니다.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    target: RoutingKey,
    records: Vec<Record>,
}

impl Batch {
    /// 빈 배치를 생성합니다.
    pub fn new(target: RoutingKey) -> Self {
        Self::with_capacity(target, 0)
    }

    /// 용량을 미리 확보한 빈 배치를 생성합니다.
    pub fn with_capacity(target: RoutingKey, capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            records: Vec::with_capacity(capacity),
        }
    }

    /// 로그 상관관계용 배치 ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 배치의 전송 대상
    pub fn target(&self) -> &RoutingKey {
        &self.target
    }

    /// 담긴 레코드 (추가 순서)
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 레코드를 추가하고 추가 후 레코드 수를 반환합니다.
    ///
    /// 대상이 다른 레코드는 거부되어 그대로 돌려받습니다.
    pub fn push(&mut self, record: Record) -> Result<usize, Record> {
        if record.target != self.target {
            return Err(record);
        }
        self.records.push(record);
        Ok(self.records.len())
    }

    /// 배치를 분해하여 레코드를 돌려받습니다.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
