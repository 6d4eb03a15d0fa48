//! `_bulk` 요청 본문 생성
//!
//! 레코드마다 action 줄과 페이로드 줄을 하나씩 쓰는 NDJSON 형식입니다.
//!
//! ```text
//! {"index":{"_index":"logs","_type":"_doc","_id":"1"}}
//! {"message":"hello"}
//! {"index":{"_index":"logs"}}
//! {"message":"world"}
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use reqwest::Url;
use serde::Serialize;

use bulkpost_core::types::{Batch, Record, RoutingKey};

use crate::error::ElasticError;

#[derive(Serialize)]
struct IndexAction<'a> {
    index: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<&'a str>,
}

impl<'a> IndexAction<'a> {
    fn new(target: &'a RoutingKey, record: &'a Record) -> Self {
        Self {
            index: ActionMeta {
                index: &target.index,
                doc_type: target.doc_type.as_deref(),
                id: record.id.as_deref(),
                pipeline: target.pipeline.as_deref(),
            },
        }
    }
}

/// 직렬화된 `_bulk` 요청 본문
#[derive(Debug, Clone)]
pub struct BulkRequestBody {
    body: Bytes,
    records: usize,
}

impl BulkRequestBody {
    /// 배치 하나를 NDJSON 본문으로 직렬화합니다.
    ///
    /// 페이로드는 끝의 개행 하나를 제외하고 그대로 씁니다.
    pub fn from_batch(batch: &Batch) -> Result<Self, ElasticError> {
        let target = batch.target();
        let estimated: usize = batch
            .records()
            .iter()
            .map(|r| r.payload.len() + 64)
            .sum();
        let mut buf = BytesMut::with_capacity(estimated);

        for record in batch.records() {
            serde_json::to_writer((&mut buf).writer(), &IndexAction::new(target, record))?;
            buf.put_u8(b'\n');
            let payload = record.payload.strip_suffix(b"\n").unwrap_or(&record.payload[..]);
            buf.put_slice(payload);
            buf.put_u8(b'\n');
        }

        Ok(Self {
            body: buf.freeze(),
            records: batch.len(),
        })
    }

    /// 본문에 담긴 레코드 수
    pub fn records(&self) -> usize {
        self.records
    }

    /// 본문 바이트 수
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// 본문을 꺼냅니다.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

/// 서버 주소와 배치 대상으로 요청 URL을 만듭니다.
///
/// 파이프라인 이름은 쿼리 문자열로 인코딩됩니다.
pub fn bulk_url(server: &str, target: &RoutingKey) -> Result<Url, ElasticError> {
    let base = server.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/_bulk")).map_err(|e| ElasticError::InvalidUrl {
        url: server.to_owned(),
        reason: e.to_string(),
    })?;
    if let Some(pipeline) = &target.pipeline {
        url.query_pairs_mut().append_pair("pipeline", pipeline);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_text(batch: &Batch) -> String {
        let body = BulkRequestBody::from_batch(batch).unwrap();
        String::from_utf8(body.into_bytes().to_vec()).unwrap()
    }

    #[test]
    fn minimal_action_lines() {
        let target = RoutingKey::new("logs");
        let mut batch = Batch::new(target.clone());
        batch.push(Record::new(target.clone(), r#"{"m":1}"#)).unwrap();
        batch.push(Record::new(target, r#"{"m":2}"#)).unwrap();

        assert_eq!(
            body_text(&batch),
            "{\"index\":{\"_index\":\"logs\"}}\n{\"m\":1}\n{\"index\":{\"_index\":\"logs\"}}\n{\"m\":2}\n"
        );
    }

    #[test]
    fn full_action_line() {
        let target = RoutingKey::new("logs").with_doc_type("_doc").with_pipeline("geoip");
        let mut batch = Batch::new(target.clone());
        batch
            .push(Record::new(target, r#"{"m":1}"#).with_id("abc"))
            .unwrap();

        let text = body_text(&batch);
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            r#"{"index":{"_index":"logs","_type":"_doc","_id":"abc","pipeline":"geoip"}}"#
        );
    }

    #[test]
    fn trailing_newline_in_payload_is_trimmed_once() {
        let target = RoutingKey::new("logs");
        let mut batch = Batch::new(target.clone());
        batch.push(Record::new(target, "{\"m\":1}\n")).unwrap();
        let body = BulkRequestBody::from_batch(&batch).unwrap();
        assert_eq!(body.records(), 1);
        assert!(body_text(&batch).ends_with("{\"m\":1}\n"));
        assert!(!body_text(&batch).ends_with("\n\n"));
    }

    #[test]
    fn ids_are_json_escaped() {
        let target = RoutingKey::new("logs");
        let mut batch = Batch::new(target.clone());
        batch
            .push(Record::new(target, "{}").with_id("a\"b"))
            .unwrap();
        assert!(body_text(&batch).starts_with(r#"{"index":{"_index":"logs","_id":"a\"b"}}"#));
    }

    #[test]
    fn url_with_and_without_pipeline() {
        assert_eq!(
            bulk_url("http://es:9200/", &RoutingKey::new("logs")).unwrap().as_str(),
            "http://es:9200/_bulk"
        );
        assert_eq!(
            bulk_url("http://es:9200", &RoutingKey::new("logs").with_pipeline("geoip"))
                .unwrap()
                .as_str(),
            "http://es:9200/_bulk?pipeline=geoip"
        );
    }

    #[test]
    fn pipeline_name_is_query_encoded() {
        let target = RoutingKey::new("logs").with_pipeline("geo ip&debug=true");
        let url = bulk_url("http://es:9200", &target).unwrap();
        assert_eq!(url.query(), Some("pipeline=geo+ip%26debug%3Dtrue"));

        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "pipeline");
        assert_eq!(pairs[0].1, "geo ip&debug=true");
    }

    #[test]
    fn unparsable_server_is_rejected() {
        let result = bulk_url("not a url", &RoutingKey::new("logs"));
        assert!(matches!(result, Err(ElasticError::InvalidUrl { .. })));
    }
}
