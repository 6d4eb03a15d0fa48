//! `_bulk` 응답 해석
//!
//! 대부분의 응답은 성공이므로, 본문 앞부분만 보고 `"errors":false`를 확인하는
//! 빠른 경로를 먼저 시도합니다. 실패했을 때만 전체 JSON을 해석해
//! 항목별 실패를 꺼냅니다.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use bulkpost_core::sink::{FailedItem, SinkResponse, TransportError};

/// 빠른 성공 판정에 쓰는 본문 앞부분 길이
const HEAD_LEN: usize = 512;

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// 본문 앞부분만으로 전체 성공 여부를 판정합니다.
///
/// HTTP 200이고 앞부분에 `"errors":false`가 있으면 참입니다.
pub fn is_fast_success(status: u16, body: &[u8]) -> bool {
    if status != 200 {
        return false;
    }
    let head = &body[..body.len().min(HEAD_LEN)];
    head.windows(b"\"errors\":false".len())
        .any(|w| w == b"\"errors\":false")
}

/// HTTP 상태와 본문을 [`SinkResponse`]로 해석합니다.
///
/// - 2xx, `errors == false`: 성공
/// - 2xx, `errors == true`: 실패한 항목 목록과 함께 실패
/// - 2xx 이외이고 JSON 본문: 상태 줄을 에러 메시지로 하는 실패
/// - JSON이 아닌 본문: [`TransportError::InvalidResponse`]
pub fn interpret(status: u16, body: &[u8]) -> Result<SinkResponse, TransportError> {
    if is_fast_success(status, body) {
        return Ok(SinkResponse::success());
    }

    let parsed: BulkResponse = serde_json::from_slice(body).map_err(|e| {
        TransportError::InvalidResponse(format!(
            "HTTP {status}: undecodable bulk response ({e}): {}",
            snippet(body)
        ))
    })?;

    let failed_items = failed_items(&parsed.items);
    let ok_status = (200..300).contains(&status);

    if ok_status && !parsed.errors && failed_items.is_empty() {
        return Ok(SinkResponse::success());
    }

    let message = if ok_status {
        format!(
            "{} of {} bulk items failed",
            failed_items.len(),
            parsed.items.len()
        )
    } else {
        match &parsed.error {
            Some(err) => format!("HTTP {status}: {}", describe_error(err)),
            None => format!("HTTP {status}"),
        }
    };

    Ok(SinkResponse::partial(message, failed_items))
}

fn failed_items(items: &[HashMap<String, BulkItem>]) -> Vec<FailedItem> {
    items
        .iter()
        .flat_map(|entry| entry.values())
        .filter(|item| item.error.is_some() || item.status >= 300)
        .map(|item| {
            let id = item.id.clone().unwrap_or_else(|| "-".to_owned());
            let reason = match &item.error {
                Some(err) => describe_error(err),
                None => format!("status {}", item.status),
            };
            FailedItem::new(id, reason)
        })
        .collect()
}

/// `{"type":..,"reason":..}` 형식이면 `type: reason`, 아니면 원문
fn describe_error(err: &Value) -> String {
    match (err.get("type"), err.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{kind}: {reason}"),
        (_, Some(Value::String(reason))) => reason.clone(),
        _ => match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

fn snippet(body: &[u8]) -> String {
    let head = &body[..body.len().min(200)];
    String::from_utf8_lossy(head).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str = r#"{"took":30,"errors":false,"items":[{"index":{"_index":"logs","_id":"1","status":201}}]}"#;

    const PARTIAL_BODY: &str = r#"{
        "took": 5,
        "errors": true,
        "items": [
            {"index": {"_index": "logs", "_id": "1", "status": 201}},
            {"index": {"_index": "logs", "_id": "2", "status": 400,
                "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [ts]"}}},
            {"create": {"_index": "logs", "_id": "3", "status": 409,
                "error": {"type": "version_conflict_engine_exception", "reason": "document already exists"}}}
        ]
    }"#;

    #[test]
    fn fast_path_detects_success() {
        assert!(is_fast_success(200, OK_BODY.as_bytes()));
        assert!(!is_fast_success(201, OK_BODY.as_bytes()));
        assert!(!is_fast_success(200, PARTIAL_BODY.as_bytes()));
    }

    #[test]
    fn fast_path_only_reads_the_head() {
        let mut body = String::from(r#"{"took":1,"items":["#);
        body.push_str(&" ".repeat(HEAD_LEN));
        body.push_str(r#"],"errors":false}"#);
        assert!(!is_fast_success(200, body.as_bytes()));
        // 전체 해석으로는 성공
        assert!(interpret(200, body.as_bytes()).unwrap().succeeded);
    }

    #[test]
    fn partial_failure_lists_failed_items() {
        let resp = interpret(200, PARTIAL_BODY.as_bytes()).unwrap();
        assert!(!resp.succeeded);
        assert_eq!(resp.error_message.as_deref(), Some("2 of 3 bulk items failed"));
        assert_eq!(
            resp.failed_items,
            vec![
                FailedItem::new("2", "mapper_parsing_exception: failed to parse field [ts]"),
                FailedItem::new("3", "version_conflict_engine_exception: document already exists"),
            ]
        );
    }

    #[test]
    fn non_2xx_json_is_failure_without_items() {
        let body = r#"{"error":{"type":"index_not_found_exception","reason":"no such index [x]"},"status":404}"#;
        let resp = interpret(404, body.as_bytes()).unwrap();
        assert!(!resp.succeeded);
        assert!(resp.failed_items.is_empty());
        assert_eq!(
            resp.error_message.as_deref(),
            Some("HTTP 404: index_not_found_exception: no such index [x]")
        );
    }

    #[test]
    fn non_json_body_is_transport_error() {
        let err = interpret(502, b"<html>Bad Gateway</html>").unwrap_err();
        match err {
            TransportError::InvalidResponse(msg) => {
                assert!(msg.contains("HTTP 502"));
                assert!(msg.contains("Bad Gateway"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn item_without_id_or_error_object() {
        let body = r#"{"errors":true,"items":[{"index":{"status":429,"error":"rejected"}},{"index":{"status":503}}]}"#;
        let resp = interpret(200, body.as_bytes()).unwrap();
        assert_eq!(
            resp.failed_items,
            vec![FailedItem::new("-", "rejected"), FailedItem::new("-", "status 503")]
        );
    }
}
