//! Elasticsearch `_bulk` HTTP sink
//!
//! 배치 하나를 `_bulk` 요청 하나로 전송합니다. 서버가 여러 개이면 요청마다
//! 순서대로 돌아가며 사용합니다. 재시도는 하지 않습니다.

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use bulkpost_core::sink::{Sink, SinkResponse, TransportError};
use bulkpost_core::types::Batch;

use crate::bulk::{BulkRequestBody, bulk_url};
use crate::config::ElasticConfig;
use crate::error::ElasticError;
use crate::response::interpret;

const NDJSON: &str = "application/x-ndjson";

/// Elasticsearch `_bulk` sink
pub struct ElasticSink {
    client: reqwest::Client,
    servers: Vec<String>,
    next_server: AtomicUsize,
    credentials: Option<(String, String)>,
}

impl ElasticSink {
    /// 설정을 검증하고 HTTP 클라이언트를 생성합니다.
    pub fn new(config: ElasticConfig) -> Result<Self, ElasticError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ElasticError::Client(e.to_string()))?;

        let credentials = config.username.zip(config.password);
        Ok(Self {
            client,
            servers: config.servers,
            next_server: AtomicUsize::new(0),
            credentials,
        })
    }

    /// 다음 요청에 사용할 서버 주소
    fn next_server(&self) -> &str {
        let i = self.next_server.fetch_add(1, Ordering::Relaxed) % self.servers.len();
        &self.servers[i]
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

impl Sink for ElasticSink {
    async fn execute(&self, batch: &Batch) -> Result<SinkResponse, TransportError> {
        let body = BulkRequestBody::from_batch(batch)
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        let url = bulk_url(self.next_server(), batch.target())
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        debug!(%url, batch_id = %batch.id(), records = body.records(), bytes = body.len(), "sending bulk request");

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, NDJSON)
            .body(body.into_bytes());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_error)?;
        interpret(status, &bytes)
    }
}
