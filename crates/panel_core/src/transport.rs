//! HTTP adapter for the records backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::RecordId,
    error::{ApiError, ApiException, ErrorCode},
    protocol::{CodeListQuery, HsCodeData, HsCodeRecord},
};
use url::Url;

use crate::{detail_url, RecordTransport, CODE_URL};

pub struct HttpRecordTransport {
    http: Client,
    base: Url,
}

impl HttpRecordTransport {
    pub fn new(server_url: &str) -> Result<Self> {
        let base = Url::parse(server_url)
            .with_context(|| format!("invalid server url: {server_url}"))?;
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    /// Record paths are absolute; graft them under the base URL so a host
    /// mounted behind a path prefix keeps its prefix.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }
}

fn fallback_code(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

/// Decode a non-2xx response into the backend's typed error payload,
/// falling back to the bare status when the body carries no payload.
async fn into_api_result(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let exception = match serde_json::from_str::<ApiError>(&body) {
        Ok(error) => ApiException::new(error.code, error.message),
        Err(_) => ApiException::new(
            fallback_code(status),
            format!("request failed with status {status}"),
        ),
    };
    Err(exception.into())
}

#[async_trait]
impl RecordTransport for HttpRecordTransport {
    async fn list(&self, query: &CodeListQuery) -> Result<Vec<HsCodeRecord>> {
        let response = self
            .http
            .get(self.endpoint(CODE_URL))
            .query(query)
            .send()
            .await?;
        let records = into_api_result(response).await?.json().await?;
        Ok(records)
    }

    async fn create(&self, data: &HsCodeData) -> Result<HsCodeRecord> {
        let response = self
            .http
            .post(self.endpoint(CODE_URL))
            .json(data)
            .send()
            .await?;
        let record = into_api_result(response).await?.json().await?;
        Ok(record)
    }

    async fn update(&self, pk: RecordId, data: &HsCodeData) -> Result<HsCodeRecord> {
        let response = self
            .http
            .patch(self.endpoint(&detail_url(pk)))
            .json(data)
            .send()
            .await?;
        let record = into_api_result(response).await?.json().await?;
        Ok(record)
    }

    async fn delete(&self, pk: RecordId) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&detail_url(pk)))
            .send()
            .await?;
        into_api_result(response).await?;
        Ok(())
    }
}
