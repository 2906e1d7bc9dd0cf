use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

/// An enriched transcript produced by the external indexing service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    /// Where the enriched transcript can be fetched.
    pub url: String,
}

#[async_trait]
pub trait TranscriptIndex: Send + Sync {
    /// Look up the enriched transcript for a provider call; `None` while still indexing.
    async fn find(&self, provider_call_id: &str) -> CoreResult<Option<TranscriptRecord>>;
}

pub struct HttpTranscriptIndex {
    client: reqwest::Client,
    api_base: String,
}

impl HttpTranscriptIndex {
    pub fn new(api_base: impl Into<String>) -> CoreResult<Self> {
        Ok(Self {
            client: super::http_client()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TranscriptIndex for HttpTranscriptIndex {
    async fn find(&self, provider_call_id: &str) -> CoreResult<Option<TranscriptRecord>> {
        let response = self
            .client
            .get(format!("{}/transcripts", self.api_base))
            .query(&[("call_id", provider_call_id)])
            .send()
            .await
            .map_err(|e| CoreError::Transcript(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::ACCEPTED => Ok(None),
            status if status.is_success() => {
                let record = response
                    .json::<TranscriptRecord>()
                    .await
                    .map_err(|e| CoreError::Transcript(e.to_string()))?;
                Ok(Some(record))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CoreError::Transcript(format!("{status}: {body}")))
            }
        }
    }
}
