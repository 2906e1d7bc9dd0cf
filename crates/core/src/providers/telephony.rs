use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use wellcall_types::PhoneNumber;

/// Parameters for originating an outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginateRequest {
    pub to: PhoneNumber,
    /// Call-control document URL fetched when the call is answered.
    pub answer_url: String,
    pub status_callback_url: String,
    pub recording_callback_url: String,
    pub record: bool,
    pub detect_answering_machine: bool,
}

#[async_trait]
pub trait Telephony: Send + Sync {
    /// Ask the provider to originate a call; returns the provider call identifier.
    async fn originate(&self, request: OriginateRequest) -> CoreResult<String>;
}

/// Telephony provider reached over its REST API with account basic auth.
pub struct HttpTelephony {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: PhoneNumber,
}

#[derive(Deserialize)]
struct CreatedCall {
    sid: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

impl HttpTelephony {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: PhoneNumber,
    ) -> CoreResult<Self> {
        Ok(Self {
            client: super::http_client()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from,
        })
    }

    fn form(&self, request: &OriginateRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("To", request.to.to_string()),
            ("From", self.from.to_string()),
            ("Url", request.answer_url.clone()),
            ("Method", "POST".to_string()),
            ("StatusCallback", request.status_callback_url.clone()),
            ("StatusCallbackMethod", "POST".to_string()),
        ];
        if request.record {
            form.push(("Record", "true".to_string()));
            form.push((
                "RecordingStatusCallback",
                request.recording_callback_url.clone(),
            ));
        }
        if request.detect_answering_machine {
            form.push(("MachineDetection", "Enable".to_string()));
        }
        form
    }
}

#[async_trait]
impl Telephony for HttpTelephony {
    async fn originate(&self, request: OriginateRequest) -> CoreResult<String> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base, self.account_sid
        );
        debug!(to = %request.to, "originating outbound call");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(&request))
            .send()
            .await
            .map_err(|e| CoreError::Telephony(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .ok()
                .and_then(|b| match (b.code, b.message) {
                    (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                    (None, Some(message)) => Some(message),
                    _ => None,
                })
                .unwrap_or(body);
            return Err(CoreError::Telephony(format!("{status}: {message}")));
        }

        let created: CreatedCall = response
            .json()
            .await
            .map_err(|e| CoreError::Telephony(e.to_string()))?;
        Ok(created.sid)
    }
}
