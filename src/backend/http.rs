//! `HttpBackend`: reqwest client for the backend routes.
//!
//! All connection details come from [`BackendConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use crate::bus::FieldMap;
use crate::config::{BackendConfig, ChatFlow, EndpointConfig};

use super::service::{BackendError, ChatBackend, GrievanceSink, Transcriber};
use super::types::{
    AudioUnit, InitResponse, SubmitResponse, TranscriptResponse, TurnRequest, TurnResponse,
};

/// Talks to the backend over HTTP.  Implements all three collaborator
/// traits.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointConfig,
}

impl HttpBackend {
    /// Build an `HttpBackend` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs` (`0` disables it).  Falls back to a default
    /// client if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Url::parse(&config.base_url).map_err(|e| BackendError::Url(e.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(std::time::Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            endpoints: config.endpoints.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let joined = join_url(&self.base_url, path);
        Url::parse(&joined).map_err(|e| BackendError::Url(format!("{joined}: {e}")))
    }

    /// Send `request` and decode a success body as `T`.
    ///
    /// Non-success statuses become [`BackendError::Status`], carrying the
    /// body's `error` or `detail` text when it has one.
    async fn exchange<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .or_else(|| body.get("detail"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn init_chat(&self, flow: ChatFlow) -> Result<InitResponse, BackendError> {
        let path = match flow {
            ChatFlow::Grievance => &self.endpoints.init_grievance,
            ChatFlow::Scheme => &self.endpoints.init_scheme,
        };
        let url = self.endpoint(path)?;
        log::debug!("backend: POST {url}");
        self.exchange(self.client.post(url)).await
    }

    async fn send_message(&self, request: &TurnRequest) -> Result<TurnResponse, BackendError> {
        let url = self.endpoint(&self.endpoints.send_message)?;
        log::debug!("backend: POST {url} (language={})", request.language);
        self.exchange(self.client.post(url).json(request)).await
    }
}

#[async_trait]
impl Transcriber for HttpBackend {
    async fn transcribe(&self, audio: &AudioUnit, language: &str) -> Result<String, BackendError> {
        let url = self.endpoint(&self.endpoints.transcribe)?;

        let part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name())
            .mime_str(&audio.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .part("audio_file", part)
            .text("language", language.to_string());

        log::debug!(
            "backend: POST {url} ({} bytes, {})",
            audio.bytes.len(),
            audio.mime_type
        );
        let body: TranscriptResponse = self.exchange(self.client.post(url).multipart(form)).await?;

        match (body.transcript, body.error) {
            (Some(text), _) if !text.trim().is_empty() => Ok(text),
            (_, Some(error)) => Err(BackendError::Service(error)),
            _ => Ok(String::new()),
        }
    }
}

#[async_trait]
impl GrievanceSink for HttpBackend {
    async fn submit_grievance(&self, form: &FieldMap) -> Result<Option<String>, BackendError> {
        let url = self.endpoint(&self.endpoints.submit_grievance)?;
        log::debug!("backend: POST {url} ({} fields)", form.len());
        let body: SubmitResponse = self.exchange(self.client.post(url).json(form)).await?;

        match body.error {
            Some(error) => Err(BackendError::Service(error)),
            None => Ok(body.message),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
