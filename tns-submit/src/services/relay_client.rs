//! Relay message hub client
//!
//! The relay forwards messages to the registry on our behalf and answers
//! with the references it created, including the registry object name.

use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{HttpTimeouts, RelaySettings};
use crate::error::{SubmissionError, SubmissionResult};
use crate::models::UploadedFile;

/// Reference source naming the registry object
pub const REGISTRY_OBJECT_SOURCE: &str = "tns_object";

const SUBMIT_PATH: &str = "api/v0/submit_message/";

/// Registry name from a relay response (`data.references[].citation`)
pub fn extract_registry_name(response: &Value) -> Option<String> {
    response
        .get("data")?
        .get("references")?
        .as_array()?
        .iter()
        .find(|r| r.get("source").and_then(Value::as_str) == Some(REGISTRY_OBJECT_SOURCE))
        .and_then(|r| r.get("citation"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Relay API client
pub struct RelayClient {
    http_client: reqwest::Client,
    submit_url: Url,
    api_key: String,
}

impl RelayClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeouts: HttpTimeouts) -> SubmissionResult<Self> {
        let submit_url = Url::parse(base_url)
            .and_then(|base| base.join(SUBMIT_PATH))
            .map_err(|e| {
                SubmissionError::Configuration(format!("Invalid relay base URL '{}': {}", base_url, e))
            })?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()
            .map_err(|e| SubmissionError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            submit_url,
            api_key: api_key.into(),
        })
    }

    /// Build a client from relay settings; base URL and key must be present
    pub fn from_settings(settings: &RelaySettings, timeouts: HttpTimeouts) -> SubmissionResult<Self> {
        match (&settings.base_url, &settings.api_key) {
            (Some(base_url), Some(api_key)) => Self::new(base_url, api_key.clone(), timeouts),
            _ => Err(SubmissionError::Configuration(
                "Relay base_url and api_key are required for relay submission".to_string(),
            )),
        }
    }

    pub fn submit_url(&self) -> &Url {
        &self.submit_url
    }

    /// Send a message; returns the registry name if the relay reported one
    ///
    /// Without files the message is posted as JSON. With files it goes as
    /// multipart: a `data` field holding the JSON plus one `files` part each.
    pub async fn submit(&self, message: &Value, files: &[&UploadedFile]) -> SubmissionResult<Option<String>> {
        let request = self
            .http_client
            .post(self.submit_url.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.api_key));

        let request = if files.is_empty() {
            request.json(message)
        } else {
            let data = serde_json::to_string(message).map_err(|e| {
                SubmissionError::Validation(format!("Relay message is not serializable: {}", e))
            })?;
            let mut form = Form::new().text("data", data);
            for file in files {
                let part = Part::bytes(file.read_contents().await?)
                    .file_name(file.file_name())
                    .mime_str(file.content_type())?;
                form = form.part("files", part);
            }
            request.multipart(form)
        };

        tracing::debug!(files = files.len(), url = %self.submit_url, "Submitting message to relay");

        let response = request.send().await?;
        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        if !status.is_success() {
            let detail = body
                .map(|b| b.to_string())
                .unwrap_or_else(|| status.to_string());
            return Err(SubmissionError::Transport(format!(
                "Failed to submit message to relay: {}",
                detail
            )));
        }

        let body = body.unwrap_or(Value::Null);
        let uuid = body
            .get("uuid")
            .and_then(Value::as_str)
            .and_then(|u| Uuid::parse_str(u).ok());
        match uuid {
            Some(uuid) => tracing::info!(uuid = %uuid, "Relay accepted message"),
            None => tracing::info!("Relay accepted message without a uuid"),
        }

        Ok(extract_registry_name(&body))
    }
}
