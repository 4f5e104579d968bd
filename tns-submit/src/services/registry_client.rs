//! Registry bulk-report API client
//!
//! Four endpoints: reference values (GET, browser user agent), file upload,
//! bulk report and bulk report reply (POST, bot marker user agent). Every
//! POST carries the API key as a form field.

use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::{HttpTimeouts, RegistryCredentials, RegistrySettings};
use crate::error::{SubmissionError, SubmissionResult};
use crate::services::file_upload::UploadSlot;
use crate::services::reference_values::ValuesSource;
use crate::services::reply_poller::{PollDecision, PollPolicy, RegistryReply, ReplyPoller};

/// The values endpoint refuses non-browser user agents
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux i686; rv:110.0) Gecko/20100101 Firefox/110.0.";

/// Registry API client
pub struct RegistryClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Option<RegistryCredentials>,
    poll_policy: PollPolicy,
}

impl RegistryClient {
    /// Build a client; credentials may be absent when only values are needed
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<RegistryCredentials>,
        timeouts: HttpTimeouts,
        poll_policy: PollPolicy,
    ) -> SubmissionResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()
            .map_err(|e| SubmissionError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        let base_url: String = base_url.into();
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            poll_policy,
        })
    }

    pub fn from_settings(settings: &RegistrySettings, poll_policy: PollPolicy) -> SubmissionResult<Self> {
        Self::new(
            settings.base_url.clone(),
            settings.credentials().ok(),
            settings.timeouts,
            poll_policy,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `api/values/` resolved against the base URL with URL-join rules
    ///
    /// A base without a trailing slash loses its last path segment, so
    /// `https://host/api` resolves to `https://host/api/values/`.
    pub fn values_url(&self) -> SubmissionResult<Url> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            SubmissionError::Configuration(format!("Invalid registry base URL '{}': {}", self.base_url, e))
        })?;
        base.join("api/values/").map_err(|e| {
            SubmissionError::Configuration(format!("Invalid registry values URL: {}", e))
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn credentials(&self) -> SubmissionResult<&RegistryCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            SubmissionError::Configuration(
                "Registry credentials (api_key, bot_id, bot_name) are not configured".to_string(),
            )
        })
    }

    /// Fetch the raw `data` object of the values endpoint
    pub async fn fetch_values(&self) -> SubmissionResult<Map<String, Value>> {
        let url = self.values_url()?;
        tracing::debug!(url = %url, "Fetching registry reference values");

        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Transport(format!(
                "Values request failed with status {}",
                status
            )));
        }

        let body: Value = response.json().await?;
        match body.get("data") {
            Some(Value::Object(data)) => Ok(data.clone()),
            _ => Err(SubmissionError::Transport(
                "Values response has no data object".to_string(),
            )),
        }
    }

    /// Upload files in slot order; returns server filenames positionally
    pub async fn upload_files(&self, slots: &[UploadSlot]) -> SubmissionResult<Vec<String>> {
        let credentials = self.credentials()?;

        let mut form = Form::new().text("api_key", credentials.api_key.clone());
        for slot in slots {
            let contents = slot.file.read_contents().await?;
            let part = Part::bytes(contents)
                .file_name(slot.file.file_name())
                .mime_str(slot.file.content_type())?;
            form = form.part(slot.field_name.clone(), part);
        }

        tracing::debug!(files = slots.len(), "Uploading files to registry");

        let response = self
            .http_client
            .post(self.endpoint("file-upload"))
            .header(reqwest::header::USER_AGENT, credentials.marker())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Transport(format!(
                "File upload failed with status {}: {}",
                status, text
            )));
        }

        let body: Value = response.json().await?;
        let names: Vec<String> = body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!(uploaded = names.len(), "Registry accepted uploaded files");
        Ok(names)
    }

    /// Post a bulk report document, returning the registry report id
    pub async fn submit(&self, document: &Value) -> SubmissionResult<i64> {
        let credentials = self.credentials()?;
        let data = serde_json::to_string(document)
            .map_err(|e| SubmissionError::Validation(format!("Report is not serializable: {}", e)))?;

        tracing::debug!("Posting bulk report to registry");

        let response = self
            .http_client
            .post(self.endpoint("bulk-report"))
            .header(reqwest::header::USER_AGENT, credentials.marker())
            .form(&[("api_key", credentials.api_key.as_str()), ("data", data.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Transport(format!(
                "Bulk report failed with status {}: {}",
                status, text
            )));
        }

        let body: Value = response.json().await?;
        let report_id = body
            .get("data")
            .and_then(|d| d.get("report_id"))
            .and_then(|id| match id {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .ok_or_else(|| {
                SubmissionError::Transport(format!("Bulk report response has no report_id: {}", body))
            })?;

        tracing::info!(report_id = report_id, "Registry accepted bulk report");
        Ok(report_id)
    }

    /// Ask once for the processing result of a report
    async fn fetch_reply(&self, report_id: i64) -> SubmissionResult<(u16, Option<Value>)> {
        let credentials = self.credentials()?;
        let report_id = report_id.to_string();

        let response = self
            .http_client
            .post(self.endpoint("bulk-report-reply"))
            .header(reqwest::header::USER_AGENT, credentials.marker())
            .form(&[
                ("api_key", credentials.api_key.as_str()),
                ("report_id", report_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = match status {
            StatusCode::OK | StatusCode::BAD_REQUEST => response.json::<Value>().await.ok(),
            _ => None,
        };
        Ok((status.as_u16(), body))
    }

    /// Poll the reply endpoint until the report is confirmed or rejected
    pub async fn poll_reply(&self, report_id: i64) -> SubmissionResult<RegistryReply> {
        let mut poller = ReplyPoller::new(report_id, self.poll_policy);

        loop {
            let (status, body) = self.fetch_reply(report_id).await?;
            tracing::debug!(
                report_id = report_id,
                status = status,
                attempt = poller.attempts() + 1,
                "Bulk report reply"
            );

            match poller.observe(status, body.as_ref()) {
                PollDecision::Retry(wait) => sleep(wait).await,
                PollDecision::Confirmed(reply) => {
                    tracing::info!(
                        report_id = report_id,
                        object_name = %reply.object_name,
                        "Registry confirmed report"
                    );
                    return Ok(reply);
                }
                PollDecision::Failed(e) => {
                    tracing::warn!(
                        report_id = report_id,
                        state = %poller.state(),
                        "Reply polling stopped: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

async fn sleep(wait: Duration) {
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}

#[async_trait::async_trait]
impl ValuesSource for RegistryClient {
    async fn fetch_values(&self) -> SubmissionResult<Map<String, Value>> {
        RegistryClient::fetch_values(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> RegistryClient {
        RegistryClient::new(base_url, None, HttpTimeouts::default(), PollPolicy::default()).unwrap()
    }

    #[test]
    fn test_values_url_join() {
        assert_eq!(
            client("https://sandbox.wis-tns.org/api").values_url().unwrap().as_str(),
            "https://sandbox.wis-tns.org/api/values/"
        );
        assert_eq!(
            client("http://127.0.0.1:8080/").values_url().unwrap().as_str(),
            "http://127.0.0.1:8080/api/values/"
        );
    }

    #[test]
    fn test_endpoints_use_trimmed_base() {
        let client = client("https://www.wis-tns.org/api/");
        assert_eq!(client.base_url(), "https://www.wis-tns.org/api");
        assert_eq!(client.endpoint("bulk-report"), "https://www.wis-tns.org/api/bulk-report");
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        assert!(matches!(
            client("not a url").values_url(),
            Err(SubmissionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_without_credentials_fails_before_network() {
        let client = client("http://127.0.0.1:9");
        let result = client.submit(&serde_json::json!({})).await;
        assert!(matches!(result, Err(SubmissionError::Configuration(_))));
    }
}
