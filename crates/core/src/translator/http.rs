//! HTTP translation backend for the hosted batch document translation API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslatorConfig;

use super::{
    DocumentCounts, JobRequest, JobStatusSnapshot, ProcessingHandle, ServiceError,
    TranslationBackend, TranslatorError,
};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";
const OPERATION_LOCATION: &str = "Operation-Location";

/// Batch request body; the service accepts several inputs per batch.
#[derive(Serialize)]
struct BatchBody<'a> {
    inputs: [&'a JobRequest; 1],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ServiceError,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    id: String,
    created_date_time_utc: DateTime<Utc>,
    last_action_date_time_utc: DateTime<Utc>,
    status: String,
    #[serde(default)]
    summary: SummaryBody,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryBody {
    total: u32,
    failed: u32,
    success: u32,
    in_progress: u32,
    not_yet_started: u32,
    cancelled: u32,
}

#[derive(Deserialize)]
struct LanguagesBody {
    #[serde(default)]
    translation: BTreeMap<String, serde_json::Value>,
}

impl From<StatusBody> for JobStatusSnapshot {
    fn from(body: StatusBody) -> Self {
        Self {
            job_id: body.id,
            status: body.status,
            created_at: body.created_date_time_utc,
            last_action_at: body.last_action_date_time_utc,
            documents: DocumentCounts {
                total: body.summary.total,
                not_yet_started: body.summary.not_yet_started,
                in_progress: body.summary.in_progress,
                succeeded: body.summary.success,
                failed: body.summary.failed,
                cancelled: body.summary.cancelled,
            },
            error: body.error,
        }
    }
}

/// Translation backend speaking the service's REST API.
pub struct HttpTranslator {
    client: Client,
    config: TranslatorConfig,
}

impl HttpTranslator {
    /// Create a new HTTP translator.
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslatorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .build()
            .map_err(|e| TranslatorError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn batches_url(&self) -> String {
        format!(
            "{}/translator/text/batch/{}/batches",
            self.base_url(),
            self.config.api_version
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(KEY_HEADER, &self.config.api_key);
        match &self.config.region {
            Some(region) => builder.header(REGION_HEADER, region),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, TranslatorError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TranslatorError::Timeout
            } else if e.is_connect() {
                TranslatorError::ConnectionFailed(e.to_string())
            } else {
                TranslatorError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => Err(TranslatorError::Rejected {
                status: status.as_u16(),
                error: parsed.error,
            }),
            Err(_) => Err(TranslatorError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ))),
        }
    }
}

#[async_trait]
impl TranslationBackend for HttpTranslator {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<ProcessingHandle, TranslatorError> {
        let url = self.batches_url();
        debug!(url = %url, "Submitting translation job");

        let builder = self
            .authorize(self.client.post(&url))
            .json(&BatchBody { inputs: [request] });
        let response = Self::send(builder).await?;

        let location = response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                TranslatorError::InvalidResponse(format!("missing {} header", OPERATION_LOCATION))
            })?;

        Ok(ProcessingHandle(location.to_string()))
    }

    async fn check_status(
        &self,
        handle: &ProcessingHandle,
    ) -> Result<JobStatusSnapshot, TranslatorError> {
        let builder = self.authorize(self.client.get(handle.as_str()));
        let response = Self::send(builder).await?;

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| TranslatorError::InvalidResponse(e.to_string()))?;

        Ok(body.into())
    }

    async fn supported_languages(&self) -> Result<Vec<String>, TranslatorError> {
        let url = format!(
            "{}/languages?api-version=3.0&scope=translation",
            self.config.languages_endpoint.trim_end_matches('/')
        );
        let response = Self::send(self.client.get(&url)).await?;

        let body: LanguagesBody = response
            .json()
            .await
            .map_err(|e| TranslatorError::InvalidResponse(e.to_string()))?;

        Ok(body.translation.into_keys().collect())
    }
}
