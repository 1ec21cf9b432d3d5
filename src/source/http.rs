//! HTTP signal source: talks to the detection backend's REST API

use super::{Query, SignalSource};
use crate::config::SourceConfig;
use crate::error::{ProctorError, Result};
use crate::types::{ActivityLog, IntegrityEvent, StartAck, StatusSnapshot, ViolationLog};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// REST client for the detection backend
///
/// Endpoints live under `<base_url>/api/`. Queries and start/stop are
/// `GET`; log-event is a JSON `POST`.
pub struct HttpSignalSource {
    client: reqwest::Client,
    config: SourceConfig,
}

impl HttpSignalSource {
    /// Build a client with the configured request timeout
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProctorError::Connection(format!("{}: {}", config.base_url, e)))?;

        tracing::debug!(base_url = %config.base_url, "HTTP signal source ready");

        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Full URL for a backend call
    pub fn url(&self, query: Query) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url.trim_end_matches('/'),
            query.endpoint()
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, query: Query) -> Result<T> {
        let response = self
            .client
            .get(self.url(query))
            .send()
            .await
            .map_err(|e| request_error(query, e))?;
        read_json(query, response).await
    }
}

async fn read_json<T: DeserializeOwned>(query: Query, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProctorError::Request {
            endpoint: query.endpoint().to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let body = response.bytes().await.map_err(|e| request_error(query, e))?;
    Ok(serde_json::from_slice(&body)?)
}

fn request_error(query: Query, e: reqwest::Error) -> ProctorError {
    if e.is_timeout() {
        ProctorError::Timeout(format!("{} request: {}", query.endpoint(), e))
    } else {
        ProctorError::Request {
            endpoint: query.endpoint().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    async fn status(&self) -> Result<StatusSnapshot> {
        self.get_json(Query::Status).await
    }

    async fn violations(&self) -> Result<ViolationLog> {
        self.get_json(Query::Violations).await
    }

    async fn activity(&self) -> Result<ActivityLog> {
        self.get_json(Query::Activity).await
    }

    async fn start_monitoring(&self) -> Result<StartAck> {
        self.get_json(Query::Start).await
    }

    async fn stop_monitoring(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url(Query::Stop))
            .send()
            .await
            .map_err(|e| request_error(Query::Stop, e))?;

        if !response.status().is_success() {
            return Err(ProctorError::Request {
                endpoint: Query::Stop.endpoint().to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }

    async fn log_event(&self, event: &IntegrityEvent) -> Result<()> {
        let response = self
            .client
            .post(self.url(Query::LogEvent))
            .json(event)
            .send()
            .await
            .map_err(|e| request_error(Query::LogEvent, e))?;

        let _: serde_json::Value = read_json(Query::LogEvent, response).await?;

        tracing::debug!(event_type = %event.kind.as_str(), "Integrity event logged");
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
