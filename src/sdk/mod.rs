//! Client for the subset of the Replicated SDK the enforcer needs.

mod app_info;

use std::time::Duration;

use anyhow::{Context as _, anyhow};
use http::{HeaderValue, StatusCode, header::ACCEPT};
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, instrument};
use url::Url;

use crate::license::{LicenseBackend, LicenseError, RawLicenseField};

pub(crate) use app_info::AppInfo;

pub(crate) const DEFAULT_SDK_ENDPOINT: &str = "http://replicated:3000";
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub(crate) struct SdkClient {
    http: reqwest::Client,
    endpoint: Url,
    request_timeout: Duration,
}

impl SdkClient {
    pub(crate) fn new(endpoint: Url, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            request_timeout,
        }
    }

    pub(crate) fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> Result<Url, LicenseError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                LicenseError::Transport(anyhow!(
                    "SDK endpoint {} cannot be used as a base URL",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document, mapping a 404 to `None`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, LicenseError> {
        debug!(%url, "Calling Replicated SDK");

        let response = match timeout(
            self.request_timeout,
            self.http
                .get(url.clone())
                .header(ACCEPT, HeaderValue::from_static("application/json"))
                .send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(LicenseError::Transport(
                    anyhow!(err).context(format!("Failed to call Replicated SDK at {url}")),
                ));
            }
            Err(_) => {
                return Err(LicenseError::Transport(anyhow!(
                    "Request to Replicated SDK at {url} timed out ({:?})",
                    self.request_timeout
                )));
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = match timeout(self.request_timeout, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                return Err(LicenseError::Transport(anyhow!(err).context(format!(
                    "Replicated SDK at {url}: {status} <Error while receiving response body>"
                ))));
            }
            Err(_) => {
                return Err(LicenseError::Transport(anyhow!(
                    "Replicated SDK at {url}: {status} <Timed out while receiving response body>"
                )));
            }
        };

        if !status.is_success() {
            return Err(LicenseError::Transport(anyhow!(
                "Replicated SDK at {url} returned {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        serde_json::from_slice(&body)
            .with_context(|| format!("Failed to decode response from Replicated SDK at {url}"))
            .map(Some)
            .map_err(LicenseError::Transport)
    }
}

impl LicenseBackend for SdkClient {
    #[instrument(level = "debug", skip(self))]
    async fn license_field(&self, name: &str) -> Result<RawLicenseField, LicenseError> {
        let url = self.url(&["api", "v1", "license", "fields", name])?;

        self.get_json(url)
            .await?
            .ok_or_else(|| LicenseError::NotFound(name.to_owned()))
    }

    #[instrument(level = "debug", skip(self))]
    async fn app_info(&self) -> Result<AppInfo, LicenseError> {
        let url = self.url(&["api", "v1", "app", "info"])?;

        self.get_json(url).await?.ok_or_else(|| {
            LicenseError::Transport(anyhow!("Replicated SDK has no application info"))
        })
    }
}
