// Redfish HTTP client
//
// Wraps `reqwest::Client` with basic auth, service-relative URL resolution,
// and Redfish error-body decoding. Endpoint groups (registries, jobs,
// systems) live in sibling files as inherent methods so this module stays
// focused on transport mechanics.

use reqwest::header::LOCATION;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::models::SubmitResponse;
use crate::transport::TransportConfig;

/// Redfish error body: `{"error": {"code", "message", "@Message.ExtendedInfo": [...]}}`.
#[derive(serde::Deserialize)]
struct RedfishErrorBody {
    error: Option<RedfishErrorInner>,
}

#[derive(serde::Deserialize)]
struct RedfishErrorInner {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "@Message.ExtendedInfo", default)]
    extended_info: Vec<ExtendedInfo>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExtendedInfo {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

/// Async client for one Redfish service.
///
/// All paths are resolved against the service base URL, so both
/// `/redfish/v1/...` paths and absolute URLs returned in `Location`
/// headers work.
#[derive(Debug)]
pub struct RedfishClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl RedfishClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the BMC root, e.g. `https://10.0.0.12`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Resolve a service path or absolute URL against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    /// GET a document and decode it.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.credentials.apply(self.http.get(url)).send().await?;
        self.handle_response(resp).await
    }

    /// GET a document as raw JSON.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, Error> {
        self.get(path).await
    }

    /// PATCH a JSON body. The returned `Location`, if any, identifies
    /// the job created for the change.
    pub async fn patch(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<SubmitResponse, Error> {
        let url = self.url(path)?;
        debug!("PATCH {url}");

        let resp = self
            .credentials
            .apply(self.http.patch(url).json(body))
            .send()
            .await?;
        self.handle_submit(resp).await
    }

    /// POST a JSON body (actions).
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<SubmitResponse, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .credentials
            .apply(self.http.post(url).json(body))
            .send()
            .await?;
        self.handle_submit(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = truncate(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    async fn handle_submit(&self, resp: reqwest::Response) -> Result<SubmitResponse, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap_or_default().trim().to_owned());
        debug!(status = status.as_u16(), ?location, "submission accepted");

        Ok(SubmitResponse {
            status: status.as_u16(),
            location,
        })
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: if raw.is_empty() {
                    "credentials rejected (HTTP 401)".into()
                } else {
                    format!("credentials rejected (HTTP 401): {}", truncate(&raw))
                },
            };
        }

        let parsed = serde_json::from_str::<RedfishErrorBody>(&raw)
            .ok()
            .and_then(|b| b.error);

        match parsed {
            Some(err) => {
                let first = err.extended_info.into_iter().next();
                let message_id = first.as_ref().and_then(|i| i.message_id.clone());
                let message = first
                    .and_then(|i| i.message)
                    .or(err.message)
                    .or(err.code)
                    .unwrap_or_else(|| status.to_string());
                Error::Redfish {
                    status: status.as_u16(),
                    message,
                    message_id,
                }
            }
            None => Error::Redfish {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    truncate(&raw)
                },
                message_id: None,
            },
        }
    }
}

/// First 200 characters of a body, for error messages.
fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}
