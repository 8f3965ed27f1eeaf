//! HTTP client for the hosted backend.
//!
//! The backend is a managed database-as-a-service: rows are read through its
//! REST layer (`/rest/v1/{table}`) and physical devices are driven through
//! serverless control functions (`/functions/v1/{name}`) maintained
//! elsewhere. This client owns the base URL, the API key headers, and the
//! error mapping; it has no knowledge of which feeds exist.
//!
//! # Example
//!
//! ```no_run
//! use manor_backend::{BackendClient, LaundryMachine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::new("https://example.backend.co", "anon-key")?;
//!
//! let machines: Vec<LaundryMachine> = client
//!     .fetch_rows("laundry_status", &[("select", "*"), ("order", "id")])
//!     .await?;
//! println!("{} machines", machines.len());
//! # Ok(())
//! # }
//! ```

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{BackendError, Result};

/// Default per-request timeout. A hung request would otherwise stall a
/// poller's cadence indefinitely.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Client for the hosted backend's REST and function endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project base URL (e.g., "https://example.backend.co")
    /// * `api_key` - API key sent as both `apikey` and bearer token
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BackendError::Request)?;
        Self::with_client(base_url, api_key, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, api_key: &str, client: Client) -> Result<Self> {
        // Normalize URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(BackendError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch rows from a table through the REST layer.
    ///
    /// `query` carries the REST query parameters verbatim (`select`, `order`,
    /// filters); the backend's query language is its own contract.
    pub async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        debug!(%url, "Fetching rows");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::NotReachable {
                url: url.clone(),
                source: e,
            })?;

        self.handle_response(response).await
    }

    /// Invoke a serverless control function with a JSON payload.
    ///
    /// Returns the function's JSON response body.
    pub async fn invoke_function<B: Serialize>(
        &self,
        name: &str,
        payload: &B,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        debug!(%url, "Invoking function");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| BackendError::NotReachable {
                url: url.clone(),
                source: e,
            })?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(BackendError::Request)
        } else {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| status.to_string());

            Err(BackendError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
