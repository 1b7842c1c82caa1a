//! Hoist Campfire client
//!
//! A small HTTP client for the Campfire chat API, used to announce deploys
//! in chat rooms.
//!
//! # Example
//!
//! ```no_run
//! use hoist_client::CampfireClient;
//!
//! #[tokio::main]
//! async fn main() -> hoist_client::Result<()> {
//!     let client = CampfireClient::new("myaccount", "api-token");
//!     client.announce(&[8343], "alice deployed myapp to production in 42.0s").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod rooms;

pub use error::{ClientError, Result};
pub use rooms::Room;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Password sent alongside the API token; Campfire ignores it
const TOKEN_PASSWORD: &str = "X";

/// HTTP client for one Campfire account
#[derive(Debug, Clone)]
pub struct CampfireClient {
    /// Base URL of the account (e.g., "https://myaccount.campfirenow.com")
    base_url: String,
    /// API token, sent as the basic-auth user
    token: String,
    /// HTTP client instance
    client: Client,
}

impl CampfireClient {
    /// Create a client for a hosted Campfire account
    ///
    /// # Arguments
    /// * `account` - Account subdomain
    /// * `token` - API token of the announcing user
    pub fn new(account: &str, token: impl Into<String>) -> Self {
        Self::with_client(
            format!("https://{}.campfirenow.com", account),
            token,
            Client::new(),
        )
    }

    /// Create a client with an explicit base URL and a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    /// Get the base URL of the account
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.token, Some(TOKEN_PASSWORD))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
