//! Shared HTTP client for feeds and lookups.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ProviderError;

/// Per-request timeout. Must stay below the default handler timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("r2d2/", env!("CARGO_PKG_VERSION"));

fn builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
}

/// Build the client every provider shares.
pub fn client() -> Result<reqwest::Client, ProviderError> {
    Ok(builder().build()?)
}

/// Client for user-supplied links. Redirects are returned to the caller
/// instead of followed, so every hop can be checked before it is fetched.
pub fn page_client() -> Result<reqwest::Client, ProviderError> {
    Ok(builder().redirect(reqwest::redirect::Policy::none()).build()?)
}

/// Send a request and reject non-2xx answers.
pub async fn send(request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// Send a request and decode a JSON body.
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let body = send(request).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Send a request and return the body as text.
pub async fn get_text(request: RequestBuilder) -> Result<String, ProviderError> {
    Ok(send(request).await?.text().await?)
}
