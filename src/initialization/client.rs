//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;
use url::Url;

use crate::config::{Config, DEFAULT_USER_AGENT};
use crate::error_handling::InitializationError;
use crate::relay::UpstreamClient;

/// Builds the `reqwest::Client` shared by the relay and the health probe.
///
/// The per-request timeout comes from `--timeout-seconds`. Redirects are not
/// followed: an API endpoint that redirects is misconfigured, and following it
/// would resend the credential header to another host.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_client(config: &Config) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(DEFAULT_USER_AGENT)
        .build()?;
    Ok(client)
}

/// Builds the upstream client for `config.endpoint` and `config.key_header`.
///
/// # Errors
///
/// Returns `InitializationError::EndpointError` if the endpoint is not a valid
/// URL, or `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_upstream(config: &Config) -> Result<UpstreamClient, InitializationError> {
    let endpoint = Url::parse(&config.endpoint)?;
    let client = init_client(config)?;
    Ok(UpstreamClient::new(client, endpoint, config.key_header.clone()))
}
