//! Health probe over the real upstream.

use async_trait::async_trait;

use super::{CredentialProber, ProbeVerdict};
use crate::config::PROBE_PROMPT;
use crate::error_handling::UpstreamError;
use crate::relay::{prompt_body, UpstreamClient};

/// Probes a credential by sending a one-word prompt to the upstream endpoint.
pub struct HttpProber {
    client: UpstreamClient,
}

impl HttpProber {
    pub fn new(client: UpstreamClient) -> Self {
        HttpProber { client }
    }
}

#[async_trait]
impl CredentialProber for HttpProber {
    async fn probe(&self, secret: &str) -> ProbeVerdict {
        match self.client.send(secret, &prompt_body(PROBE_PROMPT)).await {
            Ok(_) => ProbeVerdict::Working,
            Err(UpstreamError::QuotaExceeded { .. }) => ProbeVerdict::QuotaLimited,
            Err(e) => ProbeVerdict::Dead(e.to_string()),
        }
    }
}
