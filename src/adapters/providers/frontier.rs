//! Frontier (Elite Dangerous companion API) profile resolver.
//!
//! Identity is the commander name reported by `GET /profile`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::identity::{OAuthCredential, ProviderKind, ProviderProfile};
use crate::ports::{ProviderAccountResolver, UpstreamError};

pub const FRONTIER_API_BASE: &str = "https://companion.orerve.net";

#[derive(Debug, Deserialize)]
struct FrontierProfile {
    commander: Commander,
}

#[derive(Debug, Deserialize)]
struct Commander {
    name: String,
}

/// Resolves Frontier OAuth credentials to commander names.
pub struct FrontierResolver {
    api_base: String,
    client: Client,
}

impl FrontierResolver {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::from_reqwest)?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ProviderAccountResolver for FrontierResolver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Frontier
    }

    async fn fetch_profile(
        &self,
        credential: &OAuthCredential,
    ) -> Result<ProviderProfile, UpstreamError> {
        let response = self
            .client
            .get(format!("{}/profile", self.api_base))
            .header(AUTHORIZATION, credential.authorization_header())
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Frontier profile request failed");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let raw: serde_json::Value = response.json().await.map_err(UpstreamError::from_reqwest)?;
        let profile: FrontierProfile =
            serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        ProviderProfile::new(ProviderKind::Frontier, profile.commander.name, raw)
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}
