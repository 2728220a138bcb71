//! Discord profile resolver.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::identity::{OAuthCredential, ProviderKind, ProviderProfile};
use crate::ports::{ProviderAccountResolver, UpstreamError};

pub const DISCORD_API_BASE: &str = "https://discord.com/api";

/// Fields of `GET /users/@me` this service relies on.
#[derive(Debug, Deserialize)]
struct DiscordUser {
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
}

impl DiscordUser {
    /// `name#1234` for legacy accounts, bare `name` once Discord reports
    /// the `"0"` discriminator of unique usernames.
    fn identity(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// Resolves Discord OAuth credentials to Discord usernames.
pub struct DiscordResolver {
    api_base: String,
    client: Client,
}

impl DiscordResolver {
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

    fn current_user_url(&self) -> String {
        format!("{}/users/@me", self.api_base)
    }
}

#[async_trait]
impl ProviderAccountResolver for DiscordResolver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Discord
    }

    async fn fetch_profile(
        &self,
        credential: &OAuthCredential,
    ) -> Result<ProviderProfile, UpstreamError> {
        let response = self
            .client
            .get(self.current_user_url())
            .header(AUTHORIZATION, credential.authorization_header())
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Discord profile request failed");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let raw: serde_json::Value = response.json().await.map_err(UpstreamError::from_reqwest)?;
        let user: DiscordUser =
            serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        ProviderProfile::new(ProviderKind::Discord, user.identity(), raw)
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}
