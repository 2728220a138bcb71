//! Identity broker exchange client.
//!
//! The broker runs the provider OAuth dance and parks the resulting token
//! under a one-time state. This client redeems the state:
//!
//! ```text
//! GET {internal_url}/api/exchange?secret=..&state=..&kind=discord
//! 200 {"access_token", "token_type", "expiry", "refresh_token"}
//! 400 state_not_found
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::Timestamp;
use crate::domain::identity::{OAuthCredential, ProviderKind};
use crate::ports::{IdentityExchange, UpstreamError};

/// Body the broker returns for an unknown or expired state.
const STATE_NOT_FOUND_BODY: &str = "state_not_found";

/// Broker client configuration.
#[derive(Debug, Clone)]
pub struct BrokerClientConfig {
    /// Base URL reachable from this service (not the public one).
    pub internal_url: String,
    /// Shared secret proving this service to the broker.
    pub secret: SecretString,
    /// Deadline for one exchange call.
    pub timeout: Duration,
}

impl BrokerClientConfig {
    pub fn new(internal_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            internal_url: internal_url.into(),
            secret: SecretString::new(secret.into()),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl ExchangeResponse {
    fn into_credential(self) -> Result<OAuthCredential, UpstreamError> {
        // The broker sends the zero time for tokens without expiry.
        let expiry = self
            .expiry
            .filter(|e| e.year() > 1)
            .map(Timestamp::from_datetime);
        OAuthCredential::new(self.access_token, self.token_type, expiry, self.refresh_token)
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

/// Redeems login states against the identity broker over HTTP.
pub struct BrokerExchangeClient {
    exchange_url: Url,
    secret: SecretString,
    client: Client,
}

impl BrokerExchangeClient {
    pub fn new(config: BrokerClientConfig) -> Result<Self, UpstreamError> {
        let exchange_url = Url::parse(&config.internal_url)
            .and_then(|base| base.join("/api/exchange"))
            .map_err(|e| UpstreamError::Transport(format!("invalid broker URL: {}", e)))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(UpstreamError::from_reqwest)?;

        Ok(Self {
            exchange_url,
            secret: config.secret,
            client,
        })
    }
}

#[async_trait]
impl IdentityExchange for BrokerExchangeClient {
    async fn exchange(
        &self,
        provider: ProviderKind,
        state: &str,
    ) -> Result<OAuthCredential, UpstreamError> {
        let response = self
            .client
            .get(self.exchange_url.clone())
            .query(&[
                ("secret", self.secret.expose_secret().as_str()),
                ("state", state),
                ("kind", provider.as_str()),
            ])
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.map_err(UpstreamError::from_reqwest)?;
            if body.trim() == STATE_NOT_FOUND_BODY {
                tracing::debug!(provider = %provider, "Broker does not know login state");
                return Err(UpstreamError::StateNotFound);
            }
            tracing::warn!(
                provider = %provider,
                status = status.as_u16(),
                "Broker rejected exchange"
            );
            return Err(UpstreamError::Status(status.as_u16()));
        }
        if !status.is_success() {
            tracing::warn!(
                provider = %provider,
                status = status.as_u16(),
                "Broker exchange failed"
            );
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body: ExchangeResponse = response.json().await.map_err(UpstreamError::from_reqwest)?;
        body.into_credential()
    }
}

impl std::fmt::Debug for BrokerExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerExchangeClient")
            .field("exchange_url", &self.exchange_url.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn fake_exchange(
        Query(params): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        if params.get("secret").map(String::as_str) != Some("broker-secret") {
            return (AxumStatus::FORBIDDEN, "bad secret").into_response();
        }
        match params.get("state").map(String::as_str) {
            Some("good") => Json(json!({
                "access_token": format!("token-for-{}", params["kind"]),
                "token_type": "Bearer",
                "expiry": "2030-01-01T00:00:00Z",
                "refresh_token": "refresh-1"
            }))
            .into_response(),
            Some("no-expiry") => Json(json!({
                "access_token": "t",
                "token_type": "Bearer",
                "expiry": "0001-01-01T00:00:00Z"
            }))
            .into_response(),
            Some("broken") => (AxumStatus::OK, "not json").into_response(),
            Some("bad-request") => (AxumStatus::BAD_REQUEST, "missing kind").into_response(),
            Some("slow") => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"access_token": "t"})).into_response()
            }
            _ => (AxumStatus::BAD_REQUEST, STATE_NOT_FOUND_BODY).into_response(),
        }
    }

    async fn client() -> BrokerExchangeClient {
        let base = serve(Router::new().route("/api/exchange", get(fake_exchange))).await;
        BrokerExchangeClient::new(
            BrokerClientConfig::new(base, "broker-secret").with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn exchanges_state_for_credential() {
        let credential = client().await.exchange(ProviderKind::Discord, "good").await.unwrap();

        assert_eq!(credential.access_token.expose_secret(), "token-for-discord");
        assert_eq!(credential.token_type, "Bearer");
        assert_eq!(credential.refresh_token_value(), Some("refresh-1"));
        assert!(credential.expiry.is_some());
    }

    #[tokio::test]
    async fn zero_expiry_means_none() {
        let credential = client().await.exchange(ProviderKind::Discord, "no-expiry").await.unwrap();
        assert!(credential.expiry.is_none());
    }

    #[tokio::test]
    async fn state_not_found_body_maps_to_state_not_found() {
        let err = client().await.exchange(ProviderKind::Discord, "abc").await.unwrap_err();
        assert_eq!(err, UpstreamError::StateNotFound);
    }

    #[tokio::test]
    async fn other_client_errors_are_upstream_failures() {
        let err = client().await.exchange(ProviderKind::Discord, "bad-request").await.unwrap_err();
        assert_eq!(err, UpstreamError::Status(400));
    }

    #[tokio::test]
    async fn wrong_secret_is_an_upstream_failure() {
        let base = serve(Router::new().route("/api/exchange", get(fake_exchange))).await;
        let client = BrokerExchangeClient::new(BrokerClientConfig::new(base, "wrong")).unwrap();

        let err = client.exchange(ProviderKind::Discord, "good").await.unwrap_err();
        assert_eq!(err, UpstreamError::Status(403));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let err = client().await.exchange(ProviderKind::Discord, "broken").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_broker_times_out() {
        let err = client().await.exchange(ProviderKind::Discord, "slow").await.unwrap_err();
        assert_eq!(err, UpstreamError::Timeout);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(BrokerExchangeClient::new(BrokerClientConfig::new("not a url", "s")).is_err());
    }

    #[test]
    fn debug_output_omits_secret() {
        let config = BrokerClientConfig::new("http://broker:8080", "top-secret");
        let client = BrokerExchangeClient::new(config).unwrap();
        assert!(!format!("{:?}", client).contains("top-secret"));
    }
}
