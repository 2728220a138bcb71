//! Row mappings between PostgreSQL and the identity domain.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;

use crate::domain::foundation::{
    AccessTokenId, DomainError, ErrorCode, ExternalAccountId, PrincipalId, Timestamp, UserId,
};
use crate::domain::identity::{
    ExternalAccount, OAuthCredential, Principal, PrincipalState, ProviderKind, User,
};
use crate::domain::token::{AccessToken, SessionToken};

pub(super) const PRINCIPAL_COLUMNS: &str = "id, is_admin, created_on, last_login, state";

pub(super) const USER_COLUMNS: &str = r#"
    u.id AS user_id, p.id AS principal_id, p.is_admin, p.created_on, p.last_login, p.state
"#;

pub(super) const EXTERNAL_ACCOUNT_COLUMNS: &str = r#"
    id, user_id, provider, identity, profile_json, created, updated,
    access_token, token_type, token_expires, refresh_token
"#;

pub(super) const ACCESS_TOKEN_COLUMNS: &str = "id, principal_id, token, created, expires";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PrincipalRow {
    pub id: i64,
    pub is_admin: bool,
    pub created_on: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub state: String,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = DomainError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: PrincipalId::from_i64(row.id),
            is_admin: row.is_admin,
            created_on: Timestamp::from_datetime(row.created_on),
            last_login: row.last_login.map(Timestamp::from_datetime),
            state: parse_state(&row.state)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    pub user_id: i64,
    pub principal_id: i64,
    pub is_admin: bool,
    pub created_on: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub state: String,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let principal = PrincipalRow {
            id: row.principal_id,
            is_admin: row.is_admin,
            created_on: row.created_on,
            last_login: row.last_login,
            state: row.state,
        };
        Ok(User {
            id: UserId::from_i64(row.user_id),
            principal: principal.try_into()?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ExternalAccountRow {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub identity: String,
    pub profile_json: serde_json::Value,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub access_token: String,
    pub token_type: String,
    pub token_expires: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl TryFrom<ExternalAccountRow> for ExternalAccount {
    type Error = DomainError;

    fn try_from(row: ExternalAccountRow) -> Result<Self, Self::Error> {
        let provider: ProviderKind = row.provider.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid provider in external_accounts: {}", row.provider),
            )
        })?;
        let credential = OAuthCredential::new(
            row.access_token,
            row.token_type,
            row.token_expires.map(Timestamp::from_datetime),
            row.refresh_token,
        )
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid stored credential: {}", e),
            )
        })?;

        Ok(ExternalAccount {
            id: ExternalAccountId::from_i64(row.id),
            user_id: UserId::from_i64(row.user_id),
            provider,
            identity: row.identity,
            profile: row.profile_json,
            created: Timestamp::from_datetime(row.created),
            updated: Timestamp::from_datetime(row.updated),
            credential,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct AccessTokenRow {
    pub id: i64,
    pub principal_id: i64,
    pub token: String,
    pub created: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
}

impl From<AccessTokenRow> for AccessToken {
    fn from(row: AccessTokenRow) -> Self {
        AccessToken {
            id: AccessTokenId::from_i64(row.id),
            principal_id: PrincipalId::from_i64(row.principal_id),
            token: SessionToken::from_string(row.token),
            created: Timestamp::from_datetime(row.created),
            expires: row.expires.map(Timestamp::from_datetime),
        }
    }
}

/// Column values for a credential write.
pub(super) struct CredentialColumns {
    pub access_token: String,
    pub token_type: String,
    pub token_expires: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl From<&OAuthCredential> for CredentialColumns {
    fn from(credential: &OAuthCredential) -> Self {
        Self {
            access_token: credential.access_token.expose_secret().clone(),
            token_type: credential.token_type.clone(),
            token_expires: credential.expiry.map(Timestamp::into_datetime),
            refresh_token: credential.refresh_token_value().map(str::to_string),
        }
    }
}

fn parse_state(s: &str) -> Result<PrincipalState, DomainError> {
    s.parse().map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid principal state: {}", s),
        )
    })
}

pub(super) fn db_error(operation: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", operation, e))
}
