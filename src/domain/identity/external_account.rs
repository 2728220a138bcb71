//! External account entity: a user's link to one provider identity.

use crate::domain::foundation::{ExternalAccountId, Timestamp, UserId};

use super::{IdentityKey, OAuthCredential, ProviderKind, ProviderProfile};

/// Stored link between a user and a third-party identity.
///
/// `identity` is fixed at creation; only the credential fields and
/// `updated` change afterwards.
#[derive(Debug, Clone)]
pub struct ExternalAccount {
    pub id: ExternalAccountId,
    pub user_id: UserId,
    pub provider: ProviderKind,
    pub identity: String,
    pub profile: serde_json::Value,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub credential: OAuthCredential,
}

impl ExternalAccount {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.provider, self.identity.clone())
    }

    /// Replaces cached credential material after a fresh login.
    pub fn refresh_credential(&mut self, credential: OAuthCredential, at: Timestamp) {
        self.credential = credential;
        self.updated = at;
    }
}

/// Values for an external account that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewExternalAccount {
    pub provider: ProviderKind,
    pub identity: String,
    pub profile: serde_json::Value,
    pub credential: OAuthCredential,
    pub created: Timestamp,
}

impl NewExternalAccount {
    pub fn from_profile(
        profile: &ProviderProfile,
        credential: OAuthCredential,
        created: Timestamp,
    ) -> Self {
        Self {
            provider: profile.provider,
            identity: profile.identity.clone(),
            profile: profile.raw.clone(),
            credential,
            created,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.provider, self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn new_account_copies_profile_identity() {
        let profile =
            ProviderProfile::new(ProviderKind::Discord, "alice#0001", json!({"id": "1"})).unwrap();
        let cred = OAuthCredential::new("tok", "Bearer", None, None).unwrap();

        let account = NewExternalAccount::from_profile(&profile, cred, Timestamp::now());

        assert_eq!(account.identity_key(), profile.identity_key());
        assert_eq!(account.profile, json!({"id": "1"}));
    }

    #[test]
    fn refresh_credential_keeps_identity() {
        let now = Timestamp::now();
        let mut account = ExternalAccount {
            id: ExternalAccountId::from_i64(1),
            user_id: UserId::from_i64(1),
            provider: ProviderKind::Discord,
            identity: "alice#0001".into(),
            profile: json!({}),
            created: now,
            updated: now,
            credential: OAuthCredential::new("old", "Bearer", None, None).unwrap(),
        };

        let later = now.plus_secs(30);
        let fresh = OAuthCredential::new("new", "Bearer", None, None).unwrap();
        account.refresh_credential(fresh, later);

        assert_eq!(account.identity, "alice#0001");
        assert_eq!(account.credential.access_token.expose_secret(), "new");
        assert_eq!(account.updated, later);
    }
}
