//! PostgreSQL implementation of UnitOfWork and AccountTransaction.
//!
//! Every transaction runs at READ COMMITTED. Two logins racing to link the
//! same identity both try the insert; the loser blocks on the unique index
//! until the winner commits, then fails with a unique violation that is
//! reported as `IdentityConflict`. Its statements after the rollback to
//! savepoint see the winner's committed rows.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::rows::{
    db_error, AccessTokenRow, CredentialColumns, ExternalAccountRow, PrincipalRow, UserRow,
    ACCESS_TOKEN_COLUMNS, EXTERNAL_ACCOUNT_COLUMNS, PRINCIPAL_COLUMNS, USER_COLUMNS,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, ExternalAccountId, PrincipalId, Timestamp, UserId,
};
use crate::domain::identity::{
    ExternalAccount, IdentityKey, LinkedUser, NewExternalAccount, NewPrincipal, OAuthCredential,
    Principal, User,
};
use crate::domain::token::{AccessToken, NewAccessToken};
use crate::ports::{
    validate_savepoint_name, AccountStore, AccountTransaction, TokenStore, UnitOfWork,
};

/// Unique index over `(provider, identity)`.
pub const IDENTITY_CONSTRAINT: &str = "external_accounts_provider_identity_key";

/// Opens account transactions on a connection pool.
#[derive(Clone)]
pub struct PostgresUnitOfWork {
    pool: PgPool,
}

impl PostgresUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn AccountTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// One open transaction. Dropping it without `commit` rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    async fn execute_savepoint_command(
        &mut self,
        command: &str,
        name: &'static str,
    ) -> Result<(), DomainError> {
        validate_savepoint_name(name)?;
        let sql = format!("{} {}", command, name);
        sqlx::query(&sql)
            .execute(self.conn())
            .await
            .map_err(|e| db_error(command, e))?;
        Ok(())
    }
}

async fn fetch_principal(
    conn: &mut PgConnection,
    id: PrincipalId,
    for_update: bool,
) -> Result<Option<Principal>, DomainError> {
    let sql = format!(
        "SELECT {} FROM principals WHERE id = $1{}",
        PRINCIPAL_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, PrincipalRow>(&sql)
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("fetch principal", e))?
        .map(Principal::try_from)
        .transpose()
}

async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<Option<User>, DomainError> {
    let sql = format!(
        "SELECT {} FROM users u JOIN principals p ON p.id = u.principal_id WHERE u.id = $1",
        USER_COLUMNS
    );
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("fetch user", e))?
        .map(User::try_from)
        .transpose()
}

#[async_trait]
impl AccountStore for PostgresTransaction {
    async fn create_principal(
        &mut self,
        principal: &NewPrincipal,
    ) -> Result<Principal, DomainError> {
        let sql = format!(
            "INSERT INTO principals (is_admin, created_on, state) VALUES ($1, $2, $3) RETURNING {}",
            PRINCIPAL_COLUMNS
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(principal.is_admin)
            .bind(principal.created_on.as_datetime())
            .bind(principal.state.as_str())
            .fetch_one(self.conn())
            .await
            .map_err(|e| db_error("insert principal", e))?;
        row.try_into()
    }

    async fn create_user(&mut self, principal_id: PrincipalId) -> Result<User, DomainError> {
        let (user_id,): (i64,) =
            sqlx::query_as("INSERT INTO users (principal_id) VALUES ($1) RETURNING id")
                .bind(principal_id.as_i64())
                .fetch_one(self.conn())
                .await
                .map_err(|e| db_error("insert user", e))?;

        let principal = fetch_principal(self.conn(), principal_id, false)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PrincipalNotFound,
                    format!("Principal {} not found", principal_id),
                )
            })?;
        Ok(User {
            id: UserId::from_i64(user_id),
            principal,
        })
    }

    async fn create_external_account(
        &mut self,
        user_id: UserId,
        account: &NewExternalAccount,
    ) -> Result<ExternalAccount, DomainError> {
        let columns = CredentialColumns::from(&account.credential);
        let sql = format!(
            r#"
            INSERT INTO external_accounts (
                user_id, provider, identity, profile_json, created, updated,
                access_token, token_type, token_expires, refresh_token
            ) VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            EXTERNAL_ACCOUNT_COLUMNS
        );
        let row = sqlx::query_as::<_, ExternalAccountRow>(&sql)
            .bind(user_id.as_i64())
            .bind(account.provider.as_str())
            .bind(&account.identity)
            .bind(&account.profile)
            .bind(account.created.as_datetime())
            .bind(columns.access_token)
            .bind(columns.token_type)
            .bind(columns.token_expires)
            .bind(columns.refresh_token)
            .fetch_one(self.conn())
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.constraint() == Some(IDENTITY_CONSTRAINT) {
                        return DomainError::new(
                            ErrorCode::IdentityConflict,
                            format!("{} is already linked", account.identity_key()),
                        );
                    }
                }
                db_error("insert external account", e)
            })?;
        row.try_into()
    }

    async fn find_external_account(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<ExternalAccount>, DomainError> {
        let sql = format!(
            "SELECT {} FROM external_accounts WHERE provider = $1 AND identity = $2",
            EXTERNAL_ACCOUNT_COLUMNS
        );
        sqlx::query_as::<_, ExternalAccountRow>(&sql)
            .bind(key.provider.as_str())
            .bind(&key.identity)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| db_error("fetch external account", e))?
            .map(ExternalAccount::try_from)
            .transpose()
    }

    async fn find_user_by_identity(
        &mut self,
        key: &IdentityKey,
    ) -> Result<Option<LinkedUser>, DomainError> {
        let Some(account) = self.find_external_account(key).await? else {
            return Ok(None);
        };
        let user = fetch_user(self.conn(), account.user_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::UserNotFound,
                format!("User {} for {} not found", account.user_id, key),
            )
        })?;
        Ok(Some(LinkedUser { user, account }))
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, DomainError> {
        fetch_user(self.conn(), id).await
    }

    async fn lock_principal(&mut self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        fetch_principal(self.conn(), id, true).await
    }

    async fn touch_last_login(
        &mut self,
        id: PrincipalId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        // Only last_login is written; GREATEST keeps it monotonic.
        let result = sqlx::query(
            "UPDATE principals \
             SET last_login = GREATEST(COALESCE(last_login, $2), $2) \
             WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(at.as_datetime())
        .execute(self.conn())
        .await
        .map_err(|e| db_error("update last_login", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PrincipalNotFound,
                format!("Principal {} not found", id),
            ));
        }
        Ok(())
    }

    async fn update_credentials(
        &mut self,
        id: ExternalAccountId,
        credential: &OAuthCredential,
        updated: Timestamp,
    ) -> Result<(), DomainError> {
        let columns = CredentialColumns::from(credential);
        let result = sqlx::query(
            r#"
            UPDATE external_accounts SET
                access_token = $2,
                token_type = $3,
                token_expires = $4,
                refresh_token = $5,
                updated = $6
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(columns.access_token)
        .bind(columns.token_type)
        .bind(columns.token_expires)
        .bind(columns.refresh_token)
        .bind(updated.as_datetime())
        .execute(self.conn())
        .await
        .map_err(|e| db_error("update credentials", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::database(format!("External account {} not found", id)));
        }
        Ok(())
    }

    async fn savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        self.execute_savepoint_command("SAVEPOINT", name).await
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        self.execute_savepoint_command("ROLLBACK TO SAVEPOINT", name).await
    }

    async fn release_savepoint(&mut self, name: &'static str) -> Result<(), DomainError> {
        self.execute_savepoint_command("RELEASE SAVEPOINT", name).await
    }
}

#[async_trait]
impl TokenStore for PostgresTransaction {
    async fn insert_access_token(
        &mut self,
        token: &NewAccessToken,
    ) -> Result<AccessToken, DomainError> {
        let sql = format!(
            "INSERT INTO access_tokens (principal_id, token, created, expires) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ACCESS_TOKEN_COLUMNS
        );
        let row = sqlx::query_as::<_, AccessTokenRow>(&sql)
            .bind(token.principal_id.as_i64())
            .bind(token.token.as_str())
            .bind(token.created.as_datetime())
            .bind(token.expires.map(Timestamp::into_datetime))
            .fetch_one(self.conn())
            .await
            .map_err(|e| db_error("insert access token", e))?;
        Ok(row.into())
    }
}

#[async_trait]
impl AccountTransaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let PostgresTransaction { tx } = *self;
        tx.commit().await.map_err(|e| db_error("commit", e))
    }
}
