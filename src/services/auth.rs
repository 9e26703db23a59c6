/*
 * This file is part of the Obvia ERP.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Orchestrates the four externally visible auth operations over the
//! `TokenManager` (C11, §4.11, §6.1): Authenticate, VerifyToken,
//! RefreshToken, RevokeToken.

use crate::common::error::{CoreError, CoreResult, ErrorCategory};
use crate::common::password::verify_password;
use crate::tokens::manager::{AccessClaims, IssuedTokens, TokenManager, TokenSubject};
use crate::tokens::model::RequestContext;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Identifies the (tenant, user) pair every auth operation acts on (§4.11).
#[derive(Debug, Clone)]
pub struct UserIdentifier {
    pub tenant_id: String,
    pub user_id: String,
}

/// Result of `VerifyToken` (§6.1): the boolean the RPC contract names, plus
/// the decoded claims when valid so callers (the `api` layer, RBAC checks)
/// don't have to re-parse the token themselves.
#[derive(Debug, Clone)]
pub struct TokenValidity {
    pub valid: bool,
    pub claims: Option<AccessClaims>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthFacade: Send + Sync {
    async fn authenticate(
        &self,
        subject: &TokenSubject,
        password: &str,
        password_hash: &str,
        ctx: &RequestContext,
    ) -> CoreResult<IssuedTokens>;

    async fn verify_token(&self, access_token: &str) -> CoreResult<TokenValidity>;

    async fn refresh_token(
        &self,
        identifier: &UserIdentifier,
        refresh_token: &str,
        subject: &TokenSubject,
        ctx: &RequestContext,
    ) -> CoreResult<IssuedTokens>;

    async fn revoke_token(
        &self,
        identifier: &UserIdentifier,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        revoked_by: &str,
    ) -> CoreResult<bool>;
}

pub struct AuthService {
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(tokens: TokenManager) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthFacade for AuthService {
    async fn authenticate(
        &self,
        subject: &TokenSubject,
        password: &str,
        password_hash: &str,
        ctx: &RequestContext,
    ) -> CoreResult<IssuedTokens> {
        verify_password(password, password_hash)?;

        let (access_jwt, access_metadata) = self.tokens.generate_access_token(subject, ctx)?;
        let (refresh_token, refresh_record) = self.tokens.generate_refresh_token(subject, ctx);
        let access_expires_at = access_metadata.expires_at;
        let refresh_expires_at = refresh_record.expires_at;

        self.tokens
            .store_tokens(&subject.tenant_id, &subject.user_id, access_metadata, refresh_record)
            .await?;

        Ok(IssuedTokens {
            access_token: access_jwt,
            access_expires_at,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Never surfaces `AUTH_TOKEN_EXPIRED`/`AUTH_TOKEN_INVALID`/
    /// `AUTH_TOKEN_REVOKED`/not-found as errors: those collapse into
    /// `valid: false`, matching `VerifyToken`'s `{valid: bool}` contract
    /// (§6.1). A genuine `Internal` failure (e.g. the store being
    /// unreachable) still propagates.
    async fn verify_token(&self, access_token: &str) -> CoreResult<TokenValidity> {
        match self.tokens.verify_access_token(access_token).await {
            Ok(claims) => Ok(TokenValidity {
                valid: true,
                claims: Some(claims),
            }),
            Err(e) if e.category == ErrorCategory::Auth || e.is_not_found() => Ok(TokenValidity {
                valid: false,
                claims: None,
            }),
            Err(e) => Err(e),
        }
    }

    async fn refresh_token(
        &self,
        identifier: &UserIdentifier,
        refresh_token: &str,
        subject: &TokenSubject,
        ctx: &RequestContext,
    ) -> CoreResult<IssuedTokens> {
        self.tokens
            .refresh_access_token(&identifier.tenant_id, &identifier.user_id, refresh_token, subject, ctx)
            .await
    }

    /// Idempotent per §6.1: revoking an already-revoked or already-gone
    /// token is success, not `NOT_FOUND`.
    async fn revoke_token(
        &self,
        identifier: &UserIdentifier,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        revoked_by: &str,
    ) -> CoreResult<bool> {
        if access_token.is_none() && refresh_token.is_none() {
            return Ok(false);
        }

        if let Some(jwt) = access_token {
            let token_id = self.tokens.access_token_id(jwt);
            match self
                .tokens
                .access_store()
                .revoke(&identifier.tenant_id, &identifier.user_id, &token_id, revoked_by)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(rt) = refresh_token {
            match self
                .tokens
                .refresh_store()
                .revoke(&identifier.tenant_id, &identifier.user_id, rt, revoked_by)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::password::hash_password;
    use crate::store::memory::MemoryKvDriver;
    use crate::tokens::access_store::AccessTokenStore;
    use crate::tokens::index::TokenIndex;
    use crate::tokens::refresh_store::RefreshTokenStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> AuthService {
        let driver: Arc<dyn crate::store::KvDriver> = Arc::new(MemoryKvDriver::new());
        let index = TokenIndex::new(driver.clone());
        let access_store = AccessTokenStore::new(driver.clone(), index.clone(), Duration::hours(1));
        let refresh_store = RefreshTokenStore::new(driver, index, Duration::days(7));
        let tokens = TokenManager::new(
            access_store,
            refresh_store,
            "test-secret-at-least-32-bytes-long!",
            "auth-core-tests",
            Duration::hours(1),
            Duration::days(7),
        );
        AuthService::new(tokens)
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: "u1".to_string(),
            tenant_id: "t1".to_string(),
            username: Some("u1".to_string()),
            email: Some("u1@example.com".to_string()),
            roles: vec!["role-1".to_string()],
        }
    }

    #[tokio::test]
    async fn authenticate_then_verify_happy_path() {
        let service = service();
        let ctx = RequestContext::default();
        let hash = hash_password("correct horse battery staple").unwrap();

        let issued = service
            .authenticate(&subject(), "correct horse battery staple", &hash, &ctx)
            .await
            .unwrap();

        let validity = service.verify_token(&issued.access_token).await.unwrap();
        assert!(validity.valid);
        assert_eq!(validity.claims.unwrap().user_id, "u1");
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let service = service();
        let ctx = RequestContext::default();
        let hash = hash_password("correct horse battery staple").unwrap();

        let err = service
            .authenticate(&subject(), "totally wrong", &hash, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn revoke_single_access_then_refresh_still_valid() {
        let service = service();
        let ctx = RequestContext::default();
        let hash = hash_password("correct horse battery staple").unwrap();
        let issued = service
            .authenticate(&subject(), "correct horse battery staple", &hash, &ctx)
            .await
            .unwrap();

        let identifier = UserIdentifier {
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
        };
        let revoked = service
            .revoke_token(&identifier, Some(&issued.access_token), None, "u1")
            .await
            .unwrap();
        assert!(revoked);

        let validity = service.verify_token(&issued.access_token).await.unwrap();
        assert!(!validity.valid);

        service
            .tokens
            .refresh_store()
            .validate("t1", "u1", &issued.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_rotates_and_replay_is_rejected() {
        let service = service();
        let ctx = RequestContext::default();
        let hash = hash_password("correct horse battery staple").unwrap();
        let issued = service
            .authenticate(&subject(), "correct horse battery staple", &hash, &ctx)
            .await
            .unwrap();

        let identifier = UserIdentifier {
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
        };
        let rotated = service
            .refresh_token(&identifier, &issued.refresh_token, &subject(), &ctx)
            .await
            .unwrap();

        let err = service
            .refresh_token(&identifier, &issued.refresh_token, &subject(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_REVOKED");

        let validity = service.verify_token(&rotated.access_token).await.unwrap();
        assert!(validity.valid);
    }

    #[tokio::test]
    async fn revoke_token_is_idempotent() {
        let service = service();
        let identifier = UserIdentifier {
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
        };
        let first = service
            .revoke_token(&identifier, Some("never-issued-jwt"), None, "u1")
            .await
            .unwrap();
        assert!(first);
    }
}
