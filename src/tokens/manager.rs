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

use crate::common::error::{log_compensation_failure, CoreError, CoreResult};
use crate::tokens::access_store::AccessTokenStore;
use crate::tokens::model::{RefreshToken, RequestContext, TokenMetadata};
use crate::tokens::refresh_store::RefreshTokenStore;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Access JWT claims (§4.8, §6.4): standard registered claims plus the
/// private claims the RBAC resolver and facades read back out of a verified
/// token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub user_id: String,
    pub tenant_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// The subject data `GenerateAccessToken` needs beyond the bare
/// `(user_id, tenant_id)` pair named in §4.8 — the private claims carried on
/// the JWT itself.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: String,
    pub tenant_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// A freshly issued or refreshed access+refresh pair, returned to callers
/// with TTLs expressed in seconds (§4.11).
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Signs/verifies JWTs, orchestrates atomic pair issuance with rollback,
/// refresh-with-rotation, and bulk revoke (C8, §4.8).
#[derive(Clone)]
pub struct TokenManager {
    access_store: AccessTokenStore,
    refresh_store: RefreshTokenStore,
    jwt_secret: String,
    jwt_issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    pub fn new(
        access_store: AccessTokenStore,
        refresh_store: RefreshTokenStore,
        jwt_secret: impl Into<String>,
        jwt_issuer: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_store,
            refresh_store,
            jwt_secret: jwt_secret.into(),
            jwt_issuer: jwt_issuer.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    fn token_id(jwt: &str) -> String {
        let digest = Sha256::digest(jwt.as_bytes());
        hex_encode(&digest)
    }

    /// Exposes the `token_id = hex(sha256(jwt))` derivation (§4.8) so
    /// callers that need to revoke a single known access token (rather than
    /// the whole bulk `revoke_all_tokens` path) can address it without
    /// re-verifying its signature first.
    pub fn access_token_id(&self, jwt: &str) -> String {
        Self::token_id(jwt)
    }

    fn sign(&self, claims: &AccessClaims) -> CoreResult<String> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        encode(&header, claims, &EncodingKey::from_secret(self.jwt_secret.as_bytes()))
            .map_err(|e| CoreError::internal("INTERNAL_TOKEN_SIGNING_FAILED", "failed to sign access token").with_cause(e))
    }

    /// Parses and signature-verifies an access JWT. A signature mismatch or
    /// an `alg=none` header is rejected as `AUTH_TOKEN_INVALID` (§4.8); the
    /// `jsonwebtoken` crate already refuses `none` unless explicitly
    /// requested via `Validation`, which this code never does.
    fn decode_and_verify(&self, jwt: &str) -> CoreResult<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.jwt_issuer.clone()]);
        validation.validate_exp = true;
        decode::<AccessClaims>(jwt, &DecodingKey::from_secret(self.jwt_secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| CoreError::auth("AUTH_TOKEN_INVALID", "access token failed signature verification").with_cause(e))
    }

    /// Builds metadata with `token_id = hex(sha256(jwt))`, signs the JWT,
    /// and returns both (§4.8).
    pub fn generate_access_token(
        &self,
        subject: &TokenSubject,
        ctx: &RequestContext,
    ) -> CoreResult<(String, TokenMetadata)> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = AccessClaims {
            sub: subject.user_id.clone(),
            iss: self.jwt_issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            user_id: subject.user_id.clone(),
            tenant_id: subject.tenant_id.clone(),
            username: subject.username.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
        };

        let jwt = self.sign(&claims)?;
        let token_id = Self::token_id(&jwt);

        let metadata = TokenMetadata {
            token_id,
            jti,
            user_id: subject.user_id.clone(),
            tenant_id: subject.tenant_id.clone(),
            token_type: "access".to_string(),
            issued_at: now,
            expires_at,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            scopes: Vec::new(),
        };

        Ok((jwt, metadata))
    }

    /// Returns an opaque high-entropy random string (§10.6's resolution of
    /// the §9 Open Question) and a `RefreshToken` record.
    pub fn generate_refresh_token(&self, subject: &TokenSubject, ctx: &RequestContext) -> (String, RefreshToken) {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let now = Utc::now();

        let record = RefreshToken {
            token: token.clone(),
            user_id: subject.user_id.clone(),
            tenant_id: subject.tenant_id.clone(),
            session_id: None,
            device_id: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            expires_at: now + self.refresh_ttl,
            created_at: now,
            last_used_at: None,
            revoked_at: None,
            is_revoked: false,
        };
        (token, record)
    }

    /// Atomic pair per §4.8: store the access record first; if that fails,
    /// abort. Then store the refresh record; if that fails, compensate by
    /// deleting the access record (best-effort, failures logged).
    pub async fn store_tokens(
        &self,
        tenant_id: &str,
        user_id: &str,
        access_metadata: TokenMetadata,
        refresh: RefreshToken,
    ) -> CoreResult<()> {
        let access_token_id = access_metadata.token_id.clone();
        self.access_store.store(tenant_id, user_id, access_metadata).await?;

        if let Err(e) = self.refresh_store.store(tenant_id, user_id, refresh).await {
            if let Err(compensation_err) = self.access_store.delete(tenant_id, user_id, &access_token_id).await {
                log_compensation_failure("store_tokens_access_rollback", &compensation_err);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Parses and signature-verifies the JWT, then cross-checks the stored
    /// metadata: the store is authoritative, so a signature-valid but
    /// revoked token still fails (§4.8).
    pub async fn verify_access_token(&self, jwt: &str) -> CoreResult<AccessClaims> {
        let claims = self.decode_and_verify(jwt)?;
        let token_id = Self::token_id(jwt);
        self.access_store
            .validate(&claims.tenant_id, &claims.user_id, &token_id)
            .await?;
        Ok(claims)
    }

    /// Verifies the refresh token in the store, issues a new access+refresh
    /// pair, stores it, then revokes the old refresh token with
    /// `revoked_by="system"` (rotation, §4.8). A concurrent second call
    /// racing on the same refresh token observes `AUTH_TOKEN_REVOKED` from
    /// `validate` once the first caller's revoke has landed.
    pub async fn refresh_access_token(
        &self,
        tenant_id: &str,
        user_id: &str,
        refresh_token: &str,
        subject: &TokenSubject,
        ctx: &RequestContext,
    ) -> CoreResult<IssuedTokens> {
        self.refresh_store.validate(tenant_id, user_id, refresh_token).await?;

        let (new_jwt, new_access_metadata) = self.generate_access_token(subject, ctx)?;
        let (new_refresh_token, new_refresh_record) = self.generate_refresh_token(subject, ctx);
        let access_expires_at = new_access_metadata.expires_at;
        let refresh_expires_at = new_refresh_record.expires_at;

        self.store_tokens(tenant_id, user_id, new_access_metadata, new_refresh_record)
            .await?;

        self.refresh_store
            .revoke(tenant_id, user_id, refresh_token, "system")
            .await?;

        Ok(IssuedTokens {
            access_token: new_jwt,
            access_expires_at,
            refresh_token: new_refresh_token,
            refresh_expires_at,
        })
    }

    /// Calls `AccessStore.RevokeAll` and `RefreshStore.RevokeAll`; attempts
    /// both regardless of the first's outcome, returning the first error
    /// encountered (§4.8).
    pub async fn revoke_all_tokens(&self, tenant_id: &str, user_id: &str, revoked_by: &str) -> CoreResult<()> {
        let access_result = self.access_store.revoke_all(tenant_id, user_id, revoked_by).await;
        let refresh_result = self.refresh_store.revoke_all(tenant_id, user_id, revoked_by).await;
        access_result?;
        refresh_result
    }

    /// Hard-deletes every access- and refresh-token KV record and index
    /// entry for `tenant_id`, attempting both regardless of the first's
    /// outcome (mirrors `revoke_all_tokens`'s error policy). Used by the
    /// tenant-deletion cascade so no `*:{tenant_id}:*` key survives the
    /// revoke-all pass, which only marks records revoked rather than
    /// removing them (§4.12, §8).
    pub async fn purge_tenant_tokens(&self, tenant_id: &str) -> CoreResult<()> {
        let access_result = self.access_store.purge_tenant(tenant_id).await;
        let refresh_result = self.refresh_store.purge_tenant(tenant_id).await;
        access_result?;
        refresh_result
    }

    pub fn access_store(&self) -> &AccessTokenStore {
        &self.access_store
    }

    pub fn refresh_store(&self) -> &RefreshTokenStore {
        &self.refresh_store
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;
    use crate::tokens::index::TokenIndex;
    use std::sync::Arc;

    fn manager() -> TokenManager {
        let driver: Arc<dyn crate::store::KvDriver> = Arc::new(MemoryKvDriver::new());
        let index = TokenIndex::new(driver.clone());
        let access_store = AccessTokenStore::new(driver.clone(), index.clone(), Duration::hours(1));
        let refresh_store = RefreshTokenStore::new(driver, index, Duration::days(7));
        TokenManager::new(
            access_store,
            refresh_store,
            "test-secret-at-least-32-bytes-long!",
            "auth-core-tests",
            Duration::hours(1),
            Duration::days(7),
        )
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
    async fn generate_then_verify_returns_same_identity() {
        let manager = manager();
        let ctx = RequestContext::default();
        let (jwt, metadata) = manager.generate_access_token(&subject(), &ctx).unwrap();
        manager
            .access_store()
            .store("t1", "u1", metadata)
            .await
            .unwrap();

        let claims = manager.verify_access_token(&jwt).await.unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.tenant_id, "t1");
    }

    #[tokio::test]
    async fn verify_fails_for_tampered_signature() {
        let manager = manager();
        let ctx = RequestContext::default();
        let (jwt, metadata) = manager.generate_access_token(&subject(), &ctx).unwrap();
        manager.access_store().store("t1", "u1", metadata).await.unwrap();

        let mut tampered = jwt;
        tampered.push('x');
        let err = manager.verify_access_token(&tampered).await.unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_INVALID");
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_becomes_revoked() {
        let manager = manager();
        let subject = subject();
        let ctx = RequestContext::default();
        let (_jwt, access_metadata) = manager.generate_access_token(&subject, &ctx).unwrap();
        let (refresh_token, refresh_record) = manager.generate_refresh_token(&subject, &ctx);
        manager
            .store_tokens("t1", "u1", access_metadata, refresh_record)
            .await
            .unwrap();

        let issued = manager
            .refresh_access_token("t1", "u1", &refresh_token, &subject, &ctx)
            .await
            .unwrap();

        let err = manager
            .refresh_store()
            .validate("t1", "u1", &refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_REVOKED");

        let claims = manager.verify_access_token(&issued.access_token).await.unwrap();
        assert_eq!(claims.user_id, "u1");
    }

    #[tokio::test]
    async fn store_tokens_is_pair_atomic_on_success() {
        let manager = manager();
        let subject = subject();
        let ctx = RequestContext::default();
        let (_jwt, access_metadata) = manager.generate_access_token(&subject, &ctx).unwrap();
        let access_token_id = access_metadata.token_id.clone();
        let (_refresh_token, refresh_record) = manager.generate_refresh_token(&subject, &ctx);

        manager
            .store_tokens("t1", "u1", access_metadata, refresh_record)
            .await
            .unwrap();

        assert!(manager
            .access_store()
            .get_one("t1", "u1", &access_token_id)
            .await
            .is_ok());
    }
}
