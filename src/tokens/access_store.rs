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

use crate::common::error::{log_swallowed, CoreError, CoreResult};
use crate::store::kv::KeyValueHandler;
use crate::store::{KvDriver, TtlOpts};
use crate::tokens::index::TokenIndex;
use crate::tokens::model::TokenMetadata;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Stores/validates/revokes access-token metadata records keyed by token ID
/// (C6, §4.6). Keys: `tokens:{tenant_id}:{user_id}:{token_id}` (§6.2).
#[derive(Clone)]
pub struct AccessTokenStore {
    kv: KeyValueHandler<TokenMetadata>,
    index: TokenIndex,
    access_ttl: Duration,
}

impl AccessTokenStore {
    pub fn new(driver: Arc<dyn KvDriver>, index: TokenIndex, access_ttl: Duration) -> Self {
        Self {
            kv: KeyValueHandler::new(driver, "tokens"),
            index,
            access_ttl,
        }
    }

    fn sub_key(user_id: &str, token_id: &str) -> String {
        format!("{user_id}:{token_id}")
    }

    pub async fn store(&self, tenant_id: &str, user_id: &str, metadata: TokenMetadata) -> CoreResult<()> {
        if metadata.token_id.is_empty() || metadata.user_id.is_empty() || metadata.tenant_id.is_empty() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "token_id, user_id and tenant_id must be present",
            ));
        }
        if metadata.tenant_id != tenant_id || metadata.user_id != user_id {
            return Err(CoreError::validation(
                "VALIDATION_INVALID_VALUE",
                "token metadata tenant_id/user_id disagree with the positional arguments",
            ));
        }

        let sub_key = Self::sub_key(user_id, &metadata.token_id);
        let ttl = (metadata.expires_at - Utc::now()).max(Duration::zero());
        self.kv.set(tenant_id, &sub_key, &metadata, TtlOpts::of(ttl)).await?;

        if let Err(e) = self
            .index
            .add_access_token(tenant_id, user_id, &metadata.token_id, self.access_ttl)
            .await
        {
            log_swallowed("access_token_index_add", &e);
        }
        Ok(())
    }

    pub async fn get_one(&self, tenant_id: &str, user_id: &str, token_id: &str) -> CoreResult<TokenMetadata> {
        self.kv.get_one(tenant_id, &Self::sub_key(user_id, token_id)).await
    }

    pub async fn get_all(&self, tenant_id: &str, user_id: &str) -> CoreResult<Vec<TokenMetadata>> {
        let token_ids = self.index.get_access_tokens(tenant_id, user_id).await.unwrap_or_default();
        let mut out = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            if let Ok(metadata) = self.get_one(tenant_id, user_id, &token_id).await {
                out.push(metadata);
            }
        }
        Ok(out)
    }

    /// Returns the record if it exists, is not revoked, and `expires_at >
    /// now`. Otherwise propagates `NOT_FOUND`, or returns
    /// `AUTH_TOKEN_REVOKED` / `AUTH_TOKEN_EXPIRED` (§4.6).
    pub async fn validate(&self, tenant_id: &str, user_id: &str, token_id: &str) -> CoreResult<TokenMetadata> {
        let metadata = self.get_one(tenant_id, user_id, token_id).await?;
        if metadata.revoked {
            return Err(CoreError::auth("AUTH_TOKEN_REVOKED", "access token has been revoked"));
        }
        if metadata.expires_at <= Utc::now() {
            return Err(CoreError::auth("AUTH_TOKEN_EXPIRED", "access token has expired"));
        }
        Ok(metadata)
    }

    pub async fn revoke(&self, tenant_id: &str, user_id: &str, token_id: &str, revoked_by: &str) -> CoreResult<()> {
        let mut metadata = self.get_one(tenant_id, user_id, token_id).await?;
        metadata.revoked = true;
        metadata.revoked_at = Some(Utc::now());
        metadata.revoked_by = Some(revoked_by.to_string());
        let ttl = (metadata.expires_at - Utc::now()).max(Duration::zero());
        self.kv
            .update(tenant_id, &Self::sub_key(user_id, token_id), &metadata, TtlOpts::of(ttl))
            .await
    }

    /// Fetches token IDs from the index, revokes each (errors logged
    /// per-token, iteration continues), then clears the index (§4.6).
    pub async fn revoke_all(&self, tenant_id: &str, user_id: &str, revoked_by: &str) -> CoreResult<()> {
        let token_ids = self.index.get_access_tokens(tenant_id, user_id).await.map_err(|e| {
            CoreError::internal("INTERNAL_TOKEN_INDEX_UNAVAILABLE", "token index is unavailable").with_cause(
                std::io::Error::other(e.message),
            )
        })?;

        for token_id in &token_ids {
            if let Err(e) = self.revoke(tenant_id, user_id, token_id, revoked_by).await {
                if !e.is_not_found() {
                    log_swallowed("access_token_revoke_all", &e);
                }
            }
        }

        if let Err(e) = self.index.clear_access_tokens(tenant_id, user_id).await {
            log_swallowed("access_token_index_clear", &e);
        }
        Ok(())
    }

    pub async fn delete(&self, tenant_id: &str, user_id: &str, token_id: &str) -> CoreResult<()> {
        self.kv.delete(tenant_id, &Self::sub_key(user_id, token_id)).await?;
        if let Err(e) = self.index.remove_access_token(tenant_id, user_id, token_id).await {
            log_swallowed("access_token_index_remove", &e);
        }
        Ok(())
    }

    /// Hard-deletes every access-token record for `tenant_id`, used by the
    /// tenant-deletion cascade to guarantee no `tokens:{tenant_id}:*` key
    /// survives (§4.12, §8) — unlike `revoke_all`, which leaves revoked
    /// records in place until TTL.
    pub async fn purge_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.kv.delete_all_for_tenant(tenant_id).await?;
        if let Err(e) = self.index.purge_tenant(tenant_id).await {
            log_swallowed("access_token_index_purge", &e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;

    fn store() -> AccessTokenStore {
        let driver = Arc::new(MemoryKvDriver::new());
        AccessTokenStore::new(driver.clone(), TokenIndex::new(driver), Duration::hours(1))
    }

    fn sample(tenant_id: &str, user_id: &str, token_id: &str) -> TokenMetadata {
        TokenMetadata {
            token_id: token_id.to_string(),
            jti: "jti".to_string(),
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            token_type: "access".to_string(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            ip_address: None,
            user_agent: None,
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn store_rejects_mismatched_tenant() {
        let store = store();
        let err = store.store("t2", "u1", sample("t1", "u1", "tok1")).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_INVALID_VALUE");
    }

    #[tokio::test]
    async fn validate_after_revoke_returns_revoked_not_expired_or_not_found() {
        let store = store();
        store.store("t1", "u1", sample("t1", "u1", "tok1")).await.unwrap();
        store.revoke("t1", "u1", "tok1", "u1").await.unwrap();
        let err = store.validate("t1", "u1", "tok1").await.unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_REVOKED");
    }

    #[tokio::test]
    async fn validate_expired_token_returns_expired() {
        let store = store();
        let mut metadata = sample("t1", "u1", "tok1");
        metadata.expires_at = Utc::now() - Duration::seconds(1);
        store.store("t1", "u1", metadata).await.unwrap();
        let err = store.validate("t1", "u1", "tok1").await.unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn revoke_all_revokes_every_indexed_token() {
        let store = store();
        store.store("t1", "u1", sample("t1", "u1", "tok1")).await.unwrap();
        store.store("t1", "u1", sample("t1", "u1", "tok2")).await.unwrap();

        store.revoke_all("t1", "u1", "admin").await.unwrap();

        assert_eq!(store.validate("t1", "u1", "tok1").await.unwrap_err().code, "AUTH_TOKEN_REVOKED");
        assert_eq!(store.validate("t1", "u1", "tok2").await.unwrap_err().code, "AUTH_TOKEN_REVOKED");
        assert!(store.get_all("t1", "u1").await.unwrap().is_empty());
    }
}
