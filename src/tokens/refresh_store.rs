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
use crate::tokens::model::RefreshToken;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Stores/validates/revokes refresh-token records, plus last-used tracking
/// (C7, §4.7). Keys: `refresh_tokens:{tenant_id}:{user_id}:{token_id}`
/// where `token_id` is the opaque token value (§6.2, §10.6).
#[derive(Clone)]
pub struct RefreshTokenStore {
    kv: KeyValueHandler<RefreshToken>,
    index: TokenIndex,
    refresh_ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(driver: Arc<dyn KvDriver>, index: TokenIndex, refresh_ttl: Duration) -> Self {
        Self {
            kv: KeyValueHandler::new(driver, "refresh_tokens"),
            index,
            refresh_ttl,
        }
    }

    fn sub_key(user_id: &str, token: &str) -> String {
        format!("{user_id}:{token}")
    }

    pub async fn store(&self, tenant_id: &str, user_id: &str, refresh: RefreshToken) -> CoreResult<()> {
        if refresh.token.is_empty() || refresh.user_id.is_empty() || refresh.tenant_id.is_empty() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "token, user_id and tenant_id must be present",
            ));
        }
        if refresh.tenant_id != tenant_id || refresh.user_id != user_id {
            return Err(CoreError::validation(
                "VALIDATION_INVALID_VALUE",
                "refresh token tenant_id/user_id disagree with the positional arguments",
            ));
        }

        let sub_key = Self::sub_key(user_id, &refresh.token);
        let ttl = (refresh.expires_at - Utc::now()).max(Duration::zero());
        self.kv.set(tenant_id, &sub_key, &refresh, TtlOpts::of(ttl)).await?;

        if let Err(e) = self
            .index
            .add_refresh_token(tenant_id, user_id, &refresh.token, self.refresh_ttl)
            .await
        {
            log_swallowed("refresh_token_index_add", &e);
        }
        Ok(())
    }

    pub async fn get_one(&self, tenant_id: &str, user_id: &str, token: &str) -> CoreResult<RefreshToken> {
        self.kv.get_one(tenant_id, &Self::sub_key(user_id, token)).await
    }

    pub async fn get_all(&self, tenant_id: &str, user_id: &str) -> CoreResult<Vec<RefreshToken>> {
        let tokens = self.index.get_refresh_tokens(tenant_id, user_id).await.unwrap_or_default();
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Ok(record) = self.get_one(tenant_id, user_id, &token).await {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn validate(&self, tenant_id: &str, user_id: &str, token: &str) -> CoreResult<RefreshToken> {
        let record = self.get_one(tenant_id, user_id, token).await?;
        if record.is_revoked {
            return Err(CoreError::auth("AUTH_TOKEN_REVOKED", "refresh token has been revoked"));
        }
        if record.expires_at <= Utc::now() {
            return Err(CoreError::auth("AUTH_TOKEN_EXPIRED", "refresh token has expired"));
        }
        Ok(record)
    }

    pub async fn revoke(&self, tenant_id: &str, user_id: &str, token: &str, revoked_by: &str) -> CoreResult<()> {
        let _ = revoked_by;
        let mut record = self.get_one(tenant_id, user_id, token).await?;
        record.is_revoked = true;
        record.revoked_at = Some(Utc::now());
        let ttl = (record.expires_at - Utc::now()).max(Duration::zero());
        self.kv
            .update(tenant_id, &Self::sub_key(user_id, token), &record, TtlOpts::of(ttl))
            .await
    }

    pub async fn revoke_all(&self, tenant_id: &str, user_id: &str, revoked_by: &str) -> CoreResult<()> {
        let tokens = self.index.get_refresh_tokens(tenant_id, user_id).await.map_err(|e| {
            CoreError::internal("INTERNAL_TOKEN_INDEX_UNAVAILABLE", "token index is unavailable").with_cause(
                std::io::Error::other(e.message),
            )
        })?;

        for token in &tokens {
            if let Err(e) = self.revoke(tenant_id, user_id, token, revoked_by).await {
                if !e.is_not_found() {
                    log_swallowed("refresh_token_revoke_all", &e);
                }
            }
        }

        if let Err(e) = self.index.clear_refresh_tokens(tenant_id, user_id).await {
            log_swallowed("refresh_token_index_clear", &e);
        }
        Ok(())
    }

    pub async fn delete(&self, tenant_id: &str, user_id: &str, token: &str) -> CoreResult<()> {
        self.kv.delete(tenant_id, &Self::sub_key(user_id, token)).await?;
        if let Err(e) = self.index.remove_refresh_token(tenant_id, user_id, token).await {
            log_swallowed("refresh_token_index_remove", &e);
        }
        Ok(())
    }

    /// Hard-deletes every refresh-token record for `tenant_id` (§4.12, §8);
    /// see `AccessTokenStore::purge_tenant` for why this differs from
    /// `revoke_all`.
    pub async fn purge_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.kv.delete_all_for_tenant(tenant_id).await?;
        if let Err(e) = self.index.purge_tenant(tenant_id).await {
            log_swallowed("refresh_token_index_purge", &e);
        }
        Ok(())
    }

    pub async fn update_last_used(&self, tenant_id: &str, user_id: &str, token: &str) -> CoreResult<()> {
        let mut record = self.get_one(tenant_id, user_id, token).await?;
        record.last_used_at = Some(Utc::now());
        let ttl = (record.expires_at - Utc::now()).max(Duration::zero());
        self.kv
            .update(tenant_id, &Self::sub_key(user_id, token), &record, TtlOpts::of(ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;

    fn store() -> RefreshTokenStore {
        let driver = Arc::new(MemoryKvDriver::new());
        RefreshTokenStore::new(driver.clone(), TokenIndex::new(driver), Duration::days(7))
    }

    fn sample(tenant_id: &str, user_id: &str, token: &str) -> RefreshToken {
        RefreshToken {
            token: token.to_string(),
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            session_id: None,
            device_id: None,
            ip_address: None,
            user_agent: None,
            expires_at: Utc::now() + Duration::days(7),
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
            is_revoked: false,
        }
    }

    #[tokio::test]
    async fn update_last_used_persists() {
        let store = store();
        store.store("t1", "u1", sample("t1", "u1", "rtok")).await.unwrap();
        store.update_last_used("t1", "u1", "rtok").await.unwrap();
        let record = store.get_one("t1", "u1", "rtok").await.unwrap();
        assert!(record.last_used_at.is_some());
    }

    #[tokio::test]
    async fn revoked_refresh_token_fails_validate() {
        let store = store();
        store.store("t1", "u1", sample("t1", "u1", "rtok")).await.unwrap();
        store.revoke("t1", "u1", "rtok", "system").await.unwrap();
        let err = store.validate("t1", "u1", "rtok").await.unwrap_err();
        assert_eq!(err.code, "AUTH_TOKEN_REVOKED");
    }
}
