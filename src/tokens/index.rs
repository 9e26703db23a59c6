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

use crate::common::error::CoreResult;
use crate::store::set_index::SetIndexHandler;
use crate::store::{KvDriver, TtlOpts};
use chrono::Duration;
use std::sync::Arc;

/// Per-(tenant, user) indices mapping to the sets of live access-token IDs
/// and refresh-token IDs (C5, §4.5). Best-effort: every failure here is
/// logged and swallowed by the caller, never surfaced, because the
/// authoritative state lives in the Access/Refresh stores.
#[derive(Clone)]
pub struct TokenIndex {
    access: SetIndexHandler,
    refresh: SetIndexHandler,
}

impl TokenIndex {
    pub fn new(driver: Arc<dyn KvDriver>) -> Self {
        Self {
            access: SetIndexHandler::new(driver.clone(), "user_access_tokens"),
            refresh: SetIndexHandler::new(driver, "user_refresh_tokens"),
        }
    }

    pub async fn add_access_token(
        &self,
        tenant_id: &str,
        user_id: &str,
        token_id: &str,
        access_ttl: Duration,
    ) -> CoreResult<()> {
        self.access
            .add(tenant_id, user_id, token_id, TtlOpts::of(access_ttl * 2))
            .await
    }

    pub async fn remove_access_token(&self, tenant_id: &str, user_id: &str, token_id: &str) -> CoreResult<()> {
        self.access.remove(tenant_id, user_id, token_id).await
    }

    pub async fn get_access_tokens(&self, tenant_id: &str, user_id: &str) -> CoreResult<Vec<String>> {
        self.access.members(tenant_id, user_id).await
    }

    pub async fn clear_access_tokens(&self, tenant_id: &str, user_id: &str) -> CoreResult<()> {
        self.access.clear(tenant_id, user_id).await
    }

    pub async fn add_refresh_token(
        &self,
        tenant_id: &str,
        user_id: &str,
        token_id: &str,
        refresh_ttl: Duration,
    ) -> CoreResult<()> {
        self.refresh
            .add(tenant_id, user_id, token_id, TtlOpts::of(refresh_ttl))
            .await
    }

    pub async fn remove_refresh_token(&self, tenant_id: &str, user_id: &str, token_id: &str) -> CoreResult<()> {
        self.refresh.remove(tenant_id, user_id, token_id).await
    }

    pub async fn get_refresh_tokens(&self, tenant_id: &str, user_id: &str) -> CoreResult<Vec<String>> {
        self.refresh.members(tenant_id, user_id).await
    }

    pub async fn clear_refresh_tokens(&self, tenant_id: &str, user_id: &str) -> CoreResult<()> {
        self.refresh.clear(tenant_id, user_id).await
    }

    /// Hard-clears both index families for every user of `tenant_id`, used
    /// by the tenant-deletion cascade (§4.12, §8).
    pub async fn purge_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.access.clear_all_for_tenant(tenant_id).await?;
        self.refresh.clear_all_for_tenant(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;

    fn index() -> TokenIndex {
        TokenIndex::new(Arc::new(MemoryKvDriver::new()))
    }

    #[tokio::test]
    async fn access_tokens_are_tracked_independently_of_refresh() {
        let idx = index();
        idx.add_access_token("t1", "u1", "atok", Duration::hours(1)).await.unwrap();
        idx.add_refresh_token("t1", "u1", "rtok", Duration::days(7)).await.unwrap();

        assert_eq!(idx.get_access_tokens("t1", "u1").await.unwrap(), vec!["atok".to_string()]);
        assert_eq!(idx.get_refresh_tokens("t1", "u1").await.unwrap(), vec!["rtok".to_string()]);
    }

    #[tokio::test]
    async fn clear_access_tokens_does_not_touch_refresh() {
        let idx = index();
        idx.add_access_token("t1", "u1", "atok", Duration::hours(1)).await.unwrap();
        idx.add_refresh_token("t1", "u1", "rtok", Duration::days(7)).await.unwrap();
        idx.clear_access_tokens("t1", "u1").await.unwrap();

        assert!(idx.get_access_tokens("t1", "u1").await.unwrap().is_empty());
        assert_eq!(idx.get_refresh_tokens("t1", "u1").await.unwrap(), vec!["rtok".to_string()]);
    }
}
