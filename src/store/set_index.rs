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
use crate::store::{KvDriver, TtlOpts};
use std::sync::Arc;

/// Add/remove/members/clear over set-valued keys with TTL (C4, §4.4). Used
/// directly by `tokens::index::TokenIndex` to back the two per-(tenant,user)
/// index families.
#[derive(Clone)]
pub struct SetIndexHandler {
    driver: Arc<dyn KvDriver>,
    prefix: &'static str,
}

impl SetIndexHandler {
    pub fn new(driver: Arc<dyn KvDriver>, prefix: &'static str) -> Self {
        Self { driver, prefix }
    }

    fn key(&self, tenant_id: &str, sub_key: &str) -> String {
        format!("{}:{}:{}", self.prefix, tenant_id, sub_key)
    }

    /// Adds `member` to the set, optionally setting/extending the key's TTL.
    pub async fn add(&self, tenant_id: &str, key: &str, member: &str, opts: TtlOpts) -> CoreResult<()> {
        self.driver.sadd(&self.key(tenant_id, key), member, opts).await
    }

    /// Removing a non-member is not an error.
    pub async fn remove(&self, tenant_id: &str, key: &str, member: &str) -> CoreResult<()> {
        self.driver.srem(&self.key(tenant_id, key), member).await
    }

    pub async fn members(&self, tenant_id: &str, key: &str) -> CoreResult<Vec<String>> {
        self.driver.smembers(&self.key(tenant_id, key)).await
    }

    /// Idempotent: clearing an already-empty or nonexistent key succeeds.
    pub async fn clear(&self, tenant_id: &str, key: &str) -> CoreResult<()> {
        self.driver.sclear(&self.key(tenant_id, key)).await
    }

    /// Hard-clears every set-valued key under this handler's prefix for
    /// `tenant_id`, used by the tenant-deletion cascade alongside
    /// `KeyValueHandler::delete_all_for_tenant` (§8).
    pub async fn clear_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        let prefix = format!("{}:{}", self.prefix, tenant_id);
        self.driver.delete_prefix(&prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;

    fn handler() -> SetIndexHandler {
        SetIndexHandler::new(Arc::new(MemoryKvDriver::new()), "idx")
    }

    #[tokio::test]
    async fn add_then_members_contains_it() {
        let h = handler();
        h.add("t1", "u1", "tok-a", TtlOpts::none()).await.unwrap();
        h.add("t1", "u1", "tok-b", TtlOpts::none()).await.unwrap();
        let mut members = h.members("t1", "u1").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["tok-a".to_string(), "tok-b".to_string()]);
    }

    #[tokio::test]
    async fn removing_non_member_is_not_an_error() {
        let h = handler();
        h.remove("t1", "u1", "nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let h = handler();
        h.add("t1", "u1", "tok-a", TtlOpts::none()).await.unwrap();
        h.clear("t1", "u1").await.unwrap();
        h.clear("t1", "u1").await.unwrap();
        assert!(h.members("t1", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_all_for_tenant_removes_every_users_set() {
        let h = handler();
        h.add("t1", "u1", "tok-a", TtlOpts::none()).await.unwrap();
        h.add("t1", "u2", "tok-b", TtlOpts::none()).await.unwrap();
        h.add("t2", "u1", "tok-c", TtlOpts::none()).await.unwrap();

        h.clear_all_for_tenant("t1").await.unwrap();

        assert!(h.members("t1", "u1").await.unwrap().is_empty());
        assert!(h.members("t1", "u2").await.unwrap().is_empty());
        assert_eq!(h.members("t2", "u1").await.unwrap(), vec!["tok-c".to_string()]);
    }
}
