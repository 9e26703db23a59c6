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

use crate::common::error::{CoreError, CoreResult};
use crate::store::{KvDriver, TtlOpts};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Generic get/set/update/delete over a key-value store with JSON codec and
/// key namespacing (C3, §4.3). Keys are composed as
/// `"<prefix>:<tenant_id>:<subkey>"`; `prefix` is fixed per handler instance
/// (`tokens`, `refresh_tokens`, per §6.2).
pub struct KeyValueHandler<T> {
    driver: Arc<dyn KvDriver>,
    prefix: &'static str,
    _marker: PhantomData<T>,
}

impl<T> Clone for KeyValueHandler<T> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            prefix: self.prefix,
            _marker: PhantomData,
        }
    }
}

impl<T> KeyValueHandler<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(driver: Arc<dyn KvDriver>, prefix: &'static str) -> Self {
        Self {
            driver,
            prefix,
            _marker: PhantomData,
        }
    }

    pub fn key(&self, tenant_id: &str, sub_key: &str) -> String {
        format!("{}:{}:{}", self.prefix, tenant_id, sub_key)
    }

    pub async fn set(&self, tenant_id: &str, sub_key: &str, value: &T, opts: TtlOpts) -> CoreResult<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CoreError::internal("INTERNAL_SERIALIZATION", "failed to encode kv value").with_cause(e))?;
        self.driver.set(&self.key(tenant_id, sub_key), bytes, opts).await
    }

    pub async fn get_one(&self, tenant_id: &str, sub_key: &str) -> CoreResult<T> {
        match self.driver.get(&self.key(tenant_id, sub_key)).await? {
            Some(bytes) => Self::decode(&bytes),
            None => Err(CoreError::not_found(
                "NOT_FOUND_RESOURCE",
                format!("no value for key under prefix {}", self.prefix),
            )),
        }
    }

    pub async fn get_one_opt(&self, tenant_id: &str, sub_key: &str) -> CoreResult<Option<T>> {
        match self.driver.get(&self.key(tenant_id, sub_key)).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_all(&self, tenant_id: &str) -> CoreResult<Vec<T>> {
        let scan_prefix = format!("{}:{}", self.prefix, tenant_id);
        let entries = self.driver.scan_prefix(&scan_prefix).await?;
        entries
            .into_iter()
            .map(|(_, bytes)| Self::decode(&bytes))
            .collect()
    }

    pub async fn update(&self, tenant_id: &str, sub_key: &str, value: &T, opts: TtlOpts) -> CoreResult<()> {
        self.set(tenant_id, sub_key, value, opts).await
    }

    pub async fn delete(&self, tenant_id: &str, sub_key: &str) -> CoreResult<()> {
        self.driver.delete(&self.key(tenant_id, sub_key)).await
    }

    /// Hard-deletes every key under this handler's prefix for `tenant_id`,
    /// used by the tenant-deletion cascade to satisfy §8's "no KV key
    /// matches `*:{T}:*`" post-condition rather than relying on TTL expiry.
    pub async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        let prefix = format!("{}:{}", self.prefix, tenant_id);
        self.driver.delete_prefix(&prefix).await
    }

    fn decode(bytes: &[u8]) -> CoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            CoreError::internal("INTERNAL_DESERIALIZATION", "failed to decode kv value").with_cause(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKvDriver;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        name: String,
    }

    fn handler() -> KeyValueHandler<Widget> {
        KeyValueHandler::new(Arc::new(MemoryKvDriver::new()), "widgets")
    }

    #[tokio::test]
    async fn set_then_get_one_round_trips() {
        let h = handler();
        let widget = Widget { name: "gear".into() };
        h.set("t1", "w1", &widget, TtlOpts::none()).await.unwrap();
        let found = h.get_one("t1", "w1").await.unwrap();
        assert_eq!(found, widget);
    }

    #[tokio::test]
    async fn get_one_missing_is_not_found() {
        let h = handler();
        let err = h.get_one("t1", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn key_is_namespaced_by_prefix_tenant_and_subkey() {
        let h = handler();
        assert_eq!(h.key("t1", "w1"), "widgets:t1:w1");
    }

    #[tokio::test]
    async fn delete_all_for_tenant_removes_every_key_under_the_prefix() {
        let h = handler();
        h.set("t1", "w1", &Widget { name: "gear".into() }, TtlOpts::none())
            .await
            .unwrap();
        h.set("t1", "w2", &Widget { name: "cog".into() }, TtlOpts::none())
            .await
            .unwrap();
        h.set("t2", "w1", &Widget { name: "other-tenant".into() }, TtlOpts::none())
            .await
            .unwrap();

        h.delete_all_for_tenant("t1").await.unwrap();

        assert!(h.get_one("t1", "w1").await.is_err());
        assert!(h.get_one("t1", "w2").await.is_err());
        assert!(h.get_one("t2", "w1").await.is_ok());
    }
}
