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

//! In-memory `DocumentDriver`/`KvDriver` test doubles (§10.5), built on
//! `dashmap` for interior-mutable concurrent maps without an external
//! `Mutex`. Used by this crate's own unit/integration tests and usable as a
//! zero-dependency local dev backend; never intended for production use.

use crate::common::error::{CoreError, CoreResult};
use crate::store::{DocumentDriver, Filter, KvDriver, StoredDocument, TtlOpts};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Clone)]
struct MemoryDoc {
    tenant_id: Option<String>,
    body: Value,
}

/// In-memory `DocumentDriver`. Keyed by `(collection, id)`; filters other
/// than an `id` equality match are evaluated by scanning the collection,
/// which is fine at test scale.
#[derive(Default)]
pub struct MemoryDocumentDriver {
    docs: DashMap<String, MemoryDoc>,
}

impl MemoryDocumentDriver {
    pub fn new() -> Self {
        Self { docs: DashMap::new() }
    }

    fn storage_key(collection: &str, id: &str) -> String {
        format!("{collection}\u{0}{id}")
    }
}

fn require_tenant_scope(collection: &str, filter: &Filter) -> CoreResult<()> {
    if collection != "tenants" && filter.tenant_id().is_none() {
        return Err(CoreError::validation(
            "VALIDATION_REQUIRED_FIELDS",
            format!("filter on tenant-scoped collection '{collection}' must contain tenant_id"),
        ));
    }
    Ok(())
}

#[async_trait]
impl DocumentDriver for MemoryDocumentDriver {
    async fn create(
        &self,
        collection: &str,
        id: &str,
        tenant_id: Option<&str>,
        body: Value,
    ) -> CoreResult<()> {
        self.docs.insert(
            Self::storage_key(collection, id),
            MemoryDoc {
                tenant_id: tenant_id.map(str::to_string),
                body,
            },
        );
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> CoreResult<Option<StoredDocument>> {
        require_tenant_scope(collection, filter)?;
        let prefix = format!("{collection}\u{0}");
        for entry in self.docs.iter() {
            if !entry.key().starts_with(&prefix) {
                continue;
            }
            if filter.matches(&entry.value().body) {
                let id = entry.key()[prefix.len()..].to_string();
                return Ok(Some(StoredDocument {
                    id,
                    tenant_id: entry.value().tenant_id.clone(),
                    body: entry.value().body.clone(),
                }));
            }
        }
        Ok(None)
    }

    async fn find_all(&self, collection: &str, filter: &Filter) -> CoreResult<Vec<StoredDocument>> {
        require_tenant_scope(collection, filter)?;
        let prefix = format!("{collection}\u{0}");
        let mut out = Vec::new();
        for entry in self.docs.iter() {
            if !entry.key().starts_with(&prefix) {
                continue;
            }
            if filter.matches(&entry.value().body) {
                let id = entry.key()[prefix.len()..].to_string();
                out.push(StoredDocument {
                    id,
                    tenant_id: entry.value().tenant_id.clone(),
                    body: entry.value().body.clone(),
                });
            }
        }
        Ok(out)
    }

    async fn update(&self, collection: &str, filter: &Filter, body: Value) -> CoreResult<()> {
        require_tenant_scope(collection, filter)?;
        let prefix = format!("{collection}\u{0}");
        let matching_key = self.docs.iter().find_map(|entry| {
            if entry.key().starts_with(&prefix) && filter.matches(&entry.value().body) {
                Some(entry.key().clone())
            } else {
                None
            }
        });
        match matching_key {
            Some(key) => {
                if let Some(mut existing) = self.docs.get_mut(&key) {
                    existing.body = body;
                }
                Ok(())
            }
            None => Err(CoreError::not_found(
                "NOT_FOUND_RESOURCE",
                format!("no document found in {collection} to update"),
            )),
        }
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> CoreResult<()> {
        require_tenant_scope(collection, filter)?;
        let prefix = format!("{collection}\u{0}");
        let matching_keys: Vec<String> = self
            .docs
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix) && filter.matches(&entry.value().body))
            .map(|entry| entry.key().clone())
            .collect();
        for key in matching_keys {
            self.docs.remove(&key);
        }
        Ok(())
    }
}

struct MemoryValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

struct MemorySet {
    members: std::collections::BTreeSet<String>,
    expires_at: Option<Instant>,
}

/// In-memory `KvDriver`. TTLs are tracked with `std::time::Instant` and
/// checked lazily on read; there is no background reaper, matching the
/// spec's "handled by TTL" language loosely enough for test purposes.
#[derive(Default)]
pub struct MemoryKvDriver {
    values: DashMap<String, MemoryValue>,
    sets: DashMap<String, MemorySet>,
}

impl MemoryKvDriver {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            sets: DashMap::new(),
        }
    }

    fn deadline(opts: TtlOpts) -> Option<Instant> {
        opts.ttl
            .and_then(|d| d.to_std().ok())
            .map(|d| Instant::now() + d)
    }

    fn extend_deadline(existing: Option<Instant>, opts: TtlOpts) -> Option<Instant> {
        match Self::deadline(opts) {
            Some(new_deadline) => Some(new_deadline),
            None => existing,
        }
    }
}

#[async_trait]
impl KvDriver for MemoryKvDriver {
    async fn set(&self, key: &str, value: Vec<u8>, opts: TtlOpts) -> CoreResult<()> {
        self.values.insert(
            key.to_string(),
            MemoryValue {
                bytes: value,
                expires_at: Self::deadline(opts),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        match self.values.get(key) {
            Some(entry) => {
                if entry.expires_at.is_some_and(|d| d <= Instant::now()) {
                    drop(entry);
                    self.values.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(entry.bytes.clone()))
                }
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.values.remove(key);
        Ok(())
    }

    /// Matches the `KvDriver` contract's `"{prefix}:*"` glob (see
    /// `RedisKvDriver`): callers pass `prefix` with no trailing separator, so
    /// this appends one before comparing, or tenant `"t1"`'s prefix would
    /// also match `"t10"`/`"t1x"` keys.
    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let now = Instant::now();
        let prefix = format!("{prefix}:");
        Ok(self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix) && !entry.value().expires_at.is_some_and(|d| d <= now))
            .map(|entry| (entry.key().clone(), entry.value().bytes.clone()))
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> CoreResult<()> {
        let prefix = format!("{prefix}:");
        let matching_values: Vec<String> = self
            .values
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in matching_values {
            self.values.remove(&key);
        }
        let matching_sets: Vec<String> = self
            .sets
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in matching_sets {
            self.sets.remove(&key);
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str, opts: TtlOpts) -> CoreResult<()> {
        let mut set = self.sets.entry(key.to_string()).or_insert_with(|| MemorySet {
            members: std::collections::BTreeSet::new(),
            expires_at: None,
        });
        set.members.insert(member.to_string());
        set.expires_at = Self::extend_deadline(set.expires_at, opts);
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CoreResult<()> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.members.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CoreResult<Vec<String>> {
        match self.sets.get(key) {
            Some(set) => {
                if set.expires_at.is_some_and(|d| d <= Instant::now()) {
                    drop(set);
                    self.sets.remove(key);
                    Ok(Vec::new())
                } else {
                    Ok(set.members.iter().cloned().collect())
                }
            }
            None => Ok(Vec::new()),
        }
    }

    async fn sclear(&self, key: &str) -> CoreResult<()> {
        self.sets.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[tokio::test]
    async fn document_create_find_update_delete_round_trip() {
        let driver = MemoryDocumentDriver::new();
        driver
            .create("widgets", "w1", Some("t1"), serde_json::json!({"tenant_id": "t1", "name": "gear"}))
            .await
            .unwrap();

        let filter = Filter::new().eq("tenant_id", "t1").eq("name", "gear");
        let found = driver.find_one("widgets", &filter).await.unwrap();
        assert!(found.is_some());

        driver
            .update("widgets", &filter, serde_json::json!({"tenant_id": "t1", "name": "renamed"}))
            .await
            .unwrap();
        let renamed_filter = Filter::new().eq("tenant_id", "t1").eq("name", "renamed");
        assert!(driver.find_one("widgets", &renamed_filter).await.unwrap().is_some());

        driver.delete("widgets", &renamed_filter).await.unwrap();
        assert!(driver.find_one("widgets", &renamed_filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_tenant_filter_on_tenant_scoped_collection_is_rejected() {
        let driver = MemoryDocumentDriver::new();
        let err = driver
            .find_one("widgets", &Filter::new().eq("name", "gear"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "VALIDATION_REQUIRED_FIELDS");
    }

    #[tokio::test]
    async fn kv_value_expires_after_ttl() {
        let driver = MemoryKvDriver::new();
        driver
            .set("k1", b"hello".to_vec(), TtlOpts::of(chrono::Duration::milliseconds(20)))
            .await
            .unwrap();
        assert_eq!(driver.get("k1").await.unwrap(), Some(b"hello".to_vec()));
        sleep(Duration::from_millis(50));
        assert_eq!(driver.get("k1").await.unwrap(), None);
    }

    /// `"tokens:t1"` must not match `"tokens:t10:..."` keys: a bare
    /// `starts_with` would treat tenant `"t1"`'s prefix as a prefix of
    /// tenant `"t10"`'s keys too.
    #[tokio::test]
    async fn scan_prefix_does_not_match_tenant_ids_that_share_a_prefix() {
        let driver = MemoryKvDriver::new();
        driver
            .set("tokens:t1:tok-a", b"t1-value".to_vec(), TtlOpts::none())
            .await
            .unwrap();
        driver
            .set("tokens:t10:tok-b", b"t10-value".to_vec(), TtlOpts::none())
            .await
            .unwrap();

        let matches = driver.scan_prefix("tokens:t1").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "tokens:t1:tok-a");
    }

    #[tokio::test]
    async fn delete_prefix_does_not_remove_keys_of_a_tenant_that_shares_a_prefix() {
        let driver = MemoryKvDriver::new();
        driver
            .set("tokens:t1:tok-a", b"t1-value".to_vec(), TtlOpts::none())
            .await
            .unwrap();
        driver
            .set("tokens:t10:tok-b", b"t10-value".to_vec(), TtlOpts::none())
            .await
            .unwrap();
        driver.sadd("user_access_tokens:t1:u1", "tok-a", TtlOpts::none()).await.unwrap();
        driver.sadd("user_access_tokens:t10:u1", "tok-b", TtlOpts::none()).await.unwrap();

        driver.delete_prefix("tokens:t1").await.unwrap();
        driver.delete_prefix("user_access_tokens:t1").await.unwrap();

        assert_eq!(driver.get("tokens:t1:tok-a").await.unwrap(), None);
        assert_eq!(driver.get("tokens:t10:tok-b").await.unwrap(), Some(b"t10-value".to_vec()));
        assert!(driver.smembers("user_access_tokens:t1:u1").await.unwrap().is_empty());
        assert_eq!(driver.smembers("user_access_tokens:t10:u1").await.unwrap(), vec!["tok-b".to_string()]);
    }
}
