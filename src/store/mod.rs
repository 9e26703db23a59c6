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

pub mod document;
pub mod kv;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod set_index;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// A single `Document` as persisted by a `DocumentDriver`: an opaque JSON
/// body plus the bookkeeping columns every collection shares.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub tenant_id: Option<String>,
    pub body: Value,
}

/// A match expression against a single field, matching the `filter` shape of
/// the generic Document Collection (§4.2): either an equality match or a
/// small set of sub-expressions.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Eq(Value),
    /// `{"$all": [...]}` — the field (an array) must contain every value.
    All(Vec<Value>),
    /// `{"$in": [...]}` — the field must equal one of the given values.
    In(Vec<Value>),
}

/// A mapping from field name to match expression, the `filter` argument
/// threaded through every Document Collection operation (§4.2).
#[derive(Debug, Clone, Default)]
pub struct Filter(BTreeMap<String, FilterValue>);

impl Filter {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), FilterValue::Eq(value.into()));
        self
    }

    pub fn all(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.insert(field.into(), FilterValue::All(values));
        self
    }

    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.insert(field.into(), FilterValue::In(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self.0.get("tenant_id") {
            Some(FilterValue::Eq(Value::String(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    /// Evaluates this filter against a document body, used by the in-memory
    /// driver and by tests. Unknown fields in `body` are ignored; a filter
    /// field absent from `body` never matches.
    pub fn matches(&self, body: &Value) -> bool {
        self.0.iter().all(|(field, expr)| {
            let Some(actual) = body.get(field) else {
                return false;
            };
            match expr {
                FilterValue::Eq(expected) => actual == expected,
                FilterValue::All(expected) => {
                    let Some(arr) = actual.as_array() else {
                        return false;
                    };
                    expected.iter().all(|v| arr.contains(v))
                }
                FilterValue::In(expected) => expected.contains(actual),
            }
        })
    }
}

/// Trait boundary the generic Document Collection (C2) is built on top of.
/// Per §1 the driver internals (a real Postgres/JSONB store, a Mongo store,
/// whatever) are external collaborators; this crate only fixes the contract
/// and ships one reference implementation (`postgres::PgDocumentDriver`) plus
/// an in-memory test double (`memory::MemoryDocumentDriver`).
///
/// The tenant-scope invariant of §4.2 ("every filter must contain tenant_id
/// except for the tenants collection itself") is enforced by the driver:
/// implementations must reject filters lacking `tenant_id` for any
/// collection other than `"tenants"`.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    async fn create(
        &self,
        collection: &str,
        id: &str,
        tenant_id: Option<&str>,
        body: Value,
    ) -> Result<(), crate::common::error::CoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, crate::common::error::CoreError>;

    async fn find_all(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, crate::common::error::CoreError>;

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        body: Value,
    ) -> Result<(), crate::common::error::CoreError>;

    async fn delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<(), crate::common::error::CoreError>;
}

/// Options accepted by `KvDriver::set` / `SetIndexHandler::add` (§4.3/§4.4):
/// an optional time-to-live for the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtlOpts {
    pub ttl: Option<chrono::Duration>,
}

impl TtlOpts {
    pub fn none() -> Self {
        Self { ttl: None }
    }

    pub fn of(ttl: chrono::Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Trait boundary the generic Key-Value Handler (C3) and Set-Index Handler
/// (C4) are built on top of. Reference implementation: `redis::RedisKvDriver`
/// (§10.5); test double: `memory::MemoryKvDriver`.
#[async_trait]
pub trait KvDriver: Send + Sync {
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        opts: TtlOpts,
    ) -> Result<(), crate::common::error::CoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, crate::common::error::CoreError>;

    async fn delete(&self, key: &str) -> Result<(), crate::common::error::CoreError>;

    /// Lists every value under a `prefix:tenant_id:*` style scan, used by
    /// `GetAll` (§4.3). Only valid against scalar (non-set) keys.
    async fn scan_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, crate::common::error::CoreError>;

    /// Hard-deletes every key (scalar or set-valued) under a
    /// `prefix:tenant_id:*` style scan, used by the cascade-delete key
    /// sweep (§8's `no KV key matches *:{T}:*` property). Unlike
    /// `scan_prefix`, this never reads the matched keys' values, so it
    /// works across both key shapes this trait manages.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), crate::common::error::CoreError>;

    async fn sadd(
        &self,
        key: &str,
        member: &str,
        opts: TtlOpts,
    ) -> Result<(), crate::common::error::CoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), crate::common::error::CoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, crate::common::error::CoreError>;

    async fn sclear(&self, key: &str) -> Result<(), crate::common::error::CoreError>;
}
