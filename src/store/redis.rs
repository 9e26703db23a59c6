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

//! Reference `KvDriver` backed by Redis (§10.5). Scalar keys use `SET`/`GET`
//! with `EX` for TTL; set-valued keys use `SADD`/`SREM`/`SMEMBERS` with
//! `EXPIRE` applied on every `sadd` that carries a TTL, matching §4.4's
//! "`Add` optionally sets/extends the key's TTL". `scan_prefix` uses `KEYS`
//! rather than a cursor-based `SCAN` loop for simplicity; call sites only
//! use it for the bounded per-tenant sweeps of §4.3/§8, never over the
//! whole keyspace.

use crate::common::error::{CoreError, CoreResult};
use crate::store::{KvDriver, TtlOpts};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct RedisKvDriver {
    conn: ConnectionManager,
}

impl RedisKvDriver {
    pub async fn connect(uri: &str) -> CoreResult<Self> {
        let client = redis::Client::open(uri)
            .map_err(|e| CoreError::internal("INTERNAL_DATABASE_ERROR", "invalid key-value store URI").with_cause(e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CoreError::internal("INTERNAL_DATABASE_ERROR", "failed to connect to key-value store").with_cause(e))?;
        Ok(Self { conn })
    }
}

fn kv_error(e: redis::RedisError) -> CoreError {
    CoreError::internal("INTERNAL_DATABASE_ERROR", "key-value store operation failed").with_cause(e)
}

#[async_trait]
impl KvDriver for RedisKvDriver {
    async fn set(&self, key: &str, value: Vec<u8>, opts: TtlOpts) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        match opts.ttl.and_then(|d| d.num_seconds().try_into().ok()) {
            Some(secs) if secs > 0 => conn
                .set_ex::<_, _, ()>(key, value, secs)
                .await
                .map_err(kv_error),
            _ => conn.set::<_, _, ()>(key, value).await.map_err(kv_error),
        }
    }

    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(kv_error)
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(kv_error)
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{prefix}:*")).await.map_err(kv_error)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = conn.get::<_, Option<Vec<u8>>>(&key).await.map_err(kv_error)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    async fn delete_prefix(&self, prefix: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{prefix}:*")).await.map_err(kv_error)?;
        if keys.is_empty() {
            return Ok(());
        }
        conn.del::<_, ()>(keys).await.map_err(kv_error)
    }

    async fn sadd(&self, key: &str, member: &str, opts: TtlOpts) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await.map_err(kv_error)?;
        if let Some(secs) = opts.ttl.and_then(|d| d.num_seconds().try_into().ok()) {
            let secs: i64 = secs;
            if secs > 0 {
                conn.expire::<_, ()>(key, secs).await.map_err(kv_error)?;
            }
        }
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member).await.map_err(kv_error)
    }

    async fn smembers(&self, key: &str) -> CoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(kv_error)
    }

    async fn sclear(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(kv_error)
    }
}
