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

//! Reference `DocumentDriver` backed by a single schemaless JSONB table,
//! one row per document across every collection. Grounded in the `sqlx`
//! repository style used throughout `manager::*::repository` (bind
//! parameters, `query_as`/`query` against a pool), generalized from
//! one-table-per-entity to a single table since C2 is generic over `T`.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection  TEXT NOT NULL,
//!     id          TEXT NOT NULL,
//!     tenant_id   TEXT,
//!     body        JSONB NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (collection, id)
//! );
//! CREATE INDEX documents_tenant_idx ON documents (collection, tenant_id);
//! ```

use crate::common::error::{CoreError, CoreResult};
use crate::store::{DocumentDriver, Filter, FilterValue, StoredDocument};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::Row;

pub struct PgDocumentDriver {
    pool: PgPool,
}

impl PgDocumentDriver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(uri: &str) -> CoreResult<Self> {
        let pool = PgPool::connect(uri)
            .await
            .map_err(|e| CoreError::internal("INTERNAL_DATABASE_ERROR", "failed to connect to document store").with_cause(e))?;
        Ok(Self::new(pool))
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

/// Translates a `Filter` into a JSONB `body @> ...` style predicate plus
/// bind values, appended to a base `WHERE collection = $1`.
fn filter_predicate(filter: &Filter, next_param: &mut i32) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for (field, expr) in filter.iter() {
        match expr {
            FilterValue::Eq(value) => {
                clauses.push(format!("body -> '{field}' = ${}", *next_param));
                binds.push(value.clone());
                *next_param += 1;
            }
            FilterValue::All(values) => {
                clauses.push(format!("body -> '{field}' @> ${}", *next_param));
                binds.push(Value::Array(values.clone()));
                *next_param += 1;
            }
            FilterValue::In(values) => {
                clauses.push(format!(
                    "body -> '{field}' <@ ${} AND body ? '{field}'",
                    *next_param
                ));
                binds.push(Value::Array(values.clone()));
                *next_param += 1;
            }
        }
    }
    (clauses.join(" AND "), binds)
}

fn db_error(e: sqlx::Error) -> CoreError {
    CoreError::internal("INTERNAL_DATABASE_ERROR", "document store operation failed").with_cause(e)
}

#[async_trait]
impl DocumentDriver for PgDocumentDriver {
    async fn create(&self, collection: &str, id: &str, tenant_id: Option<&str>, body: Value) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, tenant_id, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, now(), now())",
        )
        .bind(collection)
        .bind(id)
        .bind(tenant_id)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> CoreResult<Option<StoredDocument>> {
        require_tenant_scope(collection, filter)?;
        let mut next_param = 2;
        let (predicate, binds) = filter_predicate(filter, &mut next_param);
        let sql = if predicate.is_empty() {
            "SELECT id, tenant_id, body FROM documents WHERE collection = $1 LIMIT 1".to_string()
        } else {
            format!("SELECT id, tenant_id, body FROM documents WHERE collection = $1 AND {predicate} LIMIT 1")
        };
        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(db_error)?;
        Ok(row.map(|r| StoredDocument {
            id: r.get("id"),
            tenant_id: r.get("tenant_id"),
            body: r.get("body"),
        }))
    }

    async fn find_all(&self, collection: &str, filter: &Filter) -> CoreResult<Vec<StoredDocument>> {
        require_tenant_scope(collection, filter)?;
        let mut next_param = 2;
        let (predicate, binds) = filter_predicate(filter, &mut next_param);
        let sql = if predicate.is_empty() {
            "SELECT id, tenant_id, body FROM documents WHERE collection = $1".to_string()
        } else {
            format!("SELECT id, tenant_id, body FROM documents WHERE collection = $1 AND {predicate}")
        };
        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        Ok(rows
            .into_iter()
            .map(|r| StoredDocument {
                id: r.get("id"),
                tenant_id: r.get("tenant_id"),
                body: r.get("body"),
            })
            .collect())
    }

    async fn update(&self, collection: &str, filter: &Filter, body: Value) -> CoreResult<()> {
        require_tenant_scope(collection, filter)?;
        let mut next_param = 3;
        let (predicate, binds) = filter_predicate(filter, &mut next_param);
        let sql = if predicate.is_empty() {
            "UPDATE documents SET body = $2, updated_at = now() WHERE collection = $1".to_string()
        } else {
            format!("UPDATE documents SET body = $2, updated_at = now() WHERE collection = $1 AND {predicate}")
        };
        let mut query = sqlx::query(&sql).bind(collection).bind(&body);
        for bind in binds {
            query = query.bind(bind);
        }
        let result = query.execute(&self.pool).await.map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(
                "NOT_FOUND_RESOURCE",
                format!("no document found in {collection} to update"),
            ));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> CoreResult<()> {
        require_tenant_scope(collection, filter)?;
        let mut next_param = 2;
        let (predicate, binds) = filter_predicate(filter, &mut next_param);
        let sql = if predicate.is_empty() {
            "DELETE FROM documents WHERE collection = $1".to_string()
        } else {
            format!("DELETE FROM documents WHERE collection = $1 AND {predicate}")
        };
        let mut query = sqlx::query(&sql).bind(collection);
        for bind in binds {
            query = query.bind(bind);
        }
        query.execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }
}
