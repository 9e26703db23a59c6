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
use crate::store::document::DocumentCollection;
use crate::store::{DocumentDriver, Filter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Inactive,
    Trial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantContact {
    pub email: Option<String>,
}

/// `tenants` document (§3, §6.3). The only collection not scoped by
/// `tenant_id` — a tenant is its own scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub status: TenantStatus,
    #[serde(default)]
    pub contact: TenantContact,
    pub subscription: serde_json::Value,
    pub settings: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantsRepository: Send + Sync {
    async fn create(&self, tenant: Tenant) -> CoreResult<String>;
    async fn find_by_id(&self, tenant_id: &str) -> CoreResult<Tenant>;
    async fn find_all(&self) -> CoreResult<Vec<Tenant>>;
    async fn update(&self, tenant: Tenant) -> CoreResult<()>;
    async fn delete(&self, tenant_id: &str) -> CoreResult<()>;
}

pub struct PgTenantsRepository {
    collection: DocumentCollection<Tenant>,
}

impl PgTenantsRepository {
    pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            collection: DocumentCollection::new(driver, "tenants"),
        }
    }
}

#[async_trait]
impl TenantsRepository for PgTenantsRepository {
    async fn create(&self, mut tenant: Tenant) -> CoreResult<String> {
        if tenant.name.trim().is_empty() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "tenant name must not be empty",
            ));
        }
        let now = Utc::now();
        tenant.created_at = now;
        tenant.updated_at = now;
        self.collection.create(&tenant.id, None, &tenant).await?;
        Ok(tenant.id.clone())
    }

    async fn find_by_id(&self, tenant_id: &str) -> CoreResult<Tenant> {
        self.collection
            .find_one(&Filter::new().eq("id", tenant_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::not_found("NOT_FOUND_TENANT", "tenant not found")
                        .with_detail("resource_type", "tenant")
                        .with_detail("resource_id", tenant_id)
                } else {
                    e
                }
            })
    }

    async fn find_all(&self) -> CoreResult<Vec<Tenant>> {
        self.collection.find_all(&Filter::new()).await
    }

    async fn update(&self, tenant: Tenant) -> CoreResult<()> {
        let existing = self.find_by_id(&tenant.id).await?;
        if existing.created_at != tenant.created_at {
            return Err(CoreError::validation(
                "VALIDATION_TRY_TO_CHANGE_RESTRICTED_FIELDS",
                "created_at is immutable",
            ));
        }
        let mut updated = tenant;
        updated.updated_at = Utc::now();
        self.collection
            .update(&Filter::new().eq("id", updated.id.clone()), &updated)
            .await
    }

    async fn delete(&self, tenant_id: &str) -> CoreResult<()> {
        self.collection.delete(&Filter::new().eq("id", tenant_id)).await
    }
}
