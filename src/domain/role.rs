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
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleMetadata {
    pub color: Option<String>,
    pub icon: Option<String>,
    pub max_assignable: Option<u32>,
}

/// `roles` document (§3). `(tenant_id, name)` must be unique; enforced by
/// `RolesRepository::create` with a pre-check rather than a unique index,
/// matching C2's driver-agnostic contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "type")]
    pub role_type: String,
    pub is_tenant_admin: bool,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    pub priority: i32,
    pub status: String,
    #[serde(default)]
    pub metadata: RoleMetadata,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RolesRepository: Send + Sync {
    async fn create(&self, role: Role) -> CoreResult<String>;
    async fn find_by_id(&self, tenant_id: &str, role_id: &str) -> CoreResult<Role>;
    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<Role>>;
    async fn update(&self, role: Role) -> CoreResult<()>;
    async fn delete(&self, tenant_id: &str, role_id: &str) -> CoreResult<()>;
    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()>;
}

pub struct PgRolesRepository {
    collection: DocumentCollection<Role>,
}

impl PgRolesRepository {
    pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            collection: DocumentCollection::new(driver, "roles"),
        }
    }

    async fn name_taken(&self, tenant_id: &str, name: &str) -> CoreResult<bool> {
        let existing = self
            .collection
            .find_one_opt(&Filter::new().eq("tenant_id", tenant_id).eq("name", name))
            .await?;
        Ok(existing.is_some())
    }
}

#[async_trait]
impl RolesRepository for PgRolesRepository {
    async fn create(&self, mut role: Role) -> CoreResult<String> {
        if self.name_taken(&role.tenant_id, &role.name).await? {
            return Err(CoreError::conflict(
                "CONFLICT_DUPLICATE_RESOURCE",
                format!("role name '{}' already exists in this tenant", role.name),
            ));
        }
        let now = Utc::now();
        role.created_at = now;
        role.updated_at = now;
        self.collection
            .create(&role.id, Some(&role.tenant_id), &role)
            .await?;
        Ok(role.id.clone())
    }

    async fn find_by_id(&self, tenant_id: &str, role_id: &str) -> CoreResult<Role> {
        self.collection
            .find_one(&Filter::new().eq("tenant_id", tenant_id).eq("id", role_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::not_found("NOT_FOUND_ROLE", "role not found")
                        .with_detail("resource_type", "role")
                        .with_detail("resource_id", role_id)
                } else {
                    e
                }
            })
    }

    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<Role>> {
        self.collection.find_all(&Filter::new().eq("tenant_id", tenant_id)).await
    }

    async fn update(&self, role: Role) -> CoreResult<()> {
        let existing = self.find_by_id(&role.tenant_id, &role.id).await?;
        if existing.created_at != role.created_at {
            return Err(CoreError::validation(
                "VALIDATION_TRY_TO_CHANGE_RESTRICTED_FIELDS",
                "created_at is immutable",
            ));
        }
        let mut updated = role;
        updated.updated_at = Utc::now();
        self.collection
            .update(
                &Filter::new().eq("tenant_id", updated.tenant_id.clone()).eq("id", updated.id.clone()),
                &updated,
            )
            .await
    }

    async fn delete(&self, tenant_id: &str, role_id: &str) -> CoreResult<()> {
        self.collection
            .delete(&Filter::new().eq("tenant_id", tenant_id).eq("id", role_id))
            .await
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.collection.delete(&Filter::new().eq("tenant_id", tenant_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDocumentDriver;

    fn repo() -> PgRolesRepository {
        PgRolesRepository::new(Arc::new(MemoryDocumentDriver::new()))
    }

    fn sample(id: &str, tenant_id: &str, name: &str) -> Role {
        Role {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: String::new(),
            role_type: "custom".to_string(),
            is_tenant_admin: false,
            permissions: BTreeSet::new(),
            priority: 0,
            status: "active".to_string(),
            metadata: RoleMetadata::default(),
            created_by: "system".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name_within_tenant() {
        let repo = repo();
        repo.create(sample("r1", "t1", "Manager")).await.unwrap();
        let err = repo
            .create(sample("r2", "t1", "Manager"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "CONFLICT_DUPLICATE_RESOURCE");
    }

    #[tokio::test]
    async fn same_name_allowed_in_different_tenants() {
        let repo = repo();
        repo.create(sample("r1", "t1", "Manager")).await.unwrap();
        repo.create(sample("r2", "t2", "Manager")).await.unwrap();
    }
}
