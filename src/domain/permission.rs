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
use std::sync::{Arc, LazyLock};

/// The wildcard permission string, granting every action on every resource.
pub const WILDCARD_PERMISSION: &str = "*:*";

static PERMISSION_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[^:\s]+:[^:\s]+$").expect("static pattern is valid"));

/// A permission string is valid iff it matches `RESOURCE:ACTION` where each
/// side is a non-empty token, or is the literal wildcard `*:*` (§3, §4.9).
pub fn is_valid_permission_string(s: &str) -> bool {
    s == WILDCARD_PERMISSION || PERMISSION_PATTERN.is_match(s)
}

/// `permissions` document (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub tenant_id: String,
    pub resource: String,
    pub action: String,
    pub permission_string: String,
    pub display_name: String,
    pub is_dangerous: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn wildcard(id: String, tenant_id: String, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            resource: "*".to_string(),
            action: "*".to_string(),
            permission_string: WILDCARD_PERMISSION.to_string(),
            display_name: "All permissions".to_string(),
            is_dangerous: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PermissionsRepository: Send + Sync {
    async fn create(&self, permission: Permission) -> CoreResult<String>;
    async fn find_by_id(&self, tenant_id: &str, permission_id: &str) -> CoreResult<Permission>;
    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<Permission>>;
    async fn delete(&self, tenant_id: &str, permission_id: &str) -> CoreResult<()>;
    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()>;
}

pub struct PgPermissionsRepository {
    collection: DocumentCollection<Permission>,
}

impl PgPermissionsRepository {
    pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            collection: DocumentCollection::new(driver, "permissions"),
        }
    }
}

#[async_trait]
impl PermissionsRepository for PgPermissionsRepository {
    async fn create(&self, mut permission: Permission) -> CoreResult<String> {
        if !is_valid_permission_string(&permission.permission_string) {
            return Err(CoreError::validation(
                "VALIDATION_INVALID_VALUE",
                format!("'{}' is not a valid permission string", permission.permission_string),
            )
            .with_detail("fields", "permission_string"));
        }
        let now = Utc::now();
        permission.created_at = now;
        permission.updated_at = now;
        self.collection
            .create(&permission.id, Some(&permission.tenant_id), &permission)
            .await?;
        Ok(permission.id.clone())
    }

    async fn find_by_id(&self, tenant_id: &str, permission_id: &str) -> CoreResult<Permission> {
        self.collection
            .find_one(&Filter::new().eq("tenant_id", tenant_id).eq("id", permission_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::not_found("NOT_FOUND_PERMISSION", "permission not found")
                        .with_detail("resource_type", "permission")
                        .with_detail("resource_id", permission_id)
                } else {
                    e
                }
            })
    }

    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<Permission>> {
        self.collection.find_all(&Filter::new().eq("tenant_id", tenant_id)).await
    }

    async fn delete(&self, tenant_id: &str, permission_id: &str) -> CoreResult<()> {
        self.collection
            .delete(&Filter::new().eq("tenant_id", tenant_id).eq("id", permission_id))
            .await
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.collection.delete(&Filter::new().eq("tenant_id", tenant_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_permission_strings() {
        assert!(is_valid_permission_string("orders:read"));
        assert!(is_valid_permission_string("*:*"));
    }

    #[test]
    fn invalid_permission_strings() {
        assert!(!is_valid_permission_string("orders"));
        assert!(!is_valid_permission_string(":read"));
        assert!(!is_valid_permission_string("orders:"));
        assert!(!is_valid_permission_string(""));
        assert!(!is_valid_permission_string("orders:read:extra"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_permission_string() {
        let repo = PgPermissionsRepository::new(Arc::new(crate::store::memory::MemoryDocumentDriver::new()));
        let mut permission = Permission::wildcard("p1".to_string(), "t1".to_string(), "system".to_string());
        permission.permission_string = "not-valid".to_string();
        let err = repo.create(permission).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_INVALID_VALUE");
    }
}
