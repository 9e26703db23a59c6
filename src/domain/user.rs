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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Invited,
}

/// A single entry in `User::roles` (§3): an ordered role assignment, not a
/// set, so the most-recently assigned tenant-admin role (if any) is
/// discoverable without a secondary sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role_id: String,
    pub tenant_id: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// `users` document (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: String,
    pub status: UserStatus,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    #[serde(default)]
    pub additional_permissions: BTreeSet<String>,
    #[serde(default)]
    pub revoked_permissions: BTreeSet<String>,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn create(&self, user: User) -> CoreResult<String>;
    async fn find_by_id(&self, tenant_id: &str, user_id: &str) -> CoreResult<User>;
    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<User>>;
    async fn update(&self, user: User) -> CoreResult<()>;
    async fn delete(&self, tenant_id: &str, user_id: &str) -> CoreResult<()>;
    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()>;
}

pub struct PgUsersRepository {
    collection: DocumentCollection<User>,
}

impl PgUsersRepository {
    pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            collection: DocumentCollection::new(driver, "users"),
        }
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn create(&self, mut user: User) -> CoreResult<String> {
        if user.email.is_none() && user.username.is_none() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "at least one of email/username must be present",
            ));
        }
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        self.collection
            .create(&user.id, Some(&user.tenant_id), &user)
            .await?;
        Ok(user.id.clone())
    }

    async fn find_by_id(&self, tenant_id: &str, user_id: &str) -> CoreResult<User> {
        self.collection
            .find_one(&Filter::new().eq("tenant_id", tenant_id).eq("id", user_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::not_found("NOT_FOUND_USER", "user not found")
                        .with_detail("resource_type", "user")
                        .with_detail("resource_id", user_id)
                } else {
                    e
                }
            })
    }

    async fn find_all(&self, tenant_id: &str) -> CoreResult<Vec<User>> {
        self.collection.find_all(&Filter::new().eq("tenant_id", tenant_id)).await
    }

    async fn update(&self, user: User) -> CoreResult<()> {
        let existing = self.find_by_id(&user.tenant_id, &user.id).await?;
        if existing.created_at != user.created_at {
            return Err(CoreError::validation(
                "VALIDATION_TRY_TO_CHANGE_RESTRICTED_FIELDS",
                "created_at is immutable",
            ));
        }
        if existing.username != user.username {
            return Err(CoreError::validation(
                "VALIDATION_TRY_TO_CHANGE_RESTRICTED_FIELDS",
                "username is immutable",
            ));
        }
        let mut updated = user;
        updated.updated_at = Utc::now();
        self.collection
            .update(
                &Filter::new().eq("tenant_id", updated.tenant_id.clone()).eq("id", updated.id.clone()),
                &updated,
            )
            .await
    }

    async fn delete(&self, tenant_id: &str, user_id: &str) -> CoreResult<()> {
        self.collection
            .delete(&Filter::new().eq("tenant_id", tenant_id).eq("id", user_id))
            .await
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> CoreResult<()> {
        self.collection.delete(&Filter::new().eq("tenant_id", tenant_id)).await
    }
}
