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

//! Brings a tenant's default permission, role, and admin user into existence
//! atomically (C10, §4.10): a `*:*` permission, a `TenantAdmin` role that
//! holds it, and an admin `User` that holds the role. A failure at any step
//! rolls back the records created by earlier steps, best-effort.

use crate::common::error::{log_compensation_failure, CoreResult};
use crate::common::password::{hash_password, validate_password_strength};
use crate::domain::user::RoleAssignment;
use crate::domain::{new_id, Permission, PermissionsRepository, Role, RoleMetadata, RolesRepository, User, UserStatus, UsersRepository};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct SeedResult {
    pub permission_id: String,
    pub role_id: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct TenantSeeder {
    permissions: Arc<dyn PermissionsRepository>,
    roles: Arc<dyn RolesRepository>,
    users: Arc<dyn UsersRepository>,
    min_password_entropy_bits: u32,
}

impl TenantSeeder {
    pub fn new(
        permissions: Arc<dyn PermissionsRepository>,
        roles: Arc<dyn RolesRepository>,
        users: Arc<dyn UsersRepository>,
        min_password_entropy_bits: u32,
    ) -> Self {
        Self {
            permissions,
            roles,
            users,
            min_password_entropy_bits,
        }
    }

    pub async fn seed_defaults(
        &self,
        tenant_id: &str,
        admin_email: &str,
        admin_password: &str,
        created_by: &str,
    ) -> CoreResult<SeedResult> {
        let permission_id = new_id();
        let permission = Permission::wildcard(permission_id.clone(), tenant_id.to_string(), created_by.to_string());
        self.permissions.create(permission).await?;

        let role_id = new_id();
        if let Err(e) = self.create_admin_role(tenant_id, &role_id, &permission_id, created_by).await {
            self.rollback_permission(tenant_id, &permission_id).await;
            return Err(e);
        }

        match self
            .create_admin_user(tenant_id, &role_id, admin_email, admin_password, created_by)
            .await
        {
            Ok(user_id) => Ok(SeedResult {
                permission_id,
                role_id,
                user_id,
            }),
            Err(e) => {
                self.rollback_role(tenant_id, &role_id).await;
                self.rollback_permission(tenant_id, &permission_id).await;
                Err(e)
            }
        }
    }

    async fn create_admin_role(
        &self,
        tenant_id: &str,
        role_id: &str,
        permission_id: &str,
        created_by: &str,
    ) -> CoreResult<()> {
        let now = Utc::now();
        let mut permissions = BTreeSet::new();
        permissions.insert(permission_id.to_string());
        let role = Role {
            id: role_id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: "TenantAdmin".to_string(),
            slug: "tenant-admin".to_string(),
            description: "Full administrative access within this tenant".to_string(),
            role_type: "system".to_string(),
            is_tenant_admin: true,
            permissions,
            priority: 0,
            status: "active".to_string(),
            metadata: RoleMetadata::default(),
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.roles.create(role).await.map(|_| ())
    }

    async fn create_admin_user(
        &self,
        tenant_id: &str,
        role_id: &str,
        admin_email: &str,
        admin_password: &str,
        created_by: &str,
    ) -> CoreResult<String> {
        validate_password_strength(admin_password, self.min_password_entropy_bits)?;
        let password_hash = hash_password(admin_password)?;

        let now = Utc::now();
        let user_id = new_id();
        let user = User {
            id: user_id.clone(),
            tenant_id: tenant_id.to_string(),
            email: Some(admin_email.to_string()),
            username: None,
            password_hash,
            status: UserStatus::Active,
            roles: vec![RoleAssignment {
                role_id: role_id.to_string(),
                tenant_id: tenant_id.to_string(),
                assigned_at: now,
                assigned_by: created_by.to_string(),
                expires_at: None,
            }],
            additional_permissions: BTreeSet::new(),
            revoked_permissions: BTreeSet::new(),
            email_verified: false,
            mfa_enabled: false,
            last_login: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.users.create(user).await
    }

    async fn rollback_role(&self, tenant_id: &str, role_id: &str) {
        if let Err(e) = self.roles.delete(tenant_id, role_id).await {
            log_compensation_failure("seed_defaults_role_rollback", &e);
        }
    }

    async fn rollback_permission(&self, tenant_id: &str, permission_id: &str) {
        if let Err(e) = self.permissions.delete(tenant_id, permission_id).await {
            log_compensation_failure("seed_defaults_permission_rollback", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::PgPermissionsRepository;
    use crate::domain::role::PgRolesRepository;
    use crate::domain::user::PgUsersRepository;
    use crate::store::memory::MemoryDocumentDriver;

    fn seeder() -> (TenantSeeder, Arc<dyn PermissionsRepository>, Arc<dyn RolesRepository>, Arc<dyn UsersRepository>) {
        let driver = Arc::new(MemoryDocumentDriver::new());
        let permissions: Arc<dyn PermissionsRepository> = Arc::new(PgPermissionsRepository::new(driver.clone()));
        let roles: Arc<dyn RolesRepository> = Arc::new(PgRolesRepository::new(driver.clone()));
        let users: Arc<dyn UsersRepository> = Arc::new(PgUsersRepository::new(driver));
        let seeder = TenantSeeder::new(permissions.clone(), roles.clone(), users.clone(), 60);
        (seeder, permissions, roles, users)
    }

    #[tokio::test]
    async fn seed_defaults_creates_permission_role_and_admin_user() {
        let (seeder, permissions, roles, users) = seeder();
        let result = seeder
            .seed_defaults("t9", "admin@t9.example.com", "correct horse battery staple 42!", "system")
            .await
            .unwrap();

        let permission = permissions.find_by_id("t9", &result.permission_id).await.unwrap();
        assert_eq!(permission.permission_string, "*:*");

        let role = roles.find_by_id("t9", &result.role_id).await.unwrap();
        assert!(role.is_tenant_admin);
        assert!(role.permissions.contains(&result.permission_id));

        let user = users.find_by_id("t9", &result.user_id).await.unwrap();
        assert_eq!(user.roles.len(), 1);
        assert_eq!(user.roles[0].role_id, result.role_id);
    }

    #[tokio::test]
    async fn weak_password_rolls_back_permission_and_role() {
        let (seeder, permissions, roles, _users) = seeder();
        let err = seeder
            .seed_defaults("t10", "admin@t10.example.com", "weak", "system")
            .await
            .unwrap_err();
        assert_eq!(err.code, "VALIDATION_PASSWORD_TOO_WEAK");

        assert!(permissions.find_all("t10").await.unwrap().is_empty());
        assert!(roles.find_all("t10").await.unwrap().is_empty());
    }
}
