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

//! Resolution of the effective permission set, role membership, and
//! permission checks for a (tenant, user) pair (C9, §4.9). `RbacResolver`
//! is the only piece of the core that reads both the `users` and `roles`
//! collections together; everything downstream (facades, the `api` layer)
//! goes through it rather than re-deriving the permission algebra.

use crate::common::error::{CoreError, CoreResult};
use crate::domain::permission::is_valid_permission_string;
use crate::domain::{PermissionsRepository, RolesRepository, UsersRepository, WILDCARD_PERMISSION};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The effective permission map for one (tenant, user) pair (§4.9 step 2):
/// role grants unioned, then additional grants added, then revocations
/// overwritten last so they strictly beat any grant.
pub type PermissionMap = BTreeMap<String, bool>;

#[derive(Clone)]
pub struct RbacResolver {
    users: Arc<dyn UsersRepository>,
    roles: Arc<dyn RolesRepository>,
    permissions: Arc<dyn PermissionsRepository>,
    system_tenant_id: String,
}

impl RbacResolver {
    pub fn new(
        users: Arc<dyn UsersRepository>,
        roles: Arc<dyn RolesRepository>,
        permissions: Arc<dyn PermissionsRepository>,
        system_tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
            system_tenant_id: system_tenant_id.into(),
        }
    }

    fn is_system_tenant(&self, tenant_id: &str) -> bool {
        tenant_id == self.system_tenant_id
    }

    /// Resolves one role's `permissions` set (§3: permission-*id* strings,
    /// not permission strings) to the actual `permission_string`s they name,
    /// by looking each one up in the `permissions` collection (§4.9's
    /// `GetRolePermissions(...) → []permission_string (by id resolution)`).
    async fn resolve_role_permissions(&self, tenant_id: &str, role_id: &str) -> CoreResult<Vec<String>> {
        let role = self.roles.find_by_id(tenant_id, role_id).await?;
        let mut resolved = Vec::with_capacity(role.permissions.len());
        for permission_id in &role.permissions {
            let permission = self.permissions.find_by_id(tenant_id, permission_id).await?;
            resolved.push(permission.permission_string);
        }
        Ok(resolved)
    }

    /// Computes the effective permission map per §4.9 step 2: union of
    /// non-expired role grants (each role's permission *ids* resolved to
    /// `permission_string`s), plus `additional_permissions` as `true`, with
    /// `revoked_permissions` overwritten last as `false`.
    pub async fn effective_permissions(&self, tenant_id: &str, user_id: &str) -> CoreResult<PermissionMap> {
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        let now = Utc::now();
        let mut map = PermissionMap::new();

        for assignment in &user.roles {
            if assignment.tenant_id != tenant_id || assignment.is_expired(now) {
                continue;
            }
            for permission_string in self.resolve_role_permissions(tenant_id, &assignment.role_id).await? {
                map.insert(permission_string, true);
            }
        }

        for permission in &user.additional_permissions {
            map.insert(permission.clone(), true);
        }

        for permission in &user.revoked_permissions {
            map.insert(permission.clone(), false);
        }

        Ok(map)
    }

    /// Whether the user holds a non-expired role with `is_tenant_admin` in
    /// `tenant_id`; short-circuits every permission check in that tenant
    /// (§4.9 step 3).
    pub async fn is_tenant_admin(&self, tenant_id: &str, user_id: &str) -> CoreResult<bool> {
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        let now = Utc::now();
        for assignment in &user.roles {
            if assignment.tenant_id != tenant_id || assignment.is_expired(now) {
                continue;
            }
            let role = self.roles.find_by_id(tenant_id, &assignment.role_id).await?;
            if role.is_tenant_admin {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// A check succeeds iff the exact permission is granted, `*:*` is
    /// granted, or the user is tenant-admin in `tenant_id` (§4.9 step 3).
    async fn map_grants(&self, tenant_id: &str, user_id: &str, permission: &str) -> CoreResult<bool> {
        if self.is_tenant_admin(tenant_id, user_id).await? {
            return Ok(true);
        }
        let map = self.effective_permissions(tenant_id, user_id).await?;
        if map.get(WILDCARD_PERMISSION).copied().unwrap_or(false) {
            return Ok(true);
        }
        Ok(map.get(permission).copied().unwrap_or(false))
    }

    /// Cross-tenant permission check (§4.9): same-tenant admin bypass,
    /// system-tenant boundary waiver, and explicit cross-tenant denial for
    /// everyone else.
    pub async fn has_permission(
        &self,
        tenant_id: &str,
        user_id: &str,
        permission: &str,
        target_tenant_id: &str,
    ) -> CoreResult<()> {
        if !is_valid_permission_string(permission) {
            return Err(CoreError::validation(
                "VALIDATION_INVALID_VALUE",
                format!("'{permission}' is not a valid permission string"),
            )
            .with_detail("fields", "permission"));
        }

        let allowed = if tenant_id == target_tenant_id {
            self.map_grants(tenant_id, user_id, permission).await?
        } else if self.is_system_tenant(tenant_id) {
            self.map_grants(tenant_id, user_id, permission).await?
        } else {
            false
        };

        if allowed {
            Ok(())
        } else {
            Err(CoreError::auth("AUTH_PERMISSION_DENIED", "permission denied")
                .with_detail("resource_type", "permission")
                .with_detail("resource_id", permission))
        }
    }

    /// Batch permission check (§4.9): returns a full map with `false` for
    /// absent keys. Invalid permission strings fail Validation before any
    /// lookup is attempted, for any entry in the batch.
    pub async fn check_permissions(
        &self,
        tenant_id: &str,
        user_id: &str,
        permissions: &[String],
    ) -> CoreResult<BTreeMap<String, bool>> {
        for permission in permissions {
            if !is_valid_permission_string(permission) {
                return Err(CoreError::validation(
                    "VALIDATION_INVALID_VALUE",
                    format!("'{permission}' is not a valid permission string"),
                )
                .with_detail("fields", "permission"));
            }
        }

        let is_admin = self.is_tenant_admin(tenant_id, user_id).await?;
        let map = self.effective_permissions(tenant_id, user_id).await?;
        let wildcard = map.get(WILDCARD_PERMISSION).copied().unwrap_or(false);

        let mut result = BTreeMap::new();
        for permission in permissions {
            let allowed = is_admin || wildcard || map.get(permission).copied().unwrap_or(false);
            result.insert(permission.clone(), allowed);
        }
        Ok(result)
    }

    pub async fn get_user_roles(&self, tenant_id: &str, user_id: &str) -> CoreResult<Vec<String>> {
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        Ok(user
            .roles
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.role_id.clone())
            .collect())
    }

    pub async fn verify_user_role(&self, tenant_id: &str, user_id: &str, role_id: &str) -> CoreResult<bool> {
        let now = Utc::now();
        let user = self.users.find_by_id(tenant_id, user_id).await?;
        Ok(user
            .roles
            .iter()
            .any(|a| a.tenant_id == tenant_id && a.role_id == role_id && !a.is_expired(now)))
    }

    pub async fn get_role_permissions(&self, tenant_id: &str, role_id: &str) -> CoreResult<Vec<String>> {
        self.resolve_role_permissions(tenant_id, role_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::PgPermissionsRepository;
    use crate::domain::role::{PgRolesRepository, RoleMetadata};
    use crate::domain::user::{PgUsersRepository, RoleAssignment, UserStatus};
    use crate::domain::{Permission, Role, User};
    use crate::store::memory::MemoryDocumentDriver;
    use crate::tenancy::TenantSeeder;
    use chrono::Duration;
    use std::collections::BTreeSet;

    async fn fixture() -> (
        RbacResolver,
        Arc<dyn UsersRepository>,
        Arc<dyn RolesRepository>,
        Arc<dyn PermissionsRepository>,
    ) {
        let driver = Arc::new(MemoryDocumentDriver::new());
        let users: Arc<dyn UsersRepository> = Arc::new(PgUsersRepository::new(driver.clone()));
        let roles: Arc<dyn RolesRepository> = Arc::new(PgRolesRepository::new(driver.clone()));
        let permissions: Arc<dyn PermissionsRepository> = Arc::new(PgPermissionsRepository::new(driver));
        let resolver = RbacResolver::new(users.clone(), roles.clone(), permissions.clone(), "system");
        (resolver, users, roles, permissions)
    }

    /// Creates a role whose `permissions` set holds the *ids* of freshly
    /// created `Permission` documents carrying `permission_strings` — the
    /// same shape `TenantSeeder`/real role-creation produces, rather than
    /// literal permission strings stuffed directly into the role.
    async fn role_with_permission_strings(
        roles: &Arc<dyn RolesRepository>,
        permissions: &Arc<dyn PermissionsRepository>,
        id: &str,
        tenant_id: &str,
        is_admin: bool,
        permission_strings: &[&str],
    ) {
        let now = Utc::now();
        let mut permission_ids = BTreeSet::new();
        for (i, permission_string) in permission_strings.iter().enumerate() {
            let permission_id = format!("{id}-perm-{i}");
            let (resource, action) = permission_string.split_once(':').unwrap();
            permissions
                .create(Permission {
                    id: permission_id.clone(),
                    tenant_id: tenant_id.to_string(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                    permission_string: permission_string.to_string(),
                    display_name: permission_string.to_string(),
                    is_dangerous: false,
                    created_by: "system".to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
            permission_ids.insert(permission_id);
        }
        roles
            .create(Role {
                id: id.to_string(),
                tenant_id: tenant_id.to_string(),
                name: id.to_string(),
                slug: id.to_string(),
                description: String::new(),
                role_type: "custom".to_string(),
                is_tenant_admin: is_admin,
                permissions: permission_ids,
                priority: 0,
                status: "active".to_string(),
                metadata: RoleMetadata::default(),
                created_by: "system".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn role(id: &str, tenant_id: &str, is_admin: bool, permissions: &[&str]) -> Role {
        let now = Utc::now();
        Role {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: id.to_string(),
            slug: id.to_string(),
            description: String::new(),
            role_type: "custom".to_string(),
            is_tenant_admin: is_admin,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            priority: 0,
            status: "active".to_string(),
            metadata: RoleMetadata::default(),
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: &str, tenant_id: &str, role_ids: &[&str]) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            email: Some(format!("{id}@example.com")),
            username: Some(id.to_string()),
            password_hash: "hash".to_string(),
            status: UserStatus::Active,
            roles: role_ids
                .iter()
                .map(|r| RoleAssignment {
                    role_id: r.to_string(),
                    tenant_id: tenant_id.to_string(),
                    assigned_at: now,
                    assigned_by: "system".to_string(),
                    expires_at: None,
                })
                .collect(),
            additional_permissions: BTreeSet::new(),
            revoked_permissions: BTreeSet::new(),
            email_verified: true,
            mfa_enabled: false,
            last_login: None,
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn tenant_admin_bypasses_every_permission_in_own_tenant() {
        let (resolver, users, roles, _permissions) = fixture().await;
        roles.create(role("r_admin", "t1", true, &[])).await.unwrap();
        users.create(user("u2", "t1", &["r_admin"])).await.unwrap();

        resolver
            .has_permission("t1", "u2", "products:delete", "t1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn revoked_permission_overrides_role_grant() {
        let (resolver, users, roles, permissions) = fixture().await;
        role_with_permission_strings(&roles, &permissions, "r_reader", "t1", false, &["orders:read"]).await;
        let mut u3 = user("u3", "t1", &["r_reader"]);
        u3.revoked_permissions.insert("orders:read".to_string());
        users.create(u3).await.unwrap();

        let err = resolver
            .has_permission("t1", "u3", "orders:read", "t1")
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn cross_tenant_denied_for_non_system_tenant() {
        let (resolver, users, roles, _permissions) = fixture().await;
        roles
            .create(role("r_admin", "t1", true, &[]))
            .await
            .unwrap();
        users.create(user("u4", "t1", &["r_admin"])).await.unwrap();

        let err = resolver
            .has_permission("t1", "u4", "tenant:read", "t2")
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn system_tenant_waives_tenant_boundary() {
        let (resolver, users, roles, permissions) = fixture().await;
        role_with_permission_strings(&roles, &permissions, "r_sys", "system", false, &["tenant:read"]).await;
        users.create(user("u5", "system", &["r_sys"])).await.unwrap();

        resolver
            .has_permission("system", "u5", "tenant:read", "t9")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_permission_string_fails_before_any_lookup() {
        let (resolver, _users, _roles, _permissions) = fixture().await;
        let err = resolver
            .check_permissions("t1", "ghost", &["not-valid".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code, "VALIDATION_INVALID_VALUE");
    }

    #[tokio::test]
    async fn check_permissions_returns_false_for_absent_entries() {
        let (resolver, users, roles, permissions) = fixture().await;
        role_with_permission_strings(&roles, &permissions, "r_reader", "t1", false, &["orders:read"]).await;
        users.create(user("u6", "t1", &["r_reader"])).await.unwrap();

        let result = resolver
            .check_permissions(
                "t1",
                "u6",
                &["orders:read".to_string(), "orders:delete".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(result.get("orders:read"), Some(&true));
        assert_eq!(result.get("orders:delete"), Some(&false));
    }

    #[tokio::test]
    async fn expired_role_assignment_does_not_grant() {
        let (resolver, users, roles, _permissions) = fixture().await;
        roles
            .create(role("r_reader", "t1", false, &["orders:read"]))
            .await
            .unwrap();
        let mut u7 = user("u7", "t1", &[]);
        u7.roles.push(RoleAssignment {
            role_id: "r_reader".to_string(),
            tenant_id: "t1".to_string(),
            assigned_at: Utc::now() - Duration::days(2),
            assigned_by: "system".to_string(),
            expires_at: Some(Utc::now() - Duration::days(1)),
        });
        users.create(u7).await.unwrap();

        let err = resolver
            .has_permission("t1", "u7", "orders:read", "t1")
            .await
            .unwrap_err();
        assert_eq!(err.code, "AUTH_PERMISSION_DENIED");
    }

    /// Regression test for role-permission-id resolution: goes through the
    /// real `TenantSeeder` rather than a hand-built `Role` fixture, so
    /// `RbacResolver` sees exactly what seeding stores — a permission *id*
    /// in `Role::permissions` — and must resolve it through
    /// `PermissionsRepository` to grant the wildcard permission string.
    #[tokio::test]
    async fn seeded_tenant_admin_grants_resolve_through_permission_ids() {
        let (resolver, users, roles, permissions) = fixture().await;
        let seeder = TenantSeeder::new(permissions.clone(), roles.clone(), users.clone(), 60);
        let result = seeder
            .seed_defaults("t11", "admin@t11.example.com", "correct horse battery staple 42!", "system")
            .await
            .unwrap();

        resolver
            .has_permission("t11", &result.user_id, "products:delete", "t11")
            .await
            .unwrap();

        let resolved = resolver.get_role_permissions("t11", &result.role_id).await.unwrap();
        assert_eq!(resolved, vec![WILDCARD_PERMISSION.to_string()]);
    }
}
