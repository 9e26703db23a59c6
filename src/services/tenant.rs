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

//! Orchestrates tenant CRUD, default seeding, and cascade delete (C12,
//! §4.12, §6.1).

use crate::common::error::{log_swallowed, CoreError, CoreResult};
use crate::domain::{PermissionsRepository, RolesRepository, Tenant, TenantsRepository, UsersRepository};
use crate::rbac::RbacResolver;
use crate::tenancy::TenantSeeder;
use crate::tokens::TokenManager;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// The caller whose RBAC grants gate every operation here (§4.12 step 1).
#[derive(Debug, Clone)]
pub struct CallerIdentifier {
    pub tenant_id: String,
    pub user_id: String,
}

impl CallerIdentifier {
    fn validate(&self) -> CoreResult<()> {
        if self.tenant_id.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(CoreError::validation(
                "VALIDATION_REQUIRED_FIELDS",
                "caller tenant_id and user_id must be present",
            ));
        }
        Ok(())
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantFacade: Send + Sync {
    async fn create_tenant(
        &self,
        caller: &CallerIdentifier,
        tenant: Tenant,
        admin_email: &str,
        admin_password: &str,
    ) -> CoreResult<Tenant>;

    async fn get_tenant(&self, caller: &CallerIdentifier, tenant_id: &str) -> CoreResult<Tenant>;

    async fn get_tenants(&self, caller: &CallerIdentifier) -> CoreResult<Vec<Tenant>>;

    async fn update_tenant(&self, caller: &CallerIdentifier, tenant: Tenant) -> CoreResult<()>;

    async fn delete_tenant(&self, caller: &CallerIdentifier, tenant_id: &str) -> CoreResult<()>;
}

pub struct TenantService {
    tenants: Arc<dyn TenantsRepository>,
    users: Arc<dyn UsersRepository>,
    roles: Arc<dyn RolesRepository>,
    permissions: Arc<dyn PermissionsRepository>,
    seeder: TenantSeeder,
    rbac: RbacResolver,
    tokens: TokenManager,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantsRepository>,
        users: Arc<dyn UsersRepository>,
        roles: Arc<dyn RolesRepository>,
        permissions: Arc<dyn PermissionsRepository>,
        seeder: TenantSeeder,
        rbac: RbacResolver,
        tokens: TokenManager,
    ) -> Self {
        Self {
            tenants,
            users,
            roles,
            permissions,
            seeder,
            rbac,
            tokens,
        }
    }
}

#[async_trait]
impl TenantFacade for TenantService {
    /// §4.12: create the tenant document, then seed its defaults; if
    /// seeding fails, compensate by deleting the tenant just created.
    async fn create_tenant(
        &self,
        caller: &CallerIdentifier,
        tenant: Tenant,
        admin_email: &str,
        admin_password: &str,
    ) -> CoreResult<Tenant> {
        caller.validate()?;
        self.rbac
            .has_permission(&caller.tenant_id, &caller.user_id, "tenant:create", &caller.tenant_id)
            .await?;

        self.tenants.create(tenant.clone()).await?;

        if let Err(e) = self
            .seeder
            .seed_defaults(&tenant.id, admin_email, admin_password, &caller.user_id)
            .await
        {
            if let Err(compensation_err) = self.tenants.delete(&tenant.id).await {
                log_swallowed("create_tenant_rollback", &compensation_err);
            }
            return Err(e);
        }

        Ok(tenant)
    }

    async fn get_tenant(&self, caller: &CallerIdentifier, tenant_id: &str) -> CoreResult<Tenant> {
        caller.validate()?;
        self.rbac
            .has_permission(&caller.tenant_id, &caller.user_id, "tenant:read", tenant_id)
            .await?;
        self.tenants.find_by_id(tenant_id).await
    }

    async fn get_tenants(&self, caller: &CallerIdentifier) -> CoreResult<Vec<Tenant>> {
        caller.validate()?;
        self.rbac
            .has_permission(&caller.tenant_id, &caller.user_id, "tenant:read", &caller.tenant_id)
            .await?;
        self.tenants.find_all().await
    }

    async fn update_tenant(&self, caller: &CallerIdentifier, tenant: Tenant) -> CoreResult<()> {
        caller.validate()?;
        self.rbac
            .has_permission(&caller.tenant_id, &caller.user_id, "tenant:update", &tenant.id)
            .await?;
        self.tenants.update(tenant).await
    }

    /// §4.12 cascade order: revoke tokens, delete users, then roles, then
    /// permissions, then the tenant record itself. Idempotent after first
    /// success: a second call finds no tenant and returns `NOT_FOUND_TENANT`,
    /// the expected outcome for an operation on an already-deleted resource.
    async fn delete_tenant(&self, caller: &CallerIdentifier, tenant_id: &str) -> CoreResult<()> {
        caller.validate()?;
        self.rbac
            .has_permission(&caller.tenant_id, &caller.user_id, "tenant:delete", tenant_id)
            .await?;

        self.tenants.find_by_id(tenant_id).await?;

        let users = self.users.find_all(tenant_id).await?;
        for user in &users {
            if let Err(e) = self.tokens.revoke_all_tokens(tenant_id, &user.id, &caller.user_id).await {
                log_swallowed("delete_tenant_revoke_tokens", &e);
            }
        }
        // revoke_all_tokens only marks records revoked; purge the tenant's
        // KV keys outright so no `*:{tenant_id}:*` entry survives (§8).
        if let Err(e) = self.tokens.purge_tenant_tokens(tenant_id).await {
            log_swallowed("delete_tenant_purge_tokens", &e);
        }

        self.users.delete_all_for_tenant(tenant_id).await?;
        self.roles.delete_all_for_tenant(tenant_id).await?;
        self.permissions.delete_all_for_tenant(tenant_id).await?;
        self.tenants.delete(tenant_id).await
    }
}
