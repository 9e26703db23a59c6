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

//! The persistent data model (§3): tenants, users, roles, permissions, and
//! the document-backed repositories that enforce restricted-field
//! immutability on update (§4.2).

pub mod ids;
pub mod permission;
pub mod role;
pub mod tenant;
pub mod user;

pub use ids::new_id;
pub use permission::{is_valid_permission_string, Permission, PermissionsRepository, WILDCARD_PERMISSION};
pub use role::{Role, RoleMetadata, RolesRepository};
pub use tenant::{Tenant, TenantStatus, TenantsRepository};
pub use user::{RoleAssignment, User, UserStatus, UsersRepository};

#[cfg(test)]
pub use permission::MockPermissionsRepository;
#[cfg(test)]
pub use role::MockRolesRepository;
#[cfg(test)]
pub use tenant::MockTenantsRepository;
#[cfg(test)]
pub use user::MockUsersRepository;
