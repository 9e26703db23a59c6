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

use crate::domain::UsersRepository;
use crate::rbac::RbacResolver;
use crate::services::{AuthFacade, TenantFacade};
use std::sync::Arc;

/// Shared `axum` router state: the two facades plus the two collaborators
/// the HTTP surface itself needs to bridge §6.1's RPC shapes onto them —
/// `users` to resolve a `UserIdentifier` into the `TokenSubject` the auth
/// facade signs, and `rbac` for the read-only permission/role queries that
/// have no dedicated facade (§6.1's `VerifyUserResource`/`GetUserPermissions`/
/// `GetUserRoles`).
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthFacade>,
    pub tenant: Arc<dyn TenantFacade>,
    pub users: Arc<dyn UsersRepository>,
    pub rbac: RbacResolver,
}
