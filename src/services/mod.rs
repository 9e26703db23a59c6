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

//! The two externally facing facades (C11, C12): auth operations and
//! tenant lifecycle management, each a plain async trait so the `api`
//! layer (and tests) depend on a contract rather than a concrete type.

pub mod auth;
pub mod tenant;

pub use auth::{AuthFacade, AuthService, TokenValidity, UserIdentifier};
pub use tenant::{CallerIdentifier, TenantFacade, TenantService};

#[cfg(test)]
pub use auth::MockAuthFacade;
#[cfg(test)]
pub use tenant::MockTenantFacade;
