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

//! The `axum` transport substitution for §6.1's RPC surface (§10.7): thin
//! handlers over `AuthFacade`/`TenantFacade`/`RbacResolver`, nested under
//! `/api` by resource.

pub mod auth;
pub mod rbac;
pub mod state;
pub mod tenant;

pub use state::AppState;

use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/rbac", rbac::routes())
        .nest("/api/tenants", tenant::routes())
        .with_state(state)
}
