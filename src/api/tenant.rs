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

//! HTTP surface for tenant CRUD (§6.1's `CreateTenant`/`GetTenant`/
//! `GetTenants`/`UpdateTenant`/`DeleteTenant`), a thin translation over
//! `TenantFacade`.

use crate::api::auth::AuthenticatedUser;
use crate::api::state::AppState;
use crate::common::dto::OkResponse;
use crate::common::error::CoreResult;
use crate::common::extractors::ValidJson;
use crate::domain::tenant::TenantContact;
use crate::domain::{Tenant, TenantStatus};
use crate::services::CallerIdentifier;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreateTenantRequest {
    name: String,
    admin_email: String,
    admin_password: String,
}

async fn create_tenant(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateTenantRequest>,
) -> CoreResult<impl IntoResponse> {
    let now = chrono::Utc::now();
    let tenant = Tenant {
        id: crate::domain::new_id(),
        name: body.name,
        status: TenantStatus::Active,
        contact: TenantContact::default(),
        subscription: serde_json::json!({}),
        settings: serde_json::json!({}),
        created_by: caller.user_id.clone(),
        created_at: now,
        updated_at: now,
    };

    let created = state
        .tenant
        .create_tenant(&caller_identifier(&caller), tenant, &body.admin_email, &body.admin_password)
        .await?;
    Ok(OkResponse::new(created))
}

async fn get_tenant(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> CoreResult<impl IntoResponse> {
    let tenant = state.tenant.get_tenant(&caller_identifier(&caller), &tenant_id).await?;
    Ok(OkResponse::new(tenant))
}

async fn get_tenants(caller: AuthenticatedUser, State(state): State<AppState>) -> CoreResult<impl IntoResponse> {
    let tenants = state.tenant.get_tenants(&caller_identifier(&caller)).await?;
    Ok(OkResponse::new(tenants))
}

async fn update_tenant(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    ValidJson(tenant): ValidJson<Tenant>,
) -> CoreResult<impl IntoResponse> {
    state.tenant.update_tenant(&caller_identifier(&caller), tenant).await?;
    Ok(OkResponse::new(()))
}

async fn delete_tenant(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> CoreResult<impl IntoResponse> {
    state.tenant.delete_tenant(&caller_identifier(&caller), &tenant_id).await?;
    Ok(OkResponse::new(()))
}

fn caller_identifier(caller: &AuthenticatedUser) -> CallerIdentifier {
    CallerIdentifier {
        tenant_id: caller.tenant_id.clone(),
        user_id: caller.user_id.clone(),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_tenant))
        .route("/", get(get_tenants))
        .route("/{tenant_id}", get(get_tenant))
        .route("/", put(update_tenant))
        .route("/{tenant_id}", axum::routing::delete(delete_tenant))
}
