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

//! HTTP surface for the three read-only RBAC queries of §6.1
//! (`VerifyUserResource`, `GetUserPermissions`, `GetUserRoles`). These have
//! no dedicated facade in §4.11/§4.12, so handlers here call `RbacResolver`
//! directly, same as `TenantService` does internally.

use crate::api::auth::AuthenticatedUser;
use crate::api::state::AppState;
use crate::common::dto::OkResponse;
use crate::common::error::CoreResult;
use crate::common::extractors::ValidJson;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

/// Batch check of `{resource_type}:{action}` for every action named in
/// `actions`, against the caller named by the Bearer token (§6.1's
/// `VerifyUserResource(identifier, resource_type, [resources])`).
#[derive(Debug, Deserialize)]
struct VerifyUserResourceRequest {
    resource_type: String,
    actions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResourceResult {
    action: String,
    allowed: bool,
}

async fn verify_user_resource(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<VerifyUserResourceRequest>,
) -> CoreResult<impl IntoResponse> {
    let permissions: Vec<String> = body
        .actions
        .iter()
        .map(|action| format!("{}:{action}", body.resource_type))
        .collect();

    let checked = state
        .rbac
        .check_permissions(&caller.tenant_id, &caller.user_id, &permissions)
        .await?;

    let results: Vec<ResourceResult> = body
        .actions
        .into_iter()
        .map(|action| {
            let permission = format!("{}:{action}", body.resource_type);
            let allowed = checked.get(&permission).copied().unwrap_or(false);
            ResourceResult { action, allowed }
        })
        .collect();

    Ok(OkResponse::new(results))
}

async fn get_user_permissions(caller: AuthenticatedUser, State(state): State<AppState>) -> CoreResult<impl IntoResponse> {
    let permissions = state.rbac.effective_permissions(&caller.tenant_id, &caller.user_id).await?;
    Ok(OkResponse::new(permissions))
}

async fn get_user_roles(caller: AuthenticatedUser, State(state): State<AppState>) -> CoreResult<impl IntoResponse> {
    let roles = state.rbac.get_user_roles(&caller.tenant_id, &caller.user_id).await?;
    Ok(OkResponse::new(roles))
}

#[derive(Debug, Deserialize)]
struct VerifyUserRoleParams {
    role_id: String,
}

async fn verify_user_role(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(params): Path<VerifyUserRoleParams>,
) -> CoreResult<impl IntoResponse> {
    let verified = state
        .rbac
        .verify_user_role(&caller.tenant_id, &caller.user_id, &params.role_id)
        .await?;
    Ok(OkResponse::new(verified))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/verify-resource", post(verify_user_resource))
        .route("/permissions", get(get_user_permissions))
        .route("/roles", get(get_user_roles))
        .route("/roles/{role_id}", get(verify_user_role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        MockPermissionsRepository, MockRolesRepository, MockUsersRepository, Role, RoleAssignment, RoleMetadata, User,
        UserStatus,
    };
    use crate::rbac::RbacResolver;
    use crate::services::{MockAuthFacade, MockTenantFacade, TokenValidity};
    use crate::tokens::manager::AccessClaims;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn authenticated_auth_mock() -> MockAuthFacade {
        let mut auth = MockAuthFacade::new();
        auth.expect_verify_token().returning(|_| {
            Ok(TokenValidity {
                valid: true,
                claims: Some(AccessClaims {
                    sub: "u2".to_string(),
                    iss: "auth-core-tests".to_string(),
                    iat: 0,
                    exp: i64::MAX,
                    jti: "jti".to_string(),
                    user_id: "u2".to_string(),
                    tenant_id: "t1".to_string(),
                    username: Some("u2".to_string()),
                    email: None,
                    roles: vec!["r_admin".to_string()],
                }),
            })
        });
        auth
    }

    fn admin_role() -> Role {
        Role {
            id: "r_admin".to_string(),
            tenant_id: "t1".to_string(),
            name: "TenantAdmin".to_string(),
            slug: "tenant-admin".to_string(),
            description: String::new(),
            role_type: "system".to_string(),
            is_tenant_admin: true,
            permissions: BTreeSet::new(),
            priority: 0,
            status: "active".to_string(),
            metadata: RoleMetadata::default(),
            created_by: "system".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn admin_user() -> User {
        User {
            id: "u2".to_string(),
            tenant_id: "t1".to_string(),
            email: Some("u2@example.com".to_string()),
            username: Some("u2".to_string()),
            password_hash: "hash".to_string(),
            status: UserStatus::Active,
            roles: vec![RoleAssignment {
                role_id: "r_admin".to_string(),
                tenant_id: "t1".to_string(),
                assigned_at: chrono::Utc::now(),
                assigned_by: "system".to_string(),
                expires_at: None,
            }],
            additional_permissions: BTreeSet::new(),
            revoked_permissions: BTreeSet::new(),
            email_verified: false,
            mfa_enabled: false,
            last_login: None,
            created_by: "system".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn app() -> Router {
        let mut users = MockUsersRepository::new();
        users.expect_find_by_id().returning(|_, _| Ok(admin_user()));
        let mut roles = MockRolesRepository::new();
        roles.expect_find_by_id().returning(|_, _| Ok(admin_role()));

        let state = AppState {
            auth: Arc::new(authenticated_auth_mock()),
            tenant: Arc::new(MockTenantFacade::new()),
            users: Arc::new(MockUsersRepository::new()),
            rbac: RbacResolver::new(
                Arc::new(users),
                Arc::new(roles),
                Arc::new(MockPermissionsRepository::new()),
                "system",
            ),
        };
        crate::api::router(state)
    }

    #[tokio::test]
    async fn verify_user_resource_allows_tenant_admin_for_any_action() {
        let app = app();
        let body = serde_json::to_string(&serde_json::json!({
            "resource_type": "products",
            "actions": ["delete", "read"],
        }))
        .unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/rbac/verify-resource")
            .header("content-type", "application/json")
            .header("authorization", "Bearer token")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let results = json["data"].as_array().unwrap();
        assert!(results.iter().all(|r| r["allowed"] == true));
    }

    #[tokio::test]
    async fn get_user_roles_returns_assigned_role_ids() {
        let app = app();
        let request = Request::builder()
            .method("GET")
            .uri("/api/rbac/roles")
            .header("authorization", "Bearer token")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"], serde_json::json!(["r_admin"]));
    }

    #[tokio::test]
    async fn verify_user_role_checks_membership() {
        let app = app();
        let request = Request::builder()
            .method("GET")
            .uri("/api/rbac/roles/r_admin")
            .header("authorization", "Bearer token")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"], true);
    }
}
