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

//! HTTP surface for the four auth operations of §6.1, a transport
//! substitution over `AuthFacade` rather than a second implementation of
//! it: every handler here does nothing but translate a JSON body into the
//! facade's argument types and its result back into the response shapes
//! §6.1 names.

use crate::api::state::AppState;
use crate::common::dto::OkResponse;
use crate::common::error::{CoreError, CoreResult};
use crate::common::extractors::client_context::ClientContext;
use crate::common::extractors::ValidJson;
use crate::services::UserIdentifier;
use crate::tokens::TokenSubject;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

/// The (tenant, user) pair a Bearer access token resolves to, extracted by
/// verifying the token through the same `AuthFacade` every other handler
/// uses — there is no separate "middleware" verification path.
pub struct AuthenticatedUser {
    pub tenant_id: String,
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CoreError::auth("AUTH_TOKEN_MISSING", "missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| CoreError::auth("AUTH_TOKEN_INVALID", "Authorization header is not a Bearer token"))?;

        let validity = state.auth.verify_token(token).await?;
        let claims = validity
            .claims
            .filter(|_| validity.valid)
            .ok_or_else(|| CoreError::auth("AUTH_TOKEN_INVALID", "access token is not valid"))?;

        Ok(AuthenticatedUser {
            tenant_id: claims.tenant_id,
            user_id: claims.user_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    tenant_id: String,
    user_id: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct Tokens {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct ExpiresIn {
    access_unix: i64,
    refresh_unix: i64,
}

#[derive(Debug, Serialize)]
struct TokensResponse {
    tokens: Tokens,
    expires_in: ExpiresIn,
}

async fn login(
    State(state): State<AppState>,
    ctx: ClientContext,
    ValidJson(body): ValidJson<LoginRequest>,
) -> CoreResult<impl IntoResponse> {
    let user = state.users.find_by_id(&body.tenant_id, &body.user_id).await?;
    let subject = subject_from_user(&user);
    let issued = state
        .auth
        .authenticate(&subject, &body.password, &user.password_hash, &ctx.into())
        .await?;

    Ok(OkResponse::new(TokensResponse {
        tokens: Tokens {
            access: issued.access_token,
            refresh: issued.refresh_token,
        },
        expires_in: ExpiresIn {
            access_unix: issued.access_expires_at.timestamp(),
            refresh_unix: issued.refresh_expires_at.timestamp(),
        },
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyTokenRequest {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct VerifyTokenResponse {
    valid: bool,
}

async fn verify_token(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<VerifyTokenRequest>,
) -> CoreResult<impl IntoResponse> {
    let validity = state.auth.verify_token(&body.access_token).await?;
    Ok(OkResponse::new(VerifyTokenResponse { valid: validity.valid }))
}

#[derive(Debug, Deserialize)]
struct RefreshTokenRequest {
    tenant_id: String,
    user_id: String,
    refresh_token: String,
}

async fn refresh_token(
    State(state): State<AppState>,
    ctx: ClientContext,
    ValidJson(body): ValidJson<RefreshTokenRequest>,
) -> CoreResult<impl IntoResponse> {
    let user = state.users.find_by_id(&body.tenant_id, &body.user_id).await?;
    let subject = subject_from_user(&user);
    let identifier = UserIdentifier {
        tenant_id: body.tenant_id,
        user_id: body.user_id,
    };
    let issued = state
        .auth
        .refresh_token(&identifier, &body.refresh_token, &subject, &ctx.into())
        .await?;

    Ok(OkResponse::new(TokensResponse {
        tokens: Tokens {
            access: issued.access_token,
            refresh: issued.refresh_token,
        },
        expires_in: ExpiresIn {
            access_unix: issued.access_expires_at.timestamp(),
            refresh_unix: issued.refresh_expires_at.timestamp(),
        },
    }))
}

#[derive(Debug, Deserialize)]
struct RevokeTokenRequest {
    tenant_id: String,
    user_id: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    revoked_by: String,
}

#[derive(Debug, Serialize)]
struct RevokeTokenResponse {
    revoked: bool,
}

async fn revoke_token(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RevokeTokenRequest>,
) -> CoreResult<impl IntoResponse> {
    let identifier = UserIdentifier {
        tenant_id: body.tenant_id,
        user_id: body.user_id,
    };
    let revoked = state
        .auth
        .revoke_token(
            &identifier,
            body.access_token.as_deref(),
            body.refresh_token.as_deref(),
            &body.revoked_by,
        )
        .await?;
    Ok(OkResponse::new(RevokeTokenResponse { revoked }))
}

fn subject_from_user(user: &crate::domain::User) -> TokenSubject {
    TokenSubject {
        user_id: user.id.clone(),
        tenant_id: user.tenant_id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        roles: user.roles.iter().map(|r| r.role_id.clone()).collect(),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/verify", post(verify_token))
        .route("/refresh", post(refresh_token))
        .route("/revoke", post(revoke_token))
}
