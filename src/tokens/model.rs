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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token metadata record (§3), keyed in the KV store by
/// `tokens:{tenant_id}:{user_id}:{token_id}` (§6.2). `token_id` is
/// `hex(sha256(jwt))`, never the JWT's own `jti` claim (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    pub token_id: String,
    pub jti: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default = "token_type_access")]
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn token_type_access() -> String {
    "access".to_string()
}

/// Refresh token record (§3), keyed by
/// `refresh_tokens:{tenant_id}:{user_id}:{token_id}` where `token_id` is the
/// opaque token value itself (§10.6's Open Question resolution).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: String,
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub is_revoked: bool,
}

/// Metadata accompanying a newly issued token pair, threaded through
/// `StoreTokens` / `Authenticate` so request-scoped context (caller IP,
/// user agent) lands on both records without widening every call signature.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
