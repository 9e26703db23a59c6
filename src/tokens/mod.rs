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

//! The Token Lifecycle Engine (§1): JWT signing/verification, the two
//! per-(tenant,user) stores, and the set-valued index tying them together
//! for bulk revoke (C5-C8).

pub mod access_store;
pub mod index;
pub mod manager;
pub mod model;
pub mod refresh_store;

pub use access_store::AccessTokenStore;
pub use index::TokenIndex;
pub use manager::{AccessClaims, IssuedTokens, TokenManager, TokenSubject};
pub use model::{RefreshToken, RequestContext, TokenMetadata};
pub use refresh_store::RefreshTokenStore;
