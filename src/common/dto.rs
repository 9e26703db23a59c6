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

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Thin success envelope used by the `api` module's handlers. Kept separate
/// from the facade return types so the HTTP surface can evolve (e.g. adding
/// pagination metadata) without touching facade signatures.
#[derive(Debug, Serialize)]
pub struct OkResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> OkResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for OkResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
