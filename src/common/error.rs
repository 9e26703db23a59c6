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

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{Level, event};

/// The error category taxonomy from the core spec (§4.1 / §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Auth,
    Validation,
    NotFound,
    Conflict,
    Business,
    Internal,
}

impl ErrorCategory {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCategory::Auth => StatusCode::UNAUTHORIZED,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Business => StatusCode::PRECONDITION_FAILED,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ErrorCategory::Auth => "AUTH",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::Conflict => "CONFLICT",
            ErrorCategory::Business => "BUSINESS",
            ErrorCategory::Internal => "INTERNAL",
        }
    }
}

/// The single tagged error value every component in this crate classifies
/// its failures through (C1, §4.1). Equality is by `code` only: two errors
/// sharing a code are the "same" error for test purposes even when their
/// messages or details differ.
#[derive(Debug, Error)]
pub struct CoreError {
    pub category: ErrorCategory,
    pub code: &'static str,
    pub message: String,
    pub details: BTreeMap<String, String>,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PartialEq for CoreError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.category.label(), self.message)
    }
}

impl CoreError {
    pub fn new(category: ErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        let err = Self {
            category,
            code,
            message: message.into(),
            details: BTreeMap::new(),
            cause: None,
        };
        err.trace()
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    fn trace(self) -> Self {
        event!(
            Level::DEBUG,
            category = self.category.label(),
            code = self.code,
            "core error constructed: {}",
            self.message
        );
        self
    }

    pub fn auth(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, code, message)
    }
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, code, message)
    }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, code, message)
    }
    pub fn business(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Business, code, message)
    }
    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.category == ErrorCategory::NotFound
    }
}

/// Logs a failure the caller has decided to swallow per §7 ("token-index
/// failures and audit-log failures are logged and swallowed"). A free
/// function rather than a method because call sites build a `CoreError`
/// purely to log it and then discard it.
pub fn log_swallowed(context: &str, err: &CoreError) {
    event!(
        Level::WARN,
        context,
        code = err.code,
        "swallowed failure: {}",
        err.message
    );
}

/// Logs a best-effort compensation/rollback step that itself failed. Per §7
/// these are logged at warn with enough context for an operator to reconcile.
pub fn log_compensation_failure(operation: &str, err: &CoreError) {
    event!(
        Level::WARN,
        operation,
        code = err.code,
        "compensation step failed, manual reconciliation may be required: {}",
        err.message
    );
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: BTreeMap<String, String>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.category.status_code();
        let body = ErrorBody {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
