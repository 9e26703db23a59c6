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

//! Password hashing/verification (Argon2) plus a minimal entropy estimate
//! standing in for the "password entropy validation library" that §1 names
//! as an external collaborator. A real deployment would swap
//! `estimate_entropy_bits` for that library; the shape (bits in, bits
//! required out of config) is what `TenantSeeder` and `AuthFacade` depend
//! on, not the estimation method itself.

use crate::common::error::{CoreError, CoreResult};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _};

pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::internal("INTERNAL_PASSWORD_HASH", "failed to hash password").with_cause(e))
}

/// Verifies `password` against `stored_hash`. A malformed hash is treated
/// as an internal error (it should never have been persisted); a mismatch
/// is `AUTH_INVALID_CREDENTIALS`, never distinguished from "user not found"
/// by the caller.
pub fn verify_password(password: &str, stored_hash: &str) -> CoreResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CoreError::internal("INTERNAL_PASSWORD_HASH", "stored password hash is malformed").with_cause(e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| CoreError::auth("AUTH_INVALID_CREDENTIALS", "invalid email or password"))
}

/// A coarse Shannon-style entropy estimate: `len * log2(charset size)`,
/// where the charset is inferred from which character classes appear.
/// Good enough to reject "password123" while accepting a long passphrase;
/// not a substitute for a real zxcvbn-style estimator.
pub fn estimate_entropy_bits(password: &str) -> f64 {
    let mut charset_size: f64 = 0.0;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        charset_size += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        charset_size += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        charset_size += 10.0;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        charset_size += 32.0;
    }
    if charset_size == 0.0 {
        return 0.0;
    }
    password.chars().count() as f64 * charset_size.log2()
}

pub fn validate_password_strength(password: &str, min_entropy_bits: u32) -> CoreResult<()> {
    let bits = estimate_entropy_bits(password);
    if bits < min_entropy_bits as f64 {
        return Err(CoreError::validation(
            "VALIDATION_PASSWORD_TOO_WEAK",
            format!("password entropy {bits:.1} bits is below the required {min_entropy_bits} bits"),
        ));
    }
    Ok(())
}
