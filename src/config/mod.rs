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

use serde::Deserialize;

/// Central application configuration, covering every key enumerated in
/// §6.5. Loaded from `config/default.{toml,yaml,...}` plus environment
/// overrides via the `config` crate.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    server: ServerConfig,
    auth: AuthConfig,
    store: StoreConfig,
    bootstrap: BootstrapConfig,
    password_policy: PasswordPolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

/// Token TTLs and the HMAC signing secret (§6.4/§6.5). TTLs are stored as
/// seconds; `Duration` conversions happen at the call site in the token
/// manager so this struct stays a plain deserialization target.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    jwt_secret: String,
    jwt_issuer: String,
    access_token_ttl_secs: i64,
    refresh_token_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    kv_uri: String,
    doc_uri: String,
}

/// Bootstrap/system tenant configuration (§6.5): the distinguished system
/// tenant and the credentials used to seed its first admin user.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    system_tenant_id: String,
    system_admin_email: String,
    system_admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyConfig {
    min_entropy_bits: u32,
}

impl AppConfig {
    /// Loads configuration from `config/default` plus environment overrides.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::default().separator("__"));
        builder.build()?.try_deserialize()
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }
    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }
    pub fn bootstrap(&self) -> &BootstrapConfig {
        &self.bootstrap
    }
    pub fn password_policy(&self) -> &PasswordPolicyConfig {
        &self.password_policy
    }
}

impl ServerConfig {
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl AuthConfig {
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
    pub fn jwt_issuer(&self) -> &str {
        &self.jwt_issuer
    }
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }
    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_ttl_secs)
    }
}

impl StoreConfig {
    pub fn kv_uri(&self) -> &str {
        &self.kv_uri
    }
    pub fn doc_uri(&self) -> &str {
        &self.doc_uri
    }
}

impl BootstrapConfig {
    pub fn system_tenant_id(&self) -> &str {
        &self.system_tenant_id
    }
    pub fn system_admin_email(&self) -> &str {
        &self.system_admin_email
    }
    pub fn system_admin_password(&self) -> &str {
        &self.system_admin_password
    }
}

impl PasswordPolicyConfig {
    pub fn min_entropy_bits(&self) -> u32 {
        self.min_entropy_bits
    }
}

/// Test/fixture builder so unit tests don't need a config file on disk.
#[cfg(test)]
pub struct AppConfigBuilder {
    server: ServerConfig,
    auth: AuthConfig,
    store: StoreConfig,
    bootstrap: BootstrapConfig,
    password_policy: PasswordPolicyConfig,
}

#[cfg(test)]
impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-at-least-32-bytes-long!".to_string(),
                jwt_issuer: "auth-core-tests".to_string(),
                access_token_ttl_secs: 3600,
                refresh_token_ttl_secs: 7 * 24 * 3600,
            },
            store: StoreConfig {
                kv_uri: "redis://127.0.0.1:6379".to_string(),
                doc_uri: "postgres://localhost/auth_core_test".to_string(),
            },
            bootstrap: BootstrapConfig {
                system_tenant_id: "system".to_string(),
                system_admin_email: "admin@system.local".to_string(),
                system_admin_password: "correct horse battery staple 42!".to_string(),
            },
            password_policy: PasswordPolicyConfig {
                min_entropy_bits: 60,
            },
        }
    }
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn build(self) -> AppConfig {
        AppConfig {
            server: self.server,
            auth: self.auth,
            store: self.store,
            bootstrap: self.bootstrap,
            password_policy: self.password_policy,
        }
    }

    pub fn access_ttl_secs(mut self, secs: i64) -> Self {
        self.auth.access_token_ttl_secs = secs;
        self
    }

    pub fn refresh_ttl_secs(mut self, secs: i64) -> Self {
        self.auth.refresh_token_ttl_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_usable_defaults() {
        let config = AppConfigBuilder::default().build();
        assert_eq!(config.auth().jwt_issuer(), "auth-core-tests");
        assert_eq!(config.password_policy().min_entropy_bits(), 60);
    }
}
