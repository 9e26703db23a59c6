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

#![forbid(unsafe_code)]
mod api;
mod common;
mod config;
mod domain;
mod rbac;
mod services;
mod store;
mod tenancy;
mod tokens;

use crate::config::AppConfig;
use crate::domain::permission::PgPermissionsRepository;
use crate::domain::role::PgRolesRepository;
use crate::domain::tenant::PgTenantsRepository;
use crate::domain::user::PgUsersRepository;
use crate::domain::{PermissionsRepository, RolesRepository, TenantsRepository, UsersRepository};
use crate::rbac::RbacResolver;
use crate::services::{AuthService, TenantService};
use crate::store::postgres::PgDocumentDriver;
use crate::store::redis::RedisKvDriver;
use crate::store::{DocumentDriver, KvDriver};
use crate::tenancy::TenantSeeder;
use crate::tokens::access_store::AccessTokenStore;
use crate::tokens::index::TokenIndex;
use crate::tokens::manager::TokenManager;
use crate::tokens::refresh_store::RefreshTokenStore;
use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_subscriber() {
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(Level::INFO).finish())
        .expect("setting default subscriber failed");
}

async fn init_app(config: &AppConfig) -> anyhow::Result<Router> {
    let doc_driver: Arc<dyn DocumentDriver> = Arc::new(PgDocumentDriver::connect(config.store().doc_uri()).await?);
    let kv_driver: Arc<dyn KvDriver> = Arc::new(RedisKvDriver::connect(config.store().kv_uri()).await?);

    let tenants: Arc<dyn TenantsRepository> = Arc::new(PgTenantsRepository::new(doc_driver.clone()));
    let users: Arc<dyn UsersRepository> = Arc::new(PgUsersRepository::new(doc_driver.clone()));
    let roles: Arc<dyn RolesRepository> = Arc::new(PgRolesRepository::new(doc_driver.clone()));
    let permissions: Arc<dyn PermissionsRepository> = Arc::new(PgPermissionsRepository::new(doc_driver));

    let index = TokenIndex::new(kv_driver.clone());
    let access_store = AccessTokenStore::new(kv_driver.clone(), index.clone(), config.auth().access_token_ttl());
    let refresh_store = RefreshTokenStore::new(kv_driver, index, config.auth().refresh_token_ttl());
    let tokens = TokenManager::new(
        access_store,
        refresh_store,
        config.auth().jwt_secret(),
        config.auth().jwt_issuer(),
        config.auth().access_token_ttl(),
        config.auth().refresh_token_ttl(),
    );

    let seeder = TenantSeeder::new(
        permissions.clone(),
        roles.clone(),
        users.clone(),
        config.password_policy().min_entropy_bits(),
    );
    let rbac = RbacResolver::new(
        users.clone(),
        roles.clone(),
        permissions.clone(),
        config.bootstrap().system_tenant_id(),
    );

    let auth_service = Arc::new(AuthService::new(tokens.clone()));
    let tenant_service = Arc::new(TenantService::new(
        tenants,
        users.clone(),
        roles,
        permissions,
        seeder,
        rbac.clone(),
        tokens,
    ));

    let state = api::AppState {
        auth: auth_service,
        tenant: tenant_service,
        users,
        rbac,
    };

    Ok(api::router(state).layer(TraceLayer::new_for_http()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let config = AppConfig::from_env()?;
    serve(config).await
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let app = init_app(&config).await?;

    let addr = config.server().host().to_string() + ":" + &config.server().port().to_string();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
            _ = terminate => {},
    }
}
