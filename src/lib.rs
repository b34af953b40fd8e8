pub mod config;
pub mod database;
pub mod models;
pub mod filters;
pub mod policy;
pub mod store;
pub mod services;
pub mod middleware;
pub mod controllers;
pub mod error;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use config::{Config, StoreBackend};
use models::NewUser;
use services::auth::{self, TokenService};
use store::{MemoryStore, PgStore, ResourceStore};

// Shared state для всего приложения
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub tokens: TokenService,
    pub config: Config,
}

impl AppState {
    /// Поднимает хранилище по конфигурации и создаёт staff-учётку, если она задана.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn ResourceStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let db = database::Database::connect(&config.database).await?;
                db.run_migrations().await?;
                Arc::new(PgStore::new(&db))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store, data is lost on restart");
                Arc::new(MemoryStore::default())
            }
        };

        let state = Self::with_store(config, store);
        state.ensure_admin().await?;
        Ok(state)
    }

    pub fn with_store(config: Config, store: Arc<dyn ResourceStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            tokens: TokenService::new(&config.jwt),
            config,
        })
    }

    async fn ensure_admin(&self) -> anyhow::Result<()> {
        let security = &self.config.security;
        let (Some(email), Some(password)) = (&security.admin_email, &security.admin_password) else {
            return Ok(());
        };
        let email = email.trim().to_lowercase();
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Ok(());
        }

        let password_hash = auth::hash_password(password.clone(), security.bcrypt_cost).await?;
        let admin = self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                first_name: String::new(),
                last_name: String::new(),
                is_staff: true,
            })
            .await?;
        info!(user = admin.id, "Staff account created");
        Ok(())
    }
}

/// Полный роутер приложения; используется и в `main`, и в интеграционных тестах.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(|| async { "Planetarium API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .layer(TraceLayer::new_for_http());

    if state.config.is_development() {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}
