use config::{ConfigError, Environment};
use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Где живут записи: Postgres в проде, память для разработки и тестов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    /// Учётная запись staff, создаваемая при старте, если её ещё нет.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Собирает конфигурацию: значения по умолчанию, затем
    /// `PLANETARIUM__SECTION__KEY`, затем привычные плоские имена (`PORT`, `DATABASE_URL`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "planetarium=debug,tower_http=debug")?
            .set_default("app.log_format", "pretty")?
            .set_default("database.backend", "postgres")?
            .set_default("database.pool_size", 20)?
            .set_default("jwt.access_ttl_minutes", 5)?
            .set_default("jwt.refresh_ttl_hours", 24)?
            .set_default("security.bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .add_source(
                Environment::with_prefix("PLANETARIUM")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("app.host", env::var("HOST").ok())?
            .set_override_option("app.port", env::var("PORT").ok())?
            .set_override_option("app.environment", env::var("ENVIRONMENT").ok())?
            .set_override_option("app.rust_log", env::var("RUST_LOG").ok())?
            .set_override_option("app.log_format", env::var("LOG_FORMAT").ok())?
            .set_override_option("database.backend", env::var("STORE_BACKEND").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("database.pool_size", env::var("DB_POOL_SIZE").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?
            .set_override_option("security.admin_email", env::var("ADMIN_EMAIL").ok())?
            .set_override_option("security.admin_password", env::var("ADMIN_PASSWORD").ok())?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        if config.database.backend == StoreBackend::Postgres && config.database.url.is_none() {
            return Err(ConfigError::Message(
                "DATABASE_URL must be set for the postgres backend".to_string(),
            ));
        }
        Ok(config)
    }

    /// Конфигурация без внешних зависимостей: хранилище в памяти, минимальная стоимость bcrypt.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "planetarium=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                pool_size: 1,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
                access_ttl_minutes: 5,
                refresh_ttl_hours: 24,
            },
            security: SecurityConfig {
                bcrypt_cost: 4,
                admin_email: None,
                admin_password: None,
            },
        }
    }

    pub fn is_development(&self) -> bool {
        self.app.environment == "development"
    }
}
