use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// `sqlite:` URLs select the embedded file-backed store instead of Postgres.
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let url = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                var("POSTGRES_USER", "appuser"),
                var("POSTGRES_PASSWORD", "apppassword"),
                var("POSTGRES_HOST", "db"),
                var("POSTGRES_PORT", "5432"),
                var("POSTGRES_DB", "appdb"),
            ),
        };

        let max_connections = var("DB_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?;
        let port = var("APP_PORT", "8080")
            .parse::<u16>()
            .context("APP_PORT must be a valid port number")?;

        Ok(Self {
            host: var("APP_HOST", "0.0.0.0"),
            port,
            database: DatabaseConfig {
                url,
                max_connections,
            },
        })
    }
}
