use std::str::FromStr;

use anyhow::Context;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::{
    pool::PoolConnection,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    PgPool, Postgres, Sqlite, SqlitePool,
};
use tracing::{debug, error, info};

use crate::{config::DatabaseConfig, error::ApiError, state::AppState};

/// Connection pool for whichever backend the configured URL selects.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        if config.is_sqlite() {
            let options = SqliteConnectOptions::from_str(&config.url)
                .context("parse sqlite url")?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options)
                .await
                .context("connect to sqlite database")?;
            info!("connected to sqlite");
            Ok(Self::Sqlite(pool))
        } else {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.url)
                .await
                .context("connect to database")?;
            info!("connected to postgres");
            Ok(Self::Postgres(pool))
        }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        match self {
            Self::Postgres(pool) => sqlx::migrate!("./migrations/postgres").run(pool).await,
            Self::Sqlite(pool) => sqlx::migrate!("./migrations/sqlite").run(pool).await,
        }
        .context("run migrations")?;
        info!("database migrations complete");
        Ok(())
    }

    /// Checks out one connection for the lifetime of a request.
    pub async fn session(&self) -> Result<Session, sqlx::Error> {
        let session = match self {
            Self::Postgres(pool) => Session::Postgres(pool.acquire().await?),
            Self::Sqlite(pool) => Session::Sqlite(pool.acquire().await?),
        };
        debug!("session acquired");
        Ok(session)
    }
}

/// A pooled connection scoped to a single request.
///
/// Dropping the session hands the connection back to the pool, so every exit
/// path of a handler releases it: early returns, `?` errors and panics alike.
pub enum Session {
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("session released");
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.db.session().await.map_err(|e| {
            error!(error = %e, "failed to acquire database session");
            ApiError::Database(e)
        })
    }
}

/// Runs `$body` against the raw connection behind a [`Session`], whichever
/// backend it is. The body is expanded once per backend so it type-checks
/// against each driver separately.
macro_rules! with_connection {
    ($session:expr, |$conn:ident| $body:expr) => {
        match $session {
            $crate::db::Session::Postgres($conn) => $body,
            $crate::db::Session::Sqlite($conn) => $body,
        }
    };
}
pub(crate) use with_connection;
