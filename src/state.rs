use crate::config::AppConfig;
use crate::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

impl AppState {
    /// Connects to the configured database and brings the schema up to date.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let db = DbPool::connect(&config.database).await?;
        db.migrate().await?;
        Ok(Self { db })
    }

    pub fn from_parts(db: DbPool) -> Self {
        Self { db }
    }
}
