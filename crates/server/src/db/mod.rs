mod repository;
mod store;

pub use repository::{HcpRepository, InteractionRepository};
pub use store::{PgStore, RecordStore};

use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::error::AppError;

/// Create a connection pool from a database URL
pub fn create_pool(database_url: &str) -> Result<Pool, deadpool_postgres::CreatePoolError> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
}

/// Create the hcps/interactions tables if they do not exist yet.
pub async fn init_schema(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS hcps (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                specialty VARCHAR(255),
                contact_info VARCHAR(255)
            );
            CREATE TABLE IF NOT EXISTS interactions (
                id SERIAL PRIMARY KEY,
                hcp_id INTEGER NOT NULL REFERENCES hcps(id),
                interaction_type VARCHAR(100) NOT NULL DEFAULT 'Meeting',
                interaction_date DATE NOT NULL,
                interaction_time VARCHAR(50) NOT NULL,
                attendees TEXT,
                topics_discussed TEXT,
                materials_shared TEXT,
                samples_distributed TEXT,
                hcp_sentiment VARCHAR(50) NOT NULL DEFAULT 'Neutral',
                outcomes TEXT,
                follow_up_actions TEXT,
                summary TEXT,
                raw_text_input TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_hcp_id
                ON interactions (hcp_id);",
        )
        .await?;
    Ok(())
}
