use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;

use crate::{note, session, workspace};

/// Connect to the test database. Reads `TEST_DATABASE_URL`, falling back to
/// an in-memory sqlite database held on a single pooled connection.
pub async fn connect() -> Result<DatabaseConnection> {
    let _ = dotenvy::dotenv();
    let url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await?;
    Ok(db)
}

/// Create tables for every demo entity.
pub async fn init_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let statements = [
        schema.create_table_from_entity(note::Entity),
        schema.create_table_from_entity(workspace::Entity),
        schema.create_table_from_entity(session::Entity),
    ];
    for mut stmt in statements {
        db.execute(backend.build(stmt.if_not_exists())).await?;
    }
    Ok(())
}

/// Connect and prepare the schema in one step.
pub async fn get_db() -> Result<DatabaseConnection> {
    let db = connect().await?;
    init_schema(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn schema_bootstrap() -> Result<()> {
        let db = get_db().await?;
        let notes = note::Entity::find().all(&db).await?;
        assert!(notes.is_empty());
        Ok(())
    }
}
