use adapter::{CrudService, Params, SeaOrmAdapter};
use anyhow::Result;
use models::{db, note};
use serde_json::json;

pub type NoteService = SeaOrmAdapter<note::Entity, note::ActiveModel>;

pub async fn note_service() -> Result<NoteService> {
    models::logging::init_logging_default();
    let db = db::get_db().await?;
    Ok(SeaOrmAdapter::new(db))
}

/// Four notes: priorities 1/3/5/7, the last two done and without a body.
pub async fn seeded_note_service() -> Result<NoteService> {
    let service = note_service().await?;
    service
        .create(
            json!([
                {"title": "alpha", "body": "first", "priority": 1, "done": false},
                {"title": "beta", "body": "second", "priority": 3, "done": false},
                {"title": "gamma", "priority": 5, "done": true},
                {"title": "delta", "priority": 7, "done": true},
            ]),
            Params::new(),
        )
        .await?;
    Ok(service)
}

pub fn titles_of(rows: &[serde_json::Value]) -> Vec<String> {
    let mut titles: Vec<String> = rows
        .iter()
        .map(|row| row["title"].as_str().unwrap_or_default().to_string())
        .collect();
    titles.sort();
    titles
}
