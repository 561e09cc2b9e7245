use sea_orm::{DbErr, SqlErr};
use serde_json::Value as Json;
use thiserror::Error;

/// Error taxonomy of the service convention. Every operation funnels ORM
/// failures through the single `From<DbErr>` translation below.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Db(String),
}

impl AdapterError {
    pub fn no_record(id: &Json) -> Self {
        Self::NotFound(format!("no record found for id '{id}'"))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<DbErr> for AdapterError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => Self::Conflict(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => Self::BadRequest(msg),
            _ => match err {
                DbErr::RecordNotFound(msg) => Self::NotFound(msg),
                DbErr::RecordNotUpdated => Self::NotFound("record was not updated".to_string()),
                DbErr::Type(msg) | DbErr::Json(msg) => Self::BadRequest(msg),
                other => Self::Db(other.to_string()),
            },
        }
    }
}
