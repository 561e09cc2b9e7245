use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;

use crate::errors::AdapterError;

/// Pagination envelope returned by `find` when pagination is configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub data: Vec<Json>,
}

/// `find` output: a bare sequence, or a page when pagination applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FindResult {
    Records(Vec<Json>),
    Page(Page),
}

impl FindResult {
    pub fn data(&self) -> &[Json] {
        match self {
            Self::Records(data) => data,
            Self::Page(page) => &page.data,
        }
    }

    pub fn into_data(self) -> Vec<Json> {
        match self {
            Self::Records(data) => data,
            Self::Page(page) => page.data,
        }
    }
}

/// Output of the mutating operations: one record for single-target calls,
/// a sequence for bulk calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Records {
    One(Json),
    Many(Vec<Json>),
}

impl Records {
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_one(self) -> Option<Json> {
        match self {
            Self::One(record) => Some(record),
            Self::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Vec<Json> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(records) => records,
        }
    }
}

/// The generic CRUD service convention. `id: None` on `patch` and `remove`
/// targets every record matching the filter.
#[async_trait]
pub trait CrudService<P: Send + Sync + 'static>: Send + Sync {
    async fn find(&self, params: P) -> Result<FindResult, AdapterError>;

    async fn get(&self, id: &Json, params: P) -> Result<Json, AdapterError>;

    async fn create(&self, data: Json, params: P) -> Result<Records, AdapterError>;

    async fn update(&self, id: &Json, data: Json, params: P) -> Result<Json, AdapterError>;

    async fn patch(&self, id: Option<&Json>, data: Json, params: P)
        -> Result<Records, AdapterError>;

    async fn remove(&self, id: Option<&Json>, params: P) -> Result<Records, AdapterError>;
}
