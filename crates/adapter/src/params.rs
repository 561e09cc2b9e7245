use std::sync::Arc;

use sea_orm::{EntityTrait, Select};
use serde_json::Value as Json;

/// Per-call hook applied to every read query. This is the escape hatch for
/// ORM options the filter convention cannot express (joins, locking, extra
/// conditions); it is the typed analog of merging raw ORM options into the
/// call.
pub type Scope<E> = Arc<dyn Fn(Select<E>) -> Select<E> + Send + Sync>;

/// Call parameters: the parsed filter plus adapter-specific extras.
pub struct Params<E: EntityTrait> {
    /// Filter object (`$sort`, `$limit`, `$skip`, `$select`, field operators).
    pub query: Option<Json>,
    /// `Some(false)` disables the adapter's configured pagination for this
    /// call; `None` inherits the adapter configuration.
    pub paginate: Option<bool>,
    pub scope: Option<Scope<E>>,
}

impl<E: EntityTrait> Params<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(query: Json) -> Self {
        Self {
            query: Some(query),
            ..Self::default()
        }
    }

    pub fn paginate(mut self, on: bool) -> Self {
        self.paginate = Some(on);
        self
    }

    pub fn scope(mut self, hook: impl Fn(Select<E>) -> Select<E> + Send + Sync + 'static) -> Self {
        self.scope = Some(Arc::new(hook));
        self
    }
}

impl<E: EntityTrait> Default for Params<E> {
    fn default() -> Self {
        Self {
            query: None,
            paginate: None,
            scope: None,
        }
    }
}

impl<E: EntityTrait> Clone for Params<E> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            paginate: self.paginate,
            scope: self.scope.clone(),
        }
    }
}
