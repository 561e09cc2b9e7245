//! SeaORM-backed implementation of the CRUD service convention.

use std::marker::PhantomData;
use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, IdenStatic, IntoActiveModel, Iterable, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Value,
};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::errors::AdapterError;
use crate::params::Params;
use crate::query::{self, Translated};
use crate::service::{CrudService, FindResult, Page, Records};

/// Pagination defaults applied by `find` unless disabled per call.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub default: u64,
    pub max: u64,
}

/// Adapts one SeaORM entity to the generic CRUD service convention.
///
/// The adapter is configured once per entity and stateless across calls:
/// records move in and out as JSON objects, the configured id field locates
/// single records, and the query filter translates to ORM query options.
pub struct SeaOrmAdapter<E, A> {
    db: DatabaseConnection,
    id_field: String,
    raw: bool,
    pagination: Option<Pagination>,
    atomic_returning: bool,
    _entity: PhantomData<fn() -> (E, A)>,
}

impl<E, A> SeaOrmAdapter<E, A>
where
    E: EntityTrait + 'static,
    E::Model: Serialize + IntoActiveModel<A> + Send + Sync,
    E::Column: FromStr,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
{
    /// The atomic-returning capability is derived from the backend: Postgres
    /// can re-read patched rows straight from `UPDATE .. RETURNING`.
    pub fn new(db: DatabaseConnection) -> Self {
        let atomic_returning = db.get_database_backend().support_returning();
        Self {
            db,
            id_field: "id".to_string(),
            raw: true,
            pagination: None,
            atomic_returning,
            _entity: PhantomData,
        }
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    /// Raw mode decodes rows straight to plain JSON maps; when disabled,
    /// rows materialize as typed models and serialize through serde.
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn paginate(mut self, default: u64, max: u64) -> Self {
        self.pagination = Some(Pagination { default, max });
        self
    }

    /// Override the capability detection, e.g. to force the generic patch
    /// strategy on a returning-capable backend. The override is clamped to
    /// the backend's actual RETURNING support, so enabling it never routes a
    /// write through a statement the backend cannot execute.
    pub fn atomic_returning(mut self, on: bool) -> Self {
        self.atomic_returning = on && self.db.get_database_backend().support_returning();
        self
    }

    pub fn supports_atomic_returning(&self) -> bool {
        self.atomic_returning
    }

    fn id_column(&self) -> Result<E::Column, AdapterError> {
        query::column_of::<E>(&self.id_field)
    }

    fn id_condition(&self, id: &Json) -> Result<Condition, AdapterError> {
        let col = self.id_column()?;
        let value = query::to_db_value::<E>(&col, id)?;
        Ok(Condition::all().add(col.eq(value)))
    }

    /// Base read query: filter, per-call scope, ordering.
    fn read_select(&self, translated: &Translated<E>, params: &Params<E>) -> Select<E> {
        let mut q = E::find().filter(translated.condition.clone());
        if let Some(scope) = &params.scope {
            q = scope(q);
        }
        for (col, ord) in &translated.order {
            q = q.order_by(*col, ord.clone());
        }
        q
    }

    /// Narrow the projection to the `$select` fields, keeping the id field.
    fn project(&self, q: Select<E>, select: &[String]) -> Result<Select<E>, AdapterError> {
        let mut q = q.select_only();
        let mut has_id = false;
        for name in select {
            if *name == self.id_field {
                has_id = true;
            }
            q = q.column(query::column_of::<E>(name)?);
        }
        if !has_id {
            q = q.column(self.id_column()?);
        }
        Ok(q)
    }

    /// Run a read query and decode rows per the configured result mode.
    /// A `$select` projection always decodes plain JSON, since partial rows
    /// cannot materialize a full model.
    async fn fetch(
        &self,
        q: Select<E>,
        translated: &Translated<E>,
    ) -> Result<Vec<Json>, AdapterError> {
        if let Some(select) = &translated.select {
            let q = self.project(q, select)?;
            return Ok(q.into_json().all(&self.db).await?);
        }
        if self.raw {
            return Ok(q.into_json().all(&self.db).await?);
        }
        let models = q.all(&self.db).await?;
        models.into_iter().map(Self::row_of).collect()
    }

    fn row_of(model: E::Model) -> Result<Json, AdapterError> {
        serde_json::to_value(model).map_err(|err| AdapterError::Db(err.to_string()))
    }

    fn apply_select(&self, rows: &mut [Json], translated: &Translated<E>) {
        if let Some(select) = &translated.select {
            for row in rows.iter_mut() {
                query::apply_select(row, select, &self.id_field);
            }
        }
    }

    /// Build an active model column-by-column; fields absent from the record
    /// stay `NotSet` and fall through to `ActiveModelBehavior` and database
    /// defaults.
    fn active_model(&self, record: &Json) -> Result<A, AdapterError> {
        let obj = record
            .as_object()
            .ok_or_else(|| AdapterError::bad_request("record must be an object"))?;
        let mut am = A::default();
        for (field, value) in obj {
            let col = query::column_of::<E>(field)?;
            am.set(col, query::to_db_value::<E>(&col, value)?);
        }
        Ok(am)
    }

    fn single_or_many(id: Option<&Json>, mut rows: Vec<Json>) -> Result<Records, AdapterError> {
        match id {
            Some(id) if rows.is_empty() => Err(AdapterError::no_record(id)),
            Some(_) => Ok(Records::One(rows.remove(0))),
            None => Ok(Records::Many(rows)),
        }
    }
}

#[async_trait]
impl<E, A> CrudService<Params<E>> for SeaOrmAdapter<E, A>
where
    E: EntityTrait + 'static,
    E::Model: Serialize + IntoActiveModel<A> + Send + Sync,
    E::Column: FromStr,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
{
    async fn find(&self, params: Params<E>) -> Result<FindResult, AdapterError> {
        let translated = query::translate::<E>(params.query.as_ref())?;
        let pagination = match params.paginate {
            Some(false) => None,
            _ => self.pagination.clone(),
        };
        match pagination {
            None => {
                let mut q = self.read_select(&translated, &params);
                if let Some(limit) = translated.limit {
                    q = q.limit(limit);
                }
                if let Some(skip) = translated.skip {
                    q = q.offset(skip);
                }
                Ok(FindResult::Records(self.fetch(q, &translated).await?))
            }
            Some(pagination) => {
                let mut count_q = E::find().filter(translated.condition.clone());
                if let Some(scope) = &params.scope {
                    count_q = scope(count_q);
                }
                let total = count_q.count(&self.db).await?;
                let limit = translated.limit.unwrap_or(pagination.default).min(pagination.max);
                let skip = translated.skip.unwrap_or(0);
                // `$limit: 0` is a count-only query
                let data = if limit == 0 {
                    Vec::new()
                } else {
                    let q = self.read_select(&translated, &params).limit(limit).offset(skip);
                    self.fetch(q, &translated).await?
                };
                Ok(FindResult::Page(Page {
                    total,
                    limit,
                    skip,
                    data,
                }))
            }
        }
    }

    async fn get(&self, id: &Json, params: Params<E>) -> Result<Json, AdapterError> {
        let translated = query::translate::<E>(params.query.as_ref())?;
        let cond = self.id_condition(id)?.add(translated.condition.clone());
        let mut q = E::find().filter(cond);
        if let Some(scope) = &params.scope {
            q = scope(q);
        }
        let mut rows = self.fetch(q.limit(1), &translated).await?;
        rows.pop().ok_or_else(|| AdapterError::no_record(id))
    }

    async fn create(&self, data: Json, params: Params<E>) -> Result<Records, AdapterError> {
        let translated = query::translate::<E>(params.query.as_ref())?;
        match data {
            Json::Array(items) => {
                if items.is_empty() {
                    return Ok(Records::Many(Vec::new()));
                }
                let models = if self.atomic_returning {
                    let mut ams = Vec::with_capacity(items.len());
                    for item in &items {
                        ams.push(self.active_model(item)?);
                    }
                    E::insert_many(ams)
                        .exec_with_returning_many(&self.db)
                        .await?
                } else {
                    let mut created = Vec::with_capacity(items.len());
                    for item in &items {
                        created.push(self.active_model(item)?.insert(&self.db).await?);
                    }
                    created
                };
                debug!(rows = models.len(), "bulk create completed");
                let mut rows = models
                    .into_iter()
                    .map(Self::row_of)
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply_select(&mut rows, &translated);
                Ok(Records::Many(rows))
            }
            Json::Object(_) => {
                let model = self.active_model(&data)?.insert(&self.db).await?;
                let mut rows = vec![Self::row_of(model)?];
                self.apply_select(&mut rows, &translated);
                Ok(Records::One(rows.remove(0)))
            }
            _ => Err(AdapterError::bad_request(
                "create expects an object or an array of objects",
            )),
        }
    }

    async fn update(&self, id: &Json, data: Json, params: Params<E>) -> Result<Json, AdapterError> {
        if data.is_array() {
            return Err(AdapterError::bad_request(
                "update does not accept arrays, use patch for bulk changes",
            ));
        }
        let obj = data
            .as_object()
            .ok_or_else(|| AdapterError::bad_request("record must be an object"))?;
        let translated = query::translate::<E>(params.query.as_ref())?;

        let cond = self.id_condition(id)?.add(translated.condition.clone());
        let mut probe = E::find().filter(cond);
        if let Some(scope) = &params.scope {
            probe = scope(probe);
        }
        if probe.count(&self.db).await? == 0 {
            return Err(AdapterError::no_record(id));
        }

        // Full replacement: every column absent from the incoming data is
        // written as a typed NULL; the id column is never replaced.
        let id_col = self.id_column()?;
        let mut am = A::default();
        for col in E::Column::iter() {
            if col.as_str() == self.id_field {
                continue;
            }
            match obj.get(col.as_str()) {
                Some(value) => am.set(col, query::to_db_value::<E>(&col, value)?),
                None => am.set(col, query::null_value_of::<E>(&col)),
            }
        }
        am.set(id_col, query::to_db_value::<E>(&id_col, id)?);
        let model = am.update(&self.db).await?;

        let mut rows = vec![Self::row_of(model)?];
        self.apply_select(&mut rows, &translated);
        Ok(rows.remove(0))
    }

    async fn patch(
        &self,
        id: Option<&Json>,
        data: Json,
        params: Params<E>,
    ) -> Result<Records, AdapterError> {
        let obj = data
            .as_object()
            .ok_or_else(|| AdapterError::bad_request("record must be an object"))?;
        let translated = query::translate::<E>(params.query.as_ref())?;
        let mut cond = translated.condition.clone();
        if let Some(id) = id {
            cond = self.id_condition(id)?.add(cond);
        }

        let mut changes: Vec<(E::Column, Value)> = Vec::with_capacity(obj.len());
        for (field, value) in obj {
            if *field == self.id_field {
                continue;
            }
            let col = query::column_of::<E>(field)?;
            changes.push((col, query::to_db_value::<E>(&col, value)?));
        }

        if changes.is_empty() {
            let mut q = E::find().filter(cond);
            if let Some(scope) = &params.scope {
                q = scope(q);
            }
            let rows = self.fetch(q, &translated).await?;
            return Self::single_or_many(id, rows);
        }

        // The returning shortcut cannot express a scope hook; scoped calls
        // take the id re-query path below.
        if self.atomic_returning && params.scope.is_none() {
            let mut update = E::update_many().filter(cond);
            for (col, value) in changes {
                update = update.col_expr(col, Expr::value(value));
            }
            let models = update.exec_with_returning(&self.db).await?;
            debug!(rows = models.len(), "patch applied with returning update");
            let mut rows = models
                .into_iter()
                .map(Self::row_of)
                .collect::<Result<Vec<_>, _>>()?;
            self.apply_select(&mut rows, &translated);
            return Self::single_or_many(id, rows);
        }

        // Generic strategy: resolve the affected ids, update, then re-read
        // those ids. Not transactionally isolated from concurrent writers.
        let id_col = self.id_column()?;
        let matched = {
            let mut probe = E::find().filter(cond);
            if let Some(scope) = &params.scope {
                probe = scope(probe);
            }
            probe.all(&self.db).await?
        };
        let mut ids = Vec::with_capacity(matched.len());
        for model in matched {
            let row = Self::row_of(model)?;
            let id_value = row.get(&self.id_field).cloned().ok_or_else(|| {
                AdapterError::Db(format!("id field '{}' missing from record", self.id_field))
            })?;
            ids.push(query::to_db_value::<E>(&id_col, &id_value)?);
        }
        if ids.is_empty() {
            return Self::single_or_many(id, Vec::new());
        }

        let mut update = E::update_many().filter(id_col.is_in(ids.clone()));
        for (col, value) in changes {
            update = update.col_expr(col, Expr::value(value));
        }
        let result = update.exec(&self.db).await?;
        debug!(rows = result.rows_affected, "patch applied via id re-query");

        let rows = self
            .fetch(E::find().filter(id_col.is_in(ids)), &translated)
            .await?;
        Self::single_or_many(id, rows)
    }

    async fn remove(&self, id: Option<&Json>, params: Params<E>) -> Result<Records, AdapterError> {
        let translated = query::translate::<E>(params.query.as_ref())?;
        let mut cond = translated.condition.clone();
        if let Some(id) = id {
            cond = self.id_condition(id)?.add(cond);
        }

        // Pre-read so callers get the deleted data back.
        let mut q = E::find().filter(cond.clone());
        if let Some(scope) = &params.scope {
            q = scope(q);
        }
        let rows = self.fetch(q, &translated).await?;

        if !rows.is_empty() {
            // A scope hook narrows the read beyond `cond`; delete exactly the
            // rows the read matched by targeting their ids.
            let delete_cond = if params.scope.is_some() {
                let id_col = self.id_column()?;
                let mut ids = Vec::with_capacity(rows.len());
                for row in &rows {
                    let id_value = row.get(&self.id_field).cloned().ok_or_else(|| {
                        AdapterError::Db(format!(
                            "id field '{}' missing from record",
                            self.id_field
                        ))
                    })?;
                    ids.push(query::to_db_value::<E>(&id_col, &id_value)?);
                }
                Condition::all().add(id_col.is_in(ids))
            } else {
                cond
            };
            let result = E::delete_many().filter(delete_cond).exec(&self.db).await?;
            debug!(rows = result.rows_affected, "removed records");
        }
        Self::single_or_many(id, rows)
    }
}
