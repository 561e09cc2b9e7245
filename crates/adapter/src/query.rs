//! Translation of the service query convention into SeaORM query options.
//!
//! A filter is a JSON object mixing control keys (`$sort`, `$limit`, `$skip`,
//! `$select`) with field comparisons. Field values are either plain values
//! (equality) or operator objects such as `{"$gte": 3, "$lt": 9}`.

use std::str::FromStr;

use sea_orm::sea_query::SimpleExpr;
use sea_orm::{ColumnTrait, ColumnType, Condition, EntityTrait, Order, Value};
use serde_json::Value as Json;

use crate::errors::AdapterError;

/// The ORM-native pieces a filter translates into.
#[derive(Debug)]
pub struct Translated<E: EntityTrait> {
    pub condition: Condition,
    pub order: Vec<(E::Column, Order)>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub select: Option<Vec<String>>,
}

impl<E: EntityTrait> Translated<E> {
    fn empty() -> Self {
        Self {
            condition: Condition::all(),
            order: Vec::new(),
            limit: None,
            skip: None,
            select: None,
        }
    }
}

/// Resolve a field name against the entity's columns.
pub(crate) fn column_of<E>(field: &str) -> Result<E::Column, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    E::Column::from_str(field)
        .map_err(|_| AdapterError::BadRequest(format!("unknown field '{field}'")))
}

pub fn translate<E>(filter: Option<&Json>) -> Result<Translated<E>, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let mut out = Translated::empty();
    let Some(filter) = filter else { return Ok(out) };
    if filter.is_null() {
        return Ok(out);
    }
    let map = filter
        .as_object()
        .ok_or_else(|| AdapterError::bad_request("query must be an object"))?;

    for (key, value) in map {
        match key.as_str() {
            "$limit" => out.limit = Some(non_negative(value, "$limit")?),
            "$skip" => out.skip = Some(non_negative(value, "$skip")?),
            "$sort" => out.order = sort_of::<E>(value)?,
            "$select" => out.select = Some(select_of::<E>(value)?),
            "$or" => out.condition = out.condition.add(any_of::<E>(value)?),
            "$and" => {
                for sub in expect_array(value, "$and")? {
                    out.condition = out.condition.add(condition_of::<E>(sub)?);
                }
            }
            other if other.starts_with('$') => {
                return Err(AdapterError::BadRequest(format!(
                    "unsupported operator '{other}'"
                )))
            }
            field => out.condition = out.condition.add(field_condition::<E>(field, value)?),
        }
    }
    Ok(out)
}

/// A nested filter: field comparisons plus `$or`/`$and`, no control keys.
fn condition_of<E>(filter: &Json) -> Result<Condition, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let map = filter
        .as_object()
        .ok_or_else(|| AdapterError::bad_request("filter must be an object"))?;
    let mut cond = Condition::all();
    for (key, value) in map {
        match key.as_str() {
            "$or" => cond = cond.add(any_of::<E>(value)?),
            "$and" => {
                for sub in expect_array(value, "$and")? {
                    cond = cond.add(condition_of::<E>(sub)?);
                }
            }
            other if other.starts_with('$') => {
                return Err(AdapterError::BadRequest(format!(
                    "unsupported operator '{other}'"
                )))
            }
            field => cond = cond.add(field_condition::<E>(field, value)?),
        }
    }
    Ok(cond)
}

fn any_of<E>(value: &Json) -> Result<Condition, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let mut cond = Condition::any();
    for sub in expect_array(value, "$or")? {
        cond = cond.add(condition_of::<E>(sub)?);
    }
    Ok(cond)
}

fn field_condition<E>(field: &str, value: &Json) -> Result<Condition, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let col = column_of::<E>(field)?;
    match value {
        Json::Object(ops) => {
            let mut cond = Condition::all();
            for (op, v) in ops {
                cond = cond.add(op_expr::<E>(col, op, v)?);
            }
            Ok(cond)
        }
        Json::Null => Ok(Condition::all().add(col.is_null())),
        other => Ok(Condition::all().add(col.eq(to_db_value::<E>(&col, other)?))),
    }
}

fn op_expr<E>(col: E::Column, op: &str, value: &Json) -> Result<SimpleExpr, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let expr = match op {
        "$ne" => match value {
            Json::Null => col.is_not_null(),
            v => col.ne(to_db_value::<E>(&col, v)?),
        },
        "$in" => col.is_in(values_of::<E>(&col, value, "$in")?),
        "$nin" => col.is_not_in(values_of::<E>(&col, value, "$nin")?),
        "$lt" => col.lt(to_db_value::<E>(&col, value)?),
        "$lte" => col.lte(to_db_value::<E>(&col, value)?),
        "$gt" => col.gt(to_db_value::<E>(&col, value)?),
        "$gte" => col.gte(to_db_value::<E>(&col, value)?),
        "$like" => col.like(&pattern_of(value, "$like")?),
        "$notLike" => col.not_like(&pattern_of(value, "$notLike")?),
        other => {
            return Err(AdapterError::BadRequest(format!(
                "unsupported operator '{other}'"
            )))
        }
    };
    Ok(expr)
}

fn sort_of<E>(value: &Json) -> Result<Vec<(E::Column, Order)>, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let map = value
        .as_object()
        .ok_or_else(|| AdapterError::bad_request("$sort expects an object"))?;
    let mut order = Vec::with_capacity(map.len());
    for (field, dir) in map {
        let col = column_of::<E>(field)?;
        let ord = match dir.as_i64() {
            Some(1) => Order::Asc,
            Some(-1) => Order::Desc,
            _ => {
                return Err(AdapterError::BadRequest(format!(
                    "$sort direction for '{field}' must be 1 or -1"
                )))
            }
        };
        order.push((col, ord));
    }
    Ok(order)
}

fn select_of<E>(value: &Json) -> Result<Vec<String>, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let arr = expect_array(value, "$select")?;
    let mut fields = Vec::with_capacity(arr.len());
    for item in arr {
        let name = item
            .as_str()
            .ok_or_else(|| AdapterError::bad_request("$select expects field names"))?;
        // validated here so projection never sees an unknown field
        column_of::<E>(name)?;
        fields.push(name.to_string());
    }
    Ok(fields)
}

fn values_of<E>(col: &E::Column, value: &Json, op: &str) -> Result<Vec<Value>, AdapterError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    expect_array(value, op)?
        .iter()
        .map(|v| to_db_value::<E>(col, v))
        .collect()
}

fn pattern_of(value: &Json, op: &str) -> Result<String, AdapterError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AdapterError::BadRequest(format!("{op} expects a string pattern")))
}

fn expect_array<'a>(value: &'a Json, op: &str) -> Result<&'a Vec<Json>, AdapterError> {
    value
        .as_array()
        .ok_or_else(|| AdapterError::BadRequest(format!("{op} expects an array")))
}

fn non_negative(value: &Json, key: &str) -> Result<u64, AdapterError> {
    value
        .as_u64()
        .ok_or_else(|| AdapterError::BadRequest(format!("{key} expects a non-negative integer")))
}

/// Coerce a JSON value into a `sea_orm::Value` using the column's declared
/// type, so comparisons and assignments bind with the right SQL type.
pub(crate) fn to_db_value<E>(col: &E::Column, value: &Json) -> Result<Value, AdapterError>
where
    E: EntityTrait,
{
    let def = col.def();
    let ty = def.get_column_type();
    if value.is_null() {
        return Ok(null_value(ty));
    }
    let mismatch = |expected: &str| {
        AdapterError::BadRequest(format!("expected a {expected} value, got {value}"))
    };
    match ty {
        ColumnType::Boolean => value.as_bool().map(Value::from).ok_or_else(|| mismatch("boolean")),
        ColumnType::TinyInteger | ColumnType::SmallInteger | ColumnType::Integer => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::from)
            .ok_or_else(|| mismatch("integer")),
        ColumnType::BigInteger => value.as_i64().map(Value::from).ok_or_else(|| mismatch("integer")),
        ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::Unsigned => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Value::from)
            .ok_or_else(|| mismatch("unsigned integer")),
        ColumnType::BigUnsigned => value.as_u64().map(Value::from).ok_or_else(|| mismatch("unsigned integer")),
        ColumnType::Float => value.as_f64().map(|n| Value::from(n as f32)).ok_or_else(|| mismatch("number")),
        ColumnType::Double => value.as_f64().map(Value::from).ok_or_else(|| mismatch("number")),
        ColumnType::Uuid => value
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(Value::from)
            .ok_or_else(|| mismatch("uuid string")),
        ColumnType::Json | ColumnType::JsonBinary => Ok(Value::from(value.clone())),
        _ => match value {
            Json::String(s) => Ok(Value::from(s.clone())),
            Json::Bool(b) => Ok(Value::from(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::from(f))
                } else {
                    Err(mismatch("number"))
                }
            }
            _ => Err(mismatch("scalar")),
        },
    }
}

/// A typed NULL for the column, so full-replacement updates bind cleanly.
pub(crate) fn null_value_of<E>(col: &E::Column) -> Value
where
    E: EntityTrait,
{
    null_value(col.def().get_column_type())
}

fn null_value(ty: &ColumnType) -> Value {
    match ty {
        ColumnType::Boolean => Value::Bool(None),
        ColumnType::TinyInteger | ColumnType::SmallInteger | ColumnType::Integer => Value::Int(None),
        ColumnType::BigInteger => Value::BigInt(None),
        ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::Unsigned => {
            Value::Unsigned(None)
        }
        ColumnType::BigUnsigned => Value::BigUnsigned(None),
        ColumnType::Float => Value::Float(None),
        ColumnType::Double => Value::Double(None),
        ColumnType::Uuid => Value::Uuid(None),
        ColumnType::Json | ColumnType::JsonBinary => Value::Json(None),
        _ => Value::String(None),
    }
}

/// Keep only the selected fields plus the id field on an already-fetched
/// record. Used where rows come back from inserts or returning updates.
pub(crate) fn apply_select(record: &mut Json, select: &[String], id_field: &str) {
    if let Json::Object(map) = record {
        map.retain(|key, _| key == id_field || select.iter().any(|s| s == key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::note;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait};
    use serde_json::json;

    fn render(filter: Json) -> String {
        let t = translate::<note::Entity>(Some(&filter)).expect("translate");
        let mut q = note::Entity::find().filter(t.condition);
        for (col, ord) in t.order {
            q = q.order_by(col, ord);
        }
        if let Some(limit) = t.limit {
            q = q.limit(limit);
        }
        if let Some(skip) = t.skip {
            q = q.offset(skip);
        }
        q.build(DbBackend::Sqlite).to_string()
    }

    #[test]
    fn equality_and_operators() {
        let sql = render(json!({"title": "a", "priority": {"$gte": 3, "$lt": 9}}));
        assert!(sql.contains(r#""note"."title" = 'a'"#), "{sql}");
        assert!(sql.contains(r#""note"."priority" >= 3"#), "{sql}");
        assert!(sql.contains(r#""note"."priority" < 9"#), "{sql}");
    }

    #[test]
    fn null_equality_is_is_null() {
        let sql = render(json!({"body": null}));
        assert!(sql.contains(r#""note"."body" IS NULL"#), "{sql}");
        let sql = render(json!({"body": {"$ne": null}}));
        assert!(sql.contains(r#""note"."body" IS NOT NULL"#), "{sql}");
    }

    #[test]
    fn in_and_or() {
        let sql = render(json!({"$or": [{"priority": {"$in": [1, 2]}}, {"title": "x"}]}));
        assert!(sql.contains(r#""note"."priority" IN (1, 2)"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn sort_limit_skip() {
        let sql = render(json!({"$sort": {"priority": -1}, "$limit": 5, "$skip": 10}));
        assert!(sql.contains(r#"ORDER BY "note"."priority" DESC"#), "{sql}");
        assert!(sql.contains("LIMIT 5"), "{sql}");
        assert!(sql.contains("OFFSET 10"), "{sql}");
    }

    #[test]
    fn like_patterns() {
        let sql = render(json!({"title": {"$like": "intro%"}}));
        assert!(sql.contains(r#""note"."title" LIKE 'intro%'"#), "{sql}");
    }

    #[test]
    fn unknown_field_rejected() {
        let err = translate::<note::Entity>(Some(&json!({"nope": 1}))).unwrap_err();
        assert!(matches!(err, AdapterError::BadRequest(_)));
    }

    #[test]
    fn unknown_operator_rejected() {
        let err = translate::<note::Entity>(Some(&json!({"priority": {"$regex": "x"}}))).unwrap_err();
        assert!(matches!(err, AdapterError::BadRequest(_)));
        let err = translate::<note::Entity>(Some(&json!({"$explain": true}))).unwrap_err();
        assert!(matches!(err, AdapterError::BadRequest(_)));
    }

    #[test]
    fn select_validates_fields() {
        let t = translate::<note::Entity>(Some(&json!({"$select": ["title", "done"]}))).unwrap();
        assert_eq!(t.select.as_deref(), Some(&["title".to_string(), "done".to_string()][..]));
        let err = translate::<note::Entity>(Some(&json!({"$select": ["bogus"]}))).unwrap_err();
        assert!(matches!(err, AdapterError::BadRequest(_)));
    }

    #[test]
    fn select_filtering_keeps_id() {
        let mut record = json!({"id": 7, "title": "t", "body": "b"});
        apply_select(&mut record, &["title".to_string()], "id");
        assert_eq!(record, json!({"id": 7, "title": "t"}));
    }
}
