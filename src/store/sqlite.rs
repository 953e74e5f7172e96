//! Local SQLite backend
//!
//! Mirrors the REST contract, including embedded selects. Embeds are resolved
//! with one extra query per relationship level using the foreign keys listed
//! in `RELATIONS`, then every row is projected down to the requested columns.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use sqlx::query::Query as SqlQuery;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};

use super::{check_identifier, require_filters, tables, Column, Embed, Filter, Order, Query, Row, Store};
use crate::error::{FitError, FitResult};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// ---------------------------------------------------------------------------
/// Relationships
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
  /// `child.column` references `parent.id`
  Many,
  /// `parent.column` references `child.id`
  One,
}

#[derive(Debug)]
struct Relation {
  parent: &'static str,
  child: &'static str,
  column: &'static str,
  cardinality: Cardinality,
}

const RELATIONS: &[Relation] = &[
  Relation {
    parent: tables::DAILY_WORKOUTS,
    child: tables::WORKOUT_EXERCISES,
    column: "daily_workout_id",
    cardinality: Cardinality::Many,
  },
  Relation {
    parent: tables::WORKOUT_EXERCISES,
    child: tables::EXERCISE_SETS,
    column: "exercise_id",
    cardinality: Cardinality::Many,
  },
  Relation {
    parent: tables::WORKOUT_PARTNERS,
    child: tables::USERS,
    column: "user_id",
    cardinality: Cardinality::One,
  },
  Relation {
    parent: tables::WORKOUT_PARTNERS,
    child: tables::USERS,
    column: "partner_id",
    cardinality: Cardinality::One,
  },
  Relation {
    parent: tables::DAILY_WORKOUTS,
    child: tables::USERS,
    column: "user_id",
    cardinality: Cardinality::One,
  },
];

fn find_relation(parent: &str, embed: &Embed) -> FitResult<&'static Relation> {
  let candidates: Vec<&Relation> = RELATIONS
    .iter()
    .filter(|r| r.parent == parent && r.child == embed.table)
    .filter(|r| embed.via.as_deref().map_or(true, |via| via == r.column))
    .collect();

  match candidates.as_slice() {
    [relation] => Ok(relation),
    [] => Err(FitError::InvalidInput(format!(
      "No relationship between {} and {}",
      parent, embed.table
    ))),
    _ => Err(FitError::InvalidInput(format!(
      "Ambiguous relationship between {} and {}; name the column with via()",
      parent, embed.table
    ))),
  }
}

/// ---------------------------------------------------------------------------
/// Store
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  /// Full rows of `table` with embeds attached (not yet projected)
  fn load<'a>(
    &'a self,
    table: &'a str,
    columns: &'a [Column],
    filters: Vec<Filter>,
    order: Option<&'a Order>,
    limit: Option<usize>,
  ) -> BoxFuture<'a, FitResult<Vec<Row>>> {
    Box::pin(async move {
      let table = check_identifier(table)?;
      let mut args = Vec::new();
      let mut sql = format!("SELECT * FROM {}", table);

      if !filters.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(&filters, &mut args)?);
      }
      match order {
        Some(order) => {
          let direction = if order.ascending { "ASC" } else { "DESC" };
          sql.push_str(&format!(
            " ORDER BY {} {}, rowid ASC",
            check_identifier(&order.column)?,
            direction
          ));
        }
        None => sql.push_str(" ORDER BY rowid ASC"),
      }
      if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
      }

      debug!("{}", sql);
      let mut query = sqlx::query(&sql);
      for arg in &args {
        query = bind_value(query, arg);
      }
      let mut rows = query
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_json)
        .collect::<FitResult<Vec<Row>>>()?;

      for column in columns {
        if let Column::Embed(embed) = column {
          self.attach(table, embed, &mut rows).await?;
        }
      }

      Ok(rows)
    })
  }

  async fn attach(&self, parent: &str, embed: &Embed, rows: &mut [Row]) -> FitResult<()> {
    if rows.is_empty() {
      return Ok(());
    }
    let relation = find_relation(parent, embed)?;

    match relation.cardinality {
      Cardinality::Many => {
        let ids = distinct_values(rows.iter().filter_map(|r| r.get("id")));
        let children = self
          .load(
            &embed.table,
            &embed.columns,
            vec![Filter::is_in(relation.column, ids)],
            None,
            None,
          )
          .await?;

        let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
        for child in children {
          if let Some(key) = child.get(relation.column).map(key_of) {
            grouped.entry(key).or_default().push(Value::Object(child));
          }
        }
        for row in rows.iter_mut() {
          let children = row
            .get("id")
            .map(key_of)
            .and_then(|key| grouped.get(&key).cloned())
            .unwrap_or_default();
          row.insert(embed.key().to_string(), Value::Array(children));
        }
      }
      Cardinality::One => {
        let ids = distinct_values(rows.iter().filter_map(|r| r.get(relation.column)));
        let children = self
          .load(
            &embed.table,
            &embed.columns,
            vec![Filter::is_in("id", ids)],
            None,
            None,
          )
          .await?;

        let by_id: HashMap<String, Row> = children
          .into_iter()
          .filter_map(|child| child.get("id").map(key_of).map(|key| (key, child)))
          .collect();
        for row in rows.iter_mut() {
          let child = row
            .get(relation.column)
            .map(key_of)
            .and_then(|key| by_id.get(&key).cloned())
            .map(Value::Object)
            .unwrap_or(Value::Null);
          row.insert(embed.key().to_string(), child);
        }
      }
    }

    Ok(())
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn select(&self, query: &Query) -> FitResult<Vec<Row>> {
    let rows = self
      .load(
        &query.table,
        &query.columns,
        query.filters.clone(),
        query.order.as_ref(),
        query.limit,
      )
      .await?;
    Ok(rows.into_iter().map(|row| project(row, &query.columns)).collect())
  }

  async fn insert(&self, table: &str, rows: Vec<Row>) -> FitResult<Vec<Row>> {
    let table = check_identifier(table)?;
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    // One transaction per batch, like a multi-row POST
    let mut tx = self.pool.begin().await?;
    let mut inserted = Vec::with_capacity(rows.len());

    for row in &rows {
      let sql = if row.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
      } else {
        let columns = row
          .keys()
          .map(|k| check_identifier(k))
          .collect::<FitResult<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
          "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
          table,
          columns.join(", "),
          placeholders
        )
      };

      let mut query = sqlx::query(&sql);
      for value in row.values() {
        query = bind_value(query, value);
      }
      let record = query.fetch_one(&mut *tx).await?;
      inserted.push(row_to_json(&record)?);
    }

    tx.commit().await?;
    debug!("Inserted {} rows into {}", inserted.len(), table);
    Ok(inserted)
  }

  async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> FitResult<()> {
    let table = check_identifier(table)?;
    if patch.is_empty() {
      return Ok(());
    }
    require_filters("update", table, filters)?;

    let assignments = patch
      .keys()
      .map(|k| check_identifier(k).map(|k| format!("{} = ?", k)))
      .collect::<FitResult<Vec<_>>>()?;
    let mut args: Vec<Value> = patch.values().cloned().collect();
    let sql = format!(
      "UPDATE {} SET {} WHERE {}",
      table,
      assignments.join(", "),
      where_clause(filters, &mut args)?
    );

    debug!("{}", sql);
    let mut query = sqlx::query(&sql);
    for arg in &args {
      query = bind_value(query, arg);
    }
    query.execute(&self.pool).await?;
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> FitResult<()> {
    let table = check_identifier(table)?;
    require_filters("delete", table, filters)?;

    let mut args = Vec::new();
    let sql = format!("DELETE FROM {} WHERE {}", table, where_clause(filters, &mut args)?);

    debug!("{}", sql);
    let mut query = sqlx::query(&sql);
    for arg in &args {
      query = bind_value(query, arg);
    }
    query.execute(&self.pool).await?;
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// SQL Helpers
/// ---------------------------------------------------------------------------

fn where_clause(filters: &[Filter], args: &mut Vec<Value>) -> FitResult<String> {
  let parts = filters
    .iter()
    .map(|f| filter_sql(f, args))
    .collect::<FitResult<Vec<_>>>()?;
  Ok(parts.join(" AND "))
}

fn filter_sql(filter: &Filter, args: &mut Vec<Value>) -> FitResult<String> {
  let sql = match filter {
    Filter::Eq(column, Value::Null) => format!("{} IS NULL", check_identifier(column)?),
    Filter::Neq(column, Value::Null) => format!("{} IS NOT NULL", check_identifier(column)?),
    Filter::Eq(column, value) => compare(column, "=", value, args)?,
    Filter::Neq(column, value) => compare(column, "!=", value, args)?,
    Filter::Gte(column, value) => compare(column, ">=", value, args)?,
    Filter::Lte(column, value) => compare(column, "<=", value, args)?,
    // LIKE is already case-insensitive for ASCII in SQLite
    Filter::ILike(column, pattern) => compare(column, "LIKE", &Value::String(pattern.clone()), args)?,
    Filter::In(column, values) | Filter::NotIn(column, values) => {
      let negated = matches!(filter, Filter::NotIn(..));
      if values.is_empty() {
        return Ok(if negated { "1" } else { "0" }.to_string());
      }
      args.extend(values.iter().cloned());
      format!(
        "{} {}IN ({})",
        check_identifier(column)?,
        if negated { "NOT " } else { "" },
        vec!["?"; values.len()].join(", ")
      )
    }
    Filter::Or(filters) => {
      if filters.is_empty() {
        return Ok("0".to_string());
      }
      let parts = filters
        .iter()
        .map(|f| filter_sql(f, args))
        .collect::<FitResult<Vec<_>>>()?;
      format!("({})", parts.join(" OR "))
    }
  };
  Ok(sql)
}

fn compare(column: &str, op: &str, value: &Value, args: &mut Vec<Value>) -> FitResult<String> {
  let column = check_identifier(column)?;
  args.push(value.clone());
  Ok(format!("{} {} ?", column, op))
}

fn bind_value<'q>(
  query: SqlQuery<'q, Sqlite, SqliteArguments<'q>>,
  value: &Value,
) -> SqlQuery<'q, Sqlite, SqliteArguments<'q>> {
  match value {
    Value::Null => query.bind(None::<String>),
    Value::Bool(b) => query.bind(*b),
    Value::Number(n) => match n.as_i64() {
      Some(i) => query.bind(i),
      None => query.bind(n.as_f64().unwrap_or(0.0)),
    },
    Value::String(s) => query.bind(s.clone()),
    // Lists such as `shared_with` are stored as JSON text
    other => query.bind(other.to_string()),
  }
}

fn row_to_json(row: &SqliteRow) -> FitResult<Row> {
  let mut out = Row::new();
  for column in row.columns() {
    let idx = column.ordinal();
    let declared = column.type_info().name().to_ascii_uppercase();
    out.insert(column.name().to_string(), decode_column(row, idx, &declared)?);
  }
  Ok(out)
}

fn decode_column(row: &SqliteRow, idx: usize, declared: &str) -> FitResult<Value> {
  if row.try_get_raw(idx)?.is_null() {
    return Ok(Value::Null);
  }

  let typed = match declared {
    "BOOLEAN" => row.try_get::<bool, _>(idx).ok().map(Value::Bool),
    "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row.try_get::<f64, _>(idx).ok().map(|v| json!(v)),
    "INTEGER" | "INT" | "BIGINT" => row.try_get::<i64, _>(idx).ok().map(|v| json!(v)),
    _ => None,
  };

  Ok(
    typed
      .or_else(|| row.try_get::<String, _>(idx).ok().map(Value::String))
      .or_else(|| row.try_get::<i64, _>(idx).ok().map(|v| json!(v)))
      .or_else(|| row.try_get::<f64, _>(idx).ok().map(|v| json!(v)))
      .unwrap_or(Value::Null),
  )
}

/// Keep the requested columns; embeds are projected recursively
fn project(mut row: Row, columns: &[Column]) -> Row {
  let keep_all = columns
    .iter()
    .any(|c| matches!(c, Column::Field(name) if name == "*"));

  let mut out = Row::new();
  for column in columns {
    if let Column::Embed(embed) = column {
      let value = match row.remove(embed.key()) {
        Some(Value::Array(children)) => Value::Array(
          children
            .into_iter()
            .map(|child| match child {
              Value::Object(child) => Value::Object(project(child, &embed.columns)),
              other => other,
            })
            .collect(),
        ),
        Some(Value::Object(child)) => Value::Object(project(child, &embed.columns)),
        Some(other) => other,
        None => Value::Null,
      };
      out.insert(embed.key().to_string(), value);
    }
  }

  for (key, value) in row {
    let requested = columns
      .iter()
      .any(|c| matches!(c, Column::Field(name) if *name == key));
    if keep_all || requested {
      out.entry(key).or_insert(value);
    }
  }
  out
}

fn key_of(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn distinct_values<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
  let mut seen = std::collections::HashSet::new();
  values
    .filter(|v| !v.is_null())
    .filter(|v| seen.insert(key_of(v)))
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::coerce::value_as_flag;
  use crate::store::{fields, to_row};
  use crate::test_utils::{seed_test_user, setup_test_store, teardown_test_store};

  #[test]
  fn test_filter_sql_binds_values() {
    let mut args = Vec::new();
    let sql = where_clause(
      &[
        Filter::eq("user_id", "u1"),
        Filter::gte("date", "2026-10-11"),
        Filter::or(vec![Filter::ilike("name", "%jo%"), Filter::eq("notes", Value::Null)]),
        Filter::not_in("id", vec![]),
      ],
      &mut args,
    )
    .unwrap();

    assert_eq!(
      sql,
      "user_id = ? AND date >= ? AND (name LIKE ? OR notes IS NULL) AND 1"
    );
    assert_eq!(args, vec![json!("u1"), json!("2026-10-11"), json!("%jo%")]);
  }

  #[test]
  fn test_filter_sql_rejects_injection() {
    let mut args = Vec::new();
    let result = filter_sql(&Filter::eq("id = id OR 1", "x"), &mut args);
    assert!(result.is_err());
  }

  #[test]
  fn test_relation_lookup() {
    let embed = Embed::new(tables::USERS);
    assert!(find_relation(tables::WORKOUT_PARTNERS, &embed).is_err());

    let embed = Embed::new(tables::USERS).via("partner_id");
    let relation = find_relation(tables::WORKOUT_PARTNERS, &embed).unwrap();
    assert_eq!(relation.cardinality, Cardinality::One);

    let embed = Embed::new(tables::EXERCISE_SETS);
    assert!(find_relation(tables::DAILY_WORKOUTS, &embed).is_err());
  }

  #[test]
  fn test_project_keeps_requested_columns() {
    let row = to_row(&json!({
      "id": "w1",
      "title": "Legs",
      "workout_exercises": [{"id": "e1", "name": "Squat", "daily_workout_id": "w1"}]
    }))
    .unwrap();
    let columns = vec![
      Column::field("id"),
      Embed::new(tables::WORKOUT_EXERCISES)
        .columns(fields(&["name"]))
        .into(),
    ];

    let projected = project(row, &columns);
    assert_eq!(
      Value::Object(projected),
      json!({"id": "w1", "workout_exercises": [{"name": "Squat"}]})
    );
  }

  #[tokio::test]
  async fn test_insert_returns_generated_columns() {
    let store = setup_test_store().await;
    let user = seed_test_user(&store, "auth-1", "lifter").await;

    let row = to_row(&json!({
      "user_id": user.id,
      "date": "2026-10-14",
      "title": "Legs (10/14/26)",
      "workout_type": "strength",
      "difficulty": "hard",
      "duration": 1,
      "completed": false,
      "is_favorite": false,
      "is_shared": true,
      "shared_with": ["someone"]
    }))
    .unwrap();

    let inserted = store.insert(tables::DAILY_WORKOUTS, vec![row]).await.unwrap();
    assert_eq!(inserted.len(), 1);
    assert!(inserted[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(!value_as_flag(&inserted[0]["completed"]));
    assert!(value_as_flag(&inserted[0]["is_shared"]));
    assert_eq!(inserted[0]["shared_with"], json!("[\"someone\"]"));

    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_nested_select_embeds_children_in_order() {
    let store = setup_test_store().await;
    let user = seed_test_user(&store, "auth-1", "lifter").await;
    let workout_id = crate::test_utils::seed_test_workout(
      &store,
      &user.id,
      "2026-10-14",
      true,
      &[(2, 1), (3, 3)],
    )
    .await;

    let query = Query::from(tables::DAILY_WORKOUTS)
      .select(vec![
        Column::field("id"),
        Column::field("completed"),
        Embed::new(tables::WORKOUT_EXERCISES)
          .columns(vec![
            Column::field("name"),
            Embed::new(tables::EXERCISE_SETS)
              .columns(fields(&["set_number", "completed"]))
              .into(),
          ])
          .into(),
      ])
      .filter(Filter::eq("user_id", user.id.as_str()));

    let rows = store.select(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(workout_id));
    assert!(value_as_flag(&rows[0]["completed"]));

    let exercises = rows[0]["workout_exercises"].as_array().unwrap();
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0]["name"], json!("Exercise 1"));
    assert_eq!(exercises[1]["exercise_sets"].as_array().unwrap().len(), 3);
    assert_eq!(exercises[1]["exercise_sets"][0]["set_number"], json!(1));
    assert!(exercises[0].get("daily_workout_id").is_none());

    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_update_and_delete_require_filters() {
    let store = setup_test_store().await;
    let patch = to_row(&json!({"name": "x"})).unwrap();

    assert!(store.update(tables::USERS, patch, &[]).await.is_err());
    assert!(store.delete(tables::USERS, &[]).await.is_err());

    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_delete_cascades_to_children() {
    let store = setup_test_store().await;
    let user = seed_test_user(&store, "auth-1", "lifter").await;
    let workout_id =
      crate::test_utils::seed_test_workout(&store, &user.id, "2026-10-14", false, &[(3, 0)]).await;

    store
      .delete(tables::DAILY_WORKOUTS, &[Filter::eq("id", workout_id.as_str())])
      .await
      .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercise_sets")
      .fetch_one(store.pool())
      .await
      .unwrap();
    assert_eq!(count, 0);

    teardown_test_store(store).await;
  }
}
