//! Query interface over the relational store
//!
//! Rows travel as JSON objects so the same services run against the hosted
//! REST endpoint and the local SQLite file. Typed models are decoded at the
//! service layer with the lenient readers in `models::coerce`.

pub mod rest;
pub mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FitError, FitResult};
use crate::session::Session;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

pub type Row = serde_json::Map<String, Value>;

pub mod tables {
  pub const USERS: &str = "users";
  pub const DAILY_WORKOUTS: &str = "daily_workouts";
  pub const WORKOUT_EXERCISES: &str = "workout_exercises";
  pub const EXERCISE_SETS: &str = "exercise_sets";
  pub const WORKOUT_PARTNERS: &str = "workout_partners";
}

/// ---------------------------------------------------------------------------
/// Query Model
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
  /// A column name, or `*`
  Field(String),
  Embed(Embed),
}

impl Column {
  pub fn field(name: &str) -> Self {
    Column::Field(name.to_string())
  }

  pub fn all() -> Self {
    Column::Field("*".to_string())
  }
}

pub fn fields(names: &[&str]) -> Vec<Column> {
  names.iter().map(|n| Column::field(n)).collect()
}

/// Related rows fetched alongside the parent. `via` names the foreign-key
/// column when two relationships join the same pair of tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
  pub table: String,
  pub alias: Option<String>,
  pub via: Option<String>,
  pub columns: Vec<Column>,
}

impl Embed {
  pub fn new(table: &str) -> Self {
    Self {
      table: table.to_string(),
      alias: None,
      via: None,
      columns: vec![Column::all()],
    }
  }

  pub fn alias(mut self, alias: &str) -> Self {
    self.alias = Some(alias.to_string());
    self
  }

  pub fn via(mut self, column: &str) -> Self {
    self.via = Some(column.to_string());
    self
  }

  pub fn columns(mut self, columns: Vec<Column>) -> Self {
    self.columns = columns;
    self
  }

  /// Key the embedded rows appear under in the parent row
  pub fn key(&self) -> &str {
    self.alias.as_deref().unwrap_or(&self.table)
  }
}

impl From<Embed> for Column {
  fn from(embed: Embed) -> Self {
    Column::Embed(embed)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  Eq(String, Value),
  Neq(String, Value),
  Gte(String, Value),
  Lte(String, Value),
  /// Case-insensitive match; `%` is the wildcard
  ILike(String, String),
  In(String, Vec<Value>),
  NotIn(String, Vec<Value>),
  Or(Vec<Filter>),
}

impl Filter {
  pub fn eq(column: &str, value: impl Into<Value>) -> Self {
    Filter::Eq(column.to_string(), value.into())
  }

  pub fn neq(column: &str, value: impl Into<Value>) -> Self {
    Filter::Neq(column.to_string(), value.into())
  }

  pub fn gte(column: &str, value: impl Into<Value>) -> Self {
    Filter::Gte(column.to_string(), value.into())
  }

  pub fn lte(column: &str, value: impl Into<Value>) -> Self {
    Filter::Lte(column.to_string(), value.into())
  }

  pub fn ilike(column: &str, pattern: &str) -> Self {
    Filter::ILike(column.to_string(), pattern.to_string())
  }

  pub fn is_in(column: &str, values: Vec<Value>) -> Self {
    Filter::In(column.to_string(), values)
  }

  pub fn not_in(column: &str, values: Vec<Value>) -> Self {
    Filter::NotIn(column.to_string(), values)
  }

  pub fn or(filters: Vec<Filter>) -> Self {
    Filter::Or(filters)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
  pub column: String,
  pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  pub table: String,
  pub columns: Vec<Column>,
  pub filters: Vec<Filter>,
  pub order: Option<Order>,
  pub limit: Option<usize>,
}

impl Query {
  pub fn from(table: &str) -> Self {
    Self {
      table: table.to_string(),
      columns: vec![Column::all()],
      filters: Vec::new(),
      order: None,
      limit: None,
    }
  }

  pub fn select(mut self, columns: Vec<Column>) -> Self {
    self.columns = columns;
    self
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filters.push(filter);
    self
  }

  pub fn order(mut self, column: &str, ascending: bool) -> Self {
    self.order = Some(Order {
      column: column.to_string(),
      ascending,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

/// ---------------------------------------------------------------------------
/// Store Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
  async fn select(&self, query: &Query) -> FitResult<Vec<Row>>;

  /// Inserts all rows as one batch and returns them as stored
  async fn insert(&self, table: &str, rows: Vec<Row>) -> FitResult<Vec<Row>>;

  async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> FitResult<()>;

  async fn delete(&self, table: &str, filters: &[Filter]) -> FitResult<()>;

  /// A copy that acts as the session's user. `None` when the backend has no
  /// per-user credentials and the shared store is used as is.
  fn for_session(&self, _session: &Session) -> Option<Box<dyn Store>> {
    None
  }
}

/// The store an operation should use for one session
pub struct SessionStore<'a> {
  scoped: Option<Box<dyn Store>>,
  shared: &'a dyn Store,
}

impl<'a> SessionStore<'a> {
  pub fn new(store: &'a dyn Store, session: &Session) -> Self {
    Self {
      scoped: store.for_session(session),
      shared: store,
    }
  }

  pub fn get(&self) -> &dyn Store {
    match &self.scoped {
      Some(store) => store.as_ref(),
      None => self.shared,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Row Helpers
/// ---------------------------------------------------------------------------

pub fn to_row<T: Serialize>(value: &T) -> FitResult<Row> {
  match serde_json::to_value(value)? {
    Value::Object(row) => Ok(row),
    other => Err(FitError::InvalidInput(format!(
      "Expected an object row, got {}",
      other
    ))),
  }
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> FitResult<Vec<T>> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(Value::Object(row)).map_err(FitError::from))
    .collect()
}

pub async fn select_as<T: DeserializeOwned>(store: &dyn Store, query: &Query) -> FitResult<Vec<T>> {
  from_rows(store.select(query).await?)
}

/// First matching row, if any
pub async fn select_first<T: DeserializeOwned>(
  store: &dyn Store,
  query: Query,
) -> FitResult<Option<T>> {
  let rows = store.select(&query.limit(1)).await?;
  Ok(from_rows(rows)?.into_iter().next())
}

pub async fn insert_one<T: Serialize, R: DeserializeOwned>(
  store: &dyn Store,
  table: &str,
  value: &T,
) -> FitResult<R> {
  let rows = store.insert(table, vec![to_row(value)?]).await?;
  from_rows(rows)?
    .into_iter()
    .next()
    .ok_or_else(|| FitError::Persistence(format!("Insert into {} returned no rows", table)))
}

pub async fn insert_many<T: Serialize, R: DeserializeOwned>(
  store: &dyn Store,
  table: &str,
  values: &[T],
) -> FitResult<Vec<R>> {
  let rows = values.iter().map(to_row).collect::<FitResult<Vec<_>>>()?;
  from_rows(store.insert(table, rows).await?)
}

/// Table and column names end up in SQL text and URLs, values never do
pub fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
    && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub(crate) fn check_identifier(name: &str) -> FitResult<&str> {
  if is_identifier(name) {
    Ok(name)
  } else {
    Err(FitError::InvalidInput(format!("Invalid identifier: {}", name)))
  }
}

/// Unfiltered writes would touch the whole table
pub(crate) fn require_filters(action: &str, table: &str, filters: &[Filter]) -> FitResult<()> {
  if filters.is_empty() {
    return Err(FitError::InvalidInput(format!(
      "Refusing to {} every row of {}",
      action, table
    )));
  }
  Ok(())
}
