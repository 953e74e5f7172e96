//! PostgREST-style HTTP backend (the hosted database's REST interface)

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{check_identifier, require_filters, Column, Filter, Query, Row, Store};
use crate::error::{FitError, FitResult};
use crate::session::Session;

const REST_PATH: &str = "rest/v1/";

#[derive(Debug, Clone)]
pub struct RestStore {
  client: Client,
  base_url: Url,
  api_key: String,
  access_token: Option<String>,
}

impl RestStore {
  pub fn new(base_url: &str, api_key: &str) -> FitResult<Self> {
    // A trailing slash keeps `join` from dropping the last path segment
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base_url = Url::parse(&normalized)
      .map_err(|e| FitError::MissingConfig(format!("Invalid store URL {}: {}", base_url, e)))?;

    Ok(Self {
      client: Client::new(),
      base_url,
      api_key: api_key.to_string(),
      access_token: None,
    })
  }

  /// Requests run as the signed-in user instead of the anonymous key
  pub fn with_access_token(mut self, token: &str) -> Self {
    self.access_token = Some(token.to_string());
    self
  }

  fn table_url(&self, table: &str) -> FitResult<Url> {
    let table = check_identifier(table)?;
    self
      .base_url
      .join(&format!("{}{}", REST_PATH, table))
      .map_err(|e| FitError::Persistence(format!("Failed to build URL for {}: {}", table, e)))
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
    self
      .client
      .request(method, url)
      .header("apikey", &self.api_key)
      .header("Authorization", format!("Bearer {}", bearer))
      .header("Accept", "application/json")
  }
}

#[async_trait]
impl Store for RestStore {
  async fn select(&self, query: &Query) -> FitResult<Vec<Row>> {
    let mut url = self.table_url(&query.table)?;
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("select", &render_columns(&query.columns));
      for filter in &query.filters {
        let (key, value) = filter_param(filter);
        pairs.append_pair(&key, &value);
      }
      if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
      }
      if let Some(limit) = query.limit {
        pairs.append_pair("limit", &limit.to_string());
      }
    }

    debug!("GET {}", url);
    let response = check(self.request(Method::GET, url).send().await?).await?;
    Ok(response.json::<Vec<Row>>().await?)
  }

  async fn insert(&self, table: &str, rows: Vec<Row>) -> FitResult<Vec<Row>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let url = self.table_url(table)?;
    debug!("POST {} ({} rows)", url, rows.len());
    let response = check(
      self
        .request(Method::POST, url)
        .header("Prefer", "return=representation")
        .json(&rows)
        .send()
        .await?,
    )
    .await?;
    Ok(response.json::<Vec<Row>>().await?)
  }

  async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> FitResult<()> {
    if patch.is_empty() {
      return Ok(());
    }
    require_filters("update", table, filters)?;
    let url = filtered_url(self.table_url(table)?, filters);
    debug!("PATCH {}", url);
    check(
      self
        .request(Method::PATCH, url)
        .header("Prefer", "return=minimal")
        .json(&patch)
        .send()
        .await?,
    )
    .await?;
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> FitResult<()> {
    require_filters("delete", table, filters)?;
    let url = filtered_url(self.table_url(table)?, filters);
    debug!("DELETE {}", url);
    check(self.request(Method::DELETE, url).send().await?).await?;
    Ok(())
  }

  fn for_session(&self, session: &Session) -> Option<Box<dyn Store>> {
    let token = session.access_token()?;
    Some(Box::new(self.clone().with_access_token(token)))
  }
}

/// ---------------------------------------------------------------------------
/// Query String Rendering
/// ---------------------------------------------------------------------------

pub fn render_columns(columns: &[Column]) -> String {
  columns
    .iter()
    .map(|column| match column {
      Column::Field(name) => name.clone(),
      Column::Embed(embed) => {
        let mut head = String::new();
        if let Some(alias) = &embed.alias {
          head.push_str(alias);
          head.push(':');
        }
        head.push_str(&embed.table);
        if let Some(via) = &embed.via {
          head.push('!');
          head.push_str(via);
        }
        format!("{}({})", head, render_columns(&embed.columns))
      }
    })
    .collect::<Vec<_>>()
    .join(",")
}

/// One `key=value` pair of the PostgREST filter grammar
pub fn filter_param(filter: &Filter) -> (String, String) {
  match filter {
    Filter::Eq(column, Value::Null) => (column.clone(), "is.null".to_string()),
    Filter::Eq(column, value) => (column.clone(), format!("eq.{}", render_value(value))),
    Filter::Neq(column, Value::Null) => (column.clone(), "not.is.null".to_string()),
    Filter::Neq(column, value) => (column.clone(), format!("neq.{}", render_value(value))),
    Filter::Gte(column, value) => (column.clone(), format!("gte.{}", render_value(value))),
    Filter::Lte(column, value) => (column.clone(), format!("lte.{}", render_value(value))),
    Filter::ILike(column, pattern) => (column.clone(), format!("ilike.{}", pattern.replace('%', "*"))),
    Filter::In(column, values) => (column.clone(), format!("in.({})", render_list(values))),
    Filter::NotIn(column, values) => (column.clone(), format!("not.in.({})", render_list(values))),
    Filter::Or(filters) => {
      let inner = filters
        .iter()
        .map(|f| {
          let (key, value) = filter_param(f);
          if matches!(f, Filter::Or(_)) {
            format!("or{}", value)
          } else {
            format!("{}.{}", key, value)
          }
        })
        .collect::<Vec<_>>()
        .join(",");
      ("or".to_string(), format!("({})", inner))
    }
  }
}

fn filtered_url(mut url: Url, filters: &[Filter]) -> Url {
  if !filters.is_empty() {
    let mut pairs = url.query_pairs_mut();
    for filter in filters {
      let (key, value) = filter_param(filter);
      pairs.append_pair(&key, &value);
    }
  }
  url
}

fn render_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

fn render_list(values: &[Value]) -> String {
  values
    .iter()
    .map(|v| {
      let rendered = render_value(v);
      if rendered.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", rendered.replace('"', "\\\""))
      } else {
        rendered
      }
    })
    .collect::<Vec<_>>()
    .join(",")
}

async fn check(response: Response) -> FitResult<Response> {
  let status = response.status();
  if status == StatusCode::UNAUTHORIZED {
    return Err(FitError::NotAuthenticated);
  }
  if !status.is_success() {
    let error_text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&error_text)
      .ok()
      .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
      .unwrap_or(error_text);
    return Err(FitError::Persistence(format!("{}: {}", status, message)));
  }
  Ok(response)
}
